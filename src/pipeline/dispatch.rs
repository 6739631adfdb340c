//! Recognition dispatch: pick an engine for the current selection, fall back
//! when it fails, and normalise whatever text comes back.
//!
//! ## Dispatch rule
//!
//! ```text
//! 0 selected  ──▶ ValidationError::NoSelection (no call)
//! 1 selected  ──▶ vision engine ──ok──▶ normalise
//!                      │ err
//!                      ▼
//!                 batch OCR (same item) ──▶ normalise / diagnostic
//! N selected  ──▶ batch OCR (all items, one request) ──▶ normalise / diagnostic
//! ```
//!
//! The vision engine accepts a single image per call, so it is never tried
//! for multi-page selections. When every applicable engine has failed the
//! outcome carries a diagnostic string for the text slot; engine errors never
//! escape this module.

use crate::config::{AnswerLanguage, NormalizationStrategy};
use crate::engines::{BatchImage, BatchRecognizer, VisionRecognizer};
use crate::error::{EngineError, ValidationError};
use crate::model::{EngineKind, PreviewItem, RecognitionOutcome, RecognizedText};
use crate::pipeline::normalize::normalize;
use crate::progress::SessionProgressCallback;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Prefix of the diagnostic placed in the text slot when recognition fails.
pub const OCR_FAILURE_PREFIX: &str = "OCR failed: ";

/// Everything the dispatcher needs besides the selection itself.
pub struct Dispatcher<'a> {
    pub batch: &'a dyn BatchRecognizer,
    pub language: AnswerLanguage,
    pub strategy: NormalizationStrategy,
    pub progress: &'a dyn SessionProgressCallback,
}

impl Dispatcher<'_> {
    /// Recognise the text of `selected`.
    ///
    /// `acquire_vision` is only awaited for single-item selections, so the
    /// vision capability is never constructed for batch-only work. A failure
    /// to acquire it counts as a vision-engine failure and triggers the
    /// fallback.
    pub async fn dispatch<F, Fut>(
        &self,
        selected: &[&PreviewItem],
        acquire_vision: F,
    ) -> Result<RecognitionOutcome, ValidationError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn VisionRecognizer>, EngineError>>,
    {
        if selected.is_empty() {
            return Err(ValidationError::NoSelection);
        }

        let mut fell_back = false;

        if let [item] = selected {
            self.progress.on_recognition_start(EngineKind::Vision, 1);
            match transcribe_single(item, acquire_vision).await {
                Ok(raw) => return Ok(self.finish(raw, EngineKind::Vision, false)),
                Err(e) => {
                    warn!("Vision engine failed, falling back to batch OCR: {}", e);
                    self.progress.on_recognition_fallback(&e.to_string());
                    fell_back = true;
                }
            }
        }

        self.progress
            .on_recognition_start(EngineKind::Batch, selected.len());
        match recognize_batch(selected, self.batch, self.language).await {
            Ok(raw) => Ok(self.finish(raw, EngineKind::Batch, fell_back)),
            Err(e) => {
                warn!("OCR failed: {}", e);
                let diagnostic = format!("{OCR_FAILURE_PREFIX}{e}");
                self.progress
                    .on_recognition_complete(None, diagnostic.chars().count());
                Ok(RecognitionOutcome::Failed {
                    diagnostic,
                    cause: e,
                })
            }
        }
    }

    fn finish(&self, raw: String, engine: EngineKind, fell_back: bool) -> RecognitionOutcome {
        let normalized = normalize(&raw, self.strategy);
        info!(
            "Recognised {} chars via {} ({} after {:?})",
            raw.chars().count(),
            engine,
            normalized.chars().count(),
            self.strategy
        );
        self.progress
            .on_recognition_complete(Some(engine), normalized.chars().count());
        RecognitionOutcome::Recognized(RecognizedText {
            raw,
            normalized,
            engine,
            fell_back,
        })
    }
}

/// Vision-engine attempt for one item. Blank replies count as failures.
async fn transcribe_single<F, Fut>(item: &PreviewItem, acquire_vision: F) -> Result<String, EngineError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Arc<dyn VisionRecognizer>, EngineError>>,
{
    let engine = acquire_vision().await?;
    let data_uri = item.image.to_data_uri();
    debug!("Vision request for {} ({} bytes data URI)", item.id, data_uri.len());

    let text = engine.transcribe(&data_uri).await?.into_text();
    if text.trim().is_empty() {
        return Err(EngineError::EmptyResponse {
            engine: EngineKind::Vision.name().to_string(),
        });
    }
    Ok(text)
}

/// One batch request carrying every selected item's binary content.
///
/// Items whose payload cannot be decoded are left out; if none remain the
/// request is not sent.
async fn recognize_batch(
    selected: &[&PreviewItem],
    batch: &dyn BatchRecognizer,
    language: AnswerLanguage,
) -> Result<String, EngineError> {
    let mut images = Vec::with_capacity(selected.len());
    let mut last_err = None;

    for item in selected {
        match item.image.to_bytes() {
            Ok((media_type, bytes)) => images.push(BatchImage {
                filename: item.upload_name(),
                media_type,
                bytes,
            }),
            Err(e) => {
                warn!("Skipping {}: {}", item.upload_name(), e);
                last_err = Some(EngineError::InvalidPayload {
                    engine: EngineKind::Batch.name().to_string(),
                    filename: item.upload_name(),
                    detail: e.to_string(),
                });
            }
        }
    }

    if images.is_empty() {
        return Err(last_err.unwrap_or_else(|| EngineError::EmptyResponse {
            engine: EngineKind::Batch.name().to_string(),
        }));
    }

    batch.recognize(&images, language).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EngineReply, ImagePayload, PreviewId};
    use crate::progress::NoopProgressCallback;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBatch {
        requests: Mutex<Vec<Vec<BatchImage>>>,
        reply: Option<String>,
    }

    #[async_trait]
    impl BatchRecognizer for RecordingBatch {
        async fn recognize(
            &self,
            images: &[BatchImage],
            _language: AnswerLanguage,
        ) -> Result<String, EngineError> {
            self.requests.lock().unwrap().push(images.to_vec());
            self.reply.clone().ok_or_else(|| EngineError::Unreachable {
                engine: "batch OCR".into(),
                reason: "connection refused".into(),
            })
        }
    }

    struct BlankVision;

    #[async_trait]
    impl VisionRecognizer for BlankVision {
        async fn transcribe(&self, _image: &str) -> Result<EngineReply, EngineError> {
            Ok(EngineReply::Text("   ".into()))
        }
    }

    fn item(id: u64, image: ImagePayload) -> PreviewItem {
        PreviewItem {
            id: PreviewId(id),
            image,
            filename: "scan.pdf".into(),
            origin_page: Some(id as u32),
            from_pdf: true,
            selected: true,
        }
    }

    fn dispatcher(batch: &RecordingBatch) -> Dispatcher<'_> {
        Dispatcher {
            batch,
            language: AnswerLanguage::English,
            strategy: NormalizationStrategy::DuplicatePass,
            progress: &NoopProgressCallback,
        }
    }

    async fn no_vision() -> Result<Arc<dyn VisionRecognizer>, EngineError> {
        panic!("vision engine must not be acquired")
    }

    #[tokio::test]
    async fn blank_vision_reply_falls_back() {
        let batch = RecordingBatch {
            reply: Some("from batch".into()),
            ..Default::default()
        };
        let it = item(1, ImagePayload::DataUri("data:image/png;base64,AA==".into()));

        let outcome = dispatcher(&batch)
            .dispatch(&[&it], || async { Ok(Arc::new(BlankVision) as Arc<dyn VisionRecognizer>) })
            .await
            .unwrap();

        match outcome {
            RecognitionOutcome::Recognized(r) => {
                assert_eq!(r.engine, EngineKind::Batch);
                assert!(r.fell_back);
                assert_eq!(r.normalized, "from batch");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(batch.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn undecodable_items_are_left_out_of_batch() {
        let batch = RecordingBatch {
            reply: Some("ok".into()),
            ..Default::default()
        };
        let good = item(1, ImagePayload::DataUri("data:image/png;base64,AA==".into()));
        let bad = item(2, ImagePayload::DataUri("garbage".into()));

        dispatcher(&batch)
            .dispatch(&[&good, &bad], no_vision)
            .await
            .unwrap();

        let requests = batch.requests.lock().unwrap();
        assert_eq!(requests[0].len(), 1);
        assert_eq!(requests[0][0].filename, "scan.pdf_p1.png");
        assert_eq!(requests[0][0].bytes, vec![0]);
    }

    #[tokio::test]
    async fn nothing_decodable_means_no_request() {
        let batch = RecordingBatch::default();
        let bad = item(2, ImagePayload::DataUri("garbage".into()));
        let bad2 = item(3, ImagePayload::DataUri("data:,x".into()));

        let outcome = dispatcher(&batch)
            .dispatch(&[&bad, &bad2], no_vision)
            .await
            .unwrap();

        assert!(batch.requests.lock().unwrap().is_empty());
        assert!(outcome.text().starts_with(OCR_FAILURE_PREFIX));
    }

    #[tokio::test]
    async fn batch_failure_becomes_diagnostic() {
        let batch = RecordingBatch::default();
        let a = item(1, ImagePayload::DataUri("data:image/png;base64,AA==".into()));
        let b = item(2, ImagePayload::DataUri("data:image/png;base64,AQ==".into()));

        let outcome = dispatcher(&batch).dispatch(&[&a, &b], no_vision).await.unwrap();

        assert!(!outcome.is_success());
        assert_eq!(
            outcome.text(),
            "OCR failed: batch OCR unreachable: connection refused"
        );
    }
}
