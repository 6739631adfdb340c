//! HTTP clients for the two first-party services.
//!
//! Both services take multipart uploads and answer with small JSON bodies.
//! On failure they answer `{"error": "..."}` with a 4xx/5xx status; that
//! message is carried into [`EngineError::BadStatus`] so the operator sees
//! the service's own explanation.

use super::{BatchImage, BatchRecognizer, Rasterizer};
use crate::config::{AnswerLanguage, GraderConfig};
use crate::error::{EngineError, GraderError};
use crate::model::{RasterPage, UploadedFile};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const RASTERIZER: &str = "rasteriser";
const BATCH_OCR: &str = "batch OCR";

/// Build the HTTP client shared by both services.
pub fn build_client(config: &GraderConfig) -> Result<Client, GraderError> {
    let mut builder = Client::builder();
    if let Some(secs) = config.http_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder
        .build()
        .map_err(|e| GraderError::Internal(format!("Failed to build HTTP client: {e}")))
}

// ── Rasterisation ────────────────────────────────────────────────────────

/// Client for the `extract_pdf` endpoint.
#[derive(Debug, Clone)]
pub struct HttpRasterizer {
    client: Client,
    url: String,
}

impl HttpRasterizer {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[derive(Deserialize)]
struct RasterResponse {
    pages: Option<Vec<RasterPage>>,
}

#[async_trait]
impl Rasterizer for HttpRasterizer {
    async fn rasterize(&self, file: &UploadedFile) -> Result<Vec<RasterPage>, EngineError> {
        info!("Rasterising {} ({} bytes)", file.filename, file.bytes.len());

        let part = Part::bytes(file.bytes.clone())
            .file_name(file.filename.clone())
            .mime_str("application/pdf")
            .map_err(|e| EngineError::InvalidPayload {
                engine: RASTERIZER.to_string(),
                filename: file.filename.clone(),
                detail: e.to_string(),
            })?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| EngineError::from_transport(RASTERIZER, e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| EngineError::from_transport(RASTERIZER, e))?;

        let pages = parse_raster_response(status, &body)?;
        debug!("{}: {} pages", file.filename, pages.len());
        Ok(pages)
    }
}

/// Decode the rasteriser's reply.
pub(crate) fn parse_raster_response(status: u16, body: &[u8]) -> Result<Vec<RasterPage>, EngineError> {
    check_status(RASTERIZER, status, body)?;
    let parsed: RasterResponse =
        serde_json::from_slice(body).map_err(|e| EngineError::Malformed {
            engine: RASTERIZER.to_string(),
            detail: e.to_string(),
        })?;
    parsed.pages.ok_or_else(|| EngineError::Malformed {
        engine: RASTERIZER.to_string(),
        detail: "missing 'pages' array".to_string(),
    })
}

// ── Batch recognition ────────────────────────────────────────────────────

/// Client for the batch `ocr` endpoint.
#[derive(Debug, Clone)]
pub struct HttpBatchRecognizer {
    client: Client,
    url: String,
}

impl HttpBatchRecognizer {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[derive(Deserialize)]
struct OcrResponse {
    text: Option<String>,
}

#[async_trait]
impl BatchRecognizer for HttpBatchRecognizer {
    async fn recognize(
        &self,
        images: &[BatchImage],
        language: AnswerLanguage,
    ) -> Result<String, EngineError> {
        info!(
            "Batch OCR: {} image(s), lang={}",
            images.len(),
            language.code()
        );

        let form = build_batch_form(images)?;

        let response = self
            .client
            .post(&self.url)
            .query(&[("lang", language.code())])
            .multipart(form)
            .send()
            .await
            .map_err(|e| EngineError::from_transport(BATCH_OCR, e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| EngineError::from_transport(BATCH_OCR, e))?;

        let text = parse_ocr_response(status, &body)?;
        debug!("Batch OCR returned {} chars", text.chars().count());
        Ok(text)
    }
}

/// Assemble the `images` multipart form.
///
/// A part whose media type the transport rejects is left out with a warning
/// so one bad upload cannot sink the whole batch. When no part survives the
/// first rejection is returned and nothing is sent.
pub(crate) fn build_batch_form(images: &[BatchImage]) -> Result<Form, EngineError> {
    let mut form = Form::new();
    let mut accepted = 0usize;
    let mut first_rejection = None;
    for img in images {
        match Part::bytes(img.bytes.clone())
            .file_name(img.filename.clone())
            .mime_str(&img.media_type)
        {
            Ok(part) => {
                form = form.part("images", part);
                accepted += 1;
            }
            Err(e) => {
                warn!(
                    "Skipping {} in batch OCR: media type {:?} rejected ({e})",
                    img.filename, img.media_type
                );
                first_rejection.get_or_insert(EngineError::InvalidPayload {
                    engine: BATCH_OCR.to_string(),
                    filename: img.filename.clone(),
                    detail: e.to_string(),
                });
            }
        }
    }
    match first_rejection {
        Some(err) if accepted == 0 => Err(err),
        _ => Ok(form),
    }
}

/// Decode the batch OCR reply. A success without `text` means no text.
pub(crate) fn parse_ocr_response(status: u16, body: &[u8]) -> Result<String, EngineError> {
    check_status(BATCH_OCR, status, body)?;
    let parsed: OcrResponse = serde_json::from_slice(body).map_err(|e| EngineError::Malformed {
        engine: BATCH_OCR.to_string(),
        detail: e.to_string(),
    })?;
    Ok(parsed.text.unwrap_or_default())
}

// ── Helpers ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

fn check_status(engine: &str, status: u16, body: &[u8]) -> Result<(), EngineError> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    let message = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error);
    Err(EngineError::BadStatus {
        engine: engine.to_string(),
        status,
        message,
    })
}
