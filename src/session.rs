//! The grading session: one operator's working state.
//!
//! A [`GradingSession`] owns everything an operator builds up while grading
//! one script: the preview collection, the recognised-text slot and the
//! evaluation slot. Each user action (ingest, recognise, evaluate) is one
//! `async` method made of sequential engine calls; nothing runs in the
//! background between actions.
//!
//! Engine failures never escape an action. They are written into the slot
//! the action targets as a diagnostic string, so the session stays usable for
//! another attempt and unrelated slots keep their contents.
//!
//! ## Engine capabilities
//!
//! The rasteriser and the batch OCR service are plain HTTP clients built up
//! front. The vision and grading engines need an LLM provider; they are
//! resolved on first use and then kept for the rest of the session. Any of
//! the four can be injected through [`GradingSessionBuilder`].

use crate::config::GraderConfig;
use crate::engines::http::{build_client, HttpBatchRecognizer, HttpRasterizer};
use crate::engines::{llm, BatchRecognizer, GradingEngine, Rasterizer, VisionRecognizer};
use crate::error::{EngineError, GraderError, ValidationError};
use crate::model::{
    EvaluationOutcome, IngestReport, PreviewId, PreviewItem, RecognitionOutcome, UploadedFile,
};
use crate::pipeline::dispatch::Dispatcher;
use crate::pipeline::evaluate::{evaluate, evaluate_by_keywords, EvaluationRequest};
use crate::pipeline::ingest::ingest_files;
use crate::pipeline::selection::PreviewCollection;
use crate::progress::{NoopProgressCallback, SessionProgressCallback};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// State and engines for one grading session.
pub struct GradingSession {
    config: GraderConfig,
    previews: PreviewCollection,
    recognized_text: String,
    last_recognition: Option<RecognitionOutcome>,
    evaluation: Option<EvaluationOutcome>,
    busy: Arc<AtomicBool>,

    rasterizer: Arc<dyn Rasterizer>,
    batch: Arc<dyn BatchRecognizer>,
    vision: OnceCell<Arc<dyn VisionRecognizer>>,
    grader: OnceCell<Arc<dyn GradingEngine>>,
}

impl GradingSession {
    /// Session with the default HTTP and LLM engines.
    pub fn new(config: GraderConfig) -> Result<Self, GraderError> {
        Self::builder(config).build()
    }

    pub fn builder(config: GraderConfig) -> GradingSessionBuilder {
        GradingSessionBuilder {
            config,
            rasterizer: None,
            batch: None,
            vision: None,
            grader: None,
        }
    }

    pub fn config(&self) -> &GraderConfig {
        &self.config
    }

    // ── Ingestion ────────────────────────────────────────────────────────

    /// Turn `files` into preview items appended to the collection.
    ///
    /// PDFs that fail to rasterise are listed in the report; they do not
    /// affect the other files.
    pub async fn ingest(&mut self, files: Vec<UploadedFile>) -> IngestReport {
        let _guard = BusyGuard::acquire(&self.busy);
        let progress = progress_of(&self.config);
        ingest_files(files, &*self.rasterizer, &mut self.previews, progress).await
    }

    /// Read `paths` from disk and ingest them as one batch.
    ///
    /// Fails before any ingestion if a file cannot be read.
    pub async fn ingest_paths<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
    ) -> Result<IngestReport, GraderError> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            files.push(UploadedFile::from_path(path).await?);
        }
        Ok(self.ingest(files).await)
    }

    // ── Selection ────────────────────────────────────────────────────────

    pub fn previews(&self) -> &PreviewCollection {
        &self.previews
    }

    /// Flip one item's selection flag. None for an unknown id.
    pub fn toggle(&mut self, id: PreviewId) -> Option<bool> {
        self.previews.toggle(id)
    }

    /// Make `id` the active item and flip its selection flag.
    pub fn click(&mut self, id: PreviewId) -> Option<bool> {
        self.previews.click(id)
    }

    pub fn set_active(&mut self, id: PreviewId) -> bool {
        self.previews.set_active(id)
    }

    pub fn remove(&mut self, id: PreviewId) -> Option<PreviewItem> {
        self.previews.remove(id)
    }

    pub fn select_all(&mut self, selected: bool) {
        self.previews.select_all(selected)
    }

    // ── Recognition ──────────────────────────────────────────────────────

    /// Recognise the selected items and overwrite the text slot.
    ///
    /// Returns `NoSelection` without contacting any engine when nothing is
    /// selected; the slot is left untouched in that case. Otherwise the slot
    /// receives either the normalised text or an `OCR failed: ...`
    /// diagnostic.
    pub async fn recognize(&mut self) -> Result<&RecognitionOutcome, ValidationError> {
        let _guard = BusyGuard::acquire(&self.busy);

        let outcome = {
            let selected = self.previews.selected();
            info!("Recognising {} selected item(s)", selected.len());
            let dispatcher = Dispatcher {
                batch: &*self.batch,
                language: self.config.language,
                strategy: self.config.normalization,
                progress: progress_of(&self.config),
            };
            dispatcher
                .dispatch(&selected, || self.vision_engine())
                .await?
        };

        self.recognized_text = outcome.text().to_string();
        Ok(self.last_recognition.insert(outcome))
    }

    /// Current contents of the recognised-text slot.
    pub fn recognized_text(&self) -> &str {
        &self.recognized_text
    }

    /// Replace the recognised text, e.g. after the operator corrected it.
    pub fn set_recognized_text(&mut self, text: impl Into<String>) {
        self.recognized_text = text.into();
    }

    /// Outcome of the most recent recognition, if any.
    pub fn last_recognition(&self) -> Option<&RecognitionOutcome> {
        self.last_recognition.as_ref()
    }

    // ── Evaluation ───────────────────────────────────────────────────────

    /// Grade the current text slot against `answer_key` and `rubric`.
    ///
    /// A blank rubric or answer key is rejected before any engine call and
    /// leaves the evaluation slot untouched.
    pub async fn evaluate(
        &mut self,
        answer_key: &str,
        rubric: &str,
    ) -> Result<&EvaluationOutcome, ValidationError> {
        let _guard = BusyGuard::acquire(&self.busy);

        let outcome = {
            let request = EvaluationRequest {
                answer_key,
                student_text: &self.recognized_text,
                rubric,
            };
            evaluate(
                request,
                self.config.language,
                &self.config.grading_model,
                || self.grading_engine(),
                progress_of(&self.config),
            )
            .await?
        };

        Ok(self.evaluation.insert(outcome))
    }

    /// Grade the current text slot by keyword matching, without an engine.
    ///
    /// `marks_key` and `keywords_key` hold one line per answer-key line and
    /// may be empty. A blank answer key leaves the evaluation slot untouched.
    pub fn evaluate_keywords(
        &mut self,
        answer_key: &str,
        marks_key: &str,
        keywords_key: &str,
    ) -> Result<&EvaluationOutcome, ValidationError> {
        let _guard = BusyGuard::acquire(&self.busy);
        let outcome = evaluate_by_keywords(
            answer_key,
            &self.recognized_text,
            marks_key,
            keywords_key,
            progress_of(&self.config),
        )?;
        Ok(self.evaluation.insert(outcome))
    }

    /// Current contents of the evaluation slot; empty before the first run.
    pub fn evaluation_text(&self) -> &str {
        self.evaluation.as_ref().map(|e| e.text()).unwrap_or_default()
    }

    pub fn evaluation(&self) -> Option<&EvaluationOutcome> {
        self.evaluation.as_ref()
    }

    // ── Busy flag ────────────────────────────────────────────────────────

    /// True while an action is in flight. Advisory only: it never blocks.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// A handle that observes the busy flag from outside the session.
    pub fn busy_indicator(&self) -> BusyIndicator {
        BusyIndicator(Arc::clone(&self.busy))
    }

    // ── Lazily acquired capabilities ─────────────────────────────────────

    async fn vision_engine(&self) -> Result<Arc<dyn VisionRecognizer>, EngineError> {
        self.vision
            .get_or_try_init(|| async {
                debug!("Resolving vision engine");
                llm::vision_recognizer(&self.config)
            })
            .await
            .cloned()
    }

    async fn grading_engine(&self) -> Result<Arc<dyn GradingEngine>, EngineError> {
        self.grader
            .get_or_try_init(|| async {
                debug!("Resolving grading engine");
                llm::grading_engine(&self.config)
            })
            .await
            .cloned()
    }
}

impl std::fmt::Debug for GradingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradingSession")
            .field("config", &self.config)
            .field("previews", &self.previews.len())
            .field("recognized_text", &self.recognized_text.len())
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

fn progress_of(config: &GraderConfig) -> &dyn SessionProgressCallback {
    match config.progress_callback {
        Some(ref cb) => cb.as_ref(),
        None => &NoopProgressCallback,
    }
}

// ── Builder ──────────────────────────────────────────────────────────────

/// Builder for [`GradingSession`] with optional engine overrides.
pub struct GradingSessionBuilder {
    config: GraderConfig,
    rasterizer: Option<Arc<dyn Rasterizer>>,
    batch: Option<Arc<dyn BatchRecognizer>>,
    vision: Option<Arc<dyn VisionRecognizer>>,
    grader: Option<Arc<dyn GradingEngine>>,
}

impl GradingSessionBuilder {
    pub fn rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    pub fn batch_recognizer(mut self, batch: Arc<dyn BatchRecognizer>) -> Self {
        self.batch = Some(batch);
        self
    }

    pub fn vision_recognizer(mut self, vision: Arc<dyn VisionRecognizer>) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn grading_engine(mut self, grader: Arc<dyn GradingEngine>) -> Self {
        self.grader = Some(grader);
        self
    }

    pub fn build(self) -> Result<GradingSession, GraderError> {
        let client = build_client(&self.config)?;
        let rasterizer = self.rasterizer.unwrap_or_else(|| {
            Arc::new(HttpRasterizer::new(
                client.clone(),
                self.config.rasterizer_url.clone(),
            ))
        });
        let batch = self.batch.unwrap_or_else(|| {
            Arc::new(HttpBatchRecognizer::new(client, self.config.ocr_url.clone()))
        });

        if self.config.provider.is_none() && self.config.provider_name.is_none() {
            warn_if_no_provider_env();
        }

        Ok(GradingSession {
            config: self.config,
            previews: PreviewCollection::new(),
            recognized_text: String::new(),
            last_recognition: None,
            evaluation: None,
            busy: Arc::new(AtomicBool::new(false)),
            rasterizer,
            batch,
            vision: OnceCell::new_with(self.vision),
            grader: OnceCell::new_with(self.grader),
        })
    }
}

fn warn_if_no_provider_env() {
    let has_env = ["ANSWER_GRADER_LLM_PROVIDER", "OPENAI_API_KEY", "ANTHROPIC_API_KEY", "GEMINI_API_KEY"]
        .iter()
        .any(|k| std::env::var(k).map(|v| !v.is_empty()).unwrap_or(false));
    if !has_env {
        warn!("No LLM provider configured; single-page recognition will use batch OCR only");
    }
}

// ── Busy flag ────────────────────────────────────────────────────────────

/// Read-only view of a session's busy flag.
#[derive(Debug, Clone)]
pub struct BusyIndicator(Arc<AtomicBool>);

impl BusyIndicator {
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sets the flag for its lifetime.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Self {
        if flag.swap(true, Ordering::SeqCst) {
            debug!("Action started while another is still pending");
        }
        Self(Arc::clone(flag))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
