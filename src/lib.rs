//! # answer-grader
//!
//! Grade handwritten answer scripts: scan, recognise, compare against an
//! answer key with a rubric.
//!
//! ## Why this crate?
//!
//! A teacher grading a stack of scanned scripts needs three things glued
//! together: a way to turn PDFs and photos into pages, a way to read the
//! handwriting on them, and a way to score what was read. Each of those is
//! an external service. This crate is the glue: it decides which service to
//! call, falls back when one fails, cleans up a known duplication artifact in
//! the recognised text, and keeps the operator's working state in one place.
//!
//! ## Pipeline Overview
//!
//! ```text
//! files (PDF / image)
//!  │
//!  ├─ 1. Ingest     PDFs rasterised by the extraction service, images kept as-is
//!  ├─ 2. Select     operator toggles pages in an ordered preview list
//!  ├─ 3. Recognise  1 page → vision model, falling back to batch OCR
//!  │                N pages → batch OCR in one request
//!  ├─ 4. Normalise  drop a whole-text duplicate pass
//!  └─ 5. Evaluate   answer key + text + rubric → free-text score breakdown
//!                   (or offline: per-line keyword matching → marks per question)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use answer_grader::{GraderConfig, GradingSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = GradingSession::new(GraderConfig::default())?;
//!
//!     let report = session.ingest_paths(&["script.pdf"]).await?;
//!     eprintln!("{} page(s), {} failed file(s)", report.added.len(), report.failures.len());
//!
//!     session.select_all(true);
//!     session.recognize().await?;
//!     println!("{}", session.recognized_text());
//!
//!     session
//!         .evaluate("Plants make food from light.", "accuracy=5,grammar=3,spelling=2")
//!         .await?;
//!     println!("{}", session.evaluation_text());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `answer-grader` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! answer-grader = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod engines;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AnswerLanguage, GraderConfig, GraderConfigBuilder, NormalizationStrategy};
pub use engines::{BatchImage, BatchRecognizer, GradingEngine, Rasterizer, VisionRecognizer};
pub use error::{EngineError, GraderError, IngestError, ValidationError};
pub use model::{
    EngineKind, EngineReply, EvaluationOutcome, EvaluationResult, ImagePayload, IngestReport,
    PreviewId, PreviewItem, RasterPage, RecognitionOutcome, RecognizedText, UploadedFile,
};
pub use pipeline::keywords::{grade_by_keywords, KeywordReport};
pub use pipeline::normalize::normalize;
pub use pipeline::selection::PreviewCollection;
pub use progress::{NoopProgressCallback, ProgressCallback, SessionProgressCallback};
pub use session::{BusyIndicator, GradingSession, GradingSessionBuilder};
