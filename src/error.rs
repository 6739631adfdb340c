//! Error types for the answer-grader library.
//!
//! Four error types reflect four distinct failure modes:
//!
//! * [`ValidationError`] — **Blocking**: the operator asked for an action
//!   whose inputs are missing (no page selected, empty rubric, empty answer
//!   key). Raised before any network call is made.
//!
//! * [`EngineError`] — **Recoverable**: one call to an external service
//!   failed. The recognition dispatcher reacts by falling back to the batch
//!   engine; once every option is exhausted the failure is rendered as a
//!   diagnostic string in the affected text slot rather than propagated.
//!
//! * [`IngestError`] — **Non-fatal**: a single uploaded PDF could not be
//!   rasterised. Stored in [`crate::model::IngestReport`] so the remaining
//!   files still contribute their pages.
//!
//! * [`GraderError`] — **Fatal** for the call that returned it (bad
//!   configuration, unreadable input file). Never leaves a session unusable.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by the top-level session and configuration APIs.
///
/// Validation and engine failures have their own types and never surface
/// through this one.
#[derive(Debug, Error)]
pub enum GraderError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// An answer script could not be read from disk.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Missing operator input. Checked before any engine is contacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Select one or more images/pages before running recognition")]
    NoSelection,

    #[error("Please provide rubrics for evaluation")]
    MissingRubric,

    #[error("Please provide the answer key for evaluation")]
    MissingAnswerKey,
}

/// Failure of a single call to an external service.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Transport-level failure: connection refused, DNS, TLS, timeout.
    #[error("{engine} unreachable: {reason}")]
    Unreachable { engine: String, reason: String },

    /// The service answered with a non-success HTTP status.
    #[error("{engine} returned HTTP {status}{}", .message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    BadStatus {
        engine: String,
        status: u16,
        message: Option<String>,
    },

    /// The reply could not be decoded into the expected shape.
    #[error("{engine} returned a malformed response: {detail}")]
    Malformed { engine: String, detail: String },

    /// The reply decoded but carried no usable text.
    #[error("{engine} returned an empty response")]
    EmptyResponse { engine: String },

    /// The engine could not be constructed (missing API key etc.).
    #[error("{engine} is not configured: {hint}")]
    NotConfigured { engine: String, hint: String },

    /// The image payload handed to the engine could not be prepared.
    #[error("{engine} could not prepare image '{filename}': {detail}")]
    InvalidPayload {
        engine: String,
        filename: String,
        detail: String,
    },

    /// The LLM provider rejected or failed the request.
    #[error("{engine} call failed: {message}")]
    Provider { engine: String, message: String },
}

impl EngineError {
    /// Classify a reqwest failure for the named engine.
    pub(crate) fn from_transport(engine: &str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            EngineError::Malformed {
                engine: engine.to_string(),
                detail: err.to_string(),
            }
        } else {
            EngineError::Unreachable {
                engine: engine.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

/// A non-fatal error for a single uploaded file.
///
/// Stored in [`crate::model::IngestReport::failures`]; the file contributes
/// no preview items but ingestion of the other files continues.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum IngestError {
    /// The rasterisation service could not turn the PDF into pages.
    #[error("{filename}: rasterisation failed: {detail}")]
    RasterisationFailed { filename: String, detail: String },
}
