//! Progress-callback trait for session events.
//!
//! Inject an [`Arc<dyn SessionProgressCallback>`] via
//! [`crate::config::GraderConfigBuilder::progress_callback`] to receive
//! events while files are ingested, pages are recognised and scripts are
//! graded. Every external call is a suspension point that may take seconds;
//! the callback is how a front-end shows that something is happening.
//!
//! # Example
//!
//! ```rust
//! use answer_grader::{GraderConfig, SessionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FileCounter {
//!     files: AtomicUsize,
//! }
//!
//! impl SessionProgressCallback for FileCounter {
//!     fn on_file_ingested(&self, filename: &str, items: usize) {
//!         self.files.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{filename}: {items} page(s)");
//!     }
//! }
//!
//! let config = GraderConfig::builder()
//!     .progress_callback(Arc::new(FileCounter { files: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::model::EngineKind;
use std::sync::Arc;

/// Called by the session as it works through an action.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait SessionProgressCallback: Send + Sync {
    /// Called once before the first file of a batch is processed.
    fn on_ingest_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called when a file produced its preview items.
    ///
    /// # Arguments
    /// * `filename` — name of the uploaded file
    /// * `items`    — number of preview items it contributed
    fn on_file_ingested(&self, filename: &str, items: usize) {
        let _ = (filename, items);
    }

    /// Called when a PDF could not be rasterised and was skipped.
    fn on_file_failed(&self, filename: &str, error: &str) {
        let _ = (filename, error);
    }

    /// Called just before a recognition engine is contacted.
    ///
    /// # Arguments
    /// * `engine` — which engine is about to be called
    /// * `items`  — number of images in the request
    fn on_recognition_start(&self, engine: EngineKind, items: usize) {
        let _ = (engine, items);
    }

    /// Called when the vision engine failed and the batch engine takes over.
    fn on_recognition_fallback(&self, error: &str) {
        let _ = error;
    }

    /// Called once recognition has resolved, successfully or not.
    ///
    /// # Arguments
    /// * `engine` — engine that produced the text, None when every engine failed
    /// * `chars`  — length in characters of the text now in the slot
    fn on_recognition_complete(&self, engine: Option<EngineKind>, chars: usize) {
        let _ = (engine, chars);
    }

    /// Called just before the grading engine is contacted.
    fn on_evaluation_start(&self, model: &str) {
        let _ = model;
    }

    /// Called once evaluation has resolved.
    ///
    /// # Arguments
    /// * `success` — false when the slot holds a diagnostic
    /// * `chars`   — length in characters of the evaluation text
    fn on_evaluation_complete(&self, success: bool, chars: usize) {
        let _ = (success, chars);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl SessionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GraderConfig`].
pub type ProgressCallback = Arc<dyn SessionProgressCallback>;
