//! Pipeline stages for grading a scanned answer script.
//!
//! Each submodule implements one step and is driven by
//! [`crate::session::GradingSession`]. Stages that talk to the outside world
//! take their engine as a trait object, so each is testable with doubles.
//!
//! ## Data Flow
//!
//! ```text
//! ingest ──▶ selection ──▶ dispatch ──▶ normalize ──▶ evaluate
//! (files)    (previews)    (engines)    (dedupe)      (grading)
//! ```
//!
//! 1. [`ingest`]    — PDFs through the rasteriser, images kept as bytes
//! 2. [`selection`] — ordered preview collection with an id-based active pointer
//! 3. [`dispatch`]  — vision engine for one item, batch OCR otherwise or on failure
//! 4. [`normalize`] — remove a duplicated recognition pass
//! 5. [`evaluate`]  — validate inputs, build the prompt, one grading call
//!
//! [`keywords`] is the offline alternative to step 5: fuzzy keyword matching
//! per answer-key line, no engine involved.
//!
//! [`encode`] converts image payloads between bytes and data-URIs for
//! whichever engine needs which form.

pub mod dispatch;
pub mod encode;
pub mod evaluate;
pub mod ingest;
pub mod keywords;
pub mod normalize;
pub mod selection;
