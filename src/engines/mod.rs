//! External collaborators of the grading pipeline.
//!
//! Four services do the heavy lifting; the pipeline only decides which one
//! to call and what to do when a call fails. Each is an object-safe trait so
//! a session can hold it as `Arc<dyn …>` and tests can substitute doubles:
//!
//! | Trait | Production implementation | Transport |
//! |-------|---------------------------|-----------|
//! | [`Rasterizer`]       | [`http::HttpRasterizer`]       | multipart POST → JSON pages |
//! | [`BatchRecognizer`]  | [`http::HttpBatchRecognizer`]  | multipart POST + `lang` → JSON text |
//! | [`VisionRecognizer`] | [`llm::LlmVisionRecognizer`]   | edgequake-llm vision chat |
//! | [`GradingEngine`]    | [`llm::LlmGradingEngine`]      | edgequake-llm text chat |

pub mod http;
pub mod llm;

use crate::config::AnswerLanguage;
use crate::error::EngineError;
use crate::model::{EngineReply, RasterPage, UploadedFile};
use async_trait::async_trait;

/// Converts a PDF into per-page images.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Rasterise every page of `file`, in page order.
    async fn rasterize(&self, file: &UploadedFile) -> Result<Vec<RasterPage>, EngineError>;
}

/// One image in a batch recognition request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchImage {
    pub filename: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// Recognises text across one or more images in a single request.
#[async_trait]
pub trait BatchRecognizer: Send + Sync {
    /// Return the text of all `images`, concatenated in order.
    async fn recognize(
        &self,
        images: &[BatchImage],
        language: AnswerLanguage,
    ) -> Result<String, EngineError>;
}

/// Transcribes a single image with a generative vision model.
#[async_trait]
pub trait VisionRecognizer: Send + Sync {
    /// `image` is a `data:<mime>;base64,...` URI.
    async fn transcribe(&self, image: &str) -> Result<EngineReply, EngineError>;
}

/// Produces a free-text grading from an instruction prompt.
#[async_trait]
pub trait GradingEngine: Send + Sync {
    async fn grade(&self, prompt: &str, model: &str) -> Result<EngineReply, EngineError>;
}
