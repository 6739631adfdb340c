//! Data carried between pipeline stages.
//!
//! Uploaded files are ephemeral; everything downstream of ingestion is a
//! [`PreviewItem`] owned by the session's [`crate::pipeline::selection::PreviewCollection`].
//! Recognition and evaluation produce fresh values on every run that fully
//! replace the previous ones.

use crate::error::{EngineError, GraderError, IngestError};
use crate::pipeline::encode::{self, DataUriError, OCTET_STREAM};
use crate::pipeline::keywords::KeywordReport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ── Ingestion input ──────────────────────────────────────────────────────

/// One file handed to the session by the operator.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    /// Declared media type, e.g. `image/jpeg` or `application/pdf`. May be empty.
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, deriving the media type from its extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, GraderError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| GraderError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(filename, media_type_for_path(path), bytes))
    }

    /// True when the declared type or the filename marks this file as a PDF.
    pub fn is_pdf(&self) -> bool {
        self.media_type.eq_ignore_ascii_case("application/pdf")
            || self.filename.to_lowercase().ends_with(".pdf")
    }
}

fn media_type_for_path(path: &Path) -> String {
    let is_pdf = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if is_pdf {
        return "application/pdf".to_string();
    }
    image::ImageFormat::from_path(path)
        .map(|f| f.to_mime_type().to_string())
        .unwrap_or_default()
}

/// One page returned by the rasterisation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterPage {
    /// 0-indexed page number within the source PDF.
    pub page: u32,
    /// `data:image/png;base64,...`
    #[serde(rename = "imageBase64")]
    pub image_data: String,
}

// ── Preview items ────────────────────────────────────────────────────────

/// Session-unique identifier of a [`PreviewItem`].
///
/// Allocated from a monotonic counter, so two uploads of the same file never
/// collide and an id is never reused after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PreviewId(pub(crate) u64);

impl PreviewId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PreviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

/// The image behind a preview item, kept in whichever form it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    /// Original bytes of an uploaded image.
    Bytes { data: Vec<u8>, media_type: String },
    /// A rendered PDF page as delivered by the rasterisation service.
    DataUri(String),
}

impl ImagePayload {
    /// The payload as a data-URI, encoding bytes if necessary.
    pub fn to_data_uri(&self) -> String {
        match self {
            ImagePayload::Bytes { data, media_type } => encode::encode_data_uri(data, media_type),
            ImagePayload::DataUri(uri) => uri.clone(),
        }
    }

    /// The payload as binary content plus media type, decoding if necessary.
    pub fn to_bytes(&self) -> Result<(String, Vec<u8>), DataUriError> {
        match self {
            ImagePayload::Bytes { data, media_type } => Ok((media_type.clone(), data.clone())),
            ImagePayload::DataUri(uri) => encode::decode_data_uri(uri),
        }
    }

    pub fn media_type(&self) -> &str {
        match self {
            ImagePayload::Bytes { media_type, .. } => media_type,
            ImagePayload::DataUri(uri) => encode::split_data_uri(uri)
                .map(|(mime, _)| mime)
                .unwrap_or(OCTET_STREAM),
        }
    }
}

/// One selectable page or image derived from an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewItem {
    pub id: PreviewId,
    pub image: ImagePayload,
    pub filename: String,
    /// Page number within the source PDF; None for plain images.
    pub origin_page: Option<u32>,
    pub from_pdf: bool,
    pub selected: bool,
}

impl PreviewItem {
    /// Caption shown under a thumbnail.
    pub fn label(&self) -> String {
        match self.origin_page {
            Some(page) if self.from_pdf => format!("Page {page}"),
            _ => self.filename.clone(),
        }
    }

    /// Filename used for the item's multipart part.
    pub fn upload_name(&self) -> String {
        if self.from_pdf {
            let stem = if self.filename.is_empty() {
                "pdf"
            } else {
                self.filename.as_str()
            };
            format!("{}_p{}.png", stem, self.origin_page.unwrap_or(0))
        } else if self.filename.is_empty() {
            "image.png".to_string()
        } else {
            self.filename.clone()
        }
    }
}

/// What one call to [`crate::session::GradingSession::ingest`] produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    /// Ids of the new preview items, in submission order.
    pub added: Vec<PreviewId>,
    /// Files that contributed nothing.
    pub failures: Vec<IngestError>,
}

impl IngestReport {
    /// True when at least one file failed.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

// ── Engine replies ───────────────────────────────────────────────────────

/// The two recognition engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineKind {
    /// Single-image generative vision engine, tried first for one page.
    Vision,
    /// Batch OCR service, the fallback and the only option for several pages.
    Batch,
}

impl EngineKind {
    pub fn name(&self) -> &'static str {
        match self {
            EngineKind::Vision => "vision engine",
            EngineKind::Batch => "batch OCR",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A generative engine's answer before coercion to text.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineReply {
    Text(String),
    Structured(serde_json::Value),
}

impl EngineReply {
    /// Coerce the reply to its textual representation.
    ///
    /// Structured replies yield the first string found at `text`, `content`,
    /// `message.content` or `choices[0].message.content`, and otherwise their
    /// compact JSON form.
    pub fn into_text(self) -> String {
        match self {
            EngineReply::Text(s) => s,
            EngineReply::Structured(serde_json::Value::String(s)) => s,
            EngineReply::Structured(value) => {
                const POINTERS: [&str; 4] = [
                    "/text",
                    "/content",
                    "/message/content",
                    "/choices/0/message/content",
                ];
                POINTERS
                    .iter()
                    .find_map(|p| value.pointer(p).and_then(|v| v.as_str()))
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string())
            }
        }
    }
}

impl From<String> for EngineReply {
    fn from(s: String) -> Self {
        EngineReply::Text(s)
    }
}

impl From<serde_json::Value> for EngineReply {
    fn from(v: serde_json::Value) -> Self {
        EngineReply::Structured(v)
    }
}

// ── Results ──────────────────────────────────────────────────────────────

/// Text recognised from the selected pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedText {
    /// Text exactly as the engine returned it.
    pub raw: String,
    /// `raw` after the session's normalisation strategy.
    pub normalized: String,
    pub engine: EngineKind,
    /// True when the vision engine failed and the batch engine answered.
    pub fell_back: bool,
}

/// Result of one recognition run.
#[derive(Debug, Clone)]
pub enum RecognitionOutcome {
    Recognized(RecognizedText),
    /// Every applicable engine failed. `diagnostic` replaces the text slot.
    Failed { diagnostic: String, cause: EngineError },
}

impl RecognitionOutcome {
    /// Text to place in the recognised-text slot.
    pub fn text(&self) -> &str {
        match self {
            RecognitionOutcome::Recognized(r) => &r.normalized,
            RecognitionOutcome::Failed { diagnostic, .. } => diagnostic,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RecognitionOutcome::Recognized(_))
    }
}

/// Score breakdown placed in the evaluation slot.
///
/// Engine replies are free text and never parsed. Keyword grading also keeps
/// its per-question report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub text: String,
    /// Grading model, or `"keyword"` for keyword grading.
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<KeywordReport>,
}

/// Result of one evaluation run.
#[derive(Debug, Clone)]
pub enum EvaluationOutcome {
    Graded(EvaluationResult),
    /// The grading engine failed. `diagnostic` replaces the evaluation slot.
    Failed { diagnostic: String, cause: EngineError },
}

impl EvaluationOutcome {
    /// Text to place in the evaluation slot.
    pub fn text(&self) -> &str {
        match self {
            EvaluationOutcome::Graded(r) => &r.text,
            EvaluationOutcome::Failed { diagnostic, .. } => diagnostic,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, EvaluationOutcome::Graded(_))
    }
}
