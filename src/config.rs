//! Configuration types for a grading session.
//!
//! All session behaviour is controlled through [`GraderConfig`], built via
//! its [`GraderConfigBuilder`]. Endpoints, model identifiers, the answer
//! language and the text normalisation policy live in one struct so that a
//! session can be reproduced from its config alone.

use crate::error::GraderError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default endpoint of the PDF rasterisation service.
pub const DEFAULT_RASTERIZER_URL: &str = "http://localhost:5000/extract_pdf";

/// Default endpoint of the batch recognition service.
pub const DEFAULT_OCR_URL: &str = "http://localhost:5000/ocr";

/// Model identifier sent with every grading request.
pub const DEFAULT_GRADING_MODEL: &str = "gpt-5-nano";

/// Vision model used when a provider is named without a model.
pub const DEFAULT_VISION_MODEL: &str = "gpt-4.1-nano";

/// Configuration for a grading session.
///
/// Built via [`GraderConfig::builder()`] or using [`GraderConfig::default()`].
///
/// # Example
/// ```rust
/// use answer_grader::{AnswerLanguage, GraderConfig, NormalizationStrategy};
///
/// let config = GraderConfig::builder()
///     .language(AnswerLanguage::Tamil)
///     .normalization(NormalizationStrategy::Verbatim)
///     .grading_model("gpt-5-nano")
///     .build()
///     .unwrap();
/// assert_eq!(config.language.code(), "ta");
/// ```
#[derive(Clone)]
pub struct GraderConfig {
    /// Full URL of the rasterisation endpoint (multipart field `file`).
    pub rasterizer_url: String,

    /// Full URL of the batch recognition endpoint (multipart field `images`,
    /// query parameter `lang`).
    pub ocr_url: String,

    /// Language the answer scripts are written in. Default: English.
    ///
    /// Selects the batch engine's language code and the grading prompt.
    pub language: AnswerLanguage,

    /// How recognised text is cleaned before grading. Default: duplicate-pass removal.
    pub normalization: NormalizationStrategy,

    /// Model identifier for the grading engine. Default: `gpt-5-nano`.
    pub grading_model: String,

    /// Vision model for single-page transcription. If None, uses provider default.
    pub vision_model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    ///
    /// The provider is already bound to a model, so `grading_model` and
    /// `vision_model` do not change what it calls; a mismatch is logged.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for vision transcription. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the vision model may generate. Default: 4096.
    pub max_tokens: usize,

    /// Per-request timeout for the HTTP services. Default: None.
    ///
    /// None leaves timeouts to the transport.
    pub http_timeout_secs: Option<u64>,

    /// Optional observer for session events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            rasterizer_url: DEFAULT_RASTERIZER_URL.to_string(),
            ocr_url: DEFAULT_OCR_URL.to_string(),
            language: AnswerLanguage::default(),
            normalization: NormalizationStrategy::default(),
            grading_model: DEFAULT_GRADING_MODEL.to_string(),
            vision_model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            http_timeout_secs: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GraderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraderConfig")
            .field("rasterizer_url", &self.rasterizer_url)
            .field("ocr_url", &self.ocr_url)
            .field("language", &self.language)
            .field("normalization", &self.normalization)
            .field("grading_model", &self.grading_model)
            .field("vision_model", &self.vision_model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn SessionProgressCallback>"),
            )
            .finish()
    }
}

impl GraderConfig {
    /// Create a new builder for `GraderConfig`.
    pub fn builder() -> GraderConfigBuilder {
        GraderConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GraderConfig`].
#[derive(Debug)]
pub struct GraderConfigBuilder {
    config: GraderConfig,
}

impl GraderConfigBuilder {
    pub fn rasterizer_url(mut self, url: impl Into<String>) -> Self {
        self.config.rasterizer_url = url.into();
        self
    }

    pub fn ocr_url(mut self, url: impl Into<String>) -> Self {
        self.config.ocr_url = url.into();
        self
    }

    pub fn language(mut self, language: AnswerLanguage) -> Self {
        self.config.language = language;
        self
    }

    pub fn normalization(mut self, strategy: NormalizationStrategy) -> Self {
        self.config.normalization = strategy;
        self
    }

    pub fn grading_model(mut self, model: impl Into<String>) -> Self {
        self.config.grading_model = model.into();
        self
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.config.vision_model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn http_timeout_secs(mut self, secs: u64) -> Self {
        self.config.http_timeout_secs = Some(secs);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GraderConfig, GraderError> {
        let c = &self.config;
        for (name, url) in [("rasterizer", &c.rasterizer_url), ("OCR", &c.ocr_url)] {
            if !is_http_url(url) {
                return Err(GraderError::InvalidConfig(format!(
                    "{name} endpoint must be an http(s) URL, got '{url}'"
                )));
            }
        }
        if c.grading_model.trim().is_empty() {
            return Err(GraderError::InvalidConfig(
                "Grading model must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(GraderError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

fn is_http_url(input: &str) -> bool {
    reqwest::Url::parse(input)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Language of the answer scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AnswerLanguage {
    /// English scripts (`lang=en`). (default)
    #[default]
    English,
    /// Handwritten Tamil scripts (`lang=ta`).
    Tamil,
}

impl AnswerLanguage {
    /// Language code understood by the batch recognition service.
    pub fn code(&self) -> &'static str {
        match self {
            AnswerLanguage::English => "en",
            AnswerLanguage::Tamil => "ta",
        }
    }

    /// Parse a language code (`en` / `ta`), case-insensitively.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Some(AnswerLanguage::English),
            "ta" | "tamil" => Some(AnswerLanguage::Tamil),
            _ => None,
        }
    }
}

/// Cleanup applied to recognised text before it reaches the grader.
///
/// Recognition engines sometimes echo the same passage twice or append
/// commentary after the transcription. Each variant handles one of these
/// artefacts; the choice is explicit per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormalizationStrategy {
    /// Drop an exact second copy of the passage. (default)
    #[default]
    DuplicatePass,
    /// Keep only the text before the first blank line.
    FirstParagraph,
    /// Trim surrounding whitespace, nothing else.
    Verbatim,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_services() {
        let c = GraderConfig::default();
        assert_eq!(c.rasterizer_url, "http://localhost:5000/extract_pdf");
        assert_eq!(c.ocr_url, "http://localhost:5000/ocr");
        assert_eq!(c.grading_model, "gpt-5-nano");
        assert_eq!(c.language, AnswerLanguage::English);
        assert_eq!(c.normalization, NormalizationStrategy::DuplicatePass);
        assert!(c.http_timeout_secs.is_none());
    }

    #[test]
    fn build_rejects_non_http_endpoint() {
        let err = GraderConfig::builder()
            .ocr_url("ftp://example.com/ocr")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("OCR endpoint"), "got: {err}");
    }

    #[test]
    fn build_rejects_blank_grading_model() {
        let err = GraderConfig::builder().grading_model("  ").build().unwrap_err();
        assert!(matches!(err, GraderError::InvalidConfig(_)));
    }

    #[test]
    fn temperature_is_clamped() {
        let c = GraderConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn language_codes_round_trip() {
        assert_eq!(AnswerLanguage::English.code(), "en");
        assert_eq!(AnswerLanguage::Tamil.code(), "ta");
        assert_eq!(AnswerLanguage::from_code("TA"), Some(AnswerLanguage::Tamil));
        assert_eq!(AnswerLanguage::from_code("fr"), None);
    }

    #[test]
    fn debug_hides_trait_objects() {
        let dbg = format!("{:?}", GraderConfig::default());
        assert!(dbg.contains("grading_model"));
        assert!(dbg.contains("provider: None"));
    }
}
