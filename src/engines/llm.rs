//! Generative engines backed by edgequake-llm providers.
//!
//! The vision engine sends one page image with [`TRANSCRIPTION_PROMPT`]; the
//! grading engine sends one plain-text instruction. Neither retries: the
//! vision engine has the batch OCR service as its fallback, and a failed
//! grading is shown to the operator, who can simply evaluate again.

use super::{GradingEngine, VisionRecognizer};
use crate::config::{GraderConfig, DEFAULT_VISION_MODEL};
use crate::error::EngineError;
use crate::model::EngineReply;
use crate::pipeline::encode::split_data_uri;
use crate::prompts::TRANSCRIPTION_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

const VISION: &str = "vision engine";
const GRADER: &str = "grading engine";

// ── Vision transcription ─────────────────────────────────────────────────

/// Single-image transcription through a vision-capable provider.
pub struct LlmVisionRecognizer {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmVisionRecognizer {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &GraderConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }
}

#[async_trait]
impl VisionRecognizer for LlmVisionRecognizer {
    async fn transcribe(&self, image: &str) -> Result<EngineReply, EngineError> {
        let (mime, b64) = split_data_uri(image).map_err(|e| EngineError::InvalidPayload {
            engine: VISION.to_string(),
            filename: "selected page".to_string(),
            detail: e.to_string(),
        })?;

        // `detail: "high"` keeps handwriting legible to tile-based models.
        let image_data = ImageData::new(b64.to_string(), mime).with_detail("high");
        let messages = vec![
            ChatMessage::system(TRANSCRIPTION_PROMPT),
            ChatMessage::user_with_images("", vec![image_data]),
        ];

        let start = Instant::now();
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| EngineError::Provider {
                engine: VISION.to_string(),
                message: e.to_string(),
            })?;
        debug!(
            "Vision: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(EngineReply::Text(response.content))
    }
}

/// Build `CompletionOptions` for transcription from the session config.
fn build_options(config: &GraderConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

// ── Grading ──────────────────────────────────────────────────────────────

/// Rubric grading through a text provider.
///
/// The provider is bound to its model when it is created. A `model` in
/// [`GradingEngine::grade`] that differs from the bound one is reported,
/// not switched to mid-session.
pub struct LlmGradingEngine {
    provider: Arc<dyn LLMProvider>,
}

impl LlmGradingEngine {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl GradingEngine for LlmGradingEngine {
    async fn grade(&self, prompt: &str, model: &str) -> Result<EngineReply, EngineError> {
        model_mismatch(self.provider.as_ref(), model, GRADER);
        let messages = vec![ChatMessage::user(prompt)];

        let start = Instant::now();
        let response = self
            .provider
            .chat(&messages, None)
            .await
            .map_err(|e| EngineError::Provider {
                engine: GRADER.to_string(),
                message: e.to_string(),
            })?;
        debug!(
            "Grading ({}): {} input tokens, {} output tokens, {:?}",
            model,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(EngineReply::Text(response.content))
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

/// Model the vision engine is resolved for.
pub fn vision_model(config: &GraderConfig) -> &str {
    config.vision_model.as_deref().unwrap_or(DEFAULT_VISION_MODEL)
}

/// Resolve an LLM provider for `model`, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`): used as-is, its own model
///    wins and a mismatch with `model` is logged.
/// 2. **Named provider** (`config.provider_name`): created for `model`.
/// 3. **`ANSWER_GRADER_LLM_PROVIDER`**: provider chosen by the environment,
///    with `ANSWER_GRADER_MODEL` overriding `model` when set.
/// 4. **`OPENAI_API_KEY`**: OpenAI when its key is present.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`): the detected
///    provider is re-created for `model`.
pub fn resolve_provider(
    config: &GraderConfig,
    model: &str,
    engine: &str,
) -> Result<Arc<dyn LLMProvider>, EngineError> {
    if let Some(ref provider) = config.provider {
        model_mismatch(provider.as_ref(), model, engine);
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model, engine);
    }

    if let Ok(prov) = std::env::var("ANSWER_GRADER_LLM_PROVIDER") {
        if !prov.is_empty() {
            let env_model = std::env::var("ANSWER_GRADER_MODEL")
                .ok()
                .filter(|m| !m.is_empty());
            return create_provider(&prov, env_model.as_deref().unwrap_or(model), engine);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", model, engine);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| EngineError::NotConfigured {
            engine: engine.to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment. \
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider. ({e})"
            ),
        })?;

    Ok(bind_model(llm_provider, model, engine))
}

/// Log when `provider` is bound to a model other than `model`.
fn model_mismatch(provider: &dyn LLMProvider, model: &str, engine: &str) -> bool {
    if provider.model() == model {
        return false;
    }
    warn!(
        "{engine}: provider '{}' is bound to model '{}', not '{model}'",
        provider.name(),
        provider.model()
    );
    true
}

/// Re-create an auto-detected provider for `model`.
///
/// Keeps the detected provider when the factory cannot build the same
/// provider type for the requested model.
fn bind_model(
    provider: Arc<dyn LLMProvider>,
    model: &str,
    engine: &str,
) -> Arc<dyn LLMProvider> {
    if provider.model() == model {
        return provider;
    }
    match ProviderFactory::create_llm_provider(provider.name(), model) {
        Ok(bound) => {
            debug!("{engine}: rebound '{}' to model '{model}'", provider.name());
            bound
        }
        Err(e) => {
            warn!(
                "{engine}: cannot bind '{}' to model '{model}' ({e}); using '{}'",
                provider.name(),
                provider.model()
            );
            provider
        }
    }
}

fn create_provider(
    provider_name: &str,
    model: &str,
    engine: &str,
) -> Result<Arc<dyn LLMProvider>, EngineError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        EngineError::NotConfigured {
            engine: engine.to_string(),
            hint: format!("provider '{provider_name}': {e}"),
        }
    })
}

/// Build the vision engine for a session.
pub fn vision_recognizer(config: &GraderConfig) -> Result<Arc<dyn VisionRecognizer>, EngineError> {
    let provider = resolve_provider(config, vision_model(config), VISION)?;
    Ok(Arc::new(LlmVisionRecognizer::new(provider, config)))
}

/// Build the grading engine for a session.
pub fn grading_engine(config: &GraderConfig) -> Result<Arc<dyn GradingEngine>, EngineError> {
    let provider = resolve_provider(config, &config.grading_model, GRADER)?;
    Ok(Arc::new(LlmGradingEngine::new(provider)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let config = GraderConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn prebuilt_provider_model_mismatch_is_reported() {
        let provider = edgequake_llm::MockProvider::new();
        assert!(model_mismatch(&provider, "gpt-5-nano", GRADER));
        assert!(!model_mismatch(&provider, "mock-model", GRADER));
    }

    #[test]
    fn prebuilt_provider_is_used_as_is() {
        let provider: Arc<dyn LLMProvider> = Arc::new(edgequake_llm::MockProvider::new());
        let config = GraderConfig::builder()
            .provider(Arc::clone(&provider))
            .grading_model("gpt-5-nano")
            .build()
            .unwrap();
        let resolved = resolve_provider(&config, &config.grading_model, GRADER).unwrap();
        assert!(Arc::ptr_eq(&resolved, &provider));
    }

    #[test]
    fn bind_model_keeps_provider_already_on_model() {
        let provider: Arc<dyn LLMProvider> = Arc::new(edgequake_llm::MockProvider::new());
        let bound = bind_model(Arc::clone(&provider), "mock-model", GRADER);
        assert!(Arc::ptr_eq(&bound, &provider));
    }

    #[test]
    fn bind_model_recreates_provider_for_other_model() {
        let provider: Arc<dyn LLMProvider> = Arc::new(edgequake_llm::MockProvider::new());
        let bound = bind_model(Arc::clone(&provider), "gpt-5-nano", GRADER);
        assert!(!Arc::ptr_eq(&bound, &provider));
        assert_eq!(bound.name(), "mock");
    }

    #[test]
    fn vision_model_defaults_when_unset() {
        assert_eq!(vision_model(&GraderConfig::default()), "gpt-4.1-nano");
        let config = GraderConfig::builder().vision_model("gpt-4.1").build().unwrap();
        assert_eq!(vision_model(&config), "gpt-4.1");
    }
}
