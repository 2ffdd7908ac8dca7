use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::{parse_provider_model, GenerationConfig, KNOWN_GENERATION_PROVIDERS};
use crate::error::{Result, ScanError};
use crate::llm::api::GenerationApiClient;
use crate::llm::prompts::{dish_explanation_prompt, EXPLAINER_SYSTEM_PROMPT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationBackend {
    OpenAI,
    OpenRouter,
    Ollama,
    LmStudio,
    OpenAICompatible { base_url: String },
    Unavailable { reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// The dish-explanation collaborator. Unconfigured deployments get an
/// `Unavailable` backend; enrichment then degrades to cache-only lookups
/// instead of failing scans.
#[derive(Debug, Clone)]
pub struct GenerationProvider {
    backend: GenerationBackend,
    config: Option<Arc<GenerationConfig>>,
}

impl GenerationProvider {
    pub fn new(config: Option<&GenerationConfig>) -> Self {
        let Some(config) = config else {
            return Self::unavailable("No generation configuration provided");
        };

        let (provider, _model) = parse_provider_model(&config.model, KNOWN_GENERATION_PROVIDERS);

        let backend = match provider.to_lowercase().as_str() {
            "openai" => GenerationBackend::OpenAI,
            "openrouter" => GenerationBackend::OpenRouter,
            "ollama" => GenerationBackend::Ollama,
            "lmstudio" => GenerationBackend::LmStudio,
            _ => {
                if let Some(base_url) = &config.base_url {
                    GenerationBackend::OpenAICompatible {
                        base_url: base_url.clone(),
                    }
                } else {
                    GenerationBackend::Unavailable {
                        reason: format!("Unknown provider in model: {}", config.model),
                    }
                }
            }
        };

        Self {
            backend,
            config: Some(Arc::new(config.clone())),
        }
    }

    pub fn unavailable(reason: &str) -> Self {
        Self {
            backend: GenerationBackend::Unavailable {
                reason: reason.to_string(),
            },
            config: None,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.backend, GenerationBackend::Unavailable { .. })
    }

    pub fn backend(&self) -> &GenerationBackend {
        &self.backend
    }

    pub fn config(&self) -> Option<&GenerationConfig> {
        self.config.as_deref()
    }

    /// Generate one dish explanation, bounded by the configured word cap
    /// and per-call timeout.
    pub async fn explain(
        &self,
        name: &str,
        description: Option<&str>,
        dietary_tags: &BTreeSet<String>,
        language: &str,
    ) -> Result<String> {
        if !self.is_available() {
            return Err(ScanError::GenerationUnavailable(self.unavailable_reason()));
        }

        let config = self
            .config()
            .ok_or_else(|| ScanError::GenerationUnavailable("No config available".to_string()))?;

        let prompt =
            dish_explanation_prompt(name, description, dietary_tags, language, config.max_words);

        let options = CompletionOptions {
            temperature: Some(0.4),
            max_tokens: Some(200),
        };

        let client = GenerationApiClient::new(config)?;
        client
            .complete(&prompt, Some(EXPLAINER_SYSTEM_PROMPT), Some(&options))
            .await
    }

    fn unavailable_reason(&self) -> String {
        match &self.backend {
            GenerationBackend::Unavailable { reason } => reason.clone(),
            _ => "Generation backend is available".to_string(),
        }
    }
}
