//! # Pixelforge Models
//!
//! Centralized model-service configuration for the orchestration core.
//! Every stage and swarm agent resolves its model through a `ModelConfig`,
//! so per-run overrides stay in one place.

use serde::{Deserialize, Serialize};

/// Supported multimodal model providers.
///
/// The adapter speaks each provider's REST wire format directly; API keys
/// are loaded from the environment:
/// - Gemini (Google) - `GEMINI_API_KEY`
/// - OpenAI-compatible endpoints - `OPENAI_API_KEY`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Gemini,
    #[serde(rename = "openai")]
    OpenAI,
}

impl LlmProvider {
    /// Display name for logs and warnings
    pub fn display_name(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "Gemini",
            LlmProvider::OpenAI => "OpenAI",
        }
    }

    /// Whether this provider supports a custom base URL
    pub fn supports_base_url(&self) -> bool {
        matches!(self, LlmProvider::OpenAI)
    }

    /// Environment variable holding the API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "GEMINI_API_KEY",
            LlmProvider::OpenAI => "OPENAI_API_KEY",
        }
    }
}

/// Configuration for model selection.
///
/// Used by the pipeline orchestrator and the swarm executor to decide which
/// provider and model each call goes to. Vision-heavy stages (surveyor,
/// critic) and text-only stages (router, coders) can carry different
/// configs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider to use
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model name (e.g., "gemini-2.5-flash", "gpt-4o")
    pub model: String,
    /// Optional base URL override for OpenAI-compatible APIs
    pub base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Gemini,
            model: "gemini-2.5-flash".to_string(),
            base_url: None,
        }
    }
}

impl ModelConfig {
    /// Create a new config with the default provider (Gemini)
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Gemini,
            model: model.into(),
            base_url: None,
        }
    }

    /// Create a config for a specific provider
    pub fn with_provider(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
        }
    }

    /// Set base URL (for OpenAI-compatible endpoints)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}
