//! LLM provider resolution and API request/response types.

use crate::agent::AgentError;
use ideaforge_core::config::{AgentModelConfig, LlmConfig, ProviderKind};
use serde::{Deserialize, Serialize};

/// Env var holding the bearer token for hosted providers.
pub const API_KEY_ENV: &str = "OLLAMA_API_KEY";

/// A concrete backend endpoint plus model.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmProvider {
    /// Local Ollama, `/api/generate`.
    Ollama { base_url: String, model: String },
    /// Hosted Ollama, same API with an optional bearer token.
    OllamaCloud {
        base_url: String,
        model: String,
        api_key: Option<String>,
    },
    /// Any OpenAI-compatible server, `/v1/chat/completions`.
    OpenAICompatible {
        base_url: String,
        model: String,
        api_key: Option<String>,
    },
}

impl LlmProvider {
    /// Resolve one agent's provider from config, reading the API key from the environment.
    pub fn from_config(agent: &AgentModelConfig, llm: &LlmConfig) -> Result<Self, AgentError> {
        Self::from_config_with_key(agent, llm, std::env::var(API_KEY_ENV).ok())
    }

    /// Like [`Self::from_config`] with an explicit key.
    pub fn from_config_with_key(
        agent: &AgentModelConfig,
        llm: &LlmConfig,
        api_key: Option<String>,
    ) -> Result<Self, AgentError> {
        if agent.model.trim().is_empty() {
            return Err(AgentError::UnsupportedProvider(format!(
                "{:?} provider configured without a model",
                agent.provider
            )));
        }
        let model = agent.model.clone();
        let api_key = api_key.filter(|k| !k.is_empty());

        Ok(match agent.provider {
            ProviderKind::Ollama => Self::Ollama {
                base_url: llm.base_url.clone(),
                model,
            },
            ProviderKind::OllamaCloud => {
                require_key_for_remote(&llm.cloud_url, api_key.as_deref(), "ollama-cloud")?;
                Self::OllamaCloud {
                    base_url: llm.cloud_url.clone(),
                    model,
                    api_key,
                }
            }
            ProviderKind::OpenAiCompatible => {
                require_key_for_remote(&llm.cloud_url, api_key.as_deref(), "openai-compatible")?;
                Self::OpenAICompatible {
                    base_url: llm.cloud_url.clone(),
                    model,
                    api_key,
                }
            }
        })
    }

    /// Human-readable provider name.
    pub fn provider_name(&self) -> &str {
        match self {
            Self::Ollama { .. } => "Ollama (local)",
            Self::OllamaCloud { .. } => "Ollama Cloud",
            Self::OpenAICompatible { .. } => "OpenAI-Compatible",
        }
    }

    /// Model name in use.
    pub fn model_name(&self) -> &str {
        match self {
            Self::Ollama { model, .. }
            | Self::OllamaCloud { model, .. }
            | Self::OpenAICompatible { model, .. } => model,
        }
    }

    pub fn base_url(&self) -> &str {
        match self {
            Self::Ollama { base_url, .. }
            | Self::OllamaCloud { base_url, .. }
            | Self::OpenAICompatible { base_url, .. } => base_url.trim_end_matches('/'),
        }
    }

    pub(crate) fn api_key(&self) -> Option<&str> {
        match self {
            Self::Ollama { .. } => None,
            Self::OllamaCloud { api_key, .. } | Self::OpenAICompatible { api_key, .. } => {
                api_key.as_deref()
            }
        }
    }
}

/// Hosted endpoints need a key; a loopback URL (self-hosted proxy) does not.
fn require_key_for_remote(url: &str, key: Option<&str>, provider: &str) -> Result<(), AgentError> {
    let is_local = url.contains("localhost") || url.contains("127.0.0.1");
    if key.is_none() && !is_local {
        return Err(AgentError::UnsupportedProvider(format!(
            "{provider} at {url} requires {API_KEY_ENV}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// API Request / Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub(crate) struct OllamaGenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub system: &'a str,
    pub stream: bool,
    pub options: OllamaOptions,
}

#[derive(Serialize)]
pub(crate) struct OllamaOptions {
    pub temperature: f64,
}

#[derive(Serialize)]
pub(crate) struct OllamaUnloadRequest<'a> {
    pub model: &'a str,
    pub keep_alive: u32,
}

#[derive(Deserialize)]
pub(crate) struct OllamaGenerateResponse {
    pub response: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct OpenAIRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<OpenAIMessage<'a>>,
    pub temperature: f64,
}

#[derive(Serialize)]
pub(crate) struct OpenAIMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct OpenAIResponse {
    pub choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
pub(crate) struct OpenAIChoice {
    pub message: OpenAIChoiceMessage,
}

#[derive(Deserialize)]
pub(crate) struct OpenAIChoiceMessage {
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(provider: ProviderKind) -> AgentModelConfig {
        AgentModelConfig {
            provider,
            model: "gpt-oss:120b-cloud".to_string(),
            ..AgentModelConfig::default()
        }
    }

    #[test]
    fn test_local_ollama_needs_no_key() {
        let provider =
            LlmProvider::from_config_with_key(&agent(ProviderKind::Ollama), &LlmConfig::default(), None)
                .unwrap();
        assert_eq!(provider.base_url(), "http://localhost:11434");
        assert_eq!(provider.model_name(), "gpt-oss:120b-cloud");
        assert!(provider.api_key().is_none());
    }

    #[test]
    fn test_cloud_requires_key() {
        let err = LlmProvider::from_config_with_key(
            &agent(ProviderKind::OllamaCloud),
            &LlmConfig::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AgentError::UnsupportedProvider(_)));

        let provider = LlmProvider::from_config_with_key(
            &agent(ProviderKind::OllamaCloud),
            &LlmConfig::default(),
            Some("sk-test".to_string()),
        )
        .unwrap();
        assert_eq!(provider.api_key(), Some("sk-test"));
        assert_eq!(provider.base_url(), "https://ollama.com");
    }

    #[test]
    fn test_openai_compatible_on_localhost_without_key() {
        let llm = LlmConfig {
            cloud_url: "http://127.0.0.1:8000/".to_string(),
            ..LlmConfig::default()
        };
        let provider =
            LlmProvider::from_config_with_key(&agent(ProviderKind::OpenAiCompatible), &llm, None)
                .unwrap();
        assert_eq!(provider.base_url(), "http://127.0.0.1:8000");
        assert_eq!(provider.provider_name(), "OpenAI-Compatible");
    }

    #[test]
    fn test_empty_model_rejected() {
        let mut cfg = agent(ProviderKind::Ollama);
        cfg.model = "  ".to_string();
        assert!(LlmProvider::from_config_with_key(&cfg, &LlmConfig::default(), None).is_err());
    }
}
