//! HTTP client for Ollama (local or cloud) and OpenAI-compatible text generation.

mod ollama;
mod providers;

pub use ollama::{detect_ollama, model_is_available};
pub use providers::{API_KEY_ENV, LlmProvider};

use crate::agent::AgentError;
use ideaforge_core::config::{AgentModelConfig, LlmConfig};
use providers::{
    OllamaGenerateRequest, OllamaGenerateResponse, OllamaOptions, OllamaUnloadRequest,
    OpenAIMessage, OpenAIRequest, OpenAIResponse,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// A completion client bound to one provider and model.
pub struct LlmClient {
    provider: LlmProvider,
    http: reqwest::Client,
    temperature: f64,
    retry_attempts: u32,
    retry_delays_ms: Vec<u64>,
}

impl LlmClient {
    pub fn new(provider: LlmProvider, temperature: f64, config: &LlmConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .unwrap_or_default();
        Self {
            provider,
            http,
            temperature,
            retry_attempts: config.retry_attempts,
            retry_delays_ms: config.retry_delays_ms.clone(),
        }
    }

    /// Build the client for one agent role's config section.
    pub fn from_config(agent: &AgentModelConfig, config: &LlmConfig) -> Result<Self, AgentError> {
        let provider = LlmProvider::from_config(agent, config)?;
        Ok(Self::new(provider, agent.temperature, config))
    }

    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    /// Send one completion request and return the response text.
    pub async fn complete(&self, system: &str, user_prompt: &str) -> Result<String, AgentError> {
        let base_url = self.provider.base_url();
        let model = self.provider.model_name();
        match &self.provider {
            LlmProvider::Ollama { .. } | LlmProvider::OllamaCloud { .. } => {
                let req = OllamaGenerateRequest {
                    model,
                    prompt: user_prompt,
                    system,
                    stream: false,
                    options: OllamaOptions {
                        temperature: self.temperature,
                    },
                };
                let body: OllamaGenerateResponse = self
                    .post_json(&format!("{base_url}/api/generate"), &req)
                    .await?;
                body.response
                    .ok_or_else(|| AgentError::EmptyResponse(self.provider.provider_name().into()))
            }
            LlmProvider::OpenAICompatible { .. } => {
                let req = OpenAIRequest {
                    model,
                    messages: vec![
                        OpenAIMessage {
                            role: "system",
                            content: system,
                        },
                        OpenAIMessage {
                            role: "user",
                            content: user_prompt,
                        },
                    ],
                    temperature: self.temperature,
                };
                let body: OpenAIResponse = self
                    .post_json(&format!("{base_url}/v1/chat/completions"), &req)
                    .await?;
                body.choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .ok_or_else(|| AgentError::EmptyResponse(self.provider.provider_name().into()))
            }
        }
    }

    /// Send a completion request with retry logic (exponential backoff).
    pub async fn complete_with_retry(
        &self,
        system: &str,
        user_prompt: &str,
    ) -> Result<String, AgentError> {
        let max_attempts = self.retry_attempts.max(1) as usize;
        let mut attempt = 0;

        loop {
            match self.complete(system, user_prompt).await {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_retryable() || attempt + 1 >= max_attempts => return Err(e),
                Err(e) => {
                    let delay_ms = self.delay_for(attempt);
                    tracing::warn!(
                        "{} request failed (attempt {}/{}): {}. Retrying in {}ms",
                        self.provider.provider_name(),
                        attempt + 1,
                        max_attempts,
                        e,
                        delay_ms
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
            }
        }
    }

    fn delay_for(&self, attempt: usize) -> u64 {
        let idx = attempt.min(self.retry_delays_ms.len().saturating_sub(1));
        self.retry_delays_ms.get(idx).copied().unwrap_or(4000)
    }

    /// Ask Ollama to evict the model from memory. A no-op for hosted providers.
    pub async fn unload(&self) -> Result<(), AgentError> {
        let LlmProvider::Ollama { .. } = &self.provider else {
            tracing::debug!(
                "{} manages model memory itself, skipping unload",
                self.provider.provider_name()
            );
            return Ok(());
        };

        let model = self.provider.model_name();
        let req = OllamaUnloadRequest {
            model,
            keep_alive: 0,
        };
        let _: serde_json::Value = self
            .post_json(&format!("{}/api/generate", self.provider.base_url()), &req)
            .await?;
        tracing::info!("unloaded Ollama model {}", model);
        Ok(())
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, AgentError> {
        let mut request = self.http.post(url).json(body);
        if let Some(key) = self.provider.api_key() {
            request = request.bearer_auth(key);
        }
        let resp = request.send().await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(AgentError::Api {
                status: status.as_u16(),
                message: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| AgentError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(delays: Vec<u64>) -> LlmClient {
        let config = LlmConfig {
            retry_delays_ms: delays,
            ..LlmConfig::default()
        };
        let provider = LlmProvider::Ollama {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5:7b".to_string(),
        };
        LlmClient::new(provider, 0.7, &config)
    }

    #[test]
    fn test_delay_schedule() {
        let c = client(vec![1000, 2000, 4000]);
        assert_eq!(c.delay_for(0), 1000);
        assert_eq!(c.delay_for(2), 4000);
        assert_eq!(c.delay_for(9), 4000);
        assert_eq!(client(Vec::new()).delay_for(0), 4000);
    }

    #[test]
    fn test_ollama_request_shape() {
        let req = OllamaGenerateRequest {
            model: "m",
            prompt: "p",
            system: "s",
            stream: false,
            options: OllamaOptions { temperature: 0.2 },
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["temperature"], 0.2);
        assert_eq!(json["system"], "s");
    }

    #[test]
    fn test_openai_response_without_content() {
        let body: OpenAIResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert!(body.choices[0].message.content.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_http_error() {
        let config = LlmConfig {
            retry_attempts: 1,
            request_timeout_secs: 2,
            ..LlmConfig::default()
        };
        let provider = LlmProvider::Ollama {
            // Port 9 (discard) is closed on test hosts.
            base_url: "http://127.0.0.1:9".to_string(),
            model: "m".to_string(),
        };
        let client = LlmClient::new(provider, 0.7, &config);
        let err = client.complete_with_retry("", "hi").await.unwrap_err();
        assert!(matches!(err, AgentError::Http(_)));
    }
}
