//! Agent roles and the text-generation seam the lifecycle controller calls through.

use crate::llm::LlmClient;
use ideaforge_core::config::{AgentModelConfig, ForgeConfig, LlmConfig};
use std::fmt;
use std::future::Future;
use std::path::Path;

/// Errors from a text-generation backend.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("empty response from {0}")]
    EmptyResponse(String),
    #[error("response parse error: {0}")]
    Parse(String),
    #[error("unsupported provider configuration: {0}")]
    UnsupportedProvider(String),
}

impl AgentError {
    /// Configuration errors will not fix themselves on retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::UnsupportedProvider(_))
    }
}

/// The three pipeline roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentRole {
    Generator,
    Critic,
    Refiner,
}

impl AgentRole {
    pub const ALL: [AgentRole; 3] = [AgentRole::Generator, AgentRole::Critic, AgentRole::Refiner];

    pub fn as_str(self) -> &'static str {
        match self {
            AgentRole::Generator => "generator",
            AgentRole::Critic => "critic",
            AgentRole::Refiner => "refiner",
        }
    }

    /// This role's model section in the config.
    pub fn model_config(self, config: &ForgeConfig) -> &AgentModelConfig {
        match self {
            AgentRole::Generator => &config.agents.generator,
            AgentRole::Critic => &config.agents.critic,
            AgentRole::Refiner => &config.agents.refiner,
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A text producer. No guarantees about latency, determinism, or output format.
pub trait Agent: Sync {
    fn role(&self) -> AgentRole;

    fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
    ) -> impl Future<Output = Result<String, AgentError>> + Send;

    /// Generate with the agent's own system prompt.
    fn ask(&self, prompt: &str) -> impl Future<Output = Result<String, AgentError>> + Send {
        self.generate(prompt, self.system_prompt())
    }

    /// System prompt sent with [`Agent::ask`]. Empty by default.
    fn system_prompt(&self) -> &str {
        ""
    }

    /// Called once after each batch this agent served. Default: nothing.
    fn release(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// An [`Agent`] backed by an [`LlmClient`] with a role-specific system prompt.
pub struct RoleAgent {
    role: AgentRole,
    client: LlmClient,
    system_prompt: String,
    unload_after_batch: bool,
}

impl RoleAgent {
    pub fn new(role: AgentRole, client: LlmClient, system_prompt: impl Into<String>) -> Self {
        Self {
            role,
            client,
            system_prompt: system_prompt.into(),
            unload_after_batch: false,
        }
    }

    /// Unload the model whenever a batch finishes.
    #[must_use]
    pub fn with_unload_after_batch(mut self, enabled: bool) -> Self {
        self.unload_after_batch = enabled;
        self
    }

    /// Wire a role from config. A missing or unreadable system prompt file means an
    /// empty system prompt.
    pub fn from_config(
        role: AgentRole,
        model: &AgentModelConfig,
        llm: &LlmConfig,
        project_root: &Path,
    ) -> Result<Self, AgentError> {
        let client = LlmClient::from_config(model, llm)?;
        let system_prompt = model
            .system_prompt_path
            .as_ref()
            .map(|p| project_root.join(p))
            .and_then(|path| match std::fs::read_to_string(&path) {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::warn!(
                        "{} system prompt {} unreadable, using none: {}",
                        role,
                        path.display(),
                        e
                    );
                    None
                }
            })
            .unwrap_or_default();
        tracing::debug!(
            "{} -> {} ({})",
            role,
            client.provider().model_name(),
            client.provider().provider_name()
        );
        Ok(Self::new(role, client, system_prompt).with_unload_after_batch(llm.unload_after_role))
    }

    pub fn client(&self) -> &LlmClient {
        &self.client
    }

    /// Free backend resources held for this role's model.
    pub async fn unload(&self) {
        if let Err(e) = self.client.unload().await {
            tracing::warn!("failed to unload {} model: {}", self.role, e);
        }
    }
}

impl Agent for RoleAgent {
    fn role(&self) -> AgentRole {
        self.role
    }

    async fn generate(&self, prompt: &str, system_prompt: &str) -> Result<String, AgentError> {
        self.client.complete_with_retry(system_prompt, prompt).await
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    async fn release(&self) {
        if self.unload_after_batch {
            self.unload().await;
        }
    }
}
