//! Configuration for the research loop, agent backends, and paper context.
//!
//! Load order: `ideaforge.toml` → environment variables → defaults.
//! The accept/drop thresholds have no default: a run without them fails at load time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up in the project root.
pub const CONFIG_FILE: &str = "ideaforge.toml";

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing required setting loop.{0}")]
    MissingThreshold(&'static str),
    #[error("loop.max_loops must be at least 1")]
    InvalidMaxLoops,
}

/// Top-level ideaforge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    #[serde(rename = "loop")]
    pub loop_settings: LoopConfig,
    pub llm: LlmConfig,
    pub agents: AgentsConfig,
    pub openalex: OpenAlexConfig,
    pub output: OutputConfig,
}

/// Loop thresholds and iteration budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Accept boundary: an average at or above this is accepted.
    pub score_threshold: Option<f64>,
    /// Reject boundary: an average at or below this is dropped.
    pub drop_threshold: Option<f64>,
    pub max_loops: u32,
    /// Number of drafts requested from the generator.
    pub num_ideas: usize,
    /// Concurrent per-idea agent calls within one critique or refinement batch.
    pub parallelism: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            score_threshold: None,
            drop_threshold: None,
            max_loops: 3,
            num_ideas: 3,
            parallelism: 1,
        }
    }
}

/// Immutable loop settings handed to the lifecycle controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopPolicy {
    pub accept_at: f64,
    pub drop_below: f64,
    pub max_loops: u32,
    pub parallelism: usize,
}

impl LoopConfig {
    /// Resolve into a [`LoopPolicy`], failing if a threshold is missing.
    ///
    /// An inverted pair (`drop_threshold > score_threshold`) is allowed; classification
    /// checks accept before drop. [`ForgeConfig::load`] logs it.
    pub fn policy(&self) -> Result<LoopPolicy, ConfigError> {
        let accept_at = self
            .score_threshold
            .ok_or(ConfigError::MissingThreshold("score_threshold"))?;
        let drop_below = self
            .drop_threshold
            .ok_or(ConfigError::MissingThreshold("drop_threshold"))?;
        if self.max_loops == 0 {
            return Err(ConfigError::InvalidMaxLoops);
        }
        Ok(LoopPolicy {
            accept_at,
            drop_below,
            max_loops: self.max_loops,
            parallelism: self.parallelism.max(1),
        })
    }
}

/// Shared text-generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Local Ollama endpoint.
    pub base_url: String,
    /// Ollama cloud endpoint.
    pub cloud_url: String,
    pub retry_attempts: u32,
    pub retry_delays_ms: Vec<u64>,
    /// Per-request timeout. A timed-out call is treated like unparseable output.
    pub request_timeout_secs: u64,
    /// Ask Ollama to evict a role's model once its batch step finishes.
    pub unload_after_role: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            cloud_url: "https://ollama.com".to_string(),
            retry_attempts: 3,
            retry_delays_ms: vec![1000, 2000, 4000],
            request_timeout_secs: 300,
            unload_after_role: true,
        }
    }
}

/// Backend family serving one agent role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    #[default]
    Ollama,
    OllamaCloud,
    #[serde(rename = "openai-compatible")]
    OpenAiCompatible,
}

/// Model settings for one agent role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentModelConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub temperature: f64,
    pub system_prompt_path: Option<PathBuf>,
}

impl Default for AgentModelConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            model: "qwen2.5:7b".to_string(),
            temperature: 0.7,
            system_prompt_path: None,
        }
    }
}

/// Per-role model settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub generator: AgentModelConfig,
    pub critic: AgentModelConfig,
    pub refiner: AgentModelConfig,
}

/// OpenAlex paper-context settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAlexConfig {
    pub fetch_limit: usize,
    pub top_k_papers: usize,
    /// Contact address sent in the polite-pool user agent.
    pub mailto: String,
}

impl Default for OpenAlexConfig {
    fn default() -> Self {
        Self {
            fetch_limit: 100,
            top_k_papers: 5,
            mailto: "research-agent@example.com".to_string(),
        }
    }
}

/// Where results and reports are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("results"),
        }
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

/// Like [`env_override`], for settings that have no default.
fn env_override_opt<T: std::str::FromStr>(var: &str, target: &mut Option<T>) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = Some(n);
    }
}

impl ForgeConfig {
    /// Load config from `ideaforge.toml` in the project root, with env var overrides,
    /// then validate the loop settings.
    pub fn load(project_root: &Path) -> Result<Self, ConfigError> {
        let config_path = project_root.join(CONFIG_FILE);

        let mut config: Self = if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
                    path: config_path.clone(),
                    source,
                })?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        let policy = config.loop_settings.policy()?;
        if policy.drop_below > policy.accept_at {
            tracing::warn!(
                "drop_threshold ({}) exceeds score_threshold ({}); accept is evaluated first",
                policy.drop_below,
                policy.accept_at
            );
        }

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        env_override_opt(
            "IDEAFORGE_SCORE_THRESHOLD",
            &mut self.loop_settings.score_threshold,
        );
        env_override_opt(
            "IDEAFORGE_DROP_THRESHOLD",
            &mut self.loop_settings.drop_threshold,
        );
        env_override("IDEAFORGE_MAX_LOOPS", &mut self.loop_settings.max_loops);
        env_override("IDEAFORGE_NUM_IDEAS", &mut self.loop_settings.num_ideas);
        env_override("IDEAFORGE_PARALLELISM", &mut self.loop_settings.parallelism);
        env_override("IDEAFORGE_OLLAMA_URL", &mut self.llm.base_url);
        env_override("IDEAFORGE_CLOUD_URL", &mut self.llm.cloud_url);
    }
}
