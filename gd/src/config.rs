//! GoalDaemon configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::scheduler::SchedulerConfig;

/// Main GoalDaemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Scheduler loop behavior
    pub scheduler: SchedulerConfig,

    /// Planning and risk thresholds
    pub planning: PlanningSettings,

    /// Interaction gate defaults
    pub interaction: InteractionSettings,

    /// Storage configuration
    pub storage: StorageConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .goaldaemon.yml
        let local_config = PathBuf::from(".goaldaemon.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/goaldaemon/goaldaemon.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("goaldaemon").join("goaldaemon.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "anthropic" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 120_000,
        }
    }
}

/// Planning and risk thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningSettings {
    /// OneShot count above which a plan needs approval
    #[serde(rename = "max-steps")]
    pub max_steps: usize,

    /// Fixed per-call token estimate
    #[serde(rename = "tokens-per-call")]
    pub tokens_per_call: usize,

    /// Estimated token total above which a plan needs approval
    #[serde(rename = "token-budget")]
    pub token_budget: usize,

    /// Score threshold for pattern matching and promotion
    #[serde(rename = "min-pattern-score")]
    pub min_pattern_score: f64,
}

impl Default for PlanningSettings {
    fn default() -> Self {
        Self {
            max_steps: 5,
            tokens_per_call: 500,
            token_budget: 5000,
            min_pattern_score: 0.70,
        }
    }
}

/// Interaction gate defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionSettings {
    /// Default execution mode for new plans
    /// (autonomous, supervised, interactive, approval)
    #[serde(rename = "default-mode")]
    pub default_mode: String,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            default_mode: "interactive".to_string(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for persisted state
    #[serde(rename = "data-dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/goaldaemon on Linux)
        let data_dir = dirs::data_dir()
            .map(|d| d.join("goaldaemon"))
            .unwrap_or_else(|| PathBuf::from(".goaldaemon"))
            .to_string_lossy()
            .into_owned();

        Self { data_dir }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.planning.max_steps, 5);
        assert_eq!(config.planning.tokens_per_call, 500);
        assert_eq!(config.scheduler.persist_interval, 100);
        assert_eq!(config.interaction.default_mode, "interactive");
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
llm:
  provider: anthropic
  model: claude-opus-4
  api-key-env: MY_API_KEY
  max-tokens: 8192

scheduler:
  idle-delay-secs: 30
  persist-interval: 50

planning:
  max-steps: 8
  token-budget: 10000

interaction:
  default-mode: supervised
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "claude-opus-4");
        assert_eq!(config.llm.api_key_env, "MY_API_KEY");
        assert_eq!(config.scheduler.idle_delay_secs, 30);
        assert_eq!(config.planning.max_steps, 8);
        assert_eq!(config.planning.token_budget, 10000);
        assert_eq!(config.interaction.default_mode, "supervised");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
llm:
  model: claude-haiku
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "claude-haiku");
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.llm.api_key_env, "ANTHROPIC_API_KEY");
        assert_eq!(config.planning.max_steps, 5);
    }
}
