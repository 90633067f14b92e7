//! Stepwise configuration types and loading

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::executor::DEFAULT_MAX_TOOL_ROUNDS;
use crate::pruning::PruningConfig;
use crate::sandbox::{DEFAULT_TIMEOUT_SECS, MAX_TIMEOUT_SECS};

/// Project-local config file name
pub const LOCAL_CONFIG_FILE: &str = ".stepwise.yml";

/// Main Stepwise configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Session limits
    pub session: SessionConfig,

    /// Tool output pruning thresholds
    pub pruning: PruningConfig,

    /// Command runner settings
    pub sandbox: SandboxConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        self.llm.get_api_key()?;
        if self.session.max_iters == 0 {
            return Err(eyre!("session.max-iters must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `./.stepwise.yml`, then
    /// `<config_dir>/stepwise/stepwise.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("stepwise").join("stepwise.yml");
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

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.api_key_env
            )),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 16384,
            timeout_ms: 300_000,
        }
    }
}

/// Session limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Reviewed (or fast-failed) steps before the session gives up
    #[serde(rename = "max-iters")]
    pub max_iters: u32,

    /// Tool-calling rounds the executor may spend on one step
    #[serde(rename = "max-tool-rounds")]
    pub max_tool_rounds: u32,

    /// Max tokens requested per role call
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_iters: 12,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            max_tokens: 8192,
        }
    }
}

/// Command runner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Timeout used when a tool call does not ask for one
    #[serde(rename = "default-timeout-secs")]
    pub default_timeout_secs: u64,

    /// Upper bound on any requested timeout (never above 300)
    #[serde(rename = "max-timeout-secs")]
    pub max_timeout_secs: u64,

    /// Keep the parent's proxy settings instead of blackholing network access
    #[serde(rename = "allow-network")]
    pub allow_network: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_timeout_secs: MAX_TIMEOUT_SECS,
            allow_network: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.session.max_iters, 12);
        assert_eq!(config.session.max_tool_rounds, 50);
        assert_eq!(config.pruning.tool_max_chars, 6000);
        assert_eq!(config.sandbox.default_timeout_secs, 60);
        assert_eq!(config.sandbox.max_timeout_secs, 300);
        assert!(!config.sandbox.allow_network);
    }

    #[test]
    fn test_llm_config_defaults() {
        let config = LlmConfig::default();

        assert_eq!(config.provider, "anthropic");
        assert!(config.model.contains("sonnet"));
        assert_eq!(config.api_key_env, "ANTHROPIC_API_KEY");
        assert_eq!(config.base_url, "https://api.anthropic.com");
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
llm:
  provider: anthropic
  model: claude-opus-4
  api-key-env: MY_API_KEY
  base-url: https://api.example.com
  max-tokens: 8192
  timeout-ms: 60000

session:
  max-iters: 30
  max-tool-rounds: 10

pruning:
  keep-last-messages: 8
  tool-max-chars: 2000

sandbox:
  default-timeout-secs: 30
  allow-network: true
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "claude-opus-4");
        assert_eq!(config.llm.api_key_env, "MY_API_KEY");
        assert_eq!(config.session.max_iters, 30);
        assert_eq!(config.session.max_tool_rounds, 10);
        assert_eq!(config.session.max_tokens, 8192);
        assert_eq!(config.pruning.keep_last_messages, 8);
        assert_eq!(config.pruning.tool_head_chars, 1200);
        assert_eq!(config.sandbox.default_timeout_secs, 30);
        assert_eq!(config.sandbox.max_timeout_secs, 300);
        assert!(config.sandbox.allow_network);
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
        assert_eq!(config.session.max_iters, 12);
        assert_eq!(config.pruning.keep_last_messages, 20);
    }

    #[test]
    fn test_missing_api_key_env() {
        let config = LlmConfig {
            api_key_env: "STEPWISE_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..LlmConfig::default()
        };
        let err = config.get_api_key().unwrap_err();
        assert!(err.to_string().contains("STEPWISE_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("custom.yml");
        fs::write(&path, "session:\n  max-iters: 3\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.session.max_iters, 3);

        let missing = temp.path().join("missing.yml");
        assert!(Config::load(Some(&missing)).is_err());
    }

    #[test]
    #[serial]
    fn test_load_local_config_from_cwd() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join(LOCAL_CONFIG_FILE), "session:\n  max-iters: 7\n").unwrap();

        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(temp.path()).unwrap();
        let result = Config::load(None);
        std::env::set_current_dir(original).unwrap();

        assert_eq!(result.unwrap().session.max_iters, 7);
    }
}
