//! tasktree configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the store directory
pub const DB_ENV_VAR: &str = "TASKTREE_DB";

/// Main tasktree configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Completion backend configuration
    pub llm: LlmConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Log level used when `--log-level` is not given
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Fails fast when the selected provider needs an API key that is not set.
    pub fn validate(&self) -> Result<()> {
        if self.llm.requires_api_key() && std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .tasktree.yml
        let local_config = PathBuf::from(".tasktree.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/tasktree/tasktree.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tasktree").join("tasktree.yml");
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

    /// Read only the log level, before logging is set up
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Completion backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "openai" or "endpoint"
    pub provider: String,

    /// Model identifier (openai only)
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL; for "endpoint" the full completion URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Retries for transient failures; 0 disables the retry layer
    #[serde(rename = "max-retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 120_000,
            max_retries: 0,
        }
    }
}

impl LlmConfig {
    pub fn requires_api_key(&self) -> bool {
        self.provider == "openai"
    }

    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).context(format!("{} is not set", self.api_key_env))
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the task database
    #[serde(rename = "db-path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // XDG data directory (~/.local/share/tasktree on Linux)
        let db_path = dirs::data_dir()
            .map(|d| d.join("tasktree"))
            .unwrap_or_else(|| PathBuf::from(".tasktree"))
            .to_string_lossy()
            .into_owned();

        Self { db_path }
    }
}

impl StorageConfig {
    /// Store directory, with `TASKTREE_DB` taking precedence over the config
    pub fn resolved_path(&self) -> PathBuf {
        match std::env::var(DB_ENV_VAR) {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => PathBuf::from(&self.db_path),
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

        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.max_retries, 0);
        assert!(config.storage.db_path.ends_with("tasktree"));
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
llm:
  provider: endpoint
  model: gpt-4o
  api-key-env: MY_API_KEY
  base-url: http://localhost:3000/api/completion
  max-tokens: 1024
  timeout-ms: 60000
  max-retries: 3

storage:
  db-path: /tmp/tasks

log-level: debug
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.provider, "endpoint");
        assert_eq!(config.llm.api_key_env, "MY_API_KEY");
        assert_eq!(config.llm.base_url, "http://localhost:3000/api/completion");
        assert_eq!(config.llm.max_tokens, 1024);
        assert_eq!(config.llm.max_retries, 3);
        assert_eq!(config.storage.db_path, "/tmp/tasks");
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert!(!config.llm.requires_api_key());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
llm:
  model: gpt-4.1
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "gpt-4.1");
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.llm.timeout_ms, 120_000);
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasktree.yml");
        fs::write(&path, "log-level: trace\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("trace"));
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("trace"));
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    #[serial]
    fn test_db_env_var_overrides_config() {
        let storage = StorageConfig {
            db_path: "/from/config".to_string(),
        };

        // SAFETY: serialized with the other environment tests
        unsafe { std::env::set_var(DB_ENV_VAR, "/from/env") };
        assert_eq!(storage.resolved_path(), PathBuf::from("/from/env"));

        unsafe { std::env::remove_var(DB_ENV_VAR) };
        assert_eq!(storage.resolved_path(), PathBuf::from("/from/config"));
    }

    #[test]
    #[serial]
    fn test_validate_checks_api_key_env() {
        let mut config = Config::default();
        config.llm.api_key_env = "TASKTREE_TEST_MISSING_KEY".to_string();
        unsafe { std::env::remove_var("TASKTREE_TEST_MISSING_KEY") };
        assert!(config.validate().is_err());

        unsafe { std::env::set_var("TASKTREE_TEST_MISSING_KEY", "sk-test") };
        assert!(config.validate().is_ok());
        unsafe { std::env::remove_var("TASKTREE_TEST_MISSING_KEY") };

        config.llm.provider = "endpoint".to_string();
        assert!(config.validate().is_ok());
    }
}
