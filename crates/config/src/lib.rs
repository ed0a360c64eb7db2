//! Configuration loading and validation for ferrule.
//!
//! Loads configuration from `~/.ferrule/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.ferrule/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// OpenAI-compatible endpoint base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Upper bound on model calls per run
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Retries per model call after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// HTTP timeout for one model request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Restrict the exposed tools to these names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<Vec<String>>,

    /// Working directory for tools (defaults to the process cwd)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    /// Project-level instructions (e.g. the contents of an AGENTS.md)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer_instructions: Option<String>,

    /// Additional user instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_instructions: Option<String>,

    /// Verbose logging
    #[serde(default)]
    pub debug: bool,

    // TOML tables must follow plain values.
    /// Model selection and sampling
    #[serde(default)]
    pub model: ModelConfig,

    /// Environment policy for the shell tool
    #[serde(default)]
    pub shell_environment: ShellEnvironment,
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_max_turns() -> u32 {
    100
}
fn default_max_retries() -> u32 {
    3
}
fn default_request_timeout_secs() -> u64 {
    120
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_turns", &self.max_turns)
            .field("max_retries", &self.max_retries)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("allowed_tools", &self.allowed_tools)
            .field("cwd", &self.cwd)
            .field("developer_instructions", &self.developer_instructions.is_some())
            .field("user_instructions", &self.user_instructions.is_some())
            .field("shell_environment", &self.shell_environment)
            .field("debug", &self.debug)
            .finish()
    }
}

/// Model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,

    /// Forwarded verbatim to the provider
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Context window of the model, in tokens
    #[serde(default = "default_context_window")]
    pub context_window: usize,
}

fn default_model_name() -> String {
    "z-ai/glm-4.5-air:free".into()
}
fn default_temperature() -> f32 {
    1.0
}
fn default_context_window() -> usize {
    256_000
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            temperature: default_temperature(),
            max_tokens: None,
            context_window: default_context_window(),
        }
    }
}

/// Which environment variables the shell tool passes through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellEnvironment {
    /// Glob-style name patterns (`*KEY*`) stripped from the child environment
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Variables forced into the child environment
    #[serde(default)]
    pub set_vars: BTreeMap<String, String>,
}

fn default_exclude_patterns() -> Vec<String> {
    vec!["*KEY*".into(), "*TOKEN*".into(), "*SECRET*".into()]
}

impl Default for ShellEnvironment {
    fn default() -> Self {
        Self {
            exclude_patterns: default_exclude_patterns(),
            set_vars: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.ferrule/config.toml).
    ///
    /// Environment variables take precedence over the file:
    /// - `FERRULE_API_KEY`, `OPENROUTER_API_KEY`, `OPENAI_API_KEY`, `API_KEY`
    ///   (first set wins, only when the file has no key)
    /// - `FERRULE_BASE_URL`, `BASE_URL`
    /// - `FERRULE_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.api_key.is_none() {
            self.api_key = ["FERRULE_API_KEY", "OPENROUTER_API_KEY", "OPENAI_API_KEY", "API_KEY"]
                .iter()
                .find_map(|key| non_empty(*key));
        }

        if let Some(url) = non_empty("FERRULE_BASE_URL").or_else(|| non_empty("BASE_URL")) {
            self.base_url = url;
        }

        if let Some(model) = non_empty("FERRULE_MODEL") {
            self.model.name = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ferrule")
    }

    /// Where persistent tool data (user memory) lives.
    pub fn data_dir() -> PathBuf {
        Self::config_dir().join("data")
    }

    /// The working directory tools resolve relative paths against.
    pub fn working_dir(&self) -> PathBuf {
        self.cwd
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "max_turns must be at least 1".into(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be at least 1".into(),
            ));
        }

        if let Some(cwd) = &self.cwd
            && !cwd.is_dir()
        {
            return Err(ConfigError::ValidationError(format!(
                "Working directory does not exist: {}",
                cwd.display()
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: ModelConfig::default(),
            max_turns: default_max_turns(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout_secs(),
            allowed_tools: None,
            cwd: None,
            developer_instructions: None,
            user_instructions: None,
            shell_environment: ShellEnvironment::default(),
            debug: false,
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for ferrule_core::Error {
    fn from(e: ConfigError) -> Self {
        ferrule_core::Error::Config {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_turns, 100);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.model.name, "z-ai/glm-4.5-air:free");
        assert!(config.base_url.contains("openrouter.ai"));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model.name, config.model.name);
        assert_eq!(parsed.shell_environment.exclude_patterns.len(), 3);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.model.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_turns_rejected() {
        let config = AppConfig {
            max_turns: 0,
            ..AppConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_turns"));
    }

    #[test]
    fn missing_cwd_rejected() {
        let config = AppConfig {
            cwd: Some(PathBuf::from("/nonexistent/ferrule/cwd")),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.max_turns, 100);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
max_turns = 12
allowed_tools = ["read_file", "glob"]

[model]
name = "openai/gpt-4o-mini"
temperature = 0.2
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.max_turns, 12);
        assert_eq!(config.model.name, "openai/gpt-4o-mini");
        assert_eq!(config.model.context_window, 256_000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(
            config.allowed_tools,
            Some(vec!["read_file".to_string(), "glob".to_string()])
        );
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_turns = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_key_precedence() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("API_KEY", "generic"), ("OPENROUTER_API_KEY", "router")]));
        assert_eq!(config.api_key.as_deref(), Some("router"));
    }

    #[test]
    fn file_key_wins_over_env() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config.apply_env(env(&[("FERRULE_API_KEY", "from-env")]));
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn env_overrides_url_and_model() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[
            ("BASE_URL", "http://localhost:11434/v1"),
            ("FERRULE_MODEL", "llama3"),
            ("FERRULE_API_KEY", "  "),
        ]));
        assert_eq!(config.base_url, "http://localhost:11434/v1");
        assert_eq!(config.model.name, "llama3");
        assert!(config.api_key.is_none());
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret-value".into()),
            ..AppConfig::default()
        };
        let printed = format!("{config:?}");
        assert!(!printed.contains("sk-secret-value"));
        assert!(printed.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("openrouter"));
        assert!(toml_str.contains("max_turns = 100"));
    }
}
