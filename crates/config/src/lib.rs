//! Configuration loading, validation, and management for docassist.
//!
//! Loads configuration from `~/.docassist/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.docassist/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible chat endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model identifier; also part of every reasoning cache key
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Resource ceilings enforced by the agent
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Retry behaviour for model and retrieval calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Response cache lifetimes
    #[serde(default)]
    pub cache: CacheConfig,

    /// Document retrieval settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_api_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".into()
}
fn default_model() -> String {
    "gemini-2.5-flash-lite".into()
}
fn default_temperature() -> f32 {
    0.0
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
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("limits", &self.limits)
            .field("retry", &self.retry)
            .field("cache", &self.cache)
            .field("retrieval", &self.retrieval)
            .field("gateway", &self.gateway)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Model responses allowed per run
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Tool results allowed per run
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: u32,

    /// Character budget for the transcript sent to the model
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    /// Per-document truncation applied by the retriever
    #[serde(default = "default_max_doc_chars")]
    pub max_doc_chars: usize,

    #[serde(default = "default_max_retrieved_docs")]
    pub max_retrieved_docs: usize,
}

fn default_max_turns() -> u32 {
    6
}
fn default_max_tool_calls() -> u32 {
    3
}
fn default_max_context_chars() -> usize {
    12_000
}
fn default_max_doc_chars() -> usize {
    2_000
}
fn default_max_retrieved_docs() -> usize {
    4
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_tool_calls: default_max_tool_calls(),
            max_context_chars: default_max_context_chars(),
            max_doc_chars: default_max_doc_chars(),
            max_retrieved_docs: default_max_retrieved_docs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_llm_max_retries")]
    pub llm_max_retries: u32,

    #[serde(default = "default_tool_max_retries")]
    pub tool_max_retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_llm_max_retries() -> u32 {
    2
}
fn default_tool_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    10_000
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            llm_max_retries: default_llm_max_retries(),
            tool_max_retries: default_tool_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub llm_ttl_secs: u64,

    #[serde(default = "default_ttl_secs")]
    pub retrieval_ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    3_600
}

impl CacheConfig {
    pub fn llm_ttl(&self) -> Duration {
        Duration::from_secs(self.llm_ttl_secs)
    }

    pub fn retrieval_ttl(&self) -> Duration {
        Duration::from_secs(self.retrieval_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            llm_ttl_secs: default_ttl_secs(),
            retrieval_ttl_secs: default_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Directory of `.md` / `.txt` files indexed at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_dir: Option<PathBuf>,

    /// Documents returned per search
    #[serde(default = "default_k")]
    pub k: usize,

    /// Candidates considered before diversification
    #[serde(default = "default_fetch_k")]
    pub fetch_k: usize,

    #[serde(default = "default_search_type")]
    pub search_type: String,
}

fn default_k() -> usize {
    5
}
fn default_fetch_k() -> usize {
    20
}
fn default_search_type() -> String {
    "mmr".into()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            docs_dir: None,
            k: default_k(),
            fetch_k: default_fetch_k(),
            search_type: default_search_type(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.docassist/config.toml).
    ///
    /// Environment variables take precedence over the file:
    /// - `DOCASSIST_API_KEY`, then `GEMINI_API_KEY` (only if no key is configured)
    /// - `DOCASSIST_MODEL`
    /// - `DOCASSIST_DOCS_DIR`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
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

    fn apply_env_overrides(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("DOCASSIST_API_KEY")
                .ok()
                .or_else(|| std::env::var("GEMINI_API_KEY").ok());
        }

        if let Ok(model) = std::env::var("DOCASSIST_MODEL") {
            self.model = model;
        }

        if let Ok(dir) = std::env::var("DOCASSIST_DOCS_DIR") {
            self.retrieval.docs_dir = Some(PathBuf::from(dir));
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".docassist")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.limits.max_turns == 0 || self.limits.max_tool_calls == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_turns and limits.max_tool_calls must be > 0".into(),
            ));
        }

        if self.limits.max_context_chars == 0
            || self.limits.max_doc_chars == 0
            || self.limits.max_retrieved_docs == 0
        {
            return Err(ConfigError::ValidationError(
                "character and document limits must be > 0".into(),
            ));
        }

        if self.retrieval.k == 0 || self.retrieval.k > self.retrieval.fetch_k {
            return Err(ConfigError::ValidationError(
                "retrieval.k must be > 0 and <= retrieval.fetch_k".into(),
            ));
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::ValidationError(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            limits: LimitsConfig::default(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            retrieval: RetrievalConfig::default(),
            gateway: GatewayConfig::default(),
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
