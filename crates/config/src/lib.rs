//! Configuration loading, validation, and management for turnstile.
//!
//! Loads configuration from `~/.turnstile/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.turnstile/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model for the execution engine and the output refiner
    #[serde(default = "default_primary_model")]
    pub primary_model: String,

    /// Lightweight model for the context gate
    #[serde(default = "default_secondary_model")]
    pub secondary_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Turn orchestration settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Knowledge injection policy
    #[serde(default)]
    pub injection: InjectionConfig,

    /// Where the knowledge document comes from
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Checkpoint store
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_primary_model() -> String {
    "gpt-4.1".into()
}
fn default_secondary_model() -> String {
    "gpt-4.1-nano".into()
}
fn default_temperature() -> f32 {
    0.5
}
fn default_max_tokens() -> u32 {
    4096
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
            .field("default_provider", &self.default_provider)
            .field("primary_model", &self.primary_model)
            .field("secondary_model", &self.secondary_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("orchestrator", &self.orchestrator)
            .field("injection", &self.injection)
            .field("knowledge", &self.knowledge)
            .field("checkpoint", &self.checkpoint)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Session id used when a call carries no thread id
    #[serde(default = "default_session_id")]
    pub default_session_id: String,

    /// How many prior messages the context gate sees
    #[serde(default = "default_gate_history_window")]
    pub gate_history_window: usize,

    /// Maximum tool call iterations per turn in the default engine
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,

    /// Upper bound on a single tool execution, in seconds
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Prefix stripped from the user query before refinement
    #[serde(default = "default_latest_message_tag")]
    pub latest_message_tag: String,
}

fn default_session_id() -> String {
    "default_session".into()
}
fn default_gate_history_window() -> usize {
    4
}
fn default_max_tool_iterations() -> u32 {
    25
}
fn default_tool_timeout_secs() -> u64 {
    60
}
fn default_latest_message_tag() -> String {
    "[LATEST_MESSAGE] ".into()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_session_id: default_session_id(),
            gate_history_window: default_gate_history_window(),
            max_tool_iterations: default_max_tool_iterations(),
            tool_timeout_secs: default_tool_timeout_secs(),
            latest_message_tag: default_latest_message_tag(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectionConfig {
    /// Minimum turns since the last fetch before a keyword may trigger a refetch
    #[serde(default = "default_cooldown_turns")]
    pub cooldown_turns: u64,

    /// Turns after which the document is refetched regardless of keywords
    #[serde(default = "default_max_staleness_turns")]
    pub max_staleness_turns: u64,

    /// Domain terms that mark a query as needing fresh knowledge
    #[serde(default = "default_trigger_keywords")]
    pub trigger_keywords: Vec<String>,
}

fn default_cooldown_turns() -> u64 {
    3
}
fn default_max_staleness_turns() -> u64 {
    20
}
fn default_trigger_keywords() -> Vec<String> {
    [
        "schema", "table", "query", "select", "insert", "update", "delete", "database",
        "graphql", "field", "type", "id", "name", "price", "order", "user", "product",
    ]
    .iter()
    .map(|k| k.to_string())
    .collect()
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            cooldown_turns: default_cooldown_turns(),
            max_staleness_turns: default_max_staleness_turns(),
            trigger_keywords: default_trigger_keywords(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// "none", "static", "file" or "http"
    #[serde(default = "default_knowledge_source")]
    pub source: String,

    /// Document path for the "file" source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Endpoint for the "http" source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Inline document for the "static" source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default = "default_knowledge_timeout")]
    pub timeout_secs: u64,

    /// Extra request headers for the "http" source
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

fn default_knowledge_source() -> String {
    "none".into()
}
fn default_knowledge_timeout() -> u64 {
    30
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            source: default_knowledge_source(),
            path: None,
            url: None,
            text: None,
            timeout_secs: default_knowledge_timeout(),
            headers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// "memory", "file" or "sqlite"
    #[serde(default = "default_checkpoint_backend")]
    pub backend: String,

    /// Directory (file) or database path (sqlite); defaults under the config dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_checkpoint_backend() -> String {
    "file".into()
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: default_checkpoint_backend(),
            path: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.turnstile/config.toml).
    ///
    /// Also checks environment variables:
    /// - `TURNSTILE_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `TURNSTILE_PROVIDER`, `TURNSTILE_PRIMARY_MODEL`, `TURNSTILE_SECONDARY_MODEL`
    /// - `TURNSTILE_KNOWLEDGE_URL` (switches the knowledge source to "http")
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("TURNSTILE_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("TURNSTILE_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("TURNSTILE_PRIMARY_MODEL") {
            config.primary_model = model;
        }

        if let Ok(model) = std::env::var("TURNSTILE_SECONDARY_MODEL") {
            config.secondary_model = model;
        }

        if let Ok(url) = std::env::var("TURNSTILE_KNOWLEDGE_URL") {
            config.knowledge.source = "http".into();
            config.knowledge.url = Some(url);
        }

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

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".turnstile")
    }

    /// Where checkpoints live when `checkpoint.path` is unset.
    pub fn default_checkpoint_path(&self) -> PathBuf {
        match self.checkpoint.backend.as_str() {
            "sqlite" => Self::config_dir().join("checkpoints.db"),
            _ => Self::config_dir().join("threads"),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.orchestrator.gate_history_window == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.gate_history_window must be > 0".into(),
            ));
        }

        if self.orchestrator.tool_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.tool_timeout_secs must be > 0".into(),
            ));
        }

        if self.injection.max_staleness_turns == 0 {
            return Err(ConfigError::ValidationError(
                "injection.max_staleness_turns must be > 0".into(),
            ));
        }

        if self.injection.cooldown_turns > self.injection.max_staleness_turns {
            return Err(ConfigError::ValidationError(
                "injection.cooldown_turns must not exceed injection.max_staleness_turns".into(),
            ));
        }

        match self.knowledge.source.as_str() {
            "none" | "static" => {}
            "file" if self.knowledge.path.is_none() => {
                return Err(ConfigError::ValidationError(
                    "knowledge.source = \"file\" requires knowledge.path".into(),
                ));
            }
            "http" if self.knowledge.url.is_none() => {
                return Err(ConfigError::ValidationError(
                    "knowledge.source = \"http\" requires knowledge.url".into(),
                ));
            }
            "file" | "http" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown knowledge.source: {other}"
                )));
            }
        }

        if !matches!(self.checkpoint.backend.as_str(), "memory" | "file" | "sqlite") {
            return Err(ConfigError::ValidationError(format!(
                "unknown checkpoint.backend: {}",
                self.checkpoint.backend
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some() || self.providers.values().any(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            primary_model: default_primary_model(),
            secondary_model: default_secondary_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            orchestrator: OrchestratorConfig::default(),
            injection: InjectionConfig::default(),
            knowledge: KnowledgeConfig::default(),
            checkpoint: CheckpointConfig::default(),
            providers: HashMap::new(),
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
