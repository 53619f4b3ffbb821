//! Configuration loading, validation, and management for Pengate.
//!
//! Loads configuration from `./pengate.toml` (or the path in `PENGATE_CONFIG`)
//! with environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Providers the gateway knows how to talk to.
pub const KNOWN_PROVIDERS: [&str; 2] = ["anthropic", "openai"];

/// Canvas execution modes.
pub const CANVAS_MODES: [&str; 2] = ["relay", "sandbox"];

/// The root configuration structure.
///
/// Maps directly to `pengate.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default LLM provider (`anthropic` or `openai`)
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Where canvas tools execute
    #[serde(default)]
    pub canvas: CanvasConfig,

    /// Log output and session records
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_provider() -> String {
    "anthropic".into()
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Origin allowed by CORS
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
}

fn default_port() -> u16 {
    3001
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_frontend_url() -> String {
    "http://localhost:5173".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            frontend_url: default_frontend_url(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL override (e.g. a proxy or a compatible endpoint)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    pub model: String,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_anthropic")]
    pub anthropic: ProviderConfig,

    #[serde(default = "default_openai")]
    pub openai: ProviderConfig,
}

fn default_anthropic() -> ProviderConfig {
    ProviderConfig {
        api_key: None,
        api_url: None,
        model: "claude-sonnet-4-20250514".into(),
    }
}
fn default_openai() -> ProviderConfig {
    ProviderConfig {
        api_key: None,
        api_url: None,
        model: "gpt-4o".into(),
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            anthropic: default_anthropic(),
            openai: default_openai(),
        }
    }
}

impl ProvidersConfig {
    pub fn get(&self, name: &str) -> Option<&ProviderConfig> {
        match name {
            "anthropic" => Some(&self.anthropic),
            "openai" => Some(&self.openai),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Step bound for `edits` mode
    #[serde(default = "default_edits_max_steps")]
    pub edits_max_steps: u32,

    /// Step bound for `fast` mode
    #[serde(default = "default_fast_max_steps")]
    pub fast_max_steps: u32,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_edits_max_steps() -> u32 {
    3
}
fn default_fast_max_steps() -> u32 {
    6
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            edits_max_steps: default_edits_max_steps(),
            fast_max_steps: default_fast_max_steps(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasConfig {
    /// `relay`: canvas tools run in the client. `sandbox`: they run against
    /// a fresh in-process document per request.
    #[serde(default = "default_canvas_mode")]
    pub mode: String,
}

fn default_canvas_mode() -> String {
    "relay".into()
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            mode: default_canvas_mode(),
        }
    }
}

impl CanvasConfig {
    pub fn is_sandbox(&self) -> bool {
        self.mode == "sandbox"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit logs as JSON lines
    #[serde(default)]
    pub json: bool,

    /// Persist one record per chat request
    #[serde(default)]
    pub sessions: bool,

    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,

    /// Include full message bodies in session records
    #[serde(default = "default_true")]
    pub include_messages: bool,
}

fn default_session_dir() -> PathBuf {
    PathBuf::from(".logs")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            sessions: false,
            session_dir: default_session_dir(),
            include_messages: true,
        }
    }
}

impl AppConfig {
    /// Default file name looked up in the working directory.
    pub const FILE_NAME: &'static str = "pengate.toml";

    /// Load configuration from `PENGATE_CONFIG` or `./pengate.toml`, then
    /// apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("PENGATE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(Self::FILE_NAME));
        Self::load_with_env(&path)
    }

    /// Load from a specific file, then apply process environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without env overrides.
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

    /// Apply environment overrides (highest priority). `lookup` abstracts the
    /// environment so tests can feed a fixed map.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.gateway.port = port
                .parse()
                .map_err(|_| ConfigError::ValidationError(format!("PORT is not a port: {port}")))?;
        }
        if let Some(host) = lookup("HOST") {
            self.gateway.host = host;
        }
        if let Some(url) = lookup("FRONTEND_URL") {
            self.gateway.frontend_url = url;
        }
        if let Some(provider) = lookup("AI_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(key) = lookup("ANTHROPIC_API_KEY") {
            self.providers.anthropic.api_key = Some(key);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.providers.openai.api_key = Some(key);
        }
        if let Some(model) = lookup("ANTHROPIC_MODEL") {
            self.providers.anthropic.model = model;
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.providers.openai.model = model;
        }
        if let Some(flag) = lookup("ENABLE_AGENT_LOGGING") {
            self.logging.sessions = matches!(flag.as_str(), "1" | "true" | "TRUE" | "yes");
        }
        if let Some(dir) = lookup("AGENT_LOG_DIR") {
            self.logging.session_dir = PathBuf::from(dir);
        }
        if let Some(mode) = lookup("PENGATE_CANVAS_MODE") {
            self.canvas.mode = mode;
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !KNOWN_PROVIDERS.contains(&self.default_provider.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "default_provider must be one of {}, got '{}'",
                KNOWN_PROVIDERS.join(", "),
                self.default_provider
            )));
        }

        if self.agent.temperature < 0.0 || self.agent.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "agent.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.edits_max_steps == 0 || self.agent.fast_max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent step bounds must be at least 1".into(),
            ));
        }

        if !CANVAS_MODES.contains(&self.canvas.mode.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "canvas.mode must be one of {}, got '{}'",
                CANVAS_MODES.join(", "),
                self.canvas.mode
            )));
        }

        Ok(())
    }

    /// Check whether the given provider has an API key.
    pub fn has_api_key(&self, provider: &str) -> bool {
        self.providers
            .get(provider)
            .is_some_and(|p| p.api_key.is_some())
    }

    /// Address the gateway binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }

    /// Render the configuration as TOML with secrets removed.
    pub fn to_redacted_toml(&self) -> String {
        let mut shown = self.clone();
        for provider in [&mut shown.providers.anthropic, &mut shown.providers.openai] {
            if provider.api_key.is_some() {
                provider.api_key = Some("[REDACTED]".into());
            }
        }
        toml::to_string_pretty(&shown).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            gateway: GatewayConfig::default(),
            providers: ProvidersConfig::default(),
            agent: AgentConfig::default(),
            canvas: CanvasConfig::default(),
            logging: LoggingConfig::default(),
        }
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

impl From<ConfigError> for pengate_core::Error {
    fn from(err: ConfigError) -> Self {
        pengate_core::Error::Config {
            message: err.to_string(),
        }
    }
}
