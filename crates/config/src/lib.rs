//! Configuration loading and validation for gramclaw.
//!
//! Loads configuration from `~/.gramclaw/config.toml` with environment
//! variable overrides for the secrets (`GRAMCLAW_BOT_TOKEN`,
//! `GRAMCLAW_API_KEY`, `GRAMCLAW_IMAGE_API_KEY`, `GRAMCLAW_PORT`).
//! Every field has a serde default so a missing or partial file still
//! yields a runnable configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// The root configuration structure.
///
/// Maps directly to `~/.gramclaw/config.toml`.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Model backend settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Telegram bot settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Inbound HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Outbound send rate limiter tuning
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Orchestration loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Image generation settings
    #[serde(default)]
    pub image: ImageConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("model", &self.model)
            .field("telegram", &self.telegram)
            .field("gateway", &self.gateway)
            .field("limiter", &self.limiter)
            .field("agent", &self.agent)
            .field("image", &self.image)
            .finish()
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

/// Model backend configuration (OpenAI-compatible endpoint).
#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// API key for the model backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the chat-completions endpoint
    #[serde(default = "default_model_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_model_name")]
    pub name: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Internal retry attempts for transient backend failures
    #[serde(default = "default_model_retries")]
    pub retry_attempts: u32,
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("name", &self.name)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("retry_attempts", &self.retry_attempts)
            .finish()
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_model_base_url(),
            name: default_model_name(),
            temperature: default_temperature(),
            max_tokens: None,
            retry_attempts: default_model_retries(),
        }
    }
}

fn default_model_base_url() -> String {
    "https://api.groq.com/openai/v1".into()
}
fn default_model_name() -> String {
    "deepseek-r1-distill-llama-70b".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_model_retries() -> u32 {
    2
}

/// Telegram bot configuration.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &redact(&self.bot_token))
            .finish()
    }
}

/// Inbound HTTP gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    3000
}

/// Adaptive rate limiter tuning for the outbound Telegram channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Floor of the inter-send delay, milliseconds
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Cap of the inter-send delay, milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Delay multiplier applied on a quota-exceeded failure
    #[serde(default = "default_growth")]
    pub growth: f64,

    /// Delay multiplier applied on a successful send
    #[serde(default = "default_decay")]
    pub decay: f64,

    /// Retry budget for quota-exceeded failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Wait applied after a quota failure with no server-suggested
    /// retry-after, seconds
    #[serde(default = "default_retry_after_secs")]
    pub default_retry_after_secs: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            growth: default_growth(),
            decay: default_decay(),
            max_retries: default_max_retries(),
            default_retry_after_secs: default_retry_after_secs(),
        }
    }
}

fn default_min_delay_ms() -> u64 {
    50
}
fn default_max_delay_ms() -> u64 {
    1000
}
fn default_growth() -> f64 {
    1.5
}
fn default_decay() -> f64 {
    0.8
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_after_secs() -> u64 {
    5
}

/// Orchestration loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum infer/tools cycles per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Override the built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            system_prompt: None,
        }
    }
}

fn default_max_iterations() -> u32 {
    10
}

/// Image generation backend configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// API key for the image backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the image generation endpoint
    #[serde(default = "default_image_base_url")]
    pub base_url: String,

    #[serde(default = "default_image_size")]
    pub width: u32,

    #[serde(default = "default_image_size")]
    pub height: u32,

    #[serde(default = "default_image_steps")]
    pub steps: u32,

    #[serde(default = "default_image_seed")]
    pub seed: u64,
}

impl std::fmt::Debug for ImageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("steps", &self.steps)
            .field("seed", &self.seed)
            .finish()
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_image_base_url(),
            width: default_image_size(),
            height: default_image_size(),
            steps: default_image_steps(),
            seed: default_image_seed(),
        }
    }
}

fn default_image_base_url() -> String {
    "https://api.novita.ai/v3beta/flux-1-schnell".into()
}
fn default_image_size() -> u32 {
    1024
}
fn default_image_steps() -> u32 {
    4
}
fn default_image_seed() -> u64 {
    2024
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl AppConfig {
    /// Load configuration from the default location with env overrides.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_dir().join("config.toml");
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from an explicit path (no env overrides).
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The configuration directory (`~/.gramclaw`).
    pub fn config_dir() -> PathBuf {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".gramclaw")
    }

    /// Apply environment variable overrides for secrets and the port.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("GRAMCLAW_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Ok(key) = std::env::var("GRAMCLAW_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("GRAMCLAW_IMAGE_API_KEY") {
            self.image.api_key = Some(key);
        }
        if let Ok(port) = std::env::var("GRAMCLAW_PORT") {
            if let Ok(port) = port.parse() {
                self.gateway.port = port;
            }
        }
    }

    /// Whether the model backend is usable.
    pub fn has_model_key(&self) -> bool {
        self.model.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// A default config file body, written by `gramclaw init`.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}
