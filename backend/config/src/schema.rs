//! chatbox configuration schema.
//!
//! Every section deserializes with defaults, so a partial YAML file (or none
//! at all) yields a usable config.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::defaults;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatboxConfig {
    /// Stream producer (HTTP server) settings
    pub gateway: GatewayConfig,
    /// Upstream language-model provider
    pub upstream: UpstreamConfig,
    /// Stream consumer settings
    pub client: ClientConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind: String,
    pub port: u16,
    /// Model used when a request does not name one.
    pub default_model: String,
    /// Emit a keepalive comment after this many seconds of upstream silence.
    /// `null` disables keepalives.
    pub keepalive_secs: Option<u64>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: defaults::DEFAULT_BIND.to_string(),
            port: defaults::DEFAULT_PORT,
            default_model: defaults::DEFAULT_MODEL.to_string(),
            keepalive_secs: Some(defaults::DEFAULT_KEEPALIVE_SECS),
        }
    }
}

/// Which upstream service produces tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Openai,
    Ollama,
    Mock,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Openai => write!(f, "openai"),
            ProviderKind::Ollama => write!(f, "ollama"),
            ProviderKind::Mock => write!(f, "mock"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Provider used for models without a `provider/` prefix.
    pub provider: ProviderKind,
    pub openai_base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub ollama_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            openai_base_url: defaults::DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key: None,
            ollama_url: defaults::DEFAULT_OLLAMA_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Full URL of the producer's chat endpoint.
    pub endpoint: String,
    pub model: String,
    /// Where conversations are persisted; `None` keeps them in memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,
    pub title_max_chars: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::DEFAULT_ENDPOINT.to_string(),
            model: defaults::DEFAULT_MODEL.to_string(),
            state_path: None,
            title_max_chars: defaults::DEFAULT_TITLE_MAX_CHARS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory for rolling NDJSON log files; console only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Render console output as JSON.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::DEFAULT_LOG_LEVEL.to_string(),
            dir: None,
            json: false,
        }
    }
}
