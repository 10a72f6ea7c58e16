//! Config validation: field checks with user-friendly error messages.

use crate::schema::{ChatboxConfig, ProviderKind};
use thiserror::Error;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &ChatboxConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_gateway(config, &mut report);
    validate_upstream(config, &mut report);
    validate_client(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_gateway(config: &ChatboxConfig, report: &mut ValidationReport) {
    let gw = &config.gateway;
    if gw.port != 0 && gw.port < 1024 && gw.port != 80 && gw.port != 443 {
        report.warn(
            "gateway.port",
            format!("Port {} requires elevated privileges; consider using a port >= 1024", gw.port),
        );
    }
    if gw.default_model.trim().is_empty() {
        report.error("gateway.default_model", "Default model cannot be empty");
    }
    if gw.keepalive_secs == Some(0) {
        report.error("gateway.keepalive_secs", "keepalive_secs must be > 0 (use null to disable)");
    }
}

fn validate_upstream(config: &ChatboxConfig, report: &mut ValidationReport) {
    let up = &config.upstream;
    match up.provider {
        ProviderKind::Openai => {
            if up.api_key.as_deref().map(str::is_empty).unwrap_or(true) {
                report.warn(
                    "upstream.api_key",
                    "No OpenAI API key configured; upstream calls will be rejected",
                );
            }
            if !is_http_url(&up.openai_base_url) {
                report.error("upstream.openai_base_url", "Must be an http(s) URL");
            }
        }
        ProviderKind::Ollama => {
            if !is_http_url(&up.ollama_url) {
                report.error("upstream.ollama_url", "Must be an http(s) URL");
            }
        }
        ProviderKind::Mock => {
            report.warn("upstream.provider", "Mock provider selected; responses are canned");
        }
    }
}

fn validate_client(config: &ChatboxConfig, report: &mut ValidationReport) {
    let client = &config.client;
    if !is_http_url(&client.endpoint) {
        report.error("client.endpoint", "Must be an http(s) URL");
    }
    if client.model.trim().is_empty() {
        report.error("client.model", "Model cannot be empty");
    }
    if client.title_max_chars == 0 {
        report.error("client.title_max_chars", "title_max_chars must be >= 1");
    }
}

fn validate_logging(config: &ChatboxConfig, report: &mut ValidationReport) {
    let level = config.logging.level.to_ascii_lowercase();
    // Directive strings like "chatbox_gateway=debug" are passed through untouched.
    if !level.contains('=') && !LOG_LEVELS.contains(&level.as_str()) {
        report.warn(
            "logging.level",
            format!("Unknown log level '{}'; falling back to info", config.logging.level),
        );
    }
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}
