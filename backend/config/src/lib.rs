//! `chatbox-config`: runtime configuration management.
//!
//! Provides:
//! - Typed config schema for the gateway, upstream provider, client and logging
//! - YAML read/write (atomic writes)
//! - `${ENV_VAR}` substitution and well-known env overrides
//! - Config redaction for safe display
//! - Validation with errors and warnings

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use env::{apply_env_overrides, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_config, parse_config, write_config};
pub use redact::redact;
pub use schema::{
    ChatboxConfig, ClientConfig, GatewayConfig, LoggingConfig, ProviderKind, UpstreamConfig,
};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Result};
use std::path::Path;

/// Load a config file, apply env overrides, and validate it.
///
/// This is the main entry point for loading a config at runtime. Warnings are
/// logged; any validation error fails the load.
pub async fn load_and_prepare(path: &Path) -> Result<ChatboxConfig> {
    let mut config = load_config(path).await?;
    apply_env_overrides(&mut config);
    check(&config, path)?;
    Ok(config)
}

/// Log every validation finding and fail if any of them is an error.
pub fn check(config: &ChatboxConfig, path: &Path) -> Result<()> {
    let report = validate(config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if !report.is_valid() {
        bail!("config at {} has {} error(s)", path.display(), report.errors.len());
    }
    Ok(())
}
