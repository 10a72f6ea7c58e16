//! Config file read/write.

use crate::env::resolve_env_vars;
use crate::schema::ChatboxConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolve the chatbox config directory.
/// Priority: `CHATBOX_CONFIG_DIR` env > `~/.chatbox/`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CHATBOX_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .map(|home| home.join(".chatbox"))
        .unwrap_or_else(|| PathBuf::from(".chatbox"))
}

/// Resolve the full path to the main config file.
pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Load and parse the config from disk, resolving `${VAR}` references.
///
/// Returns `Ok(Default::default())` if the file doesn't exist (first run).
pub async fn load_config(path: &Path) -> Result<ChatboxConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(ChatboxConfig::default());
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&raw)
        .with_context(|| format!("Failed to parse config at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Parse YAML text into a config, substituting env vars on the way.
pub fn parse_config(raw: &str) -> Result<ChatboxConfig> {
    if raw.trim().is_empty() {
        return Ok(ChatboxConfig::default());
    }
    let value: serde_json::Value = serde_yaml::from_str(raw).context("Invalid YAML")?;
    let value = resolve_env_vars(&value).context("Failed to resolve env vars in config")?;
    serde_json::from_value(value).context("Config does not match schema")
}

/// Write config to disk atomically (write to temp file, rename).
pub async fn write_config(config: &ChatboxConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create config directory: {}", parent.display())
        })?;
    }

    let yaml =
        serde_yaml::to_string(config).with_context(|| "Failed to serialize config to YAML")?;

    let tmp_path = path.with_extension("yaml.tmp");
    fs::write(&tmp_path, yaml.as_bytes())
        .await
        .with_context(|| format!("Failed to write temp config: {}", tmp_path.display()))?;

    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to rename temp config to: {}", path.display()))?;

    info!(path = %path.display(), "Wrote config");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ProviderKind;

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("absent.yaml")).await.unwrap();
        assert_eq!(cfg.gateway.port, crate::defaults::DEFAULT_PORT);
    }

    #[tokio::test]
    async fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_file_path(dir.path());

        let mut cfg = ChatboxConfig::default();
        cfg.upstream.provider = ProviderKind::Mock;
        cfg.gateway.keepalive_secs = None;
        write_config(&cfg, &path).await.unwrap();

        let loaded = load_config(&path).await.unwrap();
        assert_eq!(loaded.upstream.provider, ProviderKind::Mock);
        assert_eq!(loaded.gateway.keepalive_secs, None);
        assert!(!path.with_extension("yaml.tmp").exists());
    }

    #[test]
    fn test_blank_file_is_default() {
        let cfg = parse_config("  \n").unwrap();
        assert_eq!(cfg.client.model, crate::defaults::DEFAULT_MODEL);
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        assert!(parse_config("upstream:\n  provider: bard\n").is_err());
    }
}
