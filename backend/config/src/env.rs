//! Environment handling for config values.
//!
//! Two mechanisms:
//! - `${VAR_NAME}` references inside string values, resolved at load time
//!   (uppercase `[A-Z_][A-Z0-9_]*` names only, `$${VAR}` escapes to a literal `${VAR}`)
//! - well-known variables (`PORT`, `OPENAI_API_KEY`, ...) that override fields directly

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::schema::ChatboxConfig;

/// Matches `${VAR}` with an optional leading `$` that marks an escape.
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?)\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

/// Error returned for missing env vars.
#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute `${VAR}` references using the process environment.
pub fn resolve_env_vars(value: &Value) -> Result<Value> {
    resolve_env_vars_with(value, &std::env::vars().collect())
}

/// Substitute `${VAR}` references using a provided map (useful for testing).
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    substitute_value(value, env, "")
}

fn substitute_value(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(arr) => arr
            .iter()
            .enumerate()
            .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (k, v) in map {
                let child_path = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                result.insert(k.clone(), substitute_value(v, env, &child_path)?);
            }
            Ok(Value::Object(result))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String> {
    if !s.contains("${") {
        return Ok(s.to_string());
    }

    let mut missing: Option<MissingEnvVarError> = None;
    let substituted = ENV_VAR_PATTERN.replace_all(s, |caps: &Captures| {
        let name = &caps[2];
        if !caps[1].is_empty() {
            return format!("${{{name}}}");
        }
        match env.get(name) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    if let Some(err) = missing {
        bail!(err);
    }
    Ok(substituted.into_owned())
}

/// Apply well-known environment variables on top of a loaded config.
pub fn apply_env_overrides(config: &mut ChatboxConfig) {
    apply_env_overrides_with(config, &std::env::vars().collect());
}

/// Apply overrides from a provided map (useful for testing).
pub fn apply_env_overrides_with(config: &mut ChatboxConfig, env: &HashMap<String, String>) {
    let get = |key: &str| env.get(key).filter(|v| !v.is_empty()).cloned();

    if let Some(port) = get("PORT").and_then(|p| p.parse().ok()) {
        config.gateway.port = port;
    }
    if let Some(bind) = get("CHATBOX_BIND") {
        config.gateway.bind = bind;
    }
    if let Some(key) = get("OPENAI_API_KEY") {
        config.upstream.api_key = Some(key);
    }
    if let Some(url) = get("OLLAMA_URL") {
        config.upstream.ollama_url = url;
    }
    if let Some(endpoint) = get("CHATBOX_ENDPOINT") {
        config.client.endpoint = endpoint;
    }
    if let Some(path) = get("CHATBOX_STATE") {
        config.client.state_path = Some(PathBuf::from(path));
    }
    if let Some(level) = get("RUST_LOG") {
        config.logging.level = level;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn substitutes_nested_var() {
        let v = json!({"upstream": {"api_key": "${OPENAI_API_KEY}"}});
        let result = resolve_env_vars_with(&v, &env(&[("OPENAI_API_KEY", "sk-abc123")])).unwrap();
        assert_eq!(result["upstream"]["api_key"], "sk-abc123");
    }

    #[test]
    fn error_names_missing_var_and_path() {
        let v = json!({"client": {"endpoint": "${MISSING_VAR}"}});
        let err = resolve_env_vars_with(&v, &HashMap::new()).unwrap_err().to_string();
        assert!(err.contains("MISSING_VAR"));
        assert!(err.contains("client.endpoint"));
    }

    #[test]
    fn escaped_reference_is_kept_literal() {
        let v = json!({"k": "$${HOME_DIR} and ${USER_NAME}"});
        let result = resolve_env_vars_with(&v, &env(&[("USER_NAME", "ada")])).unwrap();
        assert_eq!(result["k"], "${HOME_DIR} and ada");
    }

    #[test]
    fn overrides_replace_fields() {
        let mut cfg = ChatboxConfig::default();
        apply_env_overrides_with(
            &mut cfg,
            &env(&[("PORT", "7000"), ("OPENAI_API_KEY", "sk-x"), ("RUST_LOG", "")]),
        );
        assert_eq!(cfg.gateway.port, 7000);
        assert_eq!(cfg.upstream.api_key.as_deref(), Some("sk-x"));
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn unparsable_port_is_ignored() {
        let mut cfg = ChatboxConfig::default();
        apply_env_overrides_with(&mut cfg, &env(&[("PORT", "eighty")]));
        assert_eq!(cfg.gateway.port, crate::defaults::DEFAULT_PORT);
    }
}
