//! `chatbox config`

use anyhow::Result;

use chatbox_config::{redact, ChatboxConfig};

/// Print the effective config as YAML, secrets masked.
pub fn show(config: &ChatboxConfig) -> Result<()> {
    print!("{}", render(config)?);
    Ok(())
}

fn render(config: &ChatboxConfig) -> Result<String> {
    let value = redact(&serde_json::to_value(config)?);
    Ok(serde_yaml::to_string(&value)?)
}
