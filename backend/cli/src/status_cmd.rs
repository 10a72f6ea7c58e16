//! CLI Status Command
//!
//! Asks the gateway for its health report.

use anyhow::Result;

use chatbox_config::ChatboxConfig;

use crate::terminal_output::{note_error, note_success};

pub async fn run(config: &ChatboxConfig) -> Result<()> {
    let url = health_url(config);
    let client = reqwest::Client::new();

    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            let body: serde_json::Value = resp.json().await?;
            note_success(&format!("Gateway is up at {url}"));
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Ok(resp) => note_error(&format!("Gateway at {url} answered {}", resp.status())),
        Err(_) => note_error(&format!("Chatbox gateway is not running at {url}")),
    }

    Ok(())
}

fn health_url(config: &ChatboxConfig) -> String {
    let host = match config.gateway.bind.as_str() {
        "0.0.0.0" | "::" => "127.0.0.1",
        bind => bind,
    };
    format!("http://{host}:{}/api/health", config.gateway.port)
}
