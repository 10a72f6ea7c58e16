//! `chatbox serve`

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use chatbox_config::{ChatboxConfig, ProviderKind, UpstreamConfig};
use chatbox_gateway::{start_server, GatewayState};
use chatbox_providers::{MockProvider, OllamaProvider, OpenAiProvider, ProviderRegistry};

pub async fn run(config: &ChatboxConfig, mock: bool) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port)
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.gateway.bind))?;

    let registry = build_registry(&config.upstream, mock);
    info!(
        port = config.gateway.port,
        bind = %config.gateway.bind,
        providers = ?registry.list(),
        default_model = %config.gateway.default_model,
        "Starting chatbox gateway"
    );

    let state = GatewayState::new(registry)
        .with_default_model(config.gateway.default_model.clone())
        .with_keepalive(config.gateway.keepalive_secs.map(Duration::from_secs));

    start_server(addr, state).await
}

/// Register every provider the config can reach; the configured kind is the default.
fn build_registry(upstream: &UpstreamConfig, mock: bool) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    if mock || upstream.provider == ProviderKind::Mock {
        registry.register("mock", Arc::new(MockProvider::echo()));
        info!("Registered mock echo provider");
        return registry;
    }

    if upstream.api_key.is_none() && upstream.provider == ProviderKind::Openai {
        warn!("No OpenAI API key configured; upstream calls will likely be rejected");
    }
    registry.register(
        "openai",
        Arc::new(
            OpenAiProvider::new(upstream.api_key.clone())
                .with_base_url(upstream.openai_base_url.clone()),
        ),
    );
    registry.register(
        "ollama",
        Arc::new(OllamaProvider::new().with_base_url(upstream.ollama_url.clone())),
    );
    info!(url = %upstream.ollama_url, "Registered OpenAI and Ollama providers");

    let default = upstream.provider.to_string();
    if !registry.set_default(&default) {
        warn!(provider = %default, "Configured provider is not registered, keeping openai");
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbox_core::TokenProvider;

    #[test]
    fn mock_flag_wins_over_config() {
        let registry = build_registry(&UpstreamConfig::default(), true);
        assert_eq!(registry.list(), vec!["mock"]);
    }

    #[test]
    fn configured_provider_is_default() {
        let upstream = UpstreamConfig {
            provider: ProviderKind::Ollama,
            ..UpstreamConfig::default()
        };
        let registry = build_registry(&upstream, false);
        assert_eq!(registry.list(), vec!["ollama", "openai"]);

        let (provider, model) = registry.resolve("llama3.2").unwrap();
        assert_eq!(provider.name(), "ollama");
        assert_eq!(model, "llama3.2");
    }
}
