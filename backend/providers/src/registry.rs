use std::collections::HashMap;
use std::sync::Arc;

use chatbox_core::{ProviderError, TokenProvider};

/// Registry of token providers, looked up by name.
///
/// A model id of the form `provider/model` routes to that provider with the
/// prefix stripped; anything else goes to the default provider unchanged.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn TokenProvider>>,
    default: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            default: None,
        }
    }

    /// Register a provider by name. The first registration becomes the default.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn TokenProvider>) {
        let name = name.into();
        if self.default.is_none() {
            self.default = Some(name.clone());
        }
        self.providers.insert(name, provider);
    }

    /// Make `name` the default. Returns `false` if it is not registered.
    pub fn set_default(&mut self, name: &str) -> bool {
        if self.providers.contains_key(name) {
            self.default = Some(name.to_string());
            true
        } else {
            false
        }
    }

    /// Pick the provider for `model` and the model name to send upstream.
    pub fn resolve(&self, model: &str) -> Result<(Arc<dyn TokenProvider>, String), ProviderError> {
        if let Some((prefix, rest)) = model.split_once('/') {
            if let Some(provider) = self.providers.get(prefix) {
                return Ok((Arc::clone(provider), rest.to_string()));
            }
        }

        self.default
            .as_ref()
            .and_then(|name| self.providers.get(name))
            .map(|provider| (Arc::clone(provider), model.to_string()))
            .ok_or_else(|| ProviderError::UnknownProvider(model.to_string()))
    }

    /// Get all registered provider names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockProvider;

    fn registry() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register("openai", Arc::new(MockProvider::new(["a"])));
        registry.register("ollama", Arc::new(MockProvider::new(["b"])));
        registry
    }

    #[test]
    fn test_prefix_routes_and_strips() {
        let (_, model) = registry().resolve("ollama/llama3.2").unwrap();
        assert_eq!(model, "llama3.2");
    }

    #[test]
    fn test_unprefixed_goes_to_default() {
        let (_, model) = registry().resolve("gpt-4o-mini").unwrap();
        assert_eq!(model, "gpt-4o-mini");
    }

    #[test]
    fn test_unknown_prefix_keeps_full_model() {
        let (_, model) = registry().resolve("meta-llama/llama-3-70b").unwrap();
        assert_eq!(model, "meta-llama/llama-3-70b");
    }

    #[test]
    fn test_empty_registry_is_error() {
        let err = ProviderRegistry::new().resolve("gpt-4o").err().unwrap();
        assert!(matches!(err, ProviderError::UnknownProvider(_)));
        assert_eq!(registry().list(), vec!["ollama", "openai"]);
    }

    #[test]
    fn test_set_default() {
        let mut registry = registry();
        assert!(registry.set_default("ollama"));
        assert!(!registry.set_default("missing"));
    }
}
