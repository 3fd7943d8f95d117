use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;

use crate::config::{ClientFactory, ProviderConfig, ProviderType};
use crate::traits::ChatClient;

/// Chat clients keyed by provider, built once at startup
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    clients: HashMap<ProviderType, Arc<dyn ChatClient>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from every provider that has credentials
    pub fn from_configs(configs: impl IntoIterator<Item = ProviderConfig>) -> Result<Self> {
        let mut registry = Self::new();
        for config in configs {
            let provider = config.provider;
            let client = ClientFactory::create_chat_client(config)?;
            tracing::info!(provider = %provider, "LLM provider registered");
            registry.insert(provider, client);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, provider: ProviderType, client: Arc<dyn ChatClient>) {
        self.clients.insert(provider, client);
    }

    pub fn with_client(mut self, provider: ProviderType, client: Arc<dyn ChatClient>) -> Self {
        self.insert(provider, client);
        self
    }

    pub fn get(&self, provider: ProviderType) -> Option<Arc<dyn ChatClient>> {
        self.clients.get(&provider).cloned()
    }

    pub fn providers(&self) -> Vec<ProviderType> {
        let mut providers: Vec<ProviderType> = self.clients.keys().copied().collect();
        providers.sort_by_key(|p| p.as_str());
        providers
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_only_knows_configured_providers() {
        let registry = ProviderRegistry::from_configs(vec![
            ProviderConfig::new(ProviderType::OpenAI, "a"),
            ProviderConfig::new(ProviderType::Anthropic, "b"),
        ])
        .unwrap();

        assert!(registry.get(ProviderType::OpenAI).is_some());
        assert!(registry.get(ProviderType::Groq).is_none());
        assert_eq!(registry.providers(), vec![ProviderType::Anthropic, ProviderType::OpenAI]);
    }
}
