use std::sync::Arc;
use anyhow::{Result, anyhow};

use chatsa_integrations::{KnowledgeBase, MetaMessenger};
use chatsa_llm::ProviderRegistry;
use chatsa_persist::PersistenceClient;

use crate::engine::{ConversationEngine, EngineConfig};
use crate::router::{DefaultRouter, Router};

/// Builder for constructing a ConversationEngine
pub struct ConversationEngineBuilder {
    persistence: Option<Arc<dyn PersistenceClient>>,
    providers: Option<Arc<ProviderRegistry>>,
    knowledge: Option<Arc<dyn KnowledgeBase>>,
    messenger: Option<Arc<dyn MetaMessenger>>,
    router: Option<Arc<dyn Router>>,
    config: EngineConfig,
}

impl ConversationEngineBuilder {
    pub fn new() -> Self {
        Self {
            persistence: None,
            providers: None,
            knowledge: None,
            messenger: None,
            router: None,
            config: EngineConfig::default(),
        }
    }

    pub fn persistence(mut self, client: Arc<dyn PersistenceClient>) -> Self {
        self.persistence = Some(client);
        self
    }

    /// Set the LLM clients, one per provider
    pub fn providers(mut self, registry: Arc<ProviderRegistry>) -> Self {
        self.providers = Some(registry);
        self
    }

    pub fn knowledge(mut self, knowledge: Arc<dyn KnowledgeBase>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn messenger(mut self, messenger: Arc<dyn MetaMessenger>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    /// Replace the default routing rules
    pub fn router(mut self, router: Arc<dyn Router>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<ConversationEngine> {
        let persistence = self.persistence
            .ok_or_else(|| anyhow!("Persistence client is required"))?;
        let knowledge = self.knowledge
            .ok_or_else(|| anyhow!("Knowledge base is required"))?;
        let messenger = self.messenger
            .ok_or_else(|| anyhow!("Meta messenger is required"))?;
        let providers = self.providers.unwrap_or_else(|| Arc::new(ProviderRegistry::new()));
        let router = self.router.unwrap_or_else(|| Arc::new(DefaultRouter));

        if providers.is_empty() {
            tracing::warn!("No LLM providers configured; AI answers will fail");
        }

        Ok(ConversationEngine::new(
            persistence,
            providers,
            knowledge,
            messenger,
            router,
            self.config,
        ))
    }
}

impl Default for ConversationEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
