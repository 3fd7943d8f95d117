use std::sync::Arc;

use chatsa_flow::ConversationEngine;
use chatsa_integrations::{KnowledgeBase, MetaMessenger};
use chatsa_persist::PersistenceClient;

use crate::config::Config;

/// Shared application state passed to all handlers
///
/// All resources are wrapped in Arc for sharing across async tasks. The
/// engine holds its own handles to the same clients.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub persist: Arc<dyn PersistenceClient>,
    pub knowledge: Arc<dyn KnowledgeBase>,
    pub messenger: Arc<dyn MetaMessenger>,
    pub engine: Arc<ConversationEngine>,
}

impl AppState {
    pub fn new(
        config: Config,
        persist: Arc<dyn PersistenceClient>,
        knowledge: Arc<dyn KnowledgeBase>,
        messenger: Arc<dyn MetaMessenger>,
        engine: ConversationEngine,
    ) -> Self {
        Self {
            config: Arc::new(config),
            persist,
            knowledge,
            messenger,
            engine: Arc::new(engine),
        }
    }
}
