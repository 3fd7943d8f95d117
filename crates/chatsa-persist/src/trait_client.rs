use async_trait::async_trait;
use chatsa_types::{
    Channel, Chatbot, Conversation, ConversationMessage, DatasetFile, Integration, QuestionFlow,
    Team,
};
use chrono::{DateTime, Utc};

use crate::error::Result;

/// Trait for database persistence operations
///
/// Writes are upserts keyed on the record id. Implementations provide the
/// single-document atomic operations the engine relies on: credit
/// consumption and dedup-key insertion.
#[async_trait]
pub trait PersistenceClient: Send + Sync {
    /// Backend name for health reporting
    fn backend_name(&self) -> &'static str;

    /// Round-trip to the backing store
    async fn ping(&self) -> Result<()>;

    // ----- teams ---------------------------------------------------------

    async fn save_team(&self, team: &Team) -> Result<()>;

    async fn get_team(&self, team_id: &str) -> Result<Option<Team>>;

    async fn find_team_by_api_key(&self, api_key: &str) -> Result<Option<Team>>;

    /// Atomically consume one message credit if the team is under `limit`.
    /// Returns `false` when the team has no credits left.
    async fn consume_message_credit(&self, team_id: &str, limit: u64) -> Result<bool>;

    /// Start a new billing period with zero usage
    async fn reset_message_usage(&self, team_id: &str, period_started_at: DateTime<Utc>) -> Result<()>;

    // ----- chatbots ------------------------------------------------------

    async fn save_chatbot(&self, chatbot: &Chatbot) -> Result<()>;

    async fn get_chatbot(&self, chatbot_id: &str) -> Result<Option<Chatbot>>;

    async fn list_chatbots(&self, team_id: &str) -> Result<Vec<Chatbot>>;

    async fn count_chatbots(&self, team_id: &str) -> Result<usize>;

    /// Delete a chatbot and every record that hangs off it
    async fn delete_chatbot(&self, chatbot_id: &str) -> Result<()>;

    // ----- dataset files -------------------------------------------------

    async fn save_file(&self, file: &DatasetFile) -> Result<()>;

    async fn get_file(&self, file_id: &str) -> Result<Option<DatasetFile>>;

    async fn list_files(&self, chatbot_id: &str) -> Result<Vec<DatasetFile>>;

    async fn delete_file(&self, file_id: &str) -> Result<()>;

    // ----- conversations -------------------------------------------------

    async fn save_conversation(&self, conversation: &Conversation) -> Result<()>;

    async fn get_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>>;

    async fn find_conversation(
        &self,
        chatbot_id: &str,
        channel: Channel,
        external_user_id: &str,
    ) -> Result<Option<Conversation>>;

    /// Most recently active first
    async fn list_conversations(
        &self,
        chatbot_id: &str,
        limit: Option<i64>,
        skip: Option<u64>,
    ) -> Result<Vec<Conversation>>;

    // ----- messages ------------------------------------------------------

    async fn save_message(&self, message: &ConversationMessage) -> Result<()>;

    /// All messages of a conversation, oldest first
    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<ConversationMessage>>;

    /// The last `limit` messages, oldest first
    async fn recent_messages(&self, conversation_id: &str, limit: usize) -> Result<Vec<ConversationMessage>>;

    // ----- integrations --------------------------------------------------

    async fn save_integration(&self, integration: &Integration) -> Result<()>;

    async fn get_integration(&self, integration_id: &str) -> Result<Option<Integration>>;

    async fn list_integrations(&self, chatbot_id: &str) -> Result<Vec<Integration>>;

    async fn find_integration(&self, channel: Channel, account_id: &str) -> Result<Option<Integration>>;

    async fn delete_integration(&self, integration_id: &str) -> Result<()>;

    // ----- question flows ------------------------------------------------

    async fn save_flow(&self, flow: &QuestionFlow) -> Result<()>;

    async fn get_flow(&self, flow_id: &str) -> Result<Option<QuestionFlow>>;

    async fn list_flows(&self, chatbot_id: &str) -> Result<Vec<QuestionFlow>>;

    async fn delete_flow(&self, flow_id: &str) -> Result<()>;

    // ----- dedup ---------------------------------------------------------

    /// Record an inbound message key. Returns `false` if it was already
    /// recorded.
    async fn mark_message_processed(&self, key: &str) -> Result<bool>;
}
