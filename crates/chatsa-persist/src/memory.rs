use std::collections::HashMap;

use async_trait::async_trait;
use chatsa_types::{
    Channel, Chatbot, Conversation, ConversationMessage, DatasetFile, Integration, QuestionFlow,
    Team,
};
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::error::{PersistError, Result};
use crate::trait_client::PersistenceClient;

#[derive(Default)]
struct Store {
    teams: HashMap<String, Team>,
    chatbots: HashMap<String, Chatbot>,
    files: HashMap<String, DatasetFile>,
    conversations: HashMap<String, Conversation>,
    /// Per conversation, in insertion order
    messages: HashMap<String, Vec<ConversationMessage>>,
    integrations: HashMap<String, Integration>,
    flows: HashMap<String, QuestionFlow>,
    /// Dedup key -> when it was first seen
    processed: HashMap<String, DateTime<Utc>>,
}

/// Dedup keys are forgotten after this long, matching the MongoDB TTL index
fn processed_retention() -> Duration {
    Duration::days(7)
}

/// Process-local backend. Data lives as long as the client.
#[derive(Default)]
pub struct InMemoryPersistenceClient {
    store: RwLock<Store>,
}

impl InMemoryPersistenceClient {
    pub fn new() -> Self {
        Self::default()
    }

    async fn mark_processed_at(&self, key: &str, now: DateTime<Utc>) -> bool {
        let mut store = self.store.write().await;
        let cutoff = now - processed_retention();
        store.processed.retain(|_, seen| *seen > cutoff);
        if store.processed.contains_key(key) {
            return false;
        }
        store.processed.insert(key.to_string(), now);
        true
    }
}

fn sorted_by_created<T, F>(mut items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.sort_by_key(|item| key(item));
    items
}

#[async_trait]
impl PersistenceClient for InMemoryPersistenceClient {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn save_team(&self, team: &Team) -> Result<()> {
        self.store.write().await.teams.insert(team.id.clone(), team.clone());
        Ok(())
    }

    async fn get_team(&self, team_id: &str) -> Result<Option<Team>> {
        Ok(self.store.read().await.teams.get(team_id).cloned())
    }

    async fn find_team_by_api_key(&self, api_key: &str) -> Result<Option<Team>> {
        Ok(self
            .store
            .read()
            .await
            .teams
            .values()
            .find(|t| t.api_key == api_key)
            .cloned())
    }

    async fn consume_message_credit(&self, team_id: &str, limit: u64) -> Result<bool> {
        let mut store = self.store.write().await;
        let team = store
            .teams
            .get_mut(team_id)
            .ok_or_else(|| PersistError::not_found("Team", team_id))?;

        if team.messages_used >= limit {
            return Ok(false);
        }
        team.messages_used += 1;
        team.updated_at = Utc::now();
        Ok(true)
    }

    async fn reset_message_usage(&self, team_id: &str, period_started_at: DateTime<Utc>) -> Result<()> {
        let mut store = self.store.write().await;
        let team = store
            .teams
            .get_mut(team_id)
            .ok_or_else(|| PersistError::not_found("Team", team_id))?;
        team.messages_used = 0;
        team.period_started_at = period_started_at;
        team.updated_at = Utc::now();
        Ok(())
    }

    async fn save_chatbot(&self, chatbot: &Chatbot) -> Result<()> {
        self.store
            .write()
            .await
            .chatbots
            .insert(chatbot.id.clone(), chatbot.clone());
        Ok(())
    }

    async fn get_chatbot(&self, chatbot_id: &str) -> Result<Option<Chatbot>> {
        Ok(self.store.read().await.chatbots.get(chatbot_id).cloned())
    }

    async fn list_chatbots(&self, team_id: &str) -> Result<Vec<Chatbot>> {
        let store = self.store.read().await;
        let bots = store
            .chatbots
            .values()
            .filter(|c| c.team_id == team_id)
            .cloned()
            .collect();
        Ok(sorted_by_created(bots, |c: &Chatbot| c.created_at))
    }

    async fn count_chatbots(&self, team_id: &str) -> Result<usize> {
        Ok(self
            .store
            .read()
            .await
            .chatbots
            .values()
            .filter(|c| c.team_id == team_id)
            .count())
    }

    async fn delete_chatbot(&self, chatbot_id: &str) -> Result<()> {
        let mut store = self.store.write().await;
        store.chatbots.remove(chatbot_id);
        store.files.retain(|_, f| f.chatbot_id != chatbot_id);
        store.flows.retain(|_, f| f.chatbot_id != chatbot_id);
        store.integrations.retain(|_, i| i.chatbot_id != chatbot_id);

        let conversation_ids: Vec<String> = store
            .conversations
            .values()
            .filter(|c| c.chatbot_id == chatbot_id)
            .map(|c| c.id.clone())
            .collect();
        for id in &conversation_ids {
            store.conversations.remove(id);
            store.messages.remove(id);
        }
        Ok(())
    }

    async fn save_file(&self, file: &DatasetFile) -> Result<()> {
        self.store.write().await.files.insert(file.id.clone(), file.clone());
        Ok(())
    }

    async fn get_file(&self, file_id: &str) -> Result<Option<DatasetFile>> {
        Ok(self.store.read().await.files.get(file_id).cloned())
    }

    async fn list_files(&self, chatbot_id: &str) -> Result<Vec<DatasetFile>> {
        let store = self.store.read().await;
        let files = store
            .files
            .values()
            .filter(|f| f.chatbot_id == chatbot_id)
            .cloned()
            .collect();
        Ok(sorted_by_created(files, |f: &DatasetFile| f.created_at))
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        self.store.write().await.files.remove(file_id);
        Ok(())
    }

    async fn save_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.store
            .write()
            .await
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        Ok(self.store.read().await.conversations.get(conversation_id).cloned())
    }

    async fn find_conversation(
        &self,
        chatbot_id: &str,
        channel: Channel,
        external_user_id: &str,
    ) -> Result<Option<Conversation>> {
        Ok(self
            .store
            .read()
            .await
            .conversations
            .values()
            .find(|c| {
                c.chatbot_id == chatbot_id
                    && c.channel == channel
                    && c.external_user_id == external_user_id
            })
            .cloned())
    }

    async fn list_conversations(
        &self,
        chatbot_id: &str,
        limit: Option<i64>,
        skip: Option<u64>,
    ) -> Result<Vec<Conversation>> {
        let store = self.store.read().await;
        let mut conversations: Vec<Conversation> = store
            .conversations
            .values()
            .filter(|c| c.chatbot_id == chatbot_id)
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));

        let skip = skip.unwrap_or(0) as usize;
        let limit = limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        Ok(conversations.into_iter().skip(skip).take(limit).collect())
    }

    async fn save_message(&self, message: &ConversationMessage) -> Result<()> {
        let mut store = self.store.write().await;
        let messages = store
            .messages
            .entry(message.conversation_id.clone())
            .or_default();

        match messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message.clone(),
            None => messages.push(message.clone()),
        }
        Ok(())
    }

    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<ConversationMessage>> {
        Ok(self
            .store
            .read()
            .await
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn recent_messages(&self, conversation_id: &str, limit: usize) -> Result<Vec<ConversationMessage>> {
        let store = self.store.read().await;
        let Some(messages) = store.messages.get(conversation_id) else {
            return Ok(Vec::new());
        };
        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }

    async fn save_integration(&self, integration: &Integration) -> Result<()> {
        self.store
            .write()
            .await
            .integrations
            .insert(integration.id.clone(), integration.clone());
        Ok(())
    }

    async fn get_integration(&self, integration_id: &str) -> Result<Option<Integration>> {
        Ok(self.store.read().await.integrations.get(integration_id).cloned())
    }

    async fn list_integrations(&self, chatbot_id: &str) -> Result<Vec<Integration>> {
        let store = self.store.read().await;
        let integrations = store
            .integrations
            .values()
            .filter(|i| i.chatbot_id == chatbot_id)
            .cloned()
            .collect();
        Ok(sorted_by_created(integrations, |i: &Integration| i.created_at))
    }

    async fn find_integration(&self, channel: Channel, account_id: &str) -> Result<Option<Integration>> {
        Ok(self
            .store
            .read()
            .await
            .integrations
            .values()
            .find(|i| i.channel == channel && i.account_id == account_id)
            .cloned())
    }

    async fn delete_integration(&self, integration_id: &str) -> Result<()> {
        self.store.write().await.integrations.remove(integration_id);
        Ok(())
    }

    async fn save_flow(&self, flow: &QuestionFlow) -> Result<()> {
        self.store.write().await.flows.insert(flow.id.clone(), flow.clone());
        Ok(())
    }

    async fn get_flow(&self, flow_id: &str) -> Result<Option<QuestionFlow>> {
        Ok(self.store.read().await.flows.get(flow_id).cloned())
    }

    async fn list_flows(&self, chatbot_id: &str) -> Result<Vec<QuestionFlow>> {
        let store = self.store.read().await;
        let flows = store
            .flows
            .values()
            .filter(|f| f.chatbot_id == chatbot_id)
            .cloned()
            .collect();
        Ok(sorted_by_created(flows, |f: &QuestionFlow| f.created_at))
    }

    async fn delete_flow(&self, flow_id: &str) -> Result<()> {
        self.store.write().await.flows.remove(flow_id);
        Ok(())
    }

    async fn mark_message_processed(&self, key: &str) -> Result<bool> {
        Ok(self.mark_processed_at(key, Utc::now()).await)
    }
}
