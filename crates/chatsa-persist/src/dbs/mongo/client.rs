use async_trait::async_trait;
use chatsa_types::{
    Channel, Chatbot, Conversation, ConversationMessage, DatasetFile, Integration, QuestionFlow,
    Team,
};
use chrono::{DateTime, Utc};
use mongodb::bson::doc;
use mongodb::Client;

use crate::dbs::mongo::models::{
    MongoChatbot, MongoConversation, MongoDatasetFile, MongoFlow, MongoIntegration, MongoMessage,
    MongoTeam,
};
use crate::dbs::mongo::repositories::{
    MongoChatbotRepository, MongoConversationRepository, MongoFileRepository, MongoFlowRepository,
    MongoIntegrationRepository, MongoMessageRepository, MongoProcessedMessageRepository,
    MongoTeamRepository,
};
use crate::error::{PersistError, Result};
use crate::trait_client::PersistenceClient;

pub struct MongoPersistenceClient {
    client: Client,
    database: String,
    teams: MongoTeamRepository,
    chatbots: MongoChatbotRepository,
    files: MongoFileRepository,
    conversations: MongoConversationRepository,
    messages: MongoMessageRepository,
    integrations: MongoIntegrationRepository,
    flows: MongoFlowRepository,
    processed: MongoProcessedMessageRepository,
}

impl MongoPersistenceClient {
    /// Connect to MongoDB and create client
    pub async fn connect(mongodb_uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;

        Ok(Self {
            teams: MongoTeamRepository::new(&client, database),
            chatbots: MongoChatbotRepository::new(&client, database),
            files: MongoFileRepository::new(&client, database),
            conversations: MongoConversationRepository::new(&client, database),
            messages: MongoMessageRepository::new(&client, database),
            integrations: MongoIntegrationRepository::new(&client, database),
            flows: MongoFlowRepository::new(&client, database),
            processed: MongoProcessedMessageRepository::new(&client, database),
            database: database.to_string(),
            client,
        })
    }

    /// Create the unique, lookup and TTL indexes. Idempotent.
    pub async fn create_indexes(&self) -> Result<()> {
        self.teams.create_indexes().await?;
        self.chatbots.create_indexes().await?;
        self.files.create_indexes().await?;
        self.conversations.create_indexes().await?;
        self.messages.create_indexes().await?;
        self.integrations.create_indexes().await?;
        self.flows.create_indexes().await?;
        self.processed.create_indexes().await?;
        tracing::info!(database = %self.database, "MongoDB indexes ensured");
        Ok(())
    }
}

#[async_trait]
impl PersistenceClient for MongoPersistenceClient {
    fn backend_name(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    async fn save_team(&self, team: &Team) -> Result<()> {
        self.teams.save(MongoTeam::from(team)).await
    }

    async fn get_team(&self, team_id: &str) -> Result<Option<Team>> {
        Ok(self.teams.get(team_id).await?.map(Team::from))
    }

    async fn find_team_by_api_key(&self, api_key: &str) -> Result<Option<Team>> {
        Ok(self.teams.find_by_api_key(api_key).await?.map(Team::from))
    }

    async fn consume_message_credit(&self, team_id: &str, limit: u64) -> Result<bool> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        if self.teams.consume_credit(team_id, limit).await? {
            return Ok(true);
        }
        match self.teams.get(team_id).await? {
            Some(_) => Ok(false),
            None => Err(PersistError::not_found("Team", team_id)),
        }
    }

    async fn reset_message_usage(&self, team_id: &str, period_started_at: DateTime<Utc>) -> Result<()> {
        let matched = self
            .teams
            .reset_usage(team_id, bson::DateTime::from_chrono(period_started_at))
            .await?;
        if !matched {
            return Err(PersistError::not_found("Team", team_id));
        }
        Ok(())
    }

    async fn save_chatbot(&self, chatbot: &Chatbot) -> Result<()> {
        self.chatbots.save(MongoChatbot::from(chatbot)).await
    }

    async fn get_chatbot(&self, chatbot_id: &str) -> Result<Option<Chatbot>> {
        Ok(self.chatbots.get(chatbot_id).await?.map(Chatbot::from))
    }

    async fn list_chatbots(&self, team_id: &str) -> Result<Vec<Chatbot>> {
        let chatbots = self.chatbots.list_for_team(team_id).await?;
        Ok(chatbots.into_iter().map(Chatbot::from).collect())
    }

    async fn count_chatbots(&self, team_id: &str) -> Result<usize> {
        Ok(self.chatbots.count_for_team(team_id).await? as usize)
    }

    async fn delete_chatbot(&self, chatbot_id: &str) -> Result<()> {
        let conversation_ids = self.conversations.ids_for_chatbot(chatbot_id).await?;
        self.messages.delete_for_conversations(&conversation_ids).await?;
        self.conversations.delete_for_chatbot(chatbot_id).await?;
        self.files.delete_for_chatbot(chatbot_id).await?;
        self.flows.delete_for_chatbot(chatbot_id).await?;
        self.integrations.delete_for_chatbot(chatbot_id).await?;
        self.chatbots.delete(chatbot_id).await
    }

    async fn save_file(&self, file: &DatasetFile) -> Result<()> {
        self.files.save(MongoDatasetFile::from(file)).await
    }

    async fn get_file(&self, file_id: &str) -> Result<Option<DatasetFile>> {
        Ok(self.files.get(file_id).await?.map(DatasetFile::from))
    }

    async fn list_files(&self, chatbot_id: &str) -> Result<Vec<DatasetFile>> {
        let files = self.files.list_for_chatbot(chatbot_id).await?;
        Ok(files.into_iter().map(DatasetFile::from).collect())
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        self.files.delete(file_id).await
    }

    async fn save_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.conversations.save(MongoConversation::from(conversation)).await
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        Ok(self.conversations.get(conversation_id).await?.map(Conversation::from))
    }

    async fn find_conversation(
        &self,
        chatbot_id: &str,
        channel: Channel,
        external_user_id: &str,
    ) -> Result<Option<Conversation>> {
        Ok(self
            .conversations
            .find_by_user(chatbot_id, channel, external_user_id)
            .await?
            .map(Conversation::from))
    }

    async fn list_conversations(
        &self,
        chatbot_id: &str,
        limit: Option<i64>,
        skip: Option<u64>,
    ) -> Result<Vec<Conversation>> {
        let conversations = self.conversations.list_for_chatbot(chatbot_id, limit, skip).await?;
        Ok(conversations.into_iter().map(Conversation::from).collect())
    }

    async fn save_message(&self, message: &ConversationMessage) -> Result<()> {
        self.messages.save(MongoMessage::from(message)).await
    }

    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<ConversationMessage>> {
        let messages = self.messages.list(conversation_id).await?;
        Ok(messages.into_iter().map(ConversationMessage::from).collect())
    }

    async fn recent_messages(&self, conversation_id: &str, limit: usize) -> Result<Vec<ConversationMessage>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let messages = self.messages.recent(conversation_id, limit).await?;
        Ok(messages.into_iter().map(ConversationMessage::from).collect())
    }

    async fn save_integration(&self, integration: &Integration) -> Result<()> {
        self.integrations.save(MongoIntegration::from(integration)).await
    }

    async fn get_integration(&self, integration_id: &str) -> Result<Option<Integration>> {
        Ok(self.integrations.get(integration_id).await?.map(Integration::from))
    }

    async fn list_integrations(&self, chatbot_id: &str) -> Result<Vec<Integration>> {
        let integrations = self.integrations.list_for_chatbot(chatbot_id).await?;
        Ok(integrations.into_iter().map(Integration::from).collect())
    }

    async fn find_integration(&self, channel: Channel, account_id: &str) -> Result<Option<Integration>> {
        Ok(self
            .integrations
            .find_by_account(channel, account_id)
            .await?
            .map(Integration::from))
    }

    async fn delete_integration(&self, integration_id: &str) -> Result<()> {
        self.integrations.delete(integration_id).await
    }

    async fn save_flow(&self, flow: &QuestionFlow) -> Result<()> {
        self.flows.save(MongoFlow::from(flow)).await
    }

    async fn get_flow(&self, flow_id: &str) -> Result<Option<QuestionFlow>> {
        Ok(self.flows.get(flow_id).await?.map(QuestionFlow::from))
    }

    async fn list_flows(&self, chatbot_id: &str) -> Result<Vec<QuestionFlow>> {
        let flows = self.flows.list_for_chatbot(chatbot_id).await?;
        Ok(flows.into_iter().map(QuestionFlow::from).collect())
    }

    async fn delete_flow(&self, flow_id: &str) -> Result<()> {
        self.flows.delete(flow_id).await
    }

    async fn mark_message_processed(&self, key: &str) -> Result<bool> {
        self.processed.mark(key).await
    }
}
