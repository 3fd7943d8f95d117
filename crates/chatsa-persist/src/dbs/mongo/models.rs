//! MongoDB document shapes.
//!
//! Records keep their UUID string as `_id`. Timestamps are stored as BSON
//! dates so range queries and sorts are chronological.

use bson::DateTime as BsonDateTime;
use chatsa_types::{
    Channel, Chatbot, ChatbotSettings, Conversation, ConversationMessage, DatasetFile, FileSource,
    FileStatus, FlowCursor, FlowEdge, FlowNode, Integration, MessageRole, Plan, QuestionFlow, Team,
};
use serde::{Deserialize, Serialize};

fn to_bson(dt: chrono::DateTime<chrono::Utc>) -> BsonDateTime {
    BsonDateTime::from_chrono(dt)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTeam {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub owner_email: String,
    pub api_key: String,
    pub plan: Plan,
    pub messages_used: i64,
    pub period_started_at: BsonDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripe_subscription_id: Option<String>,
    pub created_at: BsonDateTime,
    pub updated_at: BsonDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoChatbot {
    #[serde(rename = "_id")]
    pub id: String,
    pub team_id: String,
    pub name: String,
    pub dataset_id: String,
    pub settings: ChatbotSettings,
    pub created_at: BsonDateTime,
    pub updated_at: BsonDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoDatasetFile {
    #[serde(rename = "_id")]
    pub id: String,
    pub chatbot_id: String,
    pub team_id: String,
    pub name: String,
    pub source: FileSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_file_id: Option<String>,
    pub status: FileStatus,
    pub size_bytes: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: BsonDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConversation {
    #[serde(rename = "_id")]
    pub id: String,
    pub chatbot_id: String,
    pub channel: Channel,
    pub external_user_id: String,
    pub human_takeover: bool,
    #[serde(default)]
    pub human_takeover_at: Option<BsonDateTime>,
    #[serde(default)]
    pub flow_cursor: Option<FlowCursor>,
    pub created_at: BsonDateTime,
    pub updated_at: BsonDateTime,
    pub last_message_at: BsonDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_message_id: Option<String>,
    pub created_at: BsonDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoIntegration {
    #[serde(rename = "_id")]
    pub id: String,
    pub team_id: String,
    pub chatbot_id: String,
    pub channel: Channel,
    pub account_id: String,
    pub access_token: String,
    pub enabled: bool,
    pub created_at: BsonDateTime,
    pub updated_at: BsonDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoFlow {
    #[serde(rename = "_id")]
    pub id: String,
    pub chatbot_id: String,
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub trigger_keywords: Vec<String>,
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
    pub created_at: BsonDateTime,
    pub updated_at: BsonDateTime,
}

/// Dedup record for inbound webhook messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoProcessedMessage {
    #[serde(rename = "_id")]
    pub key: String,
    pub processed_at: BsonDateTime,
}

// Conversions between domain records and MongoDB documents

impl From<&Team> for MongoTeam {
    fn from(team: &Team) -> Self {
        Self {
            id: team.id.clone(),
            name: team.name.clone(),
            owner_email: team.owner_email.clone(),
            api_key: team.api_key.clone(),
            plan: team.plan,
            messages_used: i64::try_from(team.messages_used).unwrap_or(i64::MAX),
            period_started_at: to_bson(team.period_started_at),
            stripe_customer_id: team.stripe_customer_id.clone(),
            stripe_subscription_id: team.stripe_subscription_id.clone(),
            created_at: to_bson(team.created_at),
            updated_at: to_bson(team.updated_at),
        }
    }
}

impl From<MongoTeam> for Team {
    fn from(team: MongoTeam) -> Self {
        Self {
            id: team.id,
            name: team.name,
            owner_email: team.owner_email,
            api_key: team.api_key,
            plan: team.plan,
            messages_used: team.messages_used.max(0) as u64,
            period_started_at: team.period_started_at.to_chrono(),
            stripe_customer_id: team.stripe_customer_id,
            stripe_subscription_id: team.stripe_subscription_id,
            created_at: team.created_at.to_chrono(),
            updated_at: team.updated_at.to_chrono(),
        }
    }
}

impl From<&Chatbot> for MongoChatbot {
    fn from(bot: &Chatbot) -> Self {
        Self {
            id: bot.id.clone(),
            team_id: bot.team_id.clone(),
            name: bot.name.clone(),
            dataset_id: bot.dataset_id.clone(),
            settings: bot.settings.clone(),
            created_at: to_bson(bot.created_at),
            updated_at: to_bson(bot.updated_at),
        }
    }
}

impl From<MongoChatbot> for Chatbot {
    fn from(bot: MongoChatbot) -> Self {
        Self {
            id: bot.id,
            team_id: bot.team_id,
            name: bot.name,
            dataset_id: bot.dataset_id,
            settings: bot.settings,
            created_at: bot.created_at.to_chrono(),
            updated_at: bot.updated_at.to_chrono(),
        }
    }
}

impl From<&DatasetFile> for MongoDatasetFile {
    fn from(file: &DatasetFile) -> Self {
        Self {
            id: file.id.clone(),
            chatbot_id: file.chatbot_id.clone(),
            team_id: file.team_id.clone(),
            name: file.name.clone(),
            source: file.source.clone(),
            provider_file_id: file.provider_file_id.clone(),
            status: file.status,
            size_bytes: i64::try_from(file.size_bytes).unwrap_or(i64::MAX),
            error: file.error.clone(),
            created_at: to_bson(file.created_at),
        }
    }
}

impl From<MongoDatasetFile> for DatasetFile {
    fn from(file: MongoDatasetFile) -> Self {
        Self {
            id: file.id,
            chatbot_id: file.chatbot_id,
            team_id: file.team_id,
            name: file.name,
            source: file.source,
            provider_file_id: file.provider_file_id,
            status: file.status,
            size_bytes: file.size_bytes.max(0) as u64,
            error: file.error,
            created_at: file.created_at.to_chrono(),
        }
    }
}

impl From<&Conversation> for MongoConversation {
    fn from(c: &Conversation) -> Self {
        Self {
            id: c.id.clone(),
            chatbot_id: c.chatbot_id.clone(),
            channel: c.channel,
            external_user_id: c.external_user_id.clone(),
            human_takeover: c.human_takeover,
            human_takeover_at: c.human_takeover_at.map(to_bson),
            flow_cursor: c.flow_cursor.clone(),
            created_at: to_bson(c.created_at),
            updated_at: to_bson(c.updated_at),
            last_message_at: to_bson(c.last_message_at),
        }
    }
}

impl From<MongoConversation> for Conversation {
    fn from(c: MongoConversation) -> Self {
        Self {
            id: c.id,
            chatbot_id: c.chatbot_id,
            channel: c.channel,
            external_user_id: c.external_user_id,
            human_takeover: c.human_takeover,
            human_takeover_at: c.human_takeover_at.map(BsonDateTime::to_chrono),
            flow_cursor: c.flow_cursor,
            created_at: c.created_at.to_chrono(),
            updated_at: c.updated_at.to_chrono(),
            last_message_at: c.last_message_at.to_chrono(),
        }
    }
}

impl From<&ConversationMessage> for MongoMessage {
    fn from(m: &ConversationMessage) -> Self {
        Self {
            id: m.id.clone(),
            conversation_id: m.conversation_id.clone(),
            role: m.role,
            content: m.content.clone(),
            external_message_id: m.external_message_id.clone(),
            created_at: to_bson(m.created_at),
        }
    }
}

impl From<MongoMessage> for ConversationMessage {
    fn from(m: MongoMessage) -> Self {
        Self {
            id: m.id,
            conversation_id: m.conversation_id,
            role: m.role,
            content: m.content,
            external_message_id: m.external_message_id,
            created_at: m.created_at.to_chrono(),
        }
    }
}

impl From<&Integration> for MongoIntegration {
    fn from(i: &Integration) -> Self {
        Self {
            id: i.id.clone(),
            team_id: i.team_id.clone(),
            chatbot_id: i.chatbot_id.clone(),
            channel: i.channel,
            account_id: i.account_id.clone(),
            access_token: i.access_token.clone(),
            enabled: i.enabled,
            created_at: to_bson(i.created_at),
            updated_at: to_bson(i.updated_at),
        }
    }
}

impl From<MongoIntegration> for Integration {
    fn from(i: MongoIntegration) -> Self {
        Self {
            id: i.id,
            team_id: i.team_id,
            chatbot_id: i.chatbot_id,
            channel: i.channel,
            account_id: i.account_id,
            access_token: i.access_token,
            enabled: i.enabled,
            created_at: i.created_at.to_chrono(),
            updated_at: i.updated_at.to_chrono(),
        }
    }
}

impl From<&QuestionFlow> for MongoFlow {
    fn from(f: &QuestionFlow) -> Self {
        Self {
            id: f.id.clone(),
            chatbot_id: f.chatbot_id.clone(),
            name: f.name.clone(),
            enabled: f.enabled,
            trigger_keywords: f.trigger_keywords.clone(),
            nodes: f.nodes.clone(),
            edges: f.edges.clone(),
            created_at: to_bson(f.created_at),
            updated_at: to_bson(f.updated_at),
        }
    }
}

impl From<MongoFlow> for QuestionFlow {
    fn from(f: MongoFlow) -> Self {
        Self {
            id: f.id,
            chatbot_id: f.chatbot_id,
            name: f.name,
            enabled: f.enabled,
            trigger_keywords: f.trigger_keywords,
            nodes: f.nodes,
            edges: f.edges,
            created_at: f.created_at.to_chrono(),
            updated_at: f.updated_at.to_chrono(),
        }
    }
}
