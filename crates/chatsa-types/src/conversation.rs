use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Where a conversation takes place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Web,
    WhatsApp,
    Instagram,
    Messenger,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Web => "web",
            Channel::WhatsApp => "whatsapp",
            Channel::Instagram => "instagram",
            Channel::Messenger => "messenger",
        }
    }

    /// Channels delivered through the Meta Graph API
    pub fn is_meta(&self) -> bool {
        !matches!(self, Channel::Web)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a conversation inside a question flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowCursor {
    pub flow_id: String,
    pub node_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub chatbot_id: String,
    pub channel: Channel,
    /// Visitor id, WhatsApp phone number or page-scoped user id
    pub external_user_id: String,
    #[serde(default)]
    pub human_takeover: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_takeover_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_cursor: Option<FlowCursor>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(chatbot_id: impl Into<String>, channel: Channel, external_user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: crate::new_id(),
            chatbot_id: chatbot_id.into(),
            channel,
            external_user_id: external_user_id.into(),
            human_takeover: false,
            human_takeover_at: None,
            flow_cursor: None,
            created_at: now,
            updated_at: now,
            last_message_at: now,
        }
    }

    pub fn set_human_takeover(&mut self, enabled: bool) {
        let now = Utc::now();
        self.human_takeover = enabled;
        self.human_takeover_at = enabled.then_some(now);
        self.updated_at = now;
    }

    /// Whether automatic replies are suppressed at `now`.
    ///
    /// A `timeout` of `None` keeps the takeover until it is switched off.
    pub fn takeover_active(&self, now: DateTime<Utc>, timeout: Option<Duration>) -> bool {
        if !self.human_takeover {
            return false;
        }
        match (timeout, self.human_takeover_at) {
            (Some(timeout), Some(since)) => now - since < timeout,
            _ => true,
        }
    }

    pub fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = now;
        self.last_message_at = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    /// Human agent replying on behalf of the bot
    Agent,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Agent => "agent",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn new(conversation_id: impl Into<String>, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: crate::new_id(),
            conversation_id: conversation_id.into(),
            role,
            content: content.into(),
            external_message_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_message_id = Some(external_id.into());
        self
    }
}

// Conversion: ConversationMessage → chatsa_llm::Message
impl From<ConversationMessage> for chatsa_llm::Message {
    fn from(msg: ConversationMessage) -> Self {
        match msg.role {
            MessageRole::User => chatsa_llm::Message::human(msg.content),
            MessageRole::Assistant | MessageRole::Agent => chatsa_llm::Message::ai(msg.content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_takeover_without_timeout_stays_active() {
        let mut conv = Conversation::new("bot", Channel::WhatsApp, "15550001");
        assert!(!conv.takeover_active(Utc::now(), None));

        conv.set_human_takeover(true);
        assert!(conv.takeover_active(Utc::now() + Duration::days(365), None));
    }

    #[test]
    fn test_takeover_expires_after_timeout() {
        let mut conv = Conversation::new("bot", Channel::Instagram, "ig-user");
        conv.set_human_takeover(true);
        let since = conv.human_takeover_at.unwrap();

        let timeout = Some(Duration::minutes(60));
        assert!(conv.takeover_active(since + Duration::minutes(59), timeout));
        assert!(!conv.takeover_active(since + Duration::minutes(60), timeout));
    }

    #[test]
    fn test_disabling_takeover_clears_timestamp() {
        let mut conv = Conversation::new("bot", Channel::Messenger, "psid");
        conv.set_human_takeover(true);
        conv.set_human_takeover(false);
        assert!(conv.human_takeover_at.is_none());
    }

    #[test]
    fn test_agent_message_maps_to_assistant_role() {
        let msg = ConversationMessage::new("c1", MessageRole::Agent, "On it!");
        let llm: chatsa_llm::Message = msg.into();
        assert_eq!(llm.role(), "assistant");
    }

    #[test]
    fn test_channel_serialization() {
        assert_eq!(serde_json::to_string(&Channel::WhatsApp).unwrap(), "\"whatsapp\"");
        assert!(Channel::Instagram.is_meta());
        assert!(!Channel::Web.is_meta());
    }
}
