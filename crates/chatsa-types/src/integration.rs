use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::Channel;

/// Credentials connecting a chatbot to a Meta channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    pub id: String,
    pub team_id: String,
    pub chatbot_id: String,
    pub channel: Channel,
    /// WhatsApp phone-number id, Facebook page id or Instagram account id
    pub account_id: String,
    pub access_token: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Integration {
    pub fn new(
        team_id: impl Into<String>,
        chatbot_id: impl Into<String>,
        channel: Channel,
        account_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: crate::new_id(),
            team_id: team_id.into(),
            chatbot_id: chatbot_id.into(),
            channel,
            account_id: account_id.into(),
            access_token: access_token.into(),
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }
}
