mod client;
mod outbound;
mod signature;
mod webhook;

pub use client::{GraphApiClient, MetaConfig, DEFAULT_GRAPH_BASE_URL, DEFAULT_GRAPH_VERSION};
pub use outbound::{
    instagram_payloads, messenger_payloads, option_reply_id, split_text, whatsapp_payloads,
    OutboundMessage,
};
pub use signature::{sign_payload, verify_signature, SIGNATURE_HEADER};
pub use webhook::{parse_webhook, EchoEvent, InboundEvent, InboundMessage, WebhookPayload};

use anyhow::Result;
use async_trait::async_trait;
use chatsa_types::Channel;

/// Where an outbound message goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTarget {
    pub channel: Channel,
    /// Business account the message is sent from
    pub account_id: String,
    pub access_token: String,
    /// Phone number or page-scoped user id
    pub recipient_id: String,
}

/// Outbound side of the Meta messaging channels
#[async_trait]
pub trait MetaMessenger: Send + Sync {
    /// Send a message, returning the platform ids of the delivered parts
    async fn send(&self, target: &SendTarget, message: &OutboundMessage) -> Result<Vec<String>>;

    /// Subscribe the app to an account's message webhooks
    async fn subscribe_app(&self, channel: Channel, account_id: &str, access_token: &str) -> Result<()>;
}
