//! Inbound webhook payloads for WhatsApp Cloud API, Messenger and Instagram.
//!
//! Only text-like messages are surfaced. Delivery/read statuses, reactions
//! and media without a caption are dropped here.

use chatsa_types::Channel;
use serde::Deserialize;

/// Top-level webhook body
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    changes: Vec<Change>,
    #[serde(default)]
    messaging: Vec<Messaging>,
}

// ----- WhatsApp ------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Change {
    #[serde(default)]
    field: String,
    value: ChangeValue,
}

#[derive(Debug, Deserialize)]
struct ChangeValue {
    metadata: Option<WaMetadata>,
    #[serde(default)]
    messages: Vec<WaMessage>,
}

#[derive(Debug, Deserialize)]
struct WaMetadata {
    phone_number_id: String,
}

#[derive(Debug, Deserialize)]
struct WaMessage {
    from: String,
    id: String,
    #[serde(rename = "type", default)]
    message_type: String,
    text: Option<WaText>,
    interactive: Option<WaInteractive>,
    button: Option<WaButton>,
    image: Option<WaMedia>,
    document: Option<WaMedia>,
}

#[derive(Debug, Deserialize)]
struct WaText {
    body: String,
}

#[derive(Debug, Deserialize)]
struct WaInteractive {
    button_reply: Option<WaReply>,
    list_reply: Option<WaReply>,
}

#[derive(Debug, Deserialize)]
struct WaReply {
    id: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct WaButton {
    #[serde(default)]
    payload: Option<String>,
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaMedia {
    caption: Option<String>,
}

// ----- Messenger / Instagram -------------------------------------------------

#[derive(Debug, Deserialize)]
struct Messaging {
    sender: Party,
    recipient: Party,
    message: Option<SendApiMessage>,
    postback: Option<Postback>,
    /// Event time in milliseconds, stable across redeliveries
    #[serde(default)]
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct Party {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SendApiMessage {
    mid: String,
    text: Option<String>,
    quick_reply: Option<QuickReply>,
    #[serde(default)]
    is_echo: bool,
    app_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct QuickReply {
    payload: String,
}

#[derive(Debug, Deserialize)]
struct Postback {
    #[serde(default)]
    mid: Option<String>,
    #[serde(default)]
    title: Option<String>,
    payload: String,
}

// ----- Normalized events -----------------------------------------------------

/// Message sent by an end user to a connected account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub channel: Channel,
    /// Business account that received the message
    pub account_id: String,
    pub sender_id: String,
    pub message_id: String,
    pub text: String,
    /// Interactive reply / quick reply / postback payload
    pub reply_id: Option<String>,
}

/// Copy of a message sent from the business account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoEvent {
    pub channel: Channel,
    pub account_id: String,
    /// End user the message was sent to
    pub recipient_id: String,
    pub message_id: String,
    /// App that sent it; `None` when it was typed in the Meta inbox
    pub app_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Message(InboundMessage),
    Echo(EchoEvent),
}

impl InboundEvent {
    pub fn channel(&self) -> Channel {
        match self {
            Self::Message(m) => m.channel,
            Self::Echo(e) => e.channel,
        }
    }

    pub fn message_id(&self) -> &str {
        match self {
            Self::Message(m) => &m.message_id,
            Self::Echo(e) => &e.message_id,
        }
    }
}

/// Flatten a webhook body into normalized events, in delivery order
pub fn parse_webhook(payload: &WebhookPayload) -> Vec<InboundEvent> {
    match payload.object.as_str() {
        "whatsapp_business_account" => payload.entry.iter().flat_map(whatsapp_events).collect(),
        "page" => payload
            .entry
            .iter()
            .flat_map(|e| send_api_events(Channel::Messenger, e))
            .collect(),
        "instagram" => payload
            .entry
            .iter()
            .flat_map(|e| send_api_events(Channel::Instagram, e))
            .collect(),
        other => {
            tracing::debug!(object = %other, "Ignoring webhook object");
            Vec::new()
        }
    }
}

fn whatsapp_events(entry: &Entry) -> Vec<InboundEvent> {
    let mut events = Vec::new();

    for change in entry.changes.iter().filter(|c| c.field == "messages") {
        let Some(metadata) = &change.value.metadata else {
            continue;
        };

        for msg in &change.value.messages {
            let (text, reply_id) = match msg.message_type.as_str() {
                "text" => (msg.text.as_ref().map(|t| t.body.clone()), None),
                "interactive" => {
                    let reply = msg
                        .interactive
                        .as_ref()
                        .and_then(|i| i.button_reply.as_ref().or(i.list_reply.as_ref()));
                    (reply.map(|r| r.title.clone()), reply.map(|r| r.id.clone()))
                }
                "button" => (
                    msg.button.as_ref().map(|b| b.text.clone()),
                    msg.button.as_ref().and_then(|b| b.payload.clone()),
                ),
                "image" => (msg.image.as_ref().and_then(|m| m.caption.clone()), None),
                "document" => (msg.document.as_ref().and_then(|m| m.caption.clone()), None),
                _ => (None, None),
            };

            let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
                tracing::debug!(message_type = %msg.message_type, id = %msg.id, "Skipping non-text WhatsApp message");
                continue;
            };

            events.push(InboundEvent::Message(InboundMessage {
                channel: Channel::WhatsApp,
                account_id: metadata.phone_number_id.clone(),
                sender_id: msg.from.clone(),
                message_id: msg.id.clone(),
                text,
                reply_id,
            }));
        }
    }

    events
}

fn send_api_events(channel: Channel, entry: &Entry) -> Vec<InboundEvent> {
    let mut events = Vec::new();

    for item in &entry.messaging {
        if let Some(message) = &item.message {
            if message.is_echo {
                events.push(InboundEvent::Echo(EchoEvent {
                    channel,
                    account_id: item.sender.id.clone(),
                    recipient_id: item.recipient.id.clone(),
                    message_id: message.mid.clone(),
                    app_id: message.app_id,
                }));
                continue;
            }

            let reply_id = message.quick_reply.as_ref().map(|q| q.payload.clone());
            let Some(text) = message.text.clone().filter(|t| !t.trim().is_empty()) else {
                tracing::debug!(channel = %channel, mid = %message.mid, "Skipping message without text");
                continue;
            };

            events.push(InboundEvent::Message(InboundMessage {
                channel,
                account_id: item.recipient.id.clone(),
                sender_id: item.sender.id.clone(),
                message_id: message.mid.clone(),
                text,
                reply_id,
            }));
        } else if let Some(postback) = &item.postback {
            let message_id = postback
                .mid
                .clone()
                .unwrap_or_else(|| {
                    format!("postback:{}:{}:{}", item.sender.id, item.timestamp, postback.payload)
                });
            events.push(InboundEvent::Message(InboundMessage {
                channel,
                account_id: item.recipient.id.clone(),
                sender_id: item.sender.id.clone(),
                message_id,
                text: postback.title.clone().unwrap_or_else(|| postback.payload.clone()),
                reply_id: Some(postback.payload.clone()),
            }));
        }
    }

    events
}
