use serde_json::{json, Value};

const WHATSAPP_TEXT_LIMIT: usize = 4096;
const MESSENGER_TEXT_LIMIT: usize = 2000;
const INSTAGRAM_TEXT_LIMIT: usize = 1000;

const WHATSAPP_MAX_BUTTONS: usize = 3;
const WHATSAPP_BUTTON_TITLE_LIMIT: usize = 20;
const WHATSAPP_MAX_LIST_ROWS: usize = 10;
const WHATSAPP_ROW_TITLE_LIMIT: usize = 24;
const QUICK_REPLY_MAX: usize = 13;
const QUICK_REPLY_TITLE_LIMIT: usize = 20;

/// Channel-independent reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Text { body: String },
    /// Question with selectable answers
    Options { body: String, options: Vec<String> },
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text { body: body.into() }
    }

    pub fn options(body: impl Into<String>, options: Vec<String>) -> Self {
        Self::Options {
            body: body.into(),
            options,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Self::Text { body } | Self::Options { body, .. } => body,
        }
    }

    /// Plain-text rendering, used for transcripts and channels without buttons
    pub fn as_plain_text(&self) -> String {
        match self {
            Self::Text { body } => body.clone(),
            Self::Options { body, options } => numbered(body, options),
        }
    }
}

/// Reply id carried by interactive buttons and quick replies
pub fn option_reply_id(index: usize) -> String {
    format!("opt_{}", index)
}

fn numbered(body: &str, options: &[String]) -> String {
    let mut text = body.to_string();
    for (i, option) in options.iter().enumerate() {
        text.push_str(&format!("\n{}. {}", i + 1, option));
    }
    text
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Split text into parts of at most `limit` characters, preferring line
/// breaks and then spaces as cut points.
pub fn split_text(text: &str, limit: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = text.trim();

    while rest.chars().count() > limit {
        let byte_limit = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..byte_limit];
        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(byte_limit);

        parts.push(rest[..cut].trim_end().to_string());
        rest = rest[cut..].trim_start();
    }

    if !rest.is_empty() || parts.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}

/// Cloud API payloads for one outbound message
pub fn whatsapp_payloads(to: &str, message: &OutboundMessage) -> Vec<Value> {
    let text_payload = |body: &str| {
        json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "text",
            "text": { "preview_url": false, "body": body },
        })
    };

    match message {
        OutboundMessage::Text { body } => split_text(body, WHATSAPP_TEXT_LIMIT)
            .iter()
            .map(|part| text_payload(part))
            .collect(),
        OutboundMessage::Options { body, options }
            if options.len() <= WHATSAPP_MAX_BUTTONS
                && options.iter().all(|o| o.chars().count() <= WHATSAPP_BUTTON_TITLE_LIMIT) =>
        {
            let buttons: Vec<Value> = options
                .iter()
                .enumerate()
                .map(|(i, title)| {
                    json!({ "type": "reply", "reply": { "id": option_reply_id(i), "title": title } })
                })
                .collect();
            vec![json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": to,
                "type": "interactive",
                "interactive": {
                    "type": "button",
                    "body": { "text": truncate(body, 1024) },
                    "action": { "buttons": buttons },
                },
            })]
        }
        OutboundMessage::Options { body, options } if options.len() <= WHATSAPP_MAX_LIST_ROWS => {
            let rows: Vec<Value> = options
                .iter()
                .enumerate()
                .map(|(i, title)| {
                    json!({ "id": option_reply_id(i), "title": truncate(title, WHATSAPP_ROW_TITLE_LIMIT) })
                })
                .collect();
            vec![json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": to,
                "type": "interactive",
                "interactive": {
                    "type": "list",
                    "body": { "text": truncate(body, 4096) },
                    "action": {
                        "button": "Choose",
                        "sections": [{ "title": "Options", "rows": rows }],
                    },
                },
            })]
        }
        OutboundMessage::Options { body, options } => split_text(&numbered(body, options), WHATSAPP_TEXT_LIMIT)
            .iter()
            .map(|part| text_payload(part))
            .collect(),
    }
}

fn send_api_payloads(recipient_id: &str, message: &OutboundMessage, text_limit: usize) -> Vec<Value> {
    let text_payload = |body: &str| {
        json!({
            "recipient": { "id": recipient_id },
            "messaging_type": "RESPONSE",
            "message": { "text": body },
        })
    };

    match message {
        OutboundMessage::Text { body } => split_text(body, text_limit)
            .iter()
            .map(|part| text_payload(part))
            .collect(),
        OutboundMessage::Options { body, options } if options.len() <= QUICK_REPLY_MAX => {
            let quick_replies: Vec<Value> = options
                .iter()
                .enumerate()
                .map(|(i, title)| {
                    json!({
                        "content_type": "text",
                        "title": truncate(title, QUICK_REPLY_TITLE_LIMIT),
                        "payload": option_reply_id(i),
                    })
                })
                .collect();
            vec![json!({
                "recipient": { "id": recipient_id },
                "messaging_type": "RESPONSE",
                "message": { "text": truncate(body, text_limit), "quick_replies": quick_replies },
            })]
        }
        OutboundMessage::Options { body, options } => split_text(&numbered(body, options), text_limit)
            .iter()
            .map(|part| text_payload(part))
            .collect(),
    }
}

/// Send API payloads for Messenger
pub fn messenger_payloads(recipient_id: &str, message: &OutboundMessage) -> Vec<Value> {
    send_api_payloads(recipient_id, message, MESSENGER_TEXT_LIMIT)
}

/// Send API payloads for Instagram direct messages
pub fn instagram_payloads(recipient_id: &str, message: &OutboundMessage) -> Vec<Value> {
    send_api_payloads(recipient_id, message, INSTAGRAM_TEXT_LIMIT)
}
