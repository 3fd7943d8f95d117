use serde::{Deserialize, Serialize};

/// Provider-agnostic streaming event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Message {
        content: String,
    },
    
    Done {
        #[serde(skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },
}

impl StreamEvent {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Message { content } => Some(content),
            Self::Done { .. } => None,
        }
    }
}
