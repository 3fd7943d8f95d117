use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::buffer_utils::SseLineParser;
use crate::streaming::StreamEvent;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    pub role: Option<String>,
    pub content: Option<String>,
}

impl ChatStreamChunk {
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
    }
    
    fn to_stream_events(&self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        
        if let Some(choice) = self.choices.first() {
            if let Some(content) = &choice.delta.content {
                if !content.is_empty() {
                    events.push(StreamEvent::Message {
                        content: content.clone(),
                    });
                }
            }
            
            if let Some(finish_reason) = &choice.finish_reason {
                events.push(StreamEvent::Done {
                    finish_reason: Some(finish_reason.clone()),
                });
            }
        }
        
        events
    }
}

/// Chat-completions SSE payloads (OpenAI and compatible providers)
pub struct OpenAIChatParser;

impl SseLineParser for OpenAIChatParser {
    fn parse_data_line(&self, data: &str) -> Result<Vec<StreamEvent>> {
        let chunk: ChatStreamChunk = serde_json::from_str(data)
            .map_err(|e| anyhow::anyhow!("Failed to parse chat chunk: {}", e))?;
        Ok(chunk.to_stream_events())
    }
}
