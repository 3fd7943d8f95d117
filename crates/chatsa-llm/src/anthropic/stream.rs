use anyhow::Result;
use serde::Deserialize;

use crate::buffer_utils::SseLineParser;
use crate::streaming::StreamEvent;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicStreamEvent {
    ContentBlockDelta { delta: BlockDelta },
    MessageDelta { delta: MessageDelta },
    MessageStop,
    Error { error: ApiError },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct BlockDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// Messages-API SSE payloads.
///
/// `message_delta` carries the stop reason and is reported as `Done`;
/// the trailing `message_stop` is then swallowed by the stream driver.
pub struct AnthropicParser;

impl SseLineParser for AnthropicParser {
    fn parse_data_line(&self, data: &str) -> Result<Vec<StreamEvent>> {
        let event: AnthropicStreamEvent = serde_json::from_str(data)
            .map_err(|e| anyhow::anyhow!("Failed to parse Anthropic event: {}", e))?;

        Ok(match event {
            AnthropicStreamEvent::ContentBlockDelta { delta } => delta
                .text
                .filter(|t| !t.is_empty())
                .map(|content| vec![StreamEvent::Message { content }])
                .unwrap_or_default(),
            AnthropicStreamEvent::MessageDelta { delta } => match delta.stop_reason {
                Some(reason) => vec![StreamEvent::Done { finish_reason: Some(reason) }],
                None => Vec::new(),
            },
            AnthropicStreamEvent::MessageStop => vec![StreamEvent::Done { finish_reason: None }],
            AnthropicStreamEvent::Error { error } => {
                anyhow::bail!("Anthropic stream error: {}", error.message)
            }
            AnthropicStreamEvent::Other => Vec::new(),
        })
    }

    fn is_done_marker(&self, _data: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_delta() {
        let events = AnthropicParser
            .parse_data_line(r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hola"}}"#)
            .unwrap();
        assert_eq!(events, vec![StreamEvent::Message { content: "Hola".into() }]);
    }

    #[test]
    fn test_stop_reason() {
        let events = AnthropicParser
            .parse_data_line(r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":12}}"#)
            .unwrap();
        assert_eq!(events, vec![StreamEvent::Done { finish_reason: Some("end_turn".into()) }]);
    }

    #[test]
    fn test_ping_and_start_are_ignored() {
        assert!(AnthropicParser.parse_data_line(r#"{"type":"ping"}"#).unwrap().is_empty());
        assert!(AnthropicParser
            .parse_data_line(r#"{"type":"message_start","message":{"id":"m1"}}"#)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_error_event() {
        let err = AnthropicParser
            .parse_data_line(r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("Overloaded"));
    }
}
