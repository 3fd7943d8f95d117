// Anthropic Messages API client

use crate::anthropic::AnthropicParser;
use crate::buffer_utils::parse_sse_stream;
use crate::traits::{ChatClient, ChatOptions, ChatRequest, ChatResponse, EventStream, TokenUsage};
use crate::types::Message;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// `max_tokens` is mandatory on this API
const DEFAULT_MAX_TOKENS: u32 = 1024;

pub struct AnthropicClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&api_key).context("Invalid API key format")?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: ANTHROPIC_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// System messages go to the top-level `system` field; the rest become
    /// alternating user/assistant turns.
    pub(crate) fn build_messages_request(
        model: &str,
        messages: Vec<Message>,
        options: &ChatOptions,
        stream: bool,
    ) -> Value {
        let mut system_parts = Vec::new();
        let mut turns: Vec<Value> = Vec::new();

        for message in messages {
            let role = match &message {
                Message::System { content, .. } => {
                    system_parts.push(content.to_plain_text());
                    continue;
                }
                Message::Human { .. } => "user",
                Message::AI { .. } => "assistant",
            };
            let text = message.content().to_plain_text();

            // consecutive turns of the same role are merged
            if let Some(last) = turns.last_mut() {
                if last["role"] == role {
                    let merged = format!("{}\n\n{}", last["content"].as_str().unwrap_or_default(), text);
                    last["content"] = Value::from(merged);
                    continue;
                }
            }
            turns.push(serde_json::json!({ "role": role, "content": text }));
        }

        let mut obj = Map::new();
        obj.insert("model".to_string(), Value::from(model));
        obj.insert(
            "max_tokens".to_string(),
            Value::from(options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
        );
        obj.insert("messages".to_string(), Value::Array(turns));
        if !system_parts.is_empty() {
            obj.insert("system".to_string(), Value::from(system_parts.join("\n\n")));
        }
        if let Some(temp) = options.temperature {
            obj.insert("temperature".to_string(), serde_json::json!(temp));
        }
        if stream {
            obj.insert("stream".to_string(), Value::Bool(true));
        }

        Value::Object(obj)
    }

    async fn post_messages(&self, payload: &Value) -> Result<reqwest::Response> {
        let response = self
            .http_client
            .post(format!("{}/messages", self.base_url))
            .json(payload)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API error ({}): {}", status, error_text);
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatClient for AnthropicClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let payload = Self::build_messages_request(
            &request.model,
            request.messages,
            &request.options,
            false,
        );

        let raw: MessagesResponse = self
            .post_messages(&payload)
            .await?
            .json()
            .await
            .context("Failed to parse response")?;

        let text: String = raw
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        Ok(ChatResponse {
            content: (!text.is_empty()).then_some(text),
            usage: Some(TokenUsage {
                input_tokens: raw.usage.input_tokens,
                output_tokens: raw.usage.output_tokens,
                total_tokens: raw.usage.input_tokens + raw.usage.output_tokens,
            }),
            finish_reason: raw.stop_reason.clone(),
            raw: serde_json::to_value(&raw)?,
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<EventStream> {
        let payload = Self::build_messages_request(
            &request.model,
            request.messages,
            &request.options,
            true,
        );

        let response = self.post_messages(&payload).await?;
        Ok(parse_sse_stream(response.bytes_stream(), AnthropicParser))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    pub id: String,
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_is_lifted() {
        let payload = AnthropicClient::build_messages_request(
            "claude-3-5-haiku-latest",
            vec![
                Message::system("Rules"),
                Message::system("Context"),
                Message::human("Hi"),
                Message::ai("Hello!"),
                Message::human("Prices?"),
            ],
            &ChatOptions::new().temperature(0.1),
            false,
        );

        assert_eq!(payload["system"], "Rules\n\nContext");
        assert_eq!(payload["max_tokens"], 1024);
        assert_eq!(payload["messages"].as_array().unwrap().len(), 3);
        assert_eq!(payload["messages"][0]["role"], "user");
        assert!(payload.get("stream").is_none());
    }

    #[test]
    fn test_consecutive_user_turns_are_merged() {
        let payload = AnthropicClient::build_messages_request(
            "claude",
            vec![Message::human("one"), Message::human("two")],
            &ChatOptions::new().max_tokens(64),
            true,
        );

        assert_eq!(payload["messages"].as_array().unwrap().len(), 1);
        assert_eq!(payload["messages"][0]["content"], "one\n\ntwo");
        assert_eq!(payload["max_tokens"], 64);
        assert_eq!(payload["stream"], true);
    }
}
