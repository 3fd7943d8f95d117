// Chat-completions client for OpenAI and OpenAI-compatible providers

use crate::buffer_utils::parse_sse_stream;
use crate::openai::OpenAIChatParser;
use crate::traits::{ChatClient, ChatOptions, ChatRequest, ChatResponse, EventStream, TokenUsage};
use crate::types::{Content, ContentPart, Message};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI client (HTTP direct, no SDK)
pub struct OpenAIClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl OpenAIClient {
    /// Create new client with API key
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .context("Invalid API key format")?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: OPENAI_API_BASE.to_string(),
        })
    }

    /// Point the client at an OpenAI-compatible endpoint (DeepSeek, Groq, Gemini ...)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build chat completion request payload
    pub(crate) fn build_chat_request(
        model: &str,
        messages: Vec<Message>,
        options: &ChatOptions,
        stream: bool,
    ) -> Value {
        let openai_messages: Vec<Value> = messages
            .into_iter()
            .map(Self::convert_message)
            .collect();

        let mut obj = Map::new();
        obj.insert("model".to_string(), Value::from(model));
        obj.insert("messages".to_string(), Value::Array(openai_messages));
        obj.insert("stream".to_string(), Value::Bool(stream));

        // o-series and gpt-5 models use different parameter names
        let is_reasoning_model = model.starts_with("o1")
            || model.starts_with("o3")
            || model.starts_with("o4")
            || model.starts_with("gpt-5");

        if let Some(temp) = options.temperature {
            if !is_reasoning_model {
                obj.insert("temperature".to_string(), serde_json::json!(temp));
            }
        }
        if let Some(max_tokens) = options.max_tokens {
            let token_field = if is_reasoning_model {
                "max_completion_tokens"
            } else {
                "max_tokens"
            };
            obj.insert(token_field.to_string(), serde_json::json!(max_tokens));
        }

        Value::Object(obj)
    }

    /// Convert our Message type to OpenAI format
    fn convert_message(message: Message) -> Value {
        let (role, content, name) = match message {
            Message::System { content, name } => ("system", content, name),
            Message::Human { content, name } => ("user", content, name),
            Message::AI { content, name } => ("assistant", content, name),
        };

        let mut obj = Map::new();
        obj.insert("role".to_string(), Value::from(role));
        obj.insert("content".to_string(), Self::convert_content(content));
        if let Some(name) = name {
            obj.insert("name".to_string(), Value::from(name));
        }
        Value::Object(obj)
    }

    /// Convert Content to OpenAI format (string or array)
    fn convert_content(content: Content) -> Value {
        match content {
            Content::Text(s) => Value::from(s),
            Content::Parts(parts) => {
                let converted: Vec<Value> = parts
                    .into_iter()
                    .map(|ContentPart::Text { text }| {
                        serde_json::json!({
                            "type": "text",
                            "text": text,
                        })
                    })
                    .collect();
                Value::Array(converted)
            }
        }
    }

    async fn post_completions(&self, payload: &Value) -> Result<reqwest::Response> {
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .json(payload)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error ({}): {}", status, error_text);
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatClient for OpenAIClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let payload = Self::build_chat_request(
            &request.model,
            request.messages,
            &request.options,
            false,
        );

        let raw: OpenAIChatResponse = self
            .post_completions(&payload)
            .await?
            .json()
            .await
            .context("Failed to parse response")?;

        let choice = raw.choices.first();
        Ok(ChatResponse {
            content: choice.and_then(|c| c.message.content.clone()),
            usage: raw.usage.as_ref().map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: choice.and_then(|c| c.finish_reason.clone()),
            raw: serde_json::to_value(&raw)?,
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<EventStream> {
        let payload = Self::build_chat_request(
            &request.model,
            request.messages,
            &request.options,
            true,
        );

        let response = self.post_completions(&payload).await?;
        Ok(parse_sse_stream(response.bytes_stream(), OpenAIChatParser))
    }
}

// ============================================================================
// OPENAI-SPECIFIC RESPONSE TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAIChatResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Choice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResponseMessage {
    pub role: String,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}
