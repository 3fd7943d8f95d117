use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chatsa_llm::{
    ChatClient, ChatOptions, ChatRequest, ChatResponse, EventStream, Message, ProviderRegistry,
    ProviderType, StreamEvent,
};
use futures::StreamExt;

/// Client that replies with the last user message
struct EchoClient;

#[async_trait]
impl ChatClient for EchoClient {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let last = request
            .messages
            .last()
            .map(|m| m.content().to_plain_text())
            .unwrap_or_default();
        Ok(ChatResponse {
            content: Some(last),
            usage: None,
            finish_reason: Some("stop".to_string()),
            raw: serde_json::Value::Null,
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<EventStream> {
        let reply = self.chat(request).await?.content.unwrap_or_default();
        let events: Vec<Result<StreamEvent>> = reply
            .split_inclusive(' ')
            .map(|word| Ok(StreamEvent::Message { content: word.to_string() }))
            .chain(std::iter::once(Ok(StreamEvent::Done { finish_reason: None })))
            .collect();
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

#[test]
fn test_chat_request_creation() {
    let request = ChatRequest::new("gpt-4o", vec![Message::human("Hello")]);

    assert_eq!(request.model, "gpt-4o");
    assert_eq!(request.messages.len(), 1);
    assert_eq!(request.options, ChatOptions::default());
}

#[test]
fn test_chat_request_with_options() {
    let options = ChatOptions::new().temperature(0.7).max_tokens(100);
    let request = ChatRequest::new("gpt-4o", vec![Message::human("Hello")]).with_options(options);

    assert_eq!(request.options.temperature, Some(0.7));
    assert_eq!(request.options.max_tokens, Some(100));
}

#[tokio::test]
async fn test_registry_dispatches_to_registered_client() {
    let registry = ProviderRegistry::new().with_client(ProviderType::Groq, Arc::new(EchoClient));
    let client = registry.get(ProviderType::Groq).expect("groq registered");

    let response = client
        .chat(ChatRequest::new("llama", vec![Message::human("ping")]))
        .await
        .unwrap();
    assert_eq!(response.content.as_deref(), Some("ping"));
}

#[tokio::test]
async fn test_stream_collects_to_full_text() {
    let stream = EchoClient
        .chat_stream(ChatRequest::new("m", vec![Message::human("hello there friend")]))
        .await
        .unwrap();

    let text: String = stream
        .filter_map(|event| async move { event.ok().and_then(|e| e.text().map(String::from)) })
        .collect()
        .await;
    assert_eq!(text, "hello there friend");
}
