use chatsa_llm::{
    AnthropicClient, ChatClient, ChatOptions, ChatRequest, Message, OpenAIClient, StreamEvent,
};
use futures::StreamExt;
use mockito::Matcher;
use serde_json::json;

fn request(model: &str) -> ChatRequest {
    ChatRequest::new(
        model,
        vec![
            Message::system("Answer from the context."),
            Message::human("When do you open?"),
        ],
    )
    .with_options(ChatOptions::new().temperature(0.3).max_tokens(256))
}

#[tokio::test]
async fn test_openai_chat_posts_completion() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o-mini",
            "stream": false,
            "max_tokens": 256,
            "messages": [
                { "role": "system", "content": "Answer from the context." },
                { "role": "user", "content": "When do you open?" }
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "chatcmpl-1",
                "model": "gpt-4o-mini",
                "choices": [{
                    "index": 0,
                    "message": { "role": "assistant", "content": "At 9am." },
                    "finish_reason": "stop"
                }],
                "usage": { "prompt_tokens": 20, "completion_tokens": 3, "total_tokens": 23 }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = OpenAIClient::new("sk-test").unwrap().with_base_url(server.url());
    let response = client.chat(request("gpt-4o-mini")).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.content.as_deref(), Some("At 9am."));
    assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    assert_eq!(response.usage.unwrap().total_tokens, 23);
}

#[tokio::test]
async fn test_openai_error_status_is_reported() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body(r#"{"error":{"message":"invalid api key"}}"#)
        .create_async()
        .await;

    let client = OpenAIClient::new("sk-bad").unwrap().with_base_url(server.url());
    let err = client.chat(request("gpt-4o-mini")).await.err().unwrap();

    let message = err.to_string();
    assert!(message.contains("401"));
    assert!(message.contains("invalid api key"));
}

#[tokio::test]
async fn test_openai_stream_yields_deltas() {
    let body = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"At \"},\"finish_reason\":null}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"9am.\"},\"finish_reason\":null}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(json!({ "stream": true })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let client = OpenAIClient::new("sk-test").unwrap().with_base_url(server.url());
    let mut stream = client.chat_stream(request("gpt-4o-mini")).await.unwrap();

    let mut text = String::new();
    let mut finished = false;
    while let Some(event) = stream.next().await {
        match event.unwrap() {
            StreamEvent::Message { content } => text.push_str(&content),
            StreamEvent::Done { .. } => finished = true,
        }
    }
    assert_eq!(text, "At 9am.");
    assert!(finished);
}

#[tokio::test]
async fn test_anthropic_chat_joins_text_blocks() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/messages")
        .match_header("x-api-key", "sk-ant")
        .match_body(Matcher::PartialJson(json!({
            "model": "claude-3-5-haiku-latest",
            "system": "Answer from the context.",
            "messages": [{ "role": "user", "content": "When do you open?" }]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "msg_1",
                "content": [
                    { "type": "text", "text": "At " },
                    { "type": "text", "text": "9am." }
                ],
                "stop_reason": "end_turn",
                "usage": { "input_tokens": 20, "output_tokens": 3 }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = AnthropicClient::new("sk-ant").unwrap().with_base_url(server.url());
    let response = client.chat(request("claude-3-5-haiku-latest")).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.content.as_deref(), Some("At 9am."));
    assert_eq!(response.finish_reason.as_deref(), Some("end_turn"));
    assert_eq!(response.usage.unwrap().total_tokens, 23);
}
