use chatsa_llm::anthropic::AnthropicParser;
use chatsa_llm::buffer_utils::parse_sse_stream;
use chatsa_llm::openai::OpenAIChatParser;
use chatsa_llm::StreamEvent;
use futures::StreamExt;

fn body(parts: Vec<&'static str>) -> impl futures::Stream<Item = Result<&'static [u8], std::io::Error>> {
    futures::stream::iter(parts.into_iter().map(|p| Ok(p.as_bytes())))
}

#[test]
fn test_stream_event_serialization() {
    let event = StreamEvent::Message { content: "Hello".to_string() };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "message");
    assert_eq!(json["content"], "Hello");

    let done = StreamEvent::Done { finish_reason: None };
    let json = serde_json::to_value(&done).unwrap();
    assert_eq!(json["type"], "done");
    assert!(json.get("finish_reason").is_none());
}

#[tokio::test]
async fn test_openai_body_yields_single_done() {
    let events: Vec<StreamEvent> = parse_sse_stream(
        body(vec![
            "data: {\"id\":\"1\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"finish_reason\":null}]}\n\n",
            "data: {\"id\":\"1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"},\"finish_reason\":null}]}\n\n",
            "data: {\"id\":\"1\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        ]),
        OpenAIChatParser,
    )
    .map(|e| e.unwrap())
    .collect()
    .await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Message { content: "Hel".into() },
            StreamEvent::Message { content: "lo".into() },
            StreamEvent::Done { finish_reason: Some("stop".into()) },
        ]
    );
}

#[tokio::test]
async fn test_anthropic_body_yields_single_done() {
    let events: Vec<StreamEvent> = parse_sse_stream(
        body(vec![
            "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{}}\n\n",
            "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n",
            "event: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"}}\n\n",
            "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
        ]),
        AnthropicParser,
    )
    .map(|e| e.unwrap())
    .collect()
    .await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Message { content: "Hi".into() },
            StreamEvent::Done { finish_reason: Some("end_turn".into()) },
        ]
    );
}
