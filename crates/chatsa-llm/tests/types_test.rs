use chatsa_llm::types::ContentPart;
use chatsa_llm::{Content, Message};

#[test]
fn test_content_text_creation() {
    let content = Content::text("Hello, world!");
    assert_eq!(content.as_text(), Some("Hello, world!"));
}

#[test]
fn test_content_from_string() {
    let content: Content = "Test".into();
    assert_eq!(content.as_text(), Some("Test"));
}

#[test]
fn test_message_roles() {
    assert_eq!(Message::system("You are helpful").role(), "system");
    assert_eq!(Message::human("Hello").role(), "user");
    assert_eq!(Message::ai("Hi there!").role(), "assistant");
}

#[test]
fn test_message_serialization_human() {
    let msg = Message::human("Hello");
    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"role\":\"user\""));
    assert!(json.contains("Hello"));
}

#[test]
fn test_message_deserialization_assistant() {
    let msg: Message = serde_json::from_str(r#"{"role":"assistant","content":"Sure"}"#).unwrap();
    assert_eq!(msg.role(), "assistant");
    assert_eq!(msg.content().as_text(), Some("Sure"));
}

#[test]
fn test_multi_part_content_to_plain_text() {
    let content = Content::Parts(vec![
        ContentPart::Text { text: "first".to_string() },
        ContentPart::Text { text: "second".to_string() },
    ]);

    assert_eq!(content.as_text(), None);
    assert_eq!(content.to_plain_text(), "first\nsecond");
}
