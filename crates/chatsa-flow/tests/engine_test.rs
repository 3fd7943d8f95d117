use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chatsa_flow::{ConversationEngine, EngineConfig, EngineError, InboundOutcome, SkipReason};
use chatsa_integrations::{
    EchoEvent, FileUpload, InboundEvent, InboundMessage, KnowledgeBase, MetaMessenger,
    OutboundMessage, ScoredChunk, SendTarget,
};
use chatsa_llm::{
    ChatClient, ChatRequest, ChatResponse, EventStream, ProviderRegistry, ProviderType, StreamEvent,
};
use chatsa_persist::{InMemoryPersistenceClient, PersistenceClient};
use chatsa_types::{
    Channel, Chatbot, ChatbotSettings, FlowEdge, FlowNode, Integration, MessageRole, QuestionFlow,
    Team,
};
use chrono::{Duration, Utc};
use futures::StreamExt;

const ANSWER: &str = "We open at 9am.";
const OUR_APP_ID: u64 = 4242;

#[derive(Default)]
struct FakeLlm {
    requests: Mutex<Vec<ChatRequest>>,
}

#[async_trait]
impl ChatClient for FakeLlm {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().unwrap().push(request);
        Ok(ChatResponse {
            content: Some(ANSWER.to_string()),
            usage: None,
            finish_reason: Some("stop".into()),
            raw: serde_json::Value::Null,
        })
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<EventStream> {
        self.requests.lock().unwrap().push(request);
        let events = vec![
            Ok(StreamEvent::Message { content: "We open ".into() }),
            Ok(StreamEvent::Message { content: "at 9am.".into() }),
            Ok(StreamEvent::Done { finish_reason: Some("stop".into()) }),
        ];
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

struct FakeKnowledge {
    fail: bool,
}

#[async_trait]
impl KnowledgeBase for FakeKnowledge {
    async fn create_dataset(&self, _name: &str) -> Result<String> {
        Ok("ds".into())
    }
    async fn delete_dataset(&self, _dataset_id: &str) -> Result<()> {
        Ok(())
    }
    async fn upload_file(&self, _dataset_id: &str, _upload: FileUpload) -> Result<String> {
        Ok("file".into())
    }
    async fn ingest_url(&self, _dataset_id: &str, _url: &str) -> Result<String> {
        Ok("url".into())
    }
    async fn add_text(&self, _dataset_id: &str, _name: &str, _text: &str) -> Result<String> {
        Ok("chunk".into())
    }
    async fn delete_file(&self, _dataset_id: &str, _file_id: &str) -> Result<()> {
        Ok(())
    }
    async fn search(&self, _dataset_id: &str, _query: &str, _limit: u32) -> Result<Vec<ScoredChunk>> {
        if self.fail {
            return Err(anyhow!("search backend down"));
        }
        Ok(vec![ScoredChunk {
            id: "c1".into(),
            content: "<p>Opening hours: 9am to 5pm</p>".into(),
            link: None,
            score: 0.9,
        }])
    }
}

#[derive(Default)]
struct FakeMessenger {
    sent: Mutex<Vec<(SendTarget, OutboundMessage)>>,
}

#[async_trait]
impl MetaMessenger for FakeMessenger {
    async fn send(&self, target: &SendTarget, message: &OutboundMessage) -> Result<Vec<String>> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((target.clone(), message.clone()));
        Ok(vec![format!("out.{}", sent.len())])
    }

    async fn subscribe_app(&self, _channel: Channel, _account_id: &str, _access_token: &str) -> Result<()> {
        Ok(())
    }
}

struct Harness {
    engine: ConversationEngine,
    store: Arc<dyn PersistenceClient>,
    llm: Arc<FakeLlm>,
    messenger: Arc<FakeMessenger>,
    team: Team,
    chatbot: Chatbot,
}

async fn harness_with(knowledge_fails: bool, config: EngineConfig) -> Harness {
    let store: Arc<dyn PersistenceClient> = Arc::new(InMemoryPersistenceClient::new());
    let llm = Arc::new(FakeLlm::default());
    let messenger = Arc::new(FakeMessenger::default());

    let team = Team::new("Acme", "owner@acme.test");
    store.save_team(&team).await.unwrap();
    let chatbot = Chatbot::new(&team.id, "Helpdesk", "ds-1", ChatbotSettings::default());
    store.save_chatbot(&chatbot).await.unwrap();
    let integration = Integration::new(&team.id, &chatbot.id, Channel::WhatsApp, "PHONE-1", "wa-token");
    store.save_integration(&integration).await.unwrap();

    let providers = ProviderRegistry::new().with_client(ProviderType::OpenAI, llm.clone());
    let engine = ConversationEngine::builder()
        .persistence(store.clone())
        .providers(Arc::new(providers))
        .knowledge(Arc::new(FakeKnowledge { fail: knowledge_fails }))
        .messenger(messenger.clone())
        .config(config)
        .build()
        .unwrap();

    Harness { engine, store, llm, messenger, team, chatbot }
}

async fn harness() -> Harness {
    harness_with(
        false,
        EngineConfig {
            meta_app_id: Some(OUR_APP_ID),
            ..Default::default()
        },
    )
    .await
}

fn whatsapp(message_id: &str, text: &str) -> InboundMessage {
    InboundMessage {
        channel: Channel::WhatsApp,
        account_id: "PHONE-1".into(),
        sender_id: "15550001111".into(),
        message_id: message_id.into(),
        text: text.into(),
        reply_id: None,
    }
}

fn echo(message_id: &str, app_id: Option<u64>) -> InboundEvent {
    InboundEvent::Echo(EchoEvent {
        channel: Channel::WhatsApp,
        account_id: "PHONE-1".into(),
        recipient_id: "15550001111".into(),
        message_id: message_id.into(),
        app_id,
    })
}

#[tokio::test]
async fn test_ai_reply_is_sent_stored_and_charged() {
    let h = harness().await;

    let outcome = h.engine.handle_inbound(whatsapp("wamid.1", "When do you open?")).await.unwrap();
    let InboundOutcome::AiReplied { conversation_id, sent } = outcome else {
        panic!("expected an AI reply, got {:?}", outcome);
    };
    assert_eq!(sent, 1);

    let sent = h.messenger.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.recipient_id, "15550001111");
    assert_eq!(sent[0].0.access_token, "wa-token");
    assert_eq!(sent[0].1, OutboundMessage::text(ANSWER));

    let messages = h.store.get_messages(&conversation_id).await.unwrap();
    let roles: Vec<MessageRole> = messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![MessageRole::User, MessageRole::Assistant]);
    assert_eq!(messages[0].external_message_id.as_deref(), Some("wamid.1"));

    let team = h.store.get_team(&h.team.id).await.unwrap().unwrap();
    assert_eq!(team.messages_used, 1);

    let requests = h.llm.requests.lock().unwrap();
    let system = requests[0].messages[0].content().to_plain_text();
    assert!(system.contains("Opening hours: 9am to 5pm"));
}

#[tokio::test]
async fn test_duplicate_delivery_is_skipped() {
    let h = harness().await;
    h.engine.handle_inbound(whatsapp("wamid.1", "Hi")).await.unwrap();

    let again = h.engine.handle_inbound(whatsapp("wamid.1", "Hi")).await.unwrap();
    assert_eq!(again, InboundOutcome::Skipped(SkipReason::Duplicate));
    assert_eq!(h.messenger.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_and_disabled_integrations() {
    let h = harness().await;

    let mut unknown = whatsapp("wamid.1", "Hi");
    unknown.account_id = "OTHER".into();
    assert_eq!(
        h.engine.handle_inbound(unknown).await.unwrap(),
        InboundOutcome::Skipped(SkipReason::NoIntegration)
    );

    let mut integration = h
        .store
        .find_integration(Channel::WhatsApp, "PHONE-1")
        .await
        .unwrap()
        .unwrap();
    integration.enabled = false;
    h.store.save_integration(&integration).await.unwrap();

    assert_eq!(
        h.engine.handle_inbound(whatsapp("wamid.2", "Hi")).await.unwrap(),
        InboundOutcome::Skipped(SkipReason::IntegrationDisabled)
    );
    assert!(h.messenger.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_default_flow_runs_without_credits() {
    let h = harness().await;
    let flow = QuestionFlow::new(
        &h.chatbot.id,
        "Welcome",
        vec![
            FlowNode::question("topic", "How can we help?", vec!["Prices", "Hours"]),
            FlowNode::end("prices", Some("Plans start at $10.")),
            FlowNode::end("hours", Some("We open at 9am.")),
        ],
        vec![
            FlowEdge::on_option("topic", 0, "prices"),
            FlowEdge::on_option("topic", 1, "hours"),
        ],
    );
    h.store.save_flow(&flow).await.unwrap();

    let first = h.engine.handle_inbound(whatsapp("wamid.1", "hello")).await.unwrap();
    assert!(matches!(first, InboundOutcome::FlowReplied { sent: 1, .. }));

    let mut pick = whatsapp("wamid.2", "Hours");
    pick.reply_id = Some("opt_1".into());
    let second = h.engine.handle_inbound(pick).await.unwrap();
    let InboundOutcome::FlowReplied { conversation_id, .. } = second else {
        panic!("expected the flow to continue, got {:?}", second);
    };

    let sent = h.messenger.sent.lock().unwrap().clone();
    assert_eq!(
        sent[0].1,
        OutboundMessage::options("How can we help?", vec!["Prices".into(), "Hours".into()])
    );
    assert_eq!(sent[1].1, OutboundMessage::text("We open at 9am."));

    let conversation = h.store.get_conversation(&conversation_id).await.unwrap().unwrap();
    assert!(conversation.flow_cursor.is_none());

    let team = h.store.get_team(&h.team.id).await.unwrap().unwrap();
    assert_eq!(team.messages_used, 0);
    assert!(h.llm.requests.lock().unwrap().is_empty());

    // flow finished: the next message goes to the AI
    let third = h.engine.handle_inbound(whatsapp("wamid.3", "Do you ship abroad?")).await.unwrap();
    assert!(matches!(third, InboundOutcome::AiReplied { .. }));
}

#[tokio::test]
async fn test_agent_echo_starts_takeover() {
    let h = harness().await;
    h.engine.handle_inbound(whatsapp("wamid.1", "Hi")).await.unwrap();

    let own = h.engine.handle_event(echo("out.1", Some(OUR_APP_ID))).await.unwrap();
    assert_eq!(own, InboundOutcome::Skipped(SkipReason::OwnEcho));

    let agent = h.engine.handle_event(echo("wamid.agent", None)).await.unwrap();
    assert!(matches!(agent, InboundOutcome::TakeoverStarted { .. }));

    let next = h.engine.handle_inbound(whatsapp("wamid.2", "Are you there?")).await.unwrap();
    assert_eq!(next, InboundOutcome::Skipped(SkipReason::HumanTakeover));
    assert_eq!(h.messenger.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_inbox_echo_starts_takeover_without_app_id() {
    let h = harness_with(false, EngineConfig::default()).await;
    h.engine.handle_inbound(whatsapp("wamid.1", "Hi")).await.unwrap();

    // echo of our own AI reply, identified by the id returned from the send
    let own = h.engine.handle_event(echo("out.1", Some(OUR_APP_ID))).await.unwrap();
    assert_eq!(own, InboundOutcome::Skipped(SkipReason::OwnEcho));

    let agent = h
        .engine
        .handle_event(echo("m.inbox", Some(263902037430900)))
        .await
        .unwrap();
    assert!(matches!(agent, InboundOutcome::TakeoverStarted { .. }));

    let next = h.engine.handle_inbound(whatsapp("wamid.2", "Hello?")).await.unwrap();
    assert_eq!(next, InboundOutcome::Skipped(SkipReason::HumanTakeover));
    assert_eq!(h.messenger.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_takeover_expires() {
    let h = harness().await;
    h.engine.handle_inbound(whatsapp("wamid.1", "Hi")).await.unwrap();

    let mut conversation = h
        .store
        .find_conversation(&h.chatbot.id, Channel::WhatsApp, "15550001111")
        .await
        .unwrap()
        .unwrap();
    conversation.set_human_takeover(true);
    conversation.human_takeover_at = Some(Utc::now() - Duration::minutes(61));
    h.store.save_conversation(&conversation).await.unwrap();

    let outcome = h.engine.handle_inbound(whatsapp("wamid.2", "Hello?")).await.unwrap();
    assert!(matches!(outcome, InboundOutcome::AiReplied { .. }));

    let conversation = h.store.get_conversation(&conversation.id).await.unwrap().unwrap();
    assert!(!conversation.human_takeover);
}

#[tokio::test]
async fn test_exhausted_quota_blocks_ai() {
    let h = harness().await;
    let mut team = h.team.clone();
    team.messages_used = team.plan.limits().message_credits;
    h.store.save_team(&team).await.unwrap();

    let outcome = h.engine.handle_inbound(whatsapp("wamid.1", "Hi")).await.unwrap();
    assert_eq!(outcome, InboundOutcome::Skipped(SkipReason::QuotaExhausted));

    let web = h.engine.web_chat(&h.chatbot.id, None, None, "Hi").await;
    assert!(matches!(web, Err(EngineError::QuotaExceeded)));
}

#[tokio::test]
async fn test_expired_period_resets_usage() {
    let h = harness().await;
    let mut team = h.team.clone();
    team.messages_used = team.plan.limits().message_credits;
    team.period_started_at = Utc::now() - Duration::days(31);
    h.store.save_team(&team).await.unwrap();

    let reply = h.engine.web_chat(&h.chatbot.id, None, Some("visitor-1"), "Hi").await.unwrap();
    assert_eq!(reply.reply.as_deref(), Some(ANSWER));

    let team = h.store.get_team(&h.team.id).await.unwrap().unwrap();
    assert_eq!(team.messages_used, 1);
}

#[tokio::test]
async fn test_web_chat_keeps_history() {
    let h = harness().await;
    let first = h.engine.web_chat(&h.chatbot.id, None, None, "When do you open?").await.unwrap();
    let second = h
        .engine
        .web_chat(&h.chatbot.id, Some(&first.conversation_id), None, "And on Sunday?")
        .await
        .unwrap();
    assert_eq!(first.conversation_id, second.conversation_id);

    let requests = h.llm.requests.lock().unwrap();
    let roles: Vec<&str> = requests[1].messages.iter().map(|m| m.role()).collect();
    assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    assert_eq!(requests[1].messages[3].content().to_plain_text(), "And on Sunday?");
}

#[tokio::test]
async fn test_web_chat_rejects_foreign_conversation() {
    let h = harness().await;
    let result = h.engine.web_chat(&h.chatbot.id, Some("nope"), None, "Hi").await;
    assert!(matches!(result, Err(EngineError::NotFound { kind: "Conversation", .. })));
}

#[tokio::test]
async fn test_knowledge_failure_still_answers() {
    let h = harness_with(true, EngineConfig::default()).await;
    let reply = h.engine.web_chat(&h.chatbot.id, None, None, "Hi").await.unwrap();
    assert_eq!(reply.reply.as_deref(), Some(ANSWER));

    let requests = h.llm.requests.lock().unwrap();
    assert!(!requests[0].messages[0].content().to_plain_text().contains("<context>"));
}

#[tokio::test]
async fn test_stream_stores_full_answer() {
    let h = harness().await;
    let stream = h.engine.web_chat_stream(&h.chatbot.id, None, None, "Hours?").await.unwrap();
    assert!(!stream.human_takeover);

    let events: Vec<StreamEvent> = stream.events.map(|e| e.unwrap()).collect().await;
    let text: String = events.iter().filter_map(|e| e.text()).collect();
    assert_eq!(text, ANSWER);
    assert!(matches!(events.last(), Some(StreamEvent::Done { .. })));

    let messages = h.store.get_messages(&stream.conversation_id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, ANSWER);
    let team = h.store.get_team(&h.team.id).await.unwrap().unwrap();
    assert_eq!(team.messages_used, 1);
}

#[tokio::test]
async fn test_agent_reply_sends_and_takes_over() {
    let h = harness().await;
    let InboundOutcome::AiReplied { conversation_id, .. } =
        h.engine.handle_inbound(whatsapp("wamid.1", "Hi")).await.unwrap()
    else {
        panic!("expected an AI reply");
    };

    let message = h.engine.agent_reply(&conversation_id, "Hi, this is Dana from Acme.").await.unwrap();
    assert_eq!(message.role, MessageRole::Agent);
    assert_eq!(message.external_message_id.as_deref(), Some("out.2"));

    let conversation = h.store.get_conversation(&conversation_id).await.unwrap().unwrap();
    assert!(conversation.human_takeover);

    let released = h.engine.set_takeover(&conversation_id, false).await.unwrap();
    assert!(!released.human_takeover);
}
