#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chatsa_api::{build_router, AppState, Config};
use chatsa_flow::{ConversationEngine, EngineConfig};
use chatsa_integrations::{
    FileUpload, KnowledgeBase, MetaMessenger, OutboundMessage, ScoredChunk, SendTarget,
};
use chatsa_llm::{
    ChatClient, ChatRequest, ChatResponse, EventStream, ProviderRegistry, ProviderType, StreamEvent,
};
use chatsa_persist::{InMemoryPersistenceClient, PersistenceClient};
use chatsa_types::{Channel, Team};
use serde_json::Value;
use tower::ServiceExt;

pub const ADMIN_TOKEN: &str = "admin-secret";
pub const APP_SECRET: &str = "meta-app-secret";
pub const VERIFY_TOKEN: &str = "meta-verify";
pub const ANSWER: &str = "We are open 9am to 5pm.";

pub struct FakeLlm;

#[async_trait]
impl ChatClient for FakeLlm {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
        Ok(ChatResponse {
            content: Some(ANSWER.to_string()),
            usage: None,
            finish_reason: Some("stop".into()),
            raw: Value::Null,
        })
    }

    async fn chat_stream(&self, _request: ChatRequest) -> Result<EventStream> {
        let events = vec![
            Ok(StreamEvent::Message { content: "We are open ".into() }),
            Ok(StreamEvent::Message { content: "9am to 5pm.".into() }),
            Ok(StreamEvent::Done { finish_reason: Some("stop".into()) }),
        ];
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

#[derive(Default)]
pub struct FakeKnowledge {
    pub texts: Mutex<Vec<String>>,
}

#[async_trait]
impl KnowledgeBase for FakeKnowledge {
    async fn create_dataset(&self, name: &str) -> Result<String> {
        Ok(format!("ds-{}", name))
    }
    async fn delete_dataset(&self, _dataset_id: &str) -> Result<()> {
        Ok(())
    }
    async fn upload_file(&self, _dataset_id: &str, upload: FileUpload) -> Result<String> {
        Ok(format!("file-{}", upload.file_name))
    }
    async fn ingest_url(&self, _dataset_id: &str, url: &str) -> Result<String> {
        Ok(format!("url-{}", url))
    }
    async fn add_text(&self, _dataset_id: &str, _name: &str, text: &str) -> Result<String> {
        self.texts.lock().unwrap().push(text.to_string());
        Ok("chunk-1".into())
    }
    async fn delete_file(&self, _dataset_id: &str, _file_id: &str) -> Result<()> {
        Ok(())
    }
    async fn search(&self, _dataset_id: &str, _query: &str, _limit: u32) -> Result<Vec<ScoredChunk>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct FakeMessenger {
    pub sent: Mutex<Vec<(SendTarget, OutboundMessage)>>,
    pub subscribed: Mutex<Vec<(Channel, String)>>,
}

#[async_trait]
impl MetaMessenger for FakeMessenger {
    async fn send(&self, target: &SendTarget, message: &OutboundMessage) -> Result<Vec<String>> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((target.clone(), message.clone()));
        Ok(vec![format!("wamid.out.{}", sent.len())])
    }

    async fn subscribe_app(&self, channel: Channel, account_id: &str, _access_token: &str) -> Result<()> {
        self.subscribed.lock().unwrap().push((channel, account_id.to_string()));
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<dyn PersistenceClient>,
    pub knowledge: Arc<FakeKnowledge>,
    pub messenger: Arc<FakeMessenger>,
}

pub fn test_config() -> Config {
    let mut config: Config = toml::from_str(include_str!("../../../../config/default.toml"))
        .expect("default config parses");
    config.admin_token = ADMIN_TOKEN.to_string();
    config.meta_app_secret = APP_SECRET.to_string();
    config.meta_verify_token = VERIFY_TOKEN.to_string();
    config
}

pub fn test_app() -> TestApp {
    let store: Arc<dyn PersistenceClient> = Arc::new(InMemoryPersistenceClient::new());
    let knowledge = Arc::new(FakeKnowledge::default());
    let messenger = Arc::new(FakeMessenger::default());

    let engine = ConversationEngine::builder()
        .persistence(store.clone())
        .providers(Arc::new(
            ProviderRegistry::new().with_client(ProviderType::OpenAI, Arc::new(FakeLlm)),
        ))
        .knowledge(knowledge.clone())
        .messenger(messenger.clone())
        .config(EngineConfig::default())
        .build()
        .expect("engine builds");

    let state = AppState::new(test_config(), store.clone(), knowledge.clone(), messenger.clone(), engine);
    TestApp {
        router: build_router(Arc::new(state)),
        store,
        knowledge,
        messenger,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }

    /// Store a team directly and return it
    pub async fn team(&self) -> Team {
        let team = Team::new("Acme", "owner@acme.test");
        self.store.save_team(&team).await.unwrap();
        team
    }

    /// Create a chatbot through the API and return its id
    pub async fn chatbot(&self, team: &Team) -> String {
        let (status, body) = self
            .send(json_request("POST", "/chatbots", Some(&team.api_key), serde_json::json!({ "name": "Helpdesk" })))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }
}

pub fn json_request(method: &str, uri: &str, api_key: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = api_key {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", key));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::empty()).unwrap()
}
