use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatsa_api::{build_router, config::Config, state::AppState};
use chatsa_flow::{ConversationEngine, EngineConfig};
use chatsa_integrations::{
    GraphApiClient, KnowledgeBase, KnowledgeConfig, MetaConfig, MetaMessenger, TrieveClient,
};
use chatsa_llm::ProviderRegistry;
use chatsa_persist::PersistClientBuilder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config);

    tracing::info!("Starting ChatSa API server");
    tracing::info!("Config loaded: {}:{}", config.server.host, config.server.port);

    // LLM providers
    let providers = ProviderRegistry::from_configs(config.provider_configs())?;
    if providers.is_empty() {
        tracing::warn!("No LLM API keys set; AI answers are disabled");
    }

    // Storage
    tracing::info!(backend = ?config.storage.backend, "Initializing storage");
    let persist = PersistClientBuilder::new()
        .backend(config.storage.backend)
        .mongodb_uri(config.mongodb_uri.clone())
        .database(config.mongodb.database.clone())
        .build()
        .await?;

    // Knowledge provider
    if config.knowledge_api_key.is_empty() {
        tracing::warn!("KNOWLEDGE_API_KEY is not set; dataset calls will be rejected");
    }
    let knowledge: Arc<dyn KnowledgeBase> = Arc::new(TrieveClient::new(
        KnowledgeConfig::new(
            config.knowledge_api_key.clone(),
            config.knowledge_organization_id.clone(),
        )
        .with_base_url(config.knowledge.base_url.clone()),
    )?);

    // Meta Graph API
    if config.meta.verify_signature && config.meta_app_secret.is_empty() {
        tracing::warn!("META_APP_SECRET is not set; Meta webhooks will be rejected");
    }
    let meta_config = MetaConfig {
        graph_base_url: config.meta.graph_base_url.clone(),
        graph_version: config.meta.graph_version.clone(),
        app_id: config.meta.app_id,
        app_secret: config.meta_app_secret.clone(),
        verify_token: config.meta_verify_token.clone(),
    };
    let messenger: Arc<dyn MetaMessenger> = Arc::new(GraphApiClient::new(&meta_config)?);

    // Conversation engine
    let engine = ConversationEngine::builder()
        .persistence(persist.clone())
        .providers(Arc::new(providers))
        .knowledge(knowledge.clone())
        .messenger(messenger.clone())
        .config(EngineConfig {
            takeover_timeout: config.takeover_timeout(),
            meta_app_id: config.meta.app_id,
            max_tokens: config.llm.max_tokens,
        })
        .build()?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, persist, knowledge, messenger, engine));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);
    tracing::info!("API docs: http://{}/api/docs", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
