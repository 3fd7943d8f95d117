use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::Config,
    middleware::logging,
    openapi::ApiDoc,
    routes::{chat, chatbots, conversations, files, flows, health, integrations, teams, webhooks},
    state::AppState,
};

/// Base64 uploads of up to 10 MB
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        // Health
        .route("/health", get(health::health_check))
        // Teams
        .route("/teams", post(teams::create_team))
        .route("/team", get(teams::get_team))
        .route("/team/plan", put(teams::set_plan))
        // Chatbots
        .route("/chatbots", post(chatbots::create_chatbot).get(chatbots::list_chatbots))
        .route(
            "/chatbots/:chatbot_id",
            get(chatbots::get_chatbot)
                .patch(chatbots::update_chatbot)
                .delete(chatbots::delete_chatbot),
        )
        // Dataset files
        .route("/chatbots/:chatbot_id/files", post(files::create_file).get(files::list_files))
        .route(
            "/chatbots/:chatbot_id/files/:file_id",
            axum::routing::delete(files::delete_file),
        )
        // Widget chat
        .route("/chatbots/:chatbot_id/chat", post(chat::chat))
        .route("/chatbots/:chatbot_id/chat/stream", post(chat::chat_stream))
        // Conversations
        .route(
            "/chatbots/:chatbot_id/conversations",
            get(conversations::list_conversations),
        )
        .route("/conversations/:conversation_id", get(conversations::get_conversation))
        .route(
            "/conversations/:conversation_id/takeover",
            post(conversations::set_takeover),
        )
        .route("/conversations/:conversation_id/reply", post(conversations::agent_reply))
        // Flows
        .route("/chatbots/:chatbot_id/flows", put(flows::upsert_flow).get(flows::list_flows))
        .route(
            "/chatbots/:chatbot_id/flows/:flow_id",
            axum::routing::delete(flows::delete_flow),
        )
        // Integrations
        .route(
            "/chatbots/:chatbot_id/integrations",
            post(integrations::connect_channel).get(integrations::list_integrations),
        )
        .route(
            "/integrations/:integration_id",
            axum::routing::patch(integrations::update_integration)
                .delete(integrations::delete_integration),
        )
        // Meta webhooks
        .route("/webhooks/meta", get(webhooks::verify).post(webhooks::receive));

    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .merge(api_routes)
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(logging::log_request))
        .layer(TimeoutLayer::new(timeout))
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.cors.enabled {
        let cors = CorsLayer::new()
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::PATCH,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers(Any);

        if config.cors.origins.iter().any(|o| o == "*") {
            cors.allow_origin(Any)
        } else {
            let parsed_origins: Vec<axum::http::HeaderValue> = config
                .cors
                .origins
                .iter()
                .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
                .collect();

            cors.allow_origin(parsed_origins)
        }
    } else {
        CorsLayer::new()
    }
}
