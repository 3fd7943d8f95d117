use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::routes::{
    chat, chatbots, conversations, files, flows, health, integrations, teams, webhooks,
};

#[derive(OpenApi)]
#[openapi(
    info(title = "ChatSa API", description = "Multi-tenant RAG chatbots for websites, WhatsApp, Instagram and Messenger"),
    paths(
        health::health_check,
        teams::create_team,
        teams::get_team,
        teams::set_plan,
        chatbots::create_chatbot,
        chatbots::list_chatbots,
        chatbots::get_chatbot,
        chatbots::update_chatbot,
        chatbots::delete_chatbot,
        files::create_file,
        files::list_files,
        files::delete_file,
        chat::chat,
        chat::chat_stream,
        conversations::list_conversations,
        conversations::get_conversation,
        conversations::set_takeover,
        conversations::agent_reply,
        flows::upsert_flow,
        flows::list_flows,
        flows::delete_flow,
        integrations::connect_channel,
        integrations::list_integrations,
        integrations::update_integration,
        integrations::delete_integration,
        webhooks::verify,
        webhooks::receive
    ),
    components(schemas(
        health::HealthResponse,
        health::StorageStatus,
        teams::CreateTeamRequest,
        teams::SetPlanRequest,
        teams::TeamResponse,
        teams::UsageResponse,
        chatbots::CreateChatbotRequest,
        chatbots::UpdateChatbotRequest,
        chatbots::ChatbotResponse,
        files::CreateFileRequest,
        files::FileResponse,
        chat::WidgetChatRequest,
        chat::WidgetChatResponse,
        conversations::ConversationResponse,
        conversations::ListConversationsResponse,
        conversations::MessageResponse,
        conversations::ConversationDetailResponse,
        conversations::TakeoverRequest,
        conversations::AgentReplyRequest,
        flows::UpsertFlowRequest,
        flows::FlowResponse,
        integrations::ConnectChannelRequest,
        integrations::UpdateIntegrationRequest,
        integrations::IntegrationResponse
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health"),
        (name = "teams", description = "Tenants, plans and usage"),
        (name = "chatbots"),
        (name = "files", description = "Knowledge dataset documents"),
        (name = "chat", description = "Public website widget"),
        (name = "conversations"),
        (name = "flows", description = "Scripted question flows"),
        (name = "integrations", description = "Meta channel connections"),
        (name = "webhooks")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "team_key",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
            components.add_security_scheme(
                "admin_token",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(crate::auth::ADMIN_TOKEN_HEADER))),
            );
        }
    }
}
