use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chatsa_llm::ProviderType;
use chatsa_types::{Chatbot, ChatbotSettings};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    auth::{owned_chatbot, TeamAuth},
    error::{ApiError, ApiResult},
    state::AppState,
};

const MAX_CONTEXT_CHUNKS: u32 = 20;
const MAX_HISTORY_MESSAGES: u32 = 50;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateChatbotRequest {
    pub name: String,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub settings: Option<ChatbotSettings>,
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateChatbotRequest {
    pub name: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub system_prompt: Option<String>,
    pub welcome_message: Option<String>,
    pub context_chunks: Option<u32>,
    pub history_messages: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatbotResponse {
    pub id: String,
    pub team_id: String,
    pub name: String,
    pub dataset_id: String,
    #[schema(value_type = Object)]
    pub settings: ChatbotSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Chatbot> for ChatbotResponse {
    fn from(chatbot: Chatbot) -> Self {
        Self {
            id: chatbot.id,
            team_id: chatbot.team_id,
            name: chatbot.name,
            dataset_id: chatbot.dataset_id,
            settings: chatbot.settings,
            created_at: chatbot.created_at,
            updated_at: chatbot.updated_at,
        }
    }
}

fn validate_settings(settings: &ChatbotSettings) -> ApiResult<()> {
    if settings.model.trim().is_empty() {
        return Err(ApiError::BadRequest("model is required".to_string()));
    }
    if !(0.0..=2.0).contains(&settings.temperature) {
        return Err(ApiError::BadRequest("temperature must be between 0 and 2".to_string()));
    }
    if settings.context_chunks > MAX_CONTEXT_CHUNKS {
        return Err(ApiError::BadRequest(format!(
            "context_chunks must be at most {}",
            MAX_CONTEXT_CHUNKS
        )));
    }
    if settings.history_messages > MAX_HISTORY_MESSAGES {
        return Err(ApiError::BadRequest(format!(
            "history_messages must be at most {}",
            MAX_HISTORY_MESSAGES
        )));
    }
    Ok(())
}

/// Create a chatbot and its knowledge dataset
#[utoipa::path(
    post,
    path = "/chatbots",
    request_body = CreateChatbotRequest,
    responses(
        (status = 201, description = "Chatbot created", body = ChatbotResponse),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Plan chatbot limit reached")
    ),
    tag = "chatbots"
)]
pub async fn create_chatbot(
    TeamAuth(team): TeamAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateChatbotRequest>,
) -> ApiResult<(StatusCode, Json<ChatbotResponse>)> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    let settings = req.settings.unwrap_or_default();
    validate_settings(&settings)?;

    let max_chatbots = team.plan.limits().max_chatbots;
    if state.persist.count_chatbots(&team.id).await? >= max_chatbots {
        return Err(ApiError::Forbidden(format!(
            "The {} plan allows {} chatbot(s)",
            team.plan.as_str(),
            max_chatbots
        )));
    }

    let dataset_id = state
        .knowledge
        .create_dataset(&format!("{}-{}", team.id, name))
        .await?;

    let chatbot = Chatbot::new(&team.id, name, dataset_id, settings);
    state.persist.save_chatbot(&chatbot).await?;
    tracing::info!(chatbot_id = %chatbot.id, team_id = %team.id, "Chatbot created");

    Ok((StatusCode::CREATED, Json(chatbot.into())))
}

/// List the team's chatbots
#[utoipa::path(
    get,
    path = "/chatbots",
    responses(
        (status = 200, description = "Chatbots", body = [ChatbotResponse])
    ),
    tag = "chatbots"
)]
pub async fn list_chatbots(
    TeamAuth(team): TeamAuth,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<ChatbotResponse>>> {
    let chatbots = state.persist.list_chatbots(&team.id).await?;
    Ok(Json(chatbots.into_iter().map(ChatbotResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/chatbots/{chatbot_id}",
    params(("chatbot_id" = String, Path, description = "Chatbot ID")),
    responses(
        (status = 200, description = "Chatbot", body = ChatbotResponse),
        (status = 403, description = "Chatbot belongs to another team"),
        (status = 404, description = "Chatbot not found")
    ),
    tag = "chatbots"
)]
pub async fn get_chatbot(
    TeamAuth(team): TeamAuth,
    State(state): State<Arc<AppState>>,
    Path(chatbot_id): Path<String>,
) -> ApiResult<Json<ChatbotResponse>> {
    let chatbot = owned_chatbot(&state, &team, &chatbot_id).await?;
    Ok(Json(chatbot.into()))
}

#[utoipa::path(
    patch,
    path = "/chatbots/{chatbot_id}",
    params(("chatbot_id" = String, Path, description = "Chatbot ID")),
    request_body = UpdateChatbotRequest,
    responses(
        (status = 200, description = "Chatbot updated", body = ChatbotResponse),
        (status = 400, description = "Invalid settings"),
        (status = 404, description = "Chatbot not found")
    ),
    tag = "chatbots"
)]
pub async fn update_chatbot(
    TeamAuth(team): TeamAuth,
    State(state): State<Arc<AppState>>,
    Path(chatbot_id): Path<String>,
    Json(req): Json<UpdateChatbotRequest>,
) -> ApiResult<Json<ChatbotResponse>> {
    let mut chatbot = owned_chatbot(&state, &team, &chatbot_id).await?;

    if let Some(name) = req.name {
        if name.trim().is_empty() {
            return Err(ApiError::BadRequest("name must not be empty".to_string()));
        }
        chatbot.name = name.trim().to_string();
    }

    let settings = &mut chatbot.settings;
    if let Some(provider) = req.provider {
        settings.provider = provider
            .parse::<ProviderType>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    }
    if let Some(model) = req.model {
        settings.model = model;
    }
    if let Some(temperature) = req.temperature {
        settings.temperature = temperature;
    }
    if let Some(prompt) = req.system_prompt {
        settings.system_prompt = prompt;
    }
    if let Some(welcome) = req.welcome_message {
        settings.welcome_message = Some(welcome).filter(|w| !w.trim().is_empty());
    }
    if let Some(chunks) = req.context_chunks {
        settings.context_chunks = chunks;
    }
    if let Some(history) = req.history_messages {
        settings.history_messages = history;
    }
    validate_settings(settings)?;

    chatbot.updated_at = Utc::now();
    state.persist.save_chatbot(&chatbot).await?;
    Ok(Json(chatbot.into()))
}

/// Delete a chatbot with its dataset, files, conversations, flows and
/// integrations
#[utoipa::path(
    delete,
    path = "/chatbots/{chatbot_id}",
    params(("chatbot_id" = String, Path, description = "Chatbot ID")),
    responses(
        (status = 204, description = "Chatbot deleted"),
        (status = 404, description = "Chatbot not found")
    ),
    tag = "chatbots"
)]
pub async fn delete_chatbot(
    TeamAuth(team): TeamAuth,
    State(state): State<Arc<AppState>>,
    Path(chatbot_id): Path<String>,
) -> ApiResult<StatusCode> {
    let chatbot = owned_chatbot(&state, &team, &chatbot_id).await?;

    if let Err(e) = state.knowledge.delete_dataset(&chatbot.dataset_id).await {
        tracing::warn!(chatbot_id = %chatbot.id, error = %e, "Failed to delete knowledge dataset");
    }
    state.persist.delete_chatbot(&chatbot.id).await?;
    tracing::info!(chatbot_id = %chatbot.id, "Chatbot deleted");

    Ok(StatusCode::NO_CONTENT)
}
