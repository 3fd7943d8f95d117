use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chatsa_types::{Channel, Integration, Team};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    auth::{owned_chatbot, TeamAuth},
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConnectChannelRequest {
    /// whatsapp, messenger or instagram
    #[schema(value_type = String)]
    pub channel: Channel,
    /// Phone-number id, page id or Instagram account id
    pub account_id: String,
    pub access_token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateIntegrationRequest {
    pub enabled: bool,
}

/// Integration without its access token
#[derive(Debug, Serialize, ToSchema)]
pub struct IntegrationResponse {
    pub id: String,
    pub chatbot_id: String,
    pub channel: String,
    pub account_id: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Integration> for IntegrationResponse {
    fn from(integration: Integration) -> Self {
        Self {
            id: integration.id,
            chatbot_id: integration.chatbot_id,
            channel: integration.channel.as_str().to_string(),
            account_id: integration.account_id,
            enabled: integration.enabled,
            created_at: integration.created_at,
            updated_at: integration.updated_at,
        }
    }
}

/// Connect a Meta channel account to a chatbot and subscribe our app to its
/// webhooks
#[utoipa::path(
    post,
    path = "/chatbots/{chatbot_id}/integrations",
    params(("chatbot_id" = String, Path, description = "Chatbot ID")),
    request_body = ConnectChannelRequest,
    responses(
        (status = 201, description = "Channel connected", body = IntegrationResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Account connected by another team")
    ),
    tag = "integrations"
)]
pub async fn connect_channel(
    TeamAuth(team): TeamAuth,
    State(state): State<Arc<AppState>>,
    Path(chatbot_id): Path<String>,
    Json(req): Json<ConnectChannelRequest>,
) -> ApiResult<(StatusCode, Json<IntegrationResponse>)> {
    let chatbot = owned_chatbot(&state, &team, &chatbot_id).await?;

    if !req.channel.is_meta() {
        return Err(ApiError::BadRequest("the web channel needs no integration".to_string()));
    }
    let account_id = req.account_id.trim();
    let access_token = req.access_token.trim();
    if account_id.is_empty() || access_token.is_empty() {
        return Err(ApiError::BadRequest("account_id and access_token are required".to_string()));
    }

    let integration = match state.persist.find_integration(req.channel, account_id).await? {
        Some(existing) if existing.team_id != team.id => {
            return Err(ApiError::Conflict(format!(
                "{} account {} is connected by another team",
                req.channel, account_id
            )));
        }
        Some(mut existing) => {
            existing.chatbot_id = chatbot.id.clone();
            existing.access_token = access_token.to_string();
            existing.enabled = true;
            existing.updated_at = Utc::now();
            existing
        }
        None => Integration::new(&team.id, &chatbot.id, req.channel, account_id, access_token),
    };

    state
        .messenger
        .subscribe_app(integration.channel, &integration.account_id, &integration.access_token)
        .await?;
    state.persist.save_integration(&integration).await?;
    tracing::info!(
        integration_id = %integration.id,
        channel = %integration.channel,
        chatbot_id = %chatbot.id,
        "Channel connected"
    );

    Ok((StatusCode::CREATED, Json(integration.into())))
}

#[utoipa::path(
    get,
    path = "/chatbots/{chatbot_id}/integrations",
    params(("chatbot_id" = String, Path, description = "Chatbot ID")),
    responses(
        (status = 200, description = "Integrations", body = [IntegrationResponse]),
        (status = 404, description = "Chatbot not found")
    ),
    tag = "integrations"
)]
pub async fn list_integrations(
    TeamAuth(team): TeamAuth,
    State(state): State<Arc<AppState>>,
    Path(chatbot_id): Path<String>,
) -> ApiResult<Json<Vec<IntegrationResponse>>> {
    let chatbot = owned_chatbot(&state, &team, &chatbot_id).await?;
    let integrations = state.persist.list_integrations(&chatbot.id).await?;
    Ok(Json(integrations.into_iter().map(IntegrationResponse::from).collect()))
}

async fn owned_integration(state: &AppState, team: &Team, integration_id: &str) -> ApiResult<Integration> {
    let integration = state
        .persist
        .get_integration(integration_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Integration not found: {}", integration_id)))?;
    if integration.team_id != team.id {
        return Err(ApiError::Forbidden("Integration belongs to another team".to_string()));
    }
    Ok(integration)
}

/// Pause or resume automatic replies on a channel
#[utoipa::path(
    patch,
    path = "/integrations/{integration_id}",
    params(("integration_id" = String, Path, description = "Integration ID")),
    request_body = UpdateIntegrationRequest,
    responses(
        (status = 200, description = "Integration updated", body = IntegrationResponse),
        (status = 404, description = "Integration not found")
    ),
    tag = "integrations"
)]
pub async fn update_integration(
    TeamAuth(team): TeamAuth,
    State(state): State<Arc<AppState>>,
    Path(integration_id): Path<String>,
    Json(req): Json<UpdateIntegrationRequest>,
) -> ApiResult<Json<IntegrationResponse>> {
    let mut integration = owned_integration(&state, &team, &integration_id).await?;
    integration.enabled = req.enabled;
    integration.updated_at = Utc::now();
    state.persist.save_integration(&integration).await?;
    Ok(Json(integration.into()))
}

#[utoipa::path(
    delete,
    path = "/integrations/{integration_id}",
    params(("integration_id" = String, Path, description = "Integration ID")),
    responses(
        (status = 204, description = "Integration removed"),
        (status = 404, description = "Integration not found")
    ),
    tag = "integrations"
)]
pub async fn delete_integration(
    TeamAuth(team): TeamAuth,
    State(state): State<Arc<AppState>>,
    Path(integration_id): Path<String>,
) -> ApiResult<StatusCode> {
    let integration = owned_integration(&state, &team, &integration_id).await?;
    state.persist.delete_integration(&integration.id).await?;
    tracing::info!(integration_id = %integration.id, "Integration removed");
    Ok(StatusCode::NO_CONTENT)
}
