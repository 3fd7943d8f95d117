use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chatsa_types::{Chatbot, Conversation, Team};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Team resolved from `Authorization: Bearer <key>` or `x-api-key`
pub struct TeamAuth(pub Team);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for TeamAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> ApiResult<Self> {
        let key = bearer_token(parts)
            .or_else(|| header_str(parts, API_KEY_HEADER))
            .ok_or_else(|| ApiError::Unauthorized("Missing API key".to_string()))?;

        let team = state
            .persist
            .find_team_by_api_key(key)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Invalid API key".to_string()))?;

        Ok(TeamAuth(team))
    }
}

/// Operator access via `x-admin-token`
pub struct AdminAuth;

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> ApiResult<Self> {
        let expected = state.config.admin_token.as_str();
        match header_str(parts, ADMIN_TOKEN_HEADER) {
            Some(token) if !expected.is_empty() && token == expected => Ok(AdminAuth),
            _ => Err(ApiError::Unauthorized("Invalid admin token".to_string())),
        }
    }
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    header_str(parts, AUTHORIZATION.as_str())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Load a chatbot owned by `team`
pub async fn owned_chatbot(state: &AppState, team: &Team, chatbot_id: &str) -> ApiResult<Chatbot> {
    let chatbot = state
        .persist
        .get_chatbot(chatbot_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Chatbot not found: {}", chatbot_id)))?;

    if chatbot.team_id != team.id {
        return Err(ApiError::Forbidden("Chatbot belongs to another team".to_string()));
    }
    Ok(chatbot)
}

/// Load a conversation whose chatbot is owned by `team`
pub async fn owned_conversation(
    state: &AppState,
    team: &Team,
    conversation_id: &str,
) -> ApiResult<Conversation> {
    let conversation = state
        .persist
        .get_conversation(conversation_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Conversation not found: {}", conversation_id)))?;

    owned_chatbot(state, team, &conversation.chatbot_id)
        .await
        .map_err(|e| match e {
            ApiError::NotFound(_) => ApiError::NotFound(format!("Conversation not found: {}", conversation_id)),
            other => other,
        })?;
    Ok(conversation)
}
