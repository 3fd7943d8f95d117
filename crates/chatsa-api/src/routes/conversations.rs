use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chatsa_types::{Conversation, ConversationMessage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::{owned_chatbot, owned_conversation, TeamAuth},
    error::{ApiError, ApiResult},
    state::AppState,
};

const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListConversationsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationResponse {
    pub id: String,
    pub chatbot_id: String,
    pub channel: String,
    pub external_user_id: String,
    pub human_takeover: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub human_takeover_at: Option<DateTime<Utc>>,
    pub in_flow: bool,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListConversationsResponse {
    pub conversations: Vec<ConversationResponse>,
    pub has_more: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub id: String,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationDetailResponse {
    pub conversation: ConversationResponse,
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TakeoverRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AgentReplyRequest {
    pub text: String,
}

/// Conversations of a chatbot, most recent activity first
#[utoipa::path(
    get,
    path = "/chatbots/{chatbot_id}/conversations",
    params(
        ("chatbot_id" = String, Path, description = "Chatbot ID"),
        ListConversationsQuery
    ),
    responses(
        (status = 200, description = "Conversations", body = ListConversationsResponse),
        (status = 404, description = "Chatbot not found")
    ),
    tag = "conversations"
)]
pub async fn list_conversations(
    TeamAuth(team): TeamAuth,
    State(state): State<Arc<AppState>>,
    Path(chatbot_id): Path<String>,
    Query(query): Query<ListConversationsQuery>,
) -> ApiResult<Json<ListConversationsResponse>> {
    let chatbot = owned_chatbot(&state, &team, &chatbot_id).await?;
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);

    let conversations = state
        .persist
        .list_conversations(&chatbot.id, Some(limit), Some(query.offset))
        .await?;

    let has_more = conversations.len() as i64 == limit;
    Ok(Json(ListConversationsResponse {
        conversations: conversations.into_iter().map(conversation_to_response).collect(),
        has_more,
    }))
}

/// A conversation with its full transcript
#[utoipa::path(
    get,
    path = "/conversations/{conversation_id}",
    params(("conversation_id" = String, Path, description = "Conversation ID")),
    responses(
        (status = 200, description = "Conversation and messages", body = ConversationDetailResponse),
        (status = 403, description = "Conversation belongs to another team"),
        (status = 404, description = "Conversation not found")
    ),
    tag = "conversations"
)]
pub async fn get_conversation(
    TeamAuth(team): TeamAuth,
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> ApiResult<Json<ConversationDetailResponse>> {
    let conversation = owned_conversation(&state, &team, &conversation_id).await?;
    let messages = state.persist.get_messages(&conversation.id).await?;

    Ok(Json(ConversationDetailResponse {
        conversation: conversation_to_response(conversation),
        messages: messages.into_iter().map(message_to_response).collect(),
    }))
}

/// Switch automatic replies off (human agent) or back on
#[utoipa::path(
    post,
    path = "/conversations/{conversation_id}/takeover",
    params(("conversation_id" = String, Path, description = "Conversation ID")),
    request_body = TakeoverRequest,
    responses(
        (status = 200, description = "Takeover updated", body = ConversationResponse),
        (status = 404, description = "Conversation not found")
    ),
    tag = "conversations"
)]
pub async fn set_takeover(
    TeamAuth(team): TeamAuth,
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    Json(req): Json<TakeoverRequest>,
) -> ApiResult<Json<ConversationResponse>> {
    owned_conversation(&state, &team, &conversation_id).await?;
    let conversation = state.engine.set_takeover(&conversation_id, req.enabled).await?;
    Ok(Json(conversation_to_response(conversation)))
}

/// Reply as a human agent; delivered on the conversation's channel
#[utoipa::path(
    post,
    path = "/conversations/{conversation_id}/reply",
    params(("conversation_id" = String, Path, description = "Conversation ID")),
    request_body = AgentReplyRequest,
    responses(
        (status = 201, description = "Reply sent", body = MessageResponse),
        (status = 400, description = "Empty reply"),
        (status = 404, description = "Conversation or channel integration not found")
    ),
    tag = "conversations"
)]
pub async fn agent_reply(
    TeamAuth(team): TeamAuth,
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    Json(req): Json<AgentReplyRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("text is required".to_string()));
    }
    owned_conversation(&state, &team, &conversation_id).await?;

    let message = state.engine.agent_reply(&conversation_id, text).await?;
    Ok((StatusCode::CREATED, Json(message_to_response(message))))
}

fn conversation_to_response(conversation: Conversation) -> ConversationResponse {
    ConversationResponse {
        in_flow: conversation.flow_cursor.is_some(),
        id: conversation.id,
        chatbot_id: conversation.chatbot_id,
        channel: conversation.channel.as_str().to_string(),
        external_user_id: conversation.external_user_id,
        human_takeover: conversation.human_takeover,
        human_takeover_at: conversation.human_takeover_at,
        created_at: conversation.created_at,
        last_message_at: conversation.last_message_at,
    }
}

fn message_to_response(message: ConversationMessage) -> MessageResponse {
    MessageResponse {
        id: message.id,
        role: message.role.as_str().to_string(),
        content: message.content,
        created_at: message.created_at,
    }
}
