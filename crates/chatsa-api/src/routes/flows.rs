use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chatsa_types::{FlowEdge, FlowNode, QuestionFlow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    auth::{owned_chatbot, TeamAuth},
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Create a flow, or replace it when `id` names an existing one
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpsertFlowRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Empty makes this the default flow for new conversations
    #[serde(default)]
    pub trigger_keywords: Vec<String>,
    #[schema(value_type = Vec<Object>)]
    pub nodes: Vec<FlowNode>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub edges: Vec<FlowEdge>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FlowResponse {
    pub id: String,
    pub chatbot_id: String,
    pub name: String,
    pub enabled: bool,
    pub trigger_keywords: Vec<String>,
    #[schema(value_type = Vec<Object>)]
    pub nodes: Vec<FlowNode>,
    #[schema(value_type = Vec<Object>)]
    pub edges: Vec<FlowEdge>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<QuestionFlow> for FlowResponse {
    fn from(flow: QuestionFlow) -> Self {
        Self {
            id: flow.id,
            chatbot_id: flow.chatbot_id,
            name: flow.name,
            enabled: flow.enabled,
            trigger_keywords: flow.trigger_keywords,
            nodes: flow.nodes,
            edges: flow.edges,
            created_at: flow.created_at,
            updated_at: flow.updated_at,
        }
    }
}

#[utoipa::path(
    put,
    path = "/chatbots/{chatbot_id}/flows",
    params(("chatbot_id" = String, Path, description = "Chatbot ID")),
    request_body = UpsertFlowRequest,
    responses(
        (status = 201, description = "Flow created", body = FlowResponse),
        (status = 200, description = "Flow replaced", body = FlowResponse),
        (status = 400, description = "Invalid flow graph"),
        (status = 404, description = "Chatbot or flow not found")
    ),
    tag = "flows"
)]
pub async fn upsert_flow(
    TeamAuth(team): TeamAuth,
    State(state): State<Arc<AppState>>,
    Path(chatbot_id): Path<String>,
    Json(req): Json<UpsertFlowRequest>,
) -> ApiResult<(StatusCode, Json<FlowResponse>)> {
    let chatbot = owned_chatbot(&state, &team, &chatbot_id).await?;

    let existing = match req.id.as_deref() {
        Some(id) => Some(
            state
                .persist
                .get_flow(id)
                .await?
                .filter(|f| f.chatbot_id == chatbot.id)
                .ok_or_else(|| ApiError::NotFound(format!("Flow not found: {}", id)))?,
        ),
        None => None,
    };

    let mut flow = QuestionFlow::new(&chatbot.id, req.name.trim(), req.nodes, req.edges)
        .with_triggers(
            req.trigger_keywords
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
        );
    flow.enabled = req.enabled;

    let status = match &existing {
        Some(previous) => {
            flow.id = previous.id.clone();
            flow.created_at = previous.created_at;
            StatusCode::OK
        }
        None => StatusCode::CREATED,
    };

    chatsa_flow::validate(&flow)?;
    state.persist.save_flow(&flow).await?;
    tracing::info!(flow_id = %flow.id, chatbot_id = %chatbot.id, "Flow saved");

    Ok((status, Json(flow.into())))
}

#[utoipa::path(
    get,
    path = "/chatbots/{chatbot_id}/flows",
    params(("chatbot_id" = String, Path, description = "Chatbot ID")),
    responses(
        (status = 200, description = "Flows", body = [FlowResponse]),
        (status = 404, description = "Chatbot not found")
    ),
    tag = "flows"
)]
pub async fn list_flows(
    TeamAuth(team): TeamAuth,
    State(state): State<Arc<AppState>>,
    Path(chatbot_id): Path<String>,
) -> ApiResult<Json<Vec<FlowResponse>>> {
    let chatbot = owned_chatbot(&state, &team, &chatbot_id).await?;
    let flows = state.persist.list_flows(&chatbot.id).await?;
    Ok(Json(flows.into_iter().map(FlowResponse::from).collect()))
}

#[utoipa::path(
    delete,
    path = "/chatbots/{chatbot_id}/flows/{flow_id}",
    params(
        ("chatbot_id" = String, Path, description = "Chatbot ID"),
        ("flow_id" = String, Path, description = "Flow ID")
    ),
    responses(
        (status = 204, description = "Flow deleted"),
        (status = 404, description = "Flow not found")
    ),
    tag = "flows"
)]
pub async fn delete_flow(
    TeamAuth(team): TeamAuth,
    State(state): State<Arc<AppState>>,
    Path((chatbot_id, flow_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let chatbot = owned_chatbot(&state, &team, &chatbot_id).await?;
    state
        .persist
        .get_flow(&flow_id)
        .await?
        .filter(|f| f.chatbot_id == chatbot.id)
        .ok_or_else(|| ApiError::NotFound(format!("Flow not found: {}", flow_id)))?;

    state.persist.delete_flow(&flow_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
