use axum::{extract::State, http::StatusCode, Json};
use chatsa_types::{Plan, Team};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    auth::{AdminAuth, TeamAuth},
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTeamRequest {
    pub name: String,
    pub owner_email: String,
    /// free, starter, pro or business; defaults to free
    #[serde(default)]
    pub plan: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetPlanRequest {
    pub team_id: String,
    pub plan: String,
    #[serde(default)]
    pub stripe_customer_id: Option<String>,
    #[serde(default)]
    pub stripe_subscription_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TeamResponse {
    pub id: String,
    pub name: String,
    pub owner_email: String,
    pub plan: String,
    /// Only returned when the team is created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub usage: UsageResponse,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsageResponse {
    pub messages_used: u64,
    pub message_credits: u64,
    pub remaining_credits: u64,
    pub max_chatbots: usize,
    pub period_started_at: DateTime<Utc>,
}

fn parse_plan(plan: &str) -> ApiResult<Plan> {
    plan.parse::<Plan>().map_err(ApiError::BadRequest)
}

/// Create a team and issue its API key
#[utoipa::path(
    post,
    path = "/teams",
    request_body = CreateTeamRequest,
    responses(
        (status = 201, description = "Team created", body = TeamResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Invalid admin token")
    ),
    tag = "teams"
)]
pub async fn create_team(
    _admin: AdminAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTeamRequest>,
) -> ApiResult<(StatusCode, Json<TeamResponse>)> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    if !req.owner_email.contains('@') {
        return Err(ApiError::BadRequest("owner_email must be an email address".to_string()));
    }

    let mut team = Team::new(req.name.trim(), req.owner_email.trim());
    if let Some(plan) = req.plan.as_deref() {
        team.plan = parse_plan(plan)?;
    }
    state.persist.save_team(&team).await?;
    tracing::info!(team_id = %team.id, plan = %team.plan.as_str(), "Team created");

    let mut response = team_to_response(&team);
    response.api_key = Some(team.api_key);
    Ok((StatusCode::CREATED, Json(response)))
}

/// The calling team with its plan and usage
#[utoipa::path(
    get,
    path = "/team",
    responses(
        (status = 200, description = "Team details", body = TeamResponse),
        (status = 401, description = "Missing or invalid API key")
    ),
    tag = "teams"
)]
pub async fn get_team(TeamAuth(team): TeamAuth) -> Json<TeamResponse> {
    Json(team_to_response(&team))
}

/// Change a team's plan, e.g. from a billing webhook relay
#[utoipa::path(
    put,
    path = "/team/plan",
    request_body = SetPlanRequest,
    responses(
        (status = 200, description = "Plan updated", body = TeamResponse),
        (status = 400, description = "Unknown plan"),
        (status = 401, description = "Invalid admin token"),
        (status = 404, description = "Team not found")
    ),
    tag = "teams"
)]
pub async fn set_plan(
    _admin: AdminAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetPlanRequest>,
) -> ApiResult<Json<TeamResponse>> {
    let plan = parse_plan(&req.plan)?;
    let mut team = state
        .persist
        .get_team(&req.team_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Team not found: {}", req.team_id)))?;

    team.plan = plan;
    if req.stripe_customer_id.is_some() {
        team.stripe_customer_id = req.stripe_customer_id;
    }
    if req.stripe_subscription_id.is_some() {
        team.stripe_subscription_id = req.stripe_subscription_id;
    }
    team.updated_at = Utc::now();
    state.persist.save_team(&team).await?;
    tracing::info!(team_id = %team.id, plan = %plan.as_str(), "Team plan changed");

    Ok(Json(team_to_response(&team)))
}

fn team_to_response(team: &Team) -> TeamResponse {
    let limits = team.plan.limits();
    TeamResponse {
        id: team.id.clone(),
        name: team.name.clone(),
        owner_email: team.owner_email.clone(),
        plan: team.plan.as_str().to_string(),
        api_key: None,
        usage: UsageResponse {
            messages_used: team.messages_used,
            message_credits: limits.message_credits,
            remaining_credits: team.remaining_credits(),
            max_chatbots: limits.max_chatbots,
            period_started_at: team.period_started_at,
        },
        created_at: team.created_at,
    }
}
