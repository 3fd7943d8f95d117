use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
};
use chatsa_integrations::meta::{parse_webhook, verify_signature, WebhookPayload, SIGNATURE_HEADER};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Meta's subscription handshake parameters
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Echo `hub.challenge` when the verify token matches
#[utoipa::path(
    get,
    path = "/webhooks/meta",
    params(VerifyQuery),
    responses(
        (status = 200, description = "Challenge echoed", body = String),
        (status = 403, description = "Verify token mismatch")
    ),
    tag = "webhooks"
)]
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyQuery>,
) -> ApiResult<String> {
    let expected = state.config.meta_verify_token.as_str();
    let token_ok = !expected.is_empty() && query.verify_token.as_deref() == Some(expected);

    match (query.mode.as_deref(), query.challenge) {
        (Some("subscribe"), Some(challenge)) if token_ok => {
            tracing::info!("Meta webhook subscription verified");
            Ok(challenge)
        }
        _ => {
            tracing::warn!("Meta webhook verification rejected");
            Err(ApiError::Forbidden("Verification failed".to_string()))
        }
    }
}

/// Inbound WhatsApp, Messenger and Instagram events
///
/// Events are processed before responding. Failures of individual events are
/// logged and still acknowledged; redeliveries are dropped by dedup.
#[utoipa::path(
    post,
    path = "/webhooks/meta",
    request_body(content = Object, description = "Meta webhook payload"),
    responses(
        (status = 200, description = "Events accepted", body = String),
        (status = 400, description = "Malformed payload"),
        (status = 401, description = "Bad or missing signature")
    ),
    tag = "webhooks"
)]
pub async fn receive(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, &'static str)> {
    if state.config.meta.verify_signature {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let secret = state.config.meta_app_secret.as_str();
        if secret.is_empty() || !verify_signature(secret, &body, signature) {
            tracing::warn!("Rejected Meta webhook with invalid signature");
            return Err(ApiError::Unauthorized("Invalid signature".to_string()));
        }
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("malformed webhook payload: {}", e)))?;

    let events = parse_webhook(&payload);
    tracing::debug!(object = %payload.object, events = events.len(), "Meta webhook received");

    for event in events {
        let channel = event.channel();
        let message_id = event.message_id().to_string();
        match state.engine.handle_event(event).await {
            Ok(outcome) => {
                tracing::info!(channel = %channel, message_id = %message_id, outcome = ?outcome, "Webhook event handled");
            }
            Err(e) => {
                tracing::warn!(channel = %channel, message_id = %message_id, error = %e, "Webhook event failed");
            }
        }
    }

    Ok((StatusCode::OK, "EVENT_RECEIVED"))
}
