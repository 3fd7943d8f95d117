use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub storage: StorageStatus,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StorageStatus {
    pub backend: String,
    pub connected: bool,
}

/// Health check endpoint
///
/// Reports "degraded" when the storage backend does not answer a ping
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let connected = match state.persist.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Storage ping failed");
            false
        }
    };

    Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: StorageStatus {
            backend: state.persist.backend_name().to_string(),
            connected,
        },
    })
}
