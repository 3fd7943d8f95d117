use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chatsa_flow::EngineError;
use chatsa_persist::PersistError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Message quota exceeded for this billing period")]
    QuotaExceeded,

    #[error("Persistence error: {0}")]
    Persist(PersistError),

    #[error("Upstream service error: {0}")]
    Upstream(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<PersistError> for ApiError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            other => ApiError::Persist(other),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            EngineError::QuotaExceeded => ApiError::QuotaExceeded,
            EngineError::InvalidFlow(msg) => ApiError::BadRequest(msg),
            EngineError::ProviderUnavailable(provider) => {
                ApiError::Config(format!("no API key configured for LLM provider {}", provider))
            }
            EngineError::Persist(e) => e.into(),
            EngineError::Provider(e) => ApiError::Upstream(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Forbidden(_) | ApiError::QuotaExceeded => {
                (StatusCode::FORBIDDEN, self.to_string())
            }
            ApiError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            ApiError::Persist(ref e) => {
                tracing::error!("Persistence error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
            }
            ApiError::Upstream(ref e) => {
                tracing::error!("Upstream error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Processing error".to_string())
            }
            ApiError::Config(ref msg) => {
                tracing::error!("Config error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error".to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
