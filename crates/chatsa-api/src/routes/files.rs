use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chatsa_integrations::FileUpload;
use chatsa_types::{DatasetFile, FileSource, FileStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    auth::{owned_chatbot, TeamAuth},
    error::{ApiError, ApiResult},
    state::AppState,
};

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Document to add to a chatbot's dataset
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CreateFileRequest {
    /// Plain text stored as a single chunk
    Text { name: String, text: String },
    /// Web page fetched and parsed by the knowledge provider
    Url { url: String },
    /// Base64-encoded document (PDF, DOCX, TXT, ...)
    Upload {
        name: String,
        content_base64: String,
        #[serde(default)]
        content_type: Option<String>,
    },
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FileResponse {
    pub id: String,
    pub chatbot_id: String,
    pub name: String,
    #[schema(value_type = Object)]
    pub source: FileSource,
    #[schema(value_type = String)]
    pub status: FileStatus,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DatasetFile> for FileResponse {
    fn from(file: DatasetFile) -> Self {
        Self {
            id: file.id,
            chatbot_id: file.chatbot_id,
            name: file.name,
            source: file.source,
            status: file.status,
            size_bytes: file.size_bytes,
            error: file.error,
            created_at: file.created_at,
        }
    }
}

/// Ingest a document into the chatbot's dataset
#[utoipa::path(
    post,
    path = "/chatbots/{chatbot_id}/files",
    params(("chatbot_id" = String, Path, description = "Chatbot ID")),
    request_body = CreateFileRequest,
    responses(
        (status = 201, description = "File ingested", body = FileResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Chatbot not found"),
        (status = 500, description = "Knowledge provider rejected the document")
    ),
    tag = "files"
)]
pub async fn create_file(
    TeamAuth(team): TeamAuth,
    State(state): State<Arc<AppState>>,
    Path(chatbot_id): Path<String>,
    Json(req): Json<CreateFileRequest>,
) -> ApiResult<(StatusCode, Json<FileResponse>)> {
    let chatbot = owned_chatbot(&state, &team, &chatbot_id).await?;
    let dataset = chatbot.dataset_id.as_str();
    let knowledge = &state.knowledge;

    let (mut file, ingested) = match req {
        CreateFileRequest::Text { name, text } => {
            if name.trim().is_empty() || text.trim().is_empty() {
                return Err(ApiError::BadRequest("name and text are required".to_string()));
            }
            let file = DatasetFile::new(&chatbot.id, &team.id, name.trim(), FileSource::Text, text.len() as u64);
            let result = knowledge.add_text(dataset, &file.name, &text).await;
            (file, result)
        }
        CreateFileRequest::Url { url } => {
            let url = url.trim().to_string();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ApiError::BadRequest("url must be an http(s) URL".to_string()));
            }
            let file = DatasetFile::new(&chatbot.id, &team.id, &url, FileSource::Url { url: url.clone() }, 0);
            let result = knowledge.ingest_url(dataset, &url).await;
            (file, result)
        }
        CreateFileRequest::Upload { name, content_base64, content_type } => {
            if name.trim().is_empty() {
                return Err(ApiError::BadRequest("name is required".to_string()));
            }
            let bytes = STANDARD
                .decode(content_base64.trim())
                .map_err(|_| ApiError::BadRequest("content_base64 is not valid base64".to_string()))?;
            if bytes.is_empty() {
                return Err(ApiError::BadRequest("file is empty".to_string()));
            }
            if bytes.len() > MAX_UPLOAD_BYTES {
                return Err(ApiError::BadRequest(format!(
                    "file exceeds {} MB",
                    MAX_UPLOAD_BYTES / (1024 * 1024)
                )));
            }
            let file = DatasetFile::new(
                &chatbot.id,
                &team.id,
                name.trim(),
                FileSource::Upload { content_type },
                bytes.len() as u64,
            );
            let result = knowledge.upload_file(dataset, FileUpload::new(&file.name, bytes)).await;
            (file, result)
        }
    };

    match ingested {
        Ok(provider_file_id) => file.mark_ready(provider_file_id),
        Err(e) => {
            file.mark_failed(e.to_string());
            state.persist.save_file(&file).await?;
            return Err(ApiError::Upstream(e.context("knowledge ingestion failed")));
        }
    }

    state.persist.save_file(&file).await?;
    tracing::info!(file_id = %file.id, chatbot_id = %chatbot.id, "File ingested");
    Ok((StatusCode::CREATED, Json(file.into())))
}

#[utoipa::path(
    get,
    path = "/chatbots/{chatbot_id}/files",
    params(("chatbot_id" = String, Path, description = "Chatbot ID")),
    responses(
        (status = 200, description = "Dataset files", body = [FileResponse]),
        (status = 404, description = "Chatbot not found")
    ),
    tag = "files"
)]
pub async fn list_files(
    TeamAuth(team): TeamAuth,
    State(state): State<Arc<AppState>>,
    Path(chatbot_id): Path<String>,
) -> ApiResult<Json<Vec<FileResponse>>> {
    let chatbot = owned_chatbot(&state, &team, &chatbot_id).await?;
    let files = state.persist.list_files(&chatbot.id).await?;
    Ok(Json(files.into_iter().map(FileResponse::from).collect()))
}

#[utoipa::path(
    delete,
    path = "/chatbots/{chatbot_id}/files/{file_id}",
    params(
        ("chatbot_id" = String, Path, description = "Chatbot ID"),
        ("file_id" = String, Path, description = "File ID")
    ),
    responses(
        (status = 204, description = "File removed"),
        (status = 404, description = "File not found")
    ),
    tag = "files"
)]
pub async fn delete_file(
    TeamAuth(team): TeamAuth,
    State(state): State<Arc<AppState>>,
    Path((chatbot_id, file_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let chatbot = owned_chatbot(&state, &team, &chatbot_id).await?;
    let file = state
        .persist
        .get_file(&file_id)
        .await?
        .filter(|f| f.chatbot_id == chatbot.id)
        .ok_or_else(|| ApiError::NotFound(format!("File not found: {}", file_id)))?;

    if let Some(provider_file_id) = &file.provider_file_id {
        state
            .knowledge
            .delete_file(&chatbot.dataset_id, provider_file_id)
            .await?;
    }
    state.persist.delete_file(&file.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
