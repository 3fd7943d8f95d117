use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chatsa_llm::StreamEvent;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Message from the website widget
#[derive(Debug, Deserialize, ToSchema)]
pub struct WidgetChatRequest {
    pub message: String,
    /// Continue an existing widget conversation
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Stable visitor id kept by the widget
    #[serde(default)]
    pub visitor_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WidgetChatResponse {
    pub conversation_id: String,
    /// Absent while a human agent handles the conversation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    pub human_takeover: bool,
}

fn validate(state: &AppState, req: &WidgetChatRequest) -> ApiResult<()> {
    let len = req.message.trim().chars().count();
    if len == 0 {
        return Err(ApiError::BadRequest("message is required".to_string()));
    }
    let max = state.config.engine.max_message_chars;
    if len > max {
        return Err(ApiError::BadRequest(format!("message exceeds {} characters", max)));
    }
    Ok(())
}

/// Widget chat with a JSON reply
#[utoipa::path(
    post,
    path = "/chatbots/{chatbot_id}/chat",
    params(("chatbot_id" = String, Path, description = "Chatbot ID")),
    request_body = WidgetChatRequest,
    responses(
        (status = 200, description = "Answer", body = WidgetChatResponse),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Message quota exhausted"),
        (status = 404, description = "Chatbot or conversation not found")
    ),
    tag = "chat"
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Path(chatbot_id): Path<String>,
    Json(req): Json<WidgetChatRequest>,
) -> ApiResult<Json<WidgetChatResponse>> {
    validate(&state, &req)?;

    let reply = state
        .engine
        .web_chat(
            &chatbot_id,
            req.conversation_id.as_deref(),
            req.visitor_id.as_deref(),
            req.message.trim(),
        )
        .await?;

    Ok(Json(WidgetChatResponse {
        conversation_id: reply.conversation_id,
        reply: reply.reply,
        human_takeover: reply.human_takeover,
    }))
}

/// Widget chat streamed as Server-Sent Events
///
/// Events: `conversation` (ids and takeover flag), then `message` deltas,
/// then `done`; `error` replaces `done` when the provider fails mid-stream.
#[utoipa::path(
    post,
    path = "/chatbots/{chatbot_id}/chat/stream",
    params(("chatbot_id" = String, Path, description = "Chatbot ID")),
    request_body = WidgetChatRequest,
    responses(
        (status = 200, description = "Streaming answer", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Message quota exhausted"),
        (status = 404, description = "Chatbot not found")
    ),
    tag = "chat"
)]
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Path(chatbot_id): Path<String>,
    Json(req): Json<WidgetChatRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    validate(&state, &req)?;

    let answer = state
        .engine
        .web_chat_stream(
            &chatbot_id,
            req.conversation_id.as_deref(),
            req.visitor_id.as_deref(),
            req.message.trim(),
        )
        .await?;

    let opening = Event::default()
        .event("conversation")
        .json_data(serde_json::json!({
            "conversation_id": answer.conversation_id,
            "human_takeover": answer.human_takeover,
        }))
        .unwrap_or_else(|_| Event::default().event("conversation"));

    let events = answer.events.map(|event| {
        let sse_event = match event {
            Ok(StreamEvent::Message { content }) => Event::default()
                .event("message")
                .json_data(serde_json::json!({ "content": content })),
            Ok(StreamEvent::Done { finish_reason }) => Event::default()
                .event("done")
                .json_data(serde_json::json!({ "finish_reason": finish_reason })),
            Err(e) => {
                tracing::error!("Chat stream error: {:#}", e);
                Event::default()
                    .event("error")
                    .json_data(serde_json::json!({ "error": "Processing error" }))
            }
        };
        Ok::<_, Infallible>(sse_event.unwrap_or_else(|_| Event::default().event("error")))
    });

    let sse_stream = stream::once(async move { Ok::<_, Infallible>(opening) }).chain(events);
    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}
