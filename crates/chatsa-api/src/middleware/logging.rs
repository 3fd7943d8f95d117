use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::Instrument;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request logging middleware
///
/// Reuses the caller's `x-request-id` or assigns one, echoes it on the
/// response and logs method, path, status and latency under it.
pub async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let start = Instant::now();

    let span = tracing::info_span!("request", request_id = %request_id);
    let mut response = next.run(req).instrument(span.clone()).await;

    let duration = start.elapsed();
    let status = response.status();

    span.in_scope(|| {
        if status.is_server_error() {
            tracing::warn!(
                method = %method,
                path = %path,
                status = %status,
                duration_ms = %duration.as_millis(),
                "Request failed"
            );
        } else {
            tracing::info!(
                method = %method,
                path = %path,
                status = %status,
                duration_ms = %duration.as_millis(),
                "Request processed"
            );
        }
    });

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
