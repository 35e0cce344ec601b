// src/middleware/request_log.rs
// Persist one `ApiRequestLog` row per external API call, whatever its outcome.

use std::time::Instant;

use axum::{
    body::{to_bytes, Body, Bytes, HttpBody},
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::api_key::ApiKeyContext;
use crate::error::AppError;
use crate::models::ApiRequestLog;
use crate::state::AppState;

pub const MAX_BODY_BYTES: usize = 1024 * 1024;
pub const BODY_TOO_LARGE: &str = "Request body too large";

pub async fn log_api_request(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let started = Instant::now();
    let mut entry = ApiRequestLog {
        id: Uuid::new_v4(),
        api_key_id: None,
        endpoint: req.uri().path().to_string(),
        method: req.method().to_string(),
        status_code: 0,
        latency_ms: 0,
        request_body: None,
        response_body: None,
        error: None,
        created_at: Utc::now(),
    };

    let (parts, body) = req.into_parts();
    let request_bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            let response = AppError::validation(BODY_TOO_LARGE).into_response();
            entry.error = Some(BODY_TOO_LARGE.to_string());
            finish(&state, entry, response.status(), started).await;
            return response;
        }
    };
    entry.request_body = body_text(&request_bytes);
    let req = Request::from_parts(parts, Body::from(request_bytes));

    let response = next.run(req).await;
    let status = response.status();
    entry.api_key_id = response
        .extensions()
        .get::<ApiKeyContext>()
        .map(|c| c.api_key.id);

    let (parts, body) = response.into_parts();
    if !fits_in_buffer(&body) {
        // streamed or oversized: pass through untouched, log without the body
        warn!(endpoint = %entry.endpoint, "Response body not captured for request log");
        finish(&state, entry, status, started).await;
        return Response::from_parts(parts, body);
    }

    let response_bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Could not buffer response body for request log");
            entry.error = Some("Response body could not be read".to_string());
            finish(&state, entry, StatusCode::INTERNAL_SERVER_ERROR, started).await;
            return AppError::internal(format!("response body read failed: {e}")).into_response();
        }
    };

    if status.is_client_error() || status.is_server_error() {
        entry.error = error_message(&response_bytes);
    }
    entry.response_body = body_text(&response_bytes);
    finish(&state, entry, status, started).await;

    Response::from_parts(parts, Body::from(response_bytes))
}

async fn finish(state: &AppState, mut entry: ApiRequestLog, status: StatusCode, started: Instant) {
    entry.status_code = i32::from(status.as_u16());
    entry.latency_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

    info!(
        method = %entry.method,
        endpoint = %entry.endpoint,
        status = entry.status_code,
        latency_ms = entry.latency_ms,
        "External API request"
    );
    if let Err(e) = state.engine.store().record_api_request(&entry).await {
        warn!(error = %e, "Failed to record API request");
    }
}

/// Only bodies with a known size within the limit are buffered.
fn fits_in_buffer(body: &Body) -> bool {
    body.size_hint()
        .upper()
        .is_some_and(|n| n <= MAX_BODY_BYTES as u64)
}

fn body_text(bytes: &Bytes) -> Option<String> {
    if bytes.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(bytes).into_owned())
    }
}

fn error_message(bytes: &Bytes) -> Option<String> {
    serde_json::from_slice::<Value>(bytes)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
}
