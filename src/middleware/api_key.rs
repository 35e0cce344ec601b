use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::auth::api_key::{hash_api_key, API_KEY_HEADER};
use crate::error::AppError;
use crate::models::ApiKey;
use crate::state::AppState;

/// The authenticated key. Also copied onto the response so outer layers can
/// attribute the request.
#[derive(Debug, Clone)]
pub struct ApiKeyContext {
    pub api_key: ApiKey,
}

pub async fn require_api_key(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let raw = match req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        Some(k) => k,
        None => return AppError::unauthorized("Missing API key").into_response(),
    };

    let api_key = match state.engine.store().find_api_key(&hash_api_key(raw)).await {
        Ok(Some(key)) if key.is_active => key,
        Ok(Some(key)) => {
            warn!(api_key_id = %key.id, "Rejected inactive API key");
            return AppError::unauthorized("Invalid API key").into_response();
        }
        Ok(None) => return AppError::unauthorized("Invalid API key").into_response(),
        Err(e) => return e.into_response(),
    };

    let context = ApiKeyContext { api_key };
    req.extensions_mut().insert(context.clone());
    let mut response = next.run(req).await;
    response.extensions_mut().insert(context);
    response
}
