use axum::{middleware::from_fn_with_state, routing::post, Router};

use crate::handlers::product::ensure_stock_item;
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/products/{id}/stock/ensure", post(ensure_stock_item))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
}
