use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::handlers::stock::{create_stock, get_stock, list_stock, release_stock, reserve_stock};
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/stock", get(list_stock).post(create_stock))
        .route("/stock/{id}", get(get_stock))
        .route("/stock/{id}/reserve", post(reserve_stock))
        .route("/stock/{id}/release", post(release_stock))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
}
