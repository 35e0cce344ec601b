use axum::{middleware::from_fn_with_state, routing::get, Router};

use crate::handlers::stock_movement;
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/stock/{id}/movements",
            get(stock_movement::list_movements).post(stock_movement::create_movement),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth))
}
