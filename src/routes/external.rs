use axum::{middleware::from_fn_with_state, routing::get, Router};

use crate::handlers::external::{list_inventory, update_inventory};
use crate::middleware::api_key::require_api_key;
use crate::middleware::request_log::log_api_request;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    // the request log wraps key checking so rejected keys are recorded too
    Router::new()
        .route("/external/inventory", get(list_inventory).post(update_inventory))
        .route_layer(from_fn_with_state(state.clone(), require_api_key))
        .route_layer(from_fn_with_state(state.clone(), log_api_request))
}
