pub mod external;
pub mod products;
pub mod stock;
pub mod stock_movements;

use axum::{routing::get, Router};

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "SJFulfillment Stock API" }))
        .route("/health", get(health_check))
        .merge(stock::routes(&state))
        .merge(stock_movements::routes(&state))
        .merge(products::routes(&state))
        .merge(external::routes(&state))
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
