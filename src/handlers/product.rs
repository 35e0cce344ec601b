// src/handlers/product.rs
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Extension, Json,
};
use tracing::instrument;
use uuid::Uuid;

use crate::dtos::stock::EnsureStockRequest;
use crate::error::AppError;
use crate::inventory::Provisioned;
use crate::middleware::auth::AuthContext;
use crate::state::AppState;

// POST /products/{id}/stock/ensure - Make sure the product has a stock item
#[instrument(skip(state, auth, product_id, payload), fields(user_id = %auth.user_id))]
pub async fn ensure_stock_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    product_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<EnsureStockRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Provisioned>), AppError> {
    let Path(product_id) = product_id?;
    let Json(payload) = payload?;

    let provisioned = state
        .engine
        .ensure_product_stock_item(
            &auth.scope()?,
            product_id,
            payload.initial_quantity,
            payload.origin,
            &auth.user_id,
        )
        .await?;

    let status = if provisioned.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(provisioned)))
}
