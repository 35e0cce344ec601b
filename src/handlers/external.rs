// src/handlers/external.rs
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Extension, Json,
};
use tracing::instrument;
use validator::Validate;

use crate::dtos::external::ExternalInventoryRequest;
use crate::dtos::stock::StockListQuery;
use crate::error::AppError;
use crate::inventory::StockItemView;
use crate::middleware::api_key::ApiKeyContext;
use crate::models::StockItem;
use crate::state::AppState;
use crate::store::Page;

// GET /external/inventory - Stock of the key's merchant
#[instrument(skip_all, fields(api_key_id = %key.api_key.id))]
pub async fn list_inventory(
    State(state): State<AppState>,
    Extension(key): Extension<ApiKeyContext>,
    query: Result<Query<StockListQuery>, QueryRejection>,
) -> Result<Json<Page<StockItem>>, AppError> {
    let Query(query) = query?;
    let (filter, page) = query.into_parts();
    let items = state
        .engine
        .list_for_api_key(&key.api_key, filter, page)
        .await?;
    Ok(Json(items))
}

// POST /external/inventory - Find-or-create a stock item and move it
#[instrument(skip_all, fields(api_key_id = %key.api_key.id))]
pub async fn update_inventory(
    State(state): State<AppState>,
    Extension(key): Extension<ApiKeyContext>,
    payload: Result<Json<ExternalInventoryRequest>, JsonRejection>,
) -> Result<Json<StockItemView>, AppError> {
    let Json(payload) = payload?;
    payload.validate()?;

    let view = state
        .engine
        .upsert_and_move(&key.api_key, payload.into_update()?)
        .await?;
    Ok(Json(view))
}
