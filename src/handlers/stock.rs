// src/handlers/stock.rs
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::non_blank;
use crate::dtos::stock::{
    CreateStockItemRequest, CreateStockItemResponse, ReservationRequest, StockListQuery,
};
use crate::error::AppError;
use crate::inventory::levels::checked_quantity;
use crate::middleware::auth::AuthContext;
use crate::models::StockItem;
use crate::state::AppState;
use crate::store::Page;

// GET /stock - List stock items visible to the caller
#[instrument(skip(state, auth, query), fields(user_id = %auth.user_id))]
pub async fn list_stock(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    query: Result<Query<StockListQuery>, QueryRejection>,
) -> Result<Json<Page<StockItem>>, AppError> {
    let Query(query) = query?;
    let scope = auth.scope()?;
    let (filter, page) = query.into_parts();
    let items = state.engine.list_stock_items(&scope, filter, page).await?;
    Ok(Json(items))
}

// GET /stock/{id} - Get single stock item
#[instrument(skip(state, auth, id), fields(user_id = %auth.user_id))]
pub async fn get_stock(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<StockItem>, AppError> {
    let Path(id) = id?;
    let item = state.engine.get_stock_item(&auth.scope()?, id).await?;
    Ok(Json(item))
}

// POST /stock - Create a stock item for a new (product, warehouse, batch)
#[instrument(skip(state, auth, payload), fields(user_id = %auth.user_id))]
pub async fn create_stock(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<CreateStockItemRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateStockItemResponse>), AppError> {
    let Json(payload) = payload?;
    payload.validate()?;
    let scope = auth.scope()?;

    let (stock_item, initial_movement) = state
        .engine
        .create_stock_item(&scope, payload.into_new_item(), &auth.user_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateStockItemResponse {
            stock_item,
            initial_movement,
            message: "Stock item created successfully",
        }),
    ))
}

// POST /stock/{id}/reserve - Earmark available units
#[instrument(skip(state, auth, id, payload), fields(user_id = %auth.user_id))]
pub async fn reserve_stock(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ReservationRequest>, JsonRejection>,
) -> Result<Json<StockItem>, AppError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    payload.validate()?;
    let quantity = checked_quantity(payload.quantity)?;

    let item = state
        .engine
        .reserve(&auth.scope()?, id, quantity, non_blank(payload.reference), &auth.user_id)
        .await?;
    Ok(Json(item))
}

// POST /stock/{id}/release - Return reserved units to available
#[instrument(skip(state, auth, id, payload), fields(user_id = %auth.user_id))]
pub async fn release_stock(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ReservationRequest>, JsonRejection>,
) -> Result<Json<StockItem>, AppError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    payload.validate()?;
    let quantity = checked_quantity(payload.quantity)?;

    let item = state
        .engine
        .release(&auth.scope()?, id, quantity, non_blank(payload.reference), &auth.user_id)
        .await?;
    Ok(Json(item))
}
