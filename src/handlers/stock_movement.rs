// src/handlers/stock_movement.rs
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

use crate::dtos::stock::{CreateMovementRequest, MovementListQuery, MovementResponse};
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::StockMovement;
use crate::state::AppState;

// ==================== Movement History ====================

// GET /stock/{id}/movements - Ledger for one stock item, newest first
#[instrument(skip(state, auth, id, query), fields(user_id = %auth.user_id))]
pub async fn list_movements(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<MovementListQuery>, QueryRejection>,
) -> Result<Json<Vec<StockMovement>>, AppError> {
    let Path(id) = id?;
    let Query(query) = query?;
    let movements = state
        .engine
        .movement_history(&auth.scope()?, id, query.movement_type, query.limit())
        .await?;
    Ok(Json(movements))
}

// ==================== Record Movement ====================

// POST /stock/{id}/movements - Apply IN/OUT/ADJUSTMENT/TRANSFER/DAMAGE/RETURN
#[instrument(skip(state, auth, id, payload), fields(user_id = %auth.user_id))]
pub async fn create_movement(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<CreateMovementRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MovementResponse>), AppError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    payload.validate()?;
    let scope = auth.scope()?;

    let (command, ctx) = payload.into_command(&auth.user_id)?;
    let outcome = state.engine.apply(&scope, id, command, ctx).await?;
    Ok((StatusCode::CREATED, Json(MovementResponse::from(outcome))))
}
