// src/error.rs
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    InvalidQuantity(String),

    #[error("{0}")]
    InsufficientStock(String),

    #[error("Adjustment would result in negative available stock")]
    NegativeAvailableStock,

    #[error("{0}")]
    Conflict(String),

    #[error("no warehouse available: {0}")]
    NoWarehouseAvailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::Unauthorized(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    pub fn insufficient_stock(msg: impl Into<String>) -> Self {
        AppError::InsufficientStock(msg.into())
    }

    pub fn invalid_quantity(msg: impl Into<String>) -> Self {
        AppError::InvalidQuantity(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::NoWarehouseAvailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ValidationError(_)
            | AppError::InvalidQuantity(_)
            | AppError::InsufficientStock(_)
            | AppError::NegativeAvailableStock => StatusCode::BAD_REQUEST,
        }
    }

    /// Machine-actionable reason string carried in every error body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::DatabaseError(_) => "database_error",
            AppError::Internal(_) => "internal_error",
            AppError::NoWarehouseAvailable(_) => "no_warehouse_available",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::ValidationError(_) => "validation_error",
            AppError::InvalidQuantity(_) => "invalid_quantity",
            AppError::InsufficientStock(_) => "insufficient_stock",
            AppError::NegativeAvailableStock => "negative_available_stock",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the server log.
        let error_message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, code = self.code(), "Request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": error_message,
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => format!("{field}: {msg}"),
                    None => format!("{field}: invalid value ({})", e.code),
                })
            })
            .collect();
        messages.sort();
        AppError::ValidationError(messages.join("; "))
    }
}
