use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::auth::jwt::verify_token;
use crate::error::AppError;
use crate::inventory::Scope;
use crate::state::AppState;

const GLOBAL_ROLES: [&str; 4] = ["SUPER_ADMIN", "ADMIN", "WAREHOUSE_MANAGER", "WAREHOUSE_STAFF"];
const MERCHANT_ROLES: [&str; 2] = ["MERCHANT", "MERCHANT_STAFF"];

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub role: String,
    pub username: String,
    pub merchant_id: Option<Uuid>,
}

impl AuthContext {
    /// Stock the principal may read and move.
    pub fn scope(&self) -> Result<Scope, AppError> {
        let role = self.role.as_str();
        if GLOBAL_ROLES.contains(&role) {
            return Ok(Scope::Global);
        }
        if MERCHANT_ROLES.contains(&role) {
            return self
                .merchant_id
                .map(Scope::Merchant)
                .ok_or_else(|| AppError::forbidden("Merchant account is not linked to a merchant"));
        }
        Err(AppError::forbidden("Insufficient permissions"))
    }
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = match req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
    {
        Some(h) => h,
        None => return unauthorized("Missing Authorization header"),
    };

    // Expect "Bearer <token>"
    let token = match auth_header.strip_prefix("Bearer ") {
        Some(t) => t,
        None => return unauthorized("Invalid Authorization format"),
    };

    let claims = match verify_token(token, &state.jwt_secret) {
        Ok(c) => c,
        Err(e) => return e.into_response(),
    };

    req.extensions_mut().insert(AuthContext {
        user_id: claims.sub,
        role: claims.role,
        username: claims.username,
        merchant_id: claims.merchant_id,
    });

    next.run(req).await
}

fn unauthorized(msg: &str) -> Response {
    AppError::unauthorized(msg).into_response()
}
