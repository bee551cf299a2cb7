//! Admin login with credentials from configuration.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::json_body;
use crate::AppState;
use crate::auth::{ADMIN_ROLE, Claims, CurrentUser, TOKEN_TTL_SECS};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub user_id: String,
    pub email: String,
    pub expires_in: i64,
    pub message: String,
}

/// Constant-time string comparison.
fn same_secret(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// POST /api/admin/login
pub async fn login(
    State(state): State<AppState>, body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let request = json_body(body)?;
    let Some((username, password)) = state.config.admin_credentials() else {
        return Err(ApiError::Authentication("Admin login is not enabled".into()));
    };
    let Some(tokens) = state.tokens.as_ref() else {
        return Err(ApiError::Authentication("Authentication is not configured".into()));
    };

    let valid = same_secret(request.username.trim(), username) & same_secret(&request.password, password);
    if !valid {
        tracing::warn!(username = %request.username, "rejected admin login");
        return Err(ApiError::Authentication("Invalid username or password".into()));
    }

    let claims = Claims::new(&state.config.admin_user_id, Some(&state.config.admin_email), ADMIN_ROLE);
    let access_token = tokens.issue(&claims)?;
    tracing::info!(user_id = %claims.user_id, "admin logged in");
    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer".into(),
        user_id: claims.user_id,
        email: state.config.admin_email.clone(),
        expires_in: TOKEN_TTL_SECS,
        message: "Admin login successful".into(),
    }))
}

/// GET /api/admin/verify
pub async fn verify(CurrentUser(claims): CurrentUser) -> ApiResult<Json<Value>> {
    if !claims.is_admin() {
        return Err(ApiError::Authorization("Admin access required".into()));
    }
    Ok(Json(json!({
        "message": "Token is valid",
        "user_id": claims.user_id,
        "email": claims.email,
        "role": claims.role,
        "status": "authenticated",
    })))
}
