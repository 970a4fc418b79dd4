use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::{issue_token, verify_password, Claims};
use crate::config;
use crate::database::models::user::User;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// POST /api/v1/login - exchange credentials for a bearer token.
///
/// Unknown usernames and wrong passwords produce the same response so the
/// endpoint does not leak which usernames exist.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Value> {
    let username = payload.username.trim();
    if username.is_empty() || payload.password.is_empty() {
        return Err(ApiError::validation("username and password are required"));
    }

    let user: Option<User> =
        sqlx::query_as("SELECT * FROM users WHERE username = $1 AND deleted_at IS NULL")
            .bind(username)
            .fetch_optional(&state.pool)
            .await?;

    let Some(user) = user else {
        return Err(ApiError::InvalidCredentials);
    };
    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(ApiError::InvalidCredentials);
    }

    sqlx::query("UPDATE users SET last_login = now() WHERE id = $1")
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    let security = &config::config().security;
    let claims = Claims::for_user(&user, security.jwt_expiry_hours);
    let token = issue_token(&claims, &security.jwt_secret)?;

    info!(user_id = user.id, username = %user.username, "login");

    Ok(ApiResponse::success(json!({
        "token": token,
        "expires_in": security.jwt_expiry_hours * 3600,
        "user": {
            "id": user.id,
            "username": user.username,
            "role": user.role,
            "school_id": user.school_id,
        }
    })))
}
