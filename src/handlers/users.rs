use std::collections::HashMap;

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde_json::json;

use crate::auth::hash_password;
use crate::config;
use crate::database::meta;
use crate::database::models::user::{check_username_format, Role, User, UserPayload, UserUpdate};
use crate::database::models::{check_school_id_format, required_text};
use crate::error::ApiError;
use crate::guard::Guard;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, ListResponse};
use crate::query::ApiQuery;
use crate::AppState;

use super::ensure_exists;

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<ListResponse, ApiError> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let query = ApiQuery::new(&meta::USERS, params);
    let rows = query.execute(&state.pool).await?;
    let total = query.count(&state.pool).await?;
    Ok(ListResponse::new("users", rows, total, query.page_size()))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<User> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let row: Option<User> =
        sqlx::query_as("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;
    let row = row.ok_or_else(|| ApiError::not_found(format!("User {} not found", id)))?;
    Ok(ApiResponse::success(row))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UserPayload>,
) -> ApiResult<User> {
    Guard::admin().check(&user, None, &state.pool).await?;
    let payload = payload.validate()?;

    ensure_exists(&state.pool, "schools", "id", &payload.school_id, "School").await?;

    let security = &config::config().security;
    let password_hash = hash_password(&payload.password, security.bcrypt_cost)?;
    let role = payload.role.unwrap_or(Role::Teacher);

    let row: User = sqlx::query_as(
        "INSERT INTO users (username, password_hash, role, school_id)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(&payload.username)
    .bind(&password_hash)
    .bind(role.as_str())
    .bind(&payload.school_id)
    .fetch_one(&state.pool)
    .await?;
    Ok(ApiResponse::created(row))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(update): Json<UserUpdate>,
) -> ApiResult<User> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let existing: Option<User> =
        sqlx::query_as("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&state.pool)
            .await?;
    let existing = existing.ok_or_else(|| ApiError::not_found(format!("User {} not found", id)))?;

    let username = match update.username {
        Some(ref u) => {
            let u = required_text("username", u)?;
            check_username_format(&u)?;
            u
        }
        None => existing.username,
    };
    let password_hash = match update.password {
        Some(ref p) => {
            if p.len() < 8 {
                return Err(ApiError::validation(
                    "password must be at least 8 characters",
                ));
            }
            hash_password(p, config::config().security.bcrypt_cost)?
        }
        None => existing.password_hash,
    };
    let role = update.role.unwrap_or(existing.role);
    let school_id = match update.school_id {
        Some(ref s) => {
            let s = required_text("school_id", s)?;
            check_school_id_format(&s)?;
            ensure_exists(&state.pool, "schools", "id", &s, "School").await?;
            s
        }
        None => existing.school_id,
    };

    let row: User = sqlx::query_as(
        "UPDATE users SET username = $2, password_hash = $3, role = $4, school_id = $5,
                updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&username)
    .bind(&password_hash)
    .bind(role.as_str())
    .bind(&school_id)
    .fetch_one(&state.pool)
    .await?;
    Ok(ApiResponse::success(row))
}

/// Users are soft-deleted: the row keeps a tombstone timestamp and drops out
/// of authentication and listings.
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let result = sqlx::query(
        "UPDATE users SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(id)
    .execute(&state.pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!("User {} not found", id)));
    }
    Ok(ApiResponse::success(json!({ "deleted": id })))
}
