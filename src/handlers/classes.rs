use std::collections::HashMap;

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde_json::json;

use crate::database::meta;
use crate::database::models::class::{ClassPayload, ClassUpdate, SchoolClass};
use crate::database::models::{check_school_id_format, check_year_code_format, required_text};
use crate::error::ApiError;
use crate::guard::Guard;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, ListResponse};
use crate::query::ApiQuery;
use crate::AppState;

use super::{ensure_exists, scope_to_school};

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<ListResponse, ApiError> {
    Guard::any().check(&user, None, &state.pool).await?;

    let query = ApiQuery::new(&meta::CLASSES, params);
    let query = scope_to_school(query, &user)?;
    let rows = query.execute(&state.pool).await?;
    let total = query.count(&state.pool).await?;
    Ok(ListResponse::new("classes", rows, total, query.page_size()))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<SchoolClass> {
    Guard::any()
        .own_school("classes", "id", "school_id")
        .check(&user, Some(&id), &state.pool)
        .await?;

    let row: Option<SchoolClass> = sqlx::query_as("SELECT * FROM classes WHERE id = $1")
        .bind(&id)
        .fetch_optional(&state.pool)
        .await?;
    let row = row.ok_or_else(|| ApiError::not_found(format!("Class {} not found", id)))?;
    Ok(ApiResponse::success(row))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ClassPayload>,
) -> ApiResult<SchoolClass> {
    Guard::admin().check(&user, None, &state.pool).await?;
    let payload = payload.validate()?;

    ensure_exists(&state.pool, "schools", "id", &payload.school_id, "School").await?;
    ensure_exists(
        &state.pool,
        "school_years",
        "code",
        &payload.school_year_code,
        "School year",
    )
    .await?;

    let row: SchoolClass = sqlx::query_as(
        "INSERT INTO classes (id, label, level, school_year_code, school_id)
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(&payload.id)
    .bind(&payload.label)
    .bind(&payload.level)
    .bind(&payload.school_year_code)
    .bind(&payload.school_id)
    .fetch_one(&state.pool)
    .await?;
    Ok(ApiResponse::created(row))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(update): Json<ClassUpdate>,
) -> ApiResult<SchoolClass> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let existing: Option<SchoolClass> = sqlx::query_as("SELECT * FROM classes WHERE id = $1")
        .bind(&id)
        .fetch_optional(&state.pool)
        .await?;
    let existing = existing.ok_or_else(|| ApiError::not_found(format!("Class {} not found", id)))?;

    let label = match update.label {
        Some(ref l) => required_text("label", l)?,
        None => existing.label,
    };
    let level = match update.level {
        Some(ref l) => required_text("level", l)?,
        None => existing.level,
    };
    let school_year_code = match update.school_year_code {
        Some(ref c) => {
            let c = required_text("school_year_code", c)?;
            check_year_code_format(&c)?;
            ensure_exists(&state.pool, "school_years", "code", &c, "School year").await?;
            c
        }
        None => existing.school_year_code,
    };
    let school_id = match update.school_id {
        Some(ref s) => {
            let s = required_text("school_id", s)?;
            check_school_id_format(&s)?;
            ensure_exists(&state.pool, "schools", "id", &s, "School").await?;
            s
        }
        None => existing.school_id,
    };

    let row: SchoolClass = sqlx::query_as(
        "UPDATE classes SET label = $2, level = $3, school_year_code = $4, school_id = $5,
                updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(&id)
    .bind(&label)
    .bind(&level)
    .bind(&school_year_code)
    .bind(&school_id)
    .fetch_one(&state.pool)
    .await?;
    Ok(ApiResponse::success(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let result = sqlx::query("DELETE FROM classes WHERE id = $1")
        .bind(&id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!("Class {} not found", id)));
    }
    Ok(ApiResponse::success(json!({ "deleted": id })))
}
