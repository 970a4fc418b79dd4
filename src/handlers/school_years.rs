use std::collections::HashMap;

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde_json::json;

use crate::database::meta;
use crate::database::models::required_text;
use crate::database::models::school_year::{SchoolYear, SchoolYearPayload, SchoolYearUpdate};
use crate::error::ApiError;
use crate::guard::Guard;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, ListResponse};
use crate::query::ApiQuery;
use crate::AppState;

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<ListResponse, ApiError> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let query = ApiQuery::new(&meta::SCHOOL_YEARS, params);
    let rows = query.execute(&state.pool).await?;
    let total = query.count(&state.pool).await?;
    Ok(ListResponse::new("schoolYears", rows, total, query.page_size()))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(code): Path<String>,
) -> ApiResult<SchoolYear> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let row: Option<SchoolYear> = sqlx::query_as("SELECT * FROM school_years WHERE code = $1")
        .bind(&code)
        .fetch_optional(&state.pool)
        .await?;
    let row = row.ok_or_else(|| ApiError::not_found(format!("School year {} not found", code)))?;
    Ok(ApiResponse::success(row))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SchoolYearPayload>,
) -> ApiResult<SchoolYear> {
    Guard::admin().check(&user, None, &state.pool).await?;
    let payload = payload.validate()?;

    let row: SchoolYear = sqlx::query_as(
        "INSERT INTO school_years (code, label) VALUES ($1, $2) RETURNING *",
    )
    .bind(&payload.code)
    .bind(&payload.label)
    .fetch_one(&state.pool)
    .await?;
    Ok(ApiResponse::created(row))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(code): Path<String>,
    Json(update): Json<SchoolYearUpdate>,
) -> ApiResult<SchoolYear> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let existing: Option<SchoolYear> =
        sqlx::query_as("SELECT * FROM school_years WHERE code = $1")
            .bind(&code)
            .fetch_optional(&state.pool)
            .await?;
    let existing =
        existing.ok_or_else(|| ApiError::not_found(format!("School year {} not found", code)))?;

    let label = match update.label {
        Some(ref l) => required_text("label", l)?,
        None => existing.label,
    };

    let row: SchoolYear = sqlx::query_as(
        "UPDATE school_years SET label = $2, updated_at = now() WHERE code = $1 RETURNING *",
    )
    .bind(&code)
    .bind(&label)
    .fetch_one(&state.pool)
    .await?;
    Ok(ApiResponse::success(row))
}

/// Restrict-delete: a year with classes, compositions or results conflicts on
/// the foreign keys and surfaces as 409.
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(code): Path<String>,
) -> ApiResult<serde_json::Value> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let result = sqlx::query("DELETE FROM school_years WHERE code = $1")
        .bind(&code)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!("School year {} not found", code)));
    }
    Ok(ApiResponse::success(json!({ "deleted": code })))
}
