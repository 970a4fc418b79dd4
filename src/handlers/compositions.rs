use std::collections::HashMap;

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde_json::json;

use crate::database::meta;
use crate::database::models::composition::{Composition, CompositionPayload, CompositionUpdate};
use crate::database::models::{check_year_code_format, required_text};
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
    Guard::any().check(&user, None, &state.pool).await?;

    let query = ApiQuery::new(&meta::COMPOSITIONS, params);
    let rows = query.execute(&state.pool).await?;
    let total = query.count(&state.pool).await?;
    Ok(ListResponse::new(
        "compositions",
        rows,
        total,
        query.page_size(),
    ))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(code): Path<String>,
) -> ApiResult<Composition> {
    Guard::any().check(&user, None, &state.pool).await?;

    let row: Option<Composition> = sqlx::query_as("SELECT * FROM compositions WHERE code = $1")
        .bind(&code)
        .fetch_optional(&state.pool)
        .await?;
    let row = row.ok_or_else(|| ApiError::not_found(format!("Composition {} not found", code)))?;
    Ok(ApiResponse::success(row))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CompositionPayload>,
) -> ApiResult<Composition> {
    Guard::admin().check(&user, None, &state.pool).await?;
    let payload = payload.validate()?;

    ensure_exists(
        &state.pool,
        "school_years",
        "code",
        &payload.school_year_code,
        "School year",
    )
    .await?;

    let row: Composition = sqlx::query_as(
        "INSERT INTO compositions (code, label, held_on, kind, school_year_code)
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(&payload.code)
    .bind(&payload.label)
    .bind(payload.held_on)
    .bind(payload.kind.as_str())
    .bind(&payload.school_year_code)
    .fetch_one(&state.pool)
    .await?;
    Ok(ApiResponse::created(row))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(code): Path<String>,
    Json(update): Json<CompositionUpdate>,
) -> ApiResult<Composition> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let existing: Option<Composition> =
        sqlx::query_as("SELECT * FROM compositions WHERE code = $1")
            .bind(&code)
            .fetch_optional(&state.pool)
            .await?;
    let existing =
        existing.ok_or_else(|| ApiError::not_found(format!("Composition {} not found", code)))?;

    let label = match update.label {
        Some(ref l) => required_text("label", l)?,
        None => existing.label,
    };
    let held_on = update.held_on.unwrap_or(existing.held_on);
    let kind = update.kind.unwrap_or(existing.kind);
    let school_year_code = match update.school_year_code {
        Some(ref c) => {
            let c = required_text("school_year_code", c)?;
            check_year_code_format(&c)?;
            ensure_exists(&state.pool, "school_years", "code", &c, "School year").await?;
            c
        }
        None => existing.school_year_code,
    };

    let row: Composition = sqlx::query_as(
        "UPDATE compositions SET label = $2, held_on = $3, kind = $4, school_year_code = $5,
                updated_at = now()
         WHERE code = $1 RETURNING *",
    )
    .bind(&code)
    .bind(&label)
    .bind(held_on)
    .bind(kind.as_str())
    .bind(&school_year_code)
    .fetch_one(&state.pool)
    .await?;
    Ok(ApiResponse::success(row))
}

/// Restrict-delete: a composition with notes or averages conflicts on the
/// foreign keys and surfaces as 409.
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(code): Path<String>,
) -> ApiResult<serde_json::Value> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let result = sqlx::query("DELETE FROM compositions WHERE code = $1")
        .bind(&code)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!(
            "Composition {} not found",
            code
        )));
    }
    Ok(ApiResponse::success(json!({ "deleted": code })))
}
