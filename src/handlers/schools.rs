use std::collections::HashMap;

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde_json::json;

use crate::database::meta;
use crate::database::models::school::{School, SchoolPayload, SchoolUpdate};
use crate::database::models::{optional_text, required_text};
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

    let query = ApiQuery::new(&meta::SCHOOLS, params);
    let rows = query.execute(&state.pool).await?;
    let total = query.count(&state.pool).await?;
    Ok(ListResponse::new("schools", rows, total, query.page_size()))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<School> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let school: Option<School> = sqlx::query_as("SELECT * FROM schools WHERE id = $1")
        .bind(&id)
        .fetch_optional(&state.pool)
        .await?;
    let school = school.ok_or_else(|| ApiError::not_found(format!("School {} not found", id)))?;
    Ok(ApiResponse::success(school))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SchoolPayload>,
) -> ApiResult<School> {
    Guard::admin().check(&user, None, &state.pool).await?;
    let payload = payload.validate()?;

    let school: School = sqlx::query_as(
        "INSERT INTO schools (id, name, district, city) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(&payload.id)
    .bind(&payload.name)
    .bind(&payload.district)
    .bind(&payload.city)
    .fetch_one(&state.pool)
    .await?;
    Ok(ApiResponse::created(school))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(update): Json<SchoolUpdate>,
) -> ApiResult<School> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let existing: Option<School> = sqlx::query_as("SELECT * FROM schools WHERE id = $1")
        .bind(&id)
        .fetch_optional(&state.pool)
        .await?;
    let existing = existing.ok_or_else(|| ApiError::not_found(format!("School {} not found", id)))?;

    let name = match update.name {
        Some(ref n) => required_text("name", n)?,
        None => existing.name,
    };
    let district = optional_text(update.district.as_deref()).or(existing.district);
    let city = optional_text(update.city.as_deref()).or(existing.city);

    let school: School = sqlx::query_as(
        "UPDATE schools SET name = $2, district = $3, city = $4, updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(&id)
    .bind(&name)
    .bind(&district)
    .bind(&city)
    .fetch_one(&state.pool)
    .await?;
    Ok(ApiResponse::success(school))
}

/// Restrict-delete: a school with users, classes or students conflicts on the
/// foreign keys and surfaces as 409.
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let result = sqlx::query("DELETE FROM schools WHERE id = $1")
        .bind(&id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!("School {} not found", id)));
    }
    Ok(ApiResponse::success(json!({ "deleted": id })))
}
