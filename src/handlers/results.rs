use std::collections::HashMap;

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde_json::json;

use crate::aggregation::upsert_result;
use crate::database::meta;
use crate::database::models::result::{ResultPayload, SchoolResult};
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

    let query = ApiQuery::new(&meta::RESULTS, params);
    let rows = query.execute(&state.pool).await?;
    let total = query.count(&state.pool).await?;
    Ok(ListResponse::new("results", rows, total, query.page_size()))
}

/// GET /results/annee/:yearCode - one school year's results, the published
/// ranking list.
pub async fn list_for_year(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(year_code): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<ListResponse, ApiError> {
    Guard::admin().check(&user, None, &state.pool).await?;

    ensure_exists(&state.pool, "school_years", "code", &year_code, "School year").await?;

    let query =
        ApiQuery::new(&meta::RESULTS, params).scope("school_year_code", year_code.as_str())?;
    let rows = query.execute(&state.pool).await?;
    let total = query.count(&state.pool).await?;
    Ok(ListResponse::new("results", rows, total, query.page_size()))
}

/// POST /results - create-or-overwrite the annual outcome for one
/// (student, school year). 201 on first record, 200 on overwrite.
pub async fn upsert(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ResultPayload>,
) -> ApiResult<SchoolResult> {
    Guard::admin().check(&user, None, &state.pool).await?;
    let payload = payload.validate()?;

    ensure_exists(
        &state.pool,
        "students",
        "registration_id",
        &payload.student_id,
        "Student",
    )
    .await?;
    ensure_exists(
        &state.pool,
        "school_years",
        "code",
        &payload.school_year_code,
        "School year",
    )
    .await?;

    let (row, created) = upsert_result(&state.pool, &payload).await?;
    if created {
        Ok(ApiResponse::created(row))
    } else {
        Ok(ApiResponse::success(row))
    }
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((student_id, year_code)): Path<(String, String)>,
    Json(payload): Json<ResultPayload>,
) -> ApiResult<SchoolResult> {
    Guard::admin().check(&user, None, &state.pool).await?;
    let payload = payload.validate()?;

    if payload.student_id != student_id || payload.school_year_code != year_code {
        return Err(ApiError::validation(
            "payload keys must match the route parameters",
        ));
    }

    let row: Option<SchoolResult> = sqlx::query_as(
        "UPDATE results SET decision = $3, rank = $4, annual_average = $5, updated_at = now()
         WHERE student_id = $1 AND school_year_code = $2 RETURNING *",
    )
    .bind(&student_id)
    .bind(&year_code)
    .bind(payload.decision.as_str())
    .bind(payload.rank)
    .bind(payload.annual_average)
    .fetch_optional(&state.pool)
    .await?;
    let row = row.ok_or_else(|| {
        ApiError::not_found(format!(
            "Result for student {} in {} not found",
            student_id, year_code
        ))
    })?;
    Ok(ApiResponse::success(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((student_id, year_code)): Path<(String, String)>,
) -> ApiResult<serde_json::Value> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let result = sqlx::query(
        "DELETE FROM results WHERE student_id = $1 AND school_year_code = $2",
    )
    .bind(&student_id)
    .bind(&year_code)
    .execute(&state.pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!(
            "Result for student {} in {} not found",
            student_id, year_code
        )));
    }
    Ok(ApiResponse::success(json!({
        "deleted": {
            "student_id": student_id,
            "school_year_code": year_code,
        }
    })))
}
