use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde_json::json;

use crate::aggregation::compute_average;
use crate::database::meta;
use crate::database::models::average::{Average, ComputeAveragePayload};
use crate::database::models::user::Role;
use crate::database::models::{check_grade_range, required_text};
use crate::error::ApiError;
use crate::guard::Guard;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, ListResponse};
use crate::query::ApiQuery;
use crate::AppState;

use super::ensure_exists;
use super::notes::StudentSchoolResolver;

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<ListResponse, ApiError> {
    Guard::any().check(&user, None, &state.pool).await?;

    let query = ApiQuery::new(&meta::AVERAGES, params);
    let rows = query.execute(&state.pool).await?;
    let total = query.count(&state.pool).await?;
    Ok(ListResponse::new("averages", rows, total, query.page_size()))
}

/// GET /averages/eleve/:studentId
pub async fn list_for_student(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(student_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<ListResponse, ApiError> {
    Guard::any().check(&user, None, &state.pool).await?;

    ensure_exists(&state.pool, "students", "registration_id", &student_id, "Student").await?;

    let query = ApiQuery::new(&meta::AVERAGES, params).scope("student_id", student_id.as_str())?;
    let rows = query.execute(&state.pool).await?;
    let total = query.count(&state.pool).await?;
    Ok(ListResponse::new("averages", rows, total, query.page_size()))
}

/// GET /averages/composition/:code - one composition's averages across
/// students, the input for manual ranking.
pub async fn list_for_composition(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(composition_code): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<ListResponse, ApiError> {
    Guard::any().check(&user, None, &state.pool).await?;

    ensure_exists(&state.pool, "compositions", "code", &composition_code, "Composition").await?;

    let query =
        ApiQuery::new(&meta::AVERAGES, params).scope("composition_code", composition_code.as_str())?;
    let rows = query.execute(&state.pool).await?;
    let total = query.count(&state.pool).await?;
    Ok(ListResponse::new("averages", rows, total, query.page_size()))
}

/// POST /averages - compute and store the weighted average for one
/// (student, composition). 201 on first computation, 200 on recompute.
pub async fn compute(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<ComputeAveragePayload>,
) -> ApiResult<Average> {
    let student_id = required_text("student_id", &payload.student_id)?;
    let composition_code = required_text("composition_code", &payload.composition_code)?;

    Guard::roles(&[Role::Teacher])
        .custom_ownership(Arc::new(StudentSchoolResolver))
        .check(&user, Some(&student_id), &state.pool)
        .await?;

    ensure_exists(&state.pool, "compositions", "code", &composition_code, "Composition").await?;

    let computed = compute_average(&state.pool, &student_id, &composition_code).await?;
    if computed.created {
        Ok(ApiResponse::created(computed.average))
    } else {
        Ok(ApiResponse::success(computed.average))
    }
}

/// PUT /averages/:studentId/:compositionCode - administrative correction of a
/// stored value, bypassing the aggregation pipeline.
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((student_id, composition_code)): Path<(String, String)>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<Average> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let value = body
        .get("value")
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| ApiError::validation("value must be a number"))?;
    check_grade_range("value", value)?;

    let row: Option<Average> = sqlx::query_as(
        "UPDATE averages SET value = $3, updated_at = now()
         WHERE student_id = $1 AND composition_code = $2 RETURNING *",
    )
    .bind(&student_id)
    .bind(&composition_code)
    .bind(value)
    .fetch_optional(&state.pool)
    .await?;
    let row = row.ok_or_else(|| {
        ApiError::not_found(format!(
            "Average for student {} in composition {} not found",
            student_id, composition_code
        ))
    })?;
    Ok(ApiResponse::success(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((student_id, composition_code)): Path<(String, String)>,
) -> ApiResult<serde_json::Value> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let result = sqlx::query(
        "DELETE FROM averages WHERE student_id = $1 AND composition_code = $2",
    )
    .bind(&student_id)
    .bind(&composition_code)
    .execute(&state.pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!(
            "Average for student {} in composition {} not found",
            student_id, composition_code
        )));
    }
    Ok(ApiResponse::success(json!({
        "deleted": {
            "student_id": student_id,
            "composition_code": composition_code,
        }
    })))
}
