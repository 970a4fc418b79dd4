use std::collections::HashMap;

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde_json::json;

use crate::database::meta;
use crate::database::models::evaluation_type::{
    EvaluationType, EvaluationTypePayload, EvaluationTypeUpdate,
};
use crate::database::models::required_text;
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
    Guard::any().check(&user, None, &state.pool).await?;

    let query = ApiQuery::new(&meta::EVALUATION_TYPES, params);
    let rows = query.execute(&state.pool).await?;
    let total = query.count(&state.pool).await?;
    Ok(ListResponse::new(
        "evaluationTypes",
        rows,
        total,
        query.page_size(),
    ))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(code): Path<String>,
) -> ApiResult<EvaluationType> {
    Guard::any().check(&user, None, &state.pool).await?;

    let row: Option<EvaluationType> =
        sqlx::query_as("SELECT * FROM evaluation_types WHERE code = $1")
            .bind(&code)
            .fetch_optional(&state.pool)
            .await?;
    let row =
        row.ok_or_else(|| ApiError::not_found(format!("Evaluation type {} not found", code)))?;
    Ok(ApiResponse::success(row))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<EvaluationTypePayload>,
) -> ApiResult<EvaluationType> {
    Guard::admin().check(&user, None, &state.pool).await?;
    let payload = payload.validate()?;

    let row: EvaluationType = sqlx::query_as(
        "INSERT INTO evaluation_types (code, name, coefficient)
         VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&payload.code)
    .bind(&payload.name)
    .bind(payload.coefficient)
    .fetch_one(&state.pool)
    .await?;
    Ok(ApiResponse::created(row))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(code): Path<String>,
    Json(update): Json<EvaluationTypeUpdate>,
) -> ApiResult<EvaluationType> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let existing: Option<EvaluationType> =
        sqlx::query_as("SELECT * FROM evaluation_types WHERE code = $1")
            .bind(&code)
            .fetch_optional(&state.pool)
            .await?;
    let existing = existing
        .ok_or_else(|| ApiError::not_found(format!("Evaluation type {} not found", code)))?;

    let name = match update.name {
        Some(ref n) => required_text("name", n)?,
        None => existing.name,
    };
    let coefficient = match update.coefficient {
        Some(c) => {
            if !c.is_finite() || c <= 0.0 {
                return Err(ApiError::validation(
                    "coefficient must be strictly positive",
                ));
            }
            c
        }
        None => existing.coefficient,
    };

    let row: EvaluationType = sqlx::query_as(
        "UPDATE evaluation_types SET name = $2, coefficient = $3, updated_at = now()
         WHERE code = $1 RETURNING *",
    )
    .bind(&code)
    .bind(&name)
    .bind(coefficient)
    .fetch_one(&state.pool)
    .await?;
    Ok(ApiResponse::success(row))
}

/// Restrict-delete: a type with recorded notes conflicts on the foreign key
/// and surfaces as 409.
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(code): Path<String>,
) -> ApiResult<serde_json::Value> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let result = sqlx::query("DELETE FROM evaluation_types WHERE code = $1")
        .bind(&code)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!(
            "Evaluation type {} not found",
            code
        )));
    }
    Ok(ApiResponse::success(json!({ "deleted": code })))
}
