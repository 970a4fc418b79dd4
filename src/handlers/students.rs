use std::collections::HashMap;

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde_json::json;

use crate::database::meta;
use crate::database::models::student::{Student, StudentPayload, StudentUpdate};
use crate::database::models::{check_school_id_format, required_text};
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

    let query = ApiQuery::new(&meta::STUDENTS, params);
    let query = scope_to_school(query, &user)?;
    let rows = query.execute(&state.pool).await?;
    let total = query.count(&state.pool).await?;
    Ok(ListResponse::new("students", rows, total, query.page_size()))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(registration_id): Path<String>,
) -> ApiResult<Student> {
    Guard::any()
        .own_school("students", "registration_id", "school_id")
        .check(&user, Some(&registration_id), &state.pool)
        .await?;

    let row: Option<Student> =
        sqlx::query_as("SELECT * FROM students WHERE registration_id = $1")
            .bind(&registration_id)
            .fetch_optional(&state.pool)
            .await?;
    let row = row
        .ok_or_else(|| ApiError::not_found(format!("Student {} not found", registration_id)))?;
    Ok(ApiResponse::success(row))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<StudentPayload>,
) -> ApiResult<Student> {
    Guard::admin().check(&user, None, &state.pool).await?;
    let payload = payload.validate()?;

    ensure_exists(&state.pool, "schools", "id", &payload.school_id, "School").await?;
    ensure_exists(&state.pool, "classes", "id", &payload.class_id, "Class").await?;

    let row: Student = sqlx::query_as(
        "INSERT INTO students (registration_id, last_name, first_name, gender, class_id, school_id)
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(&payload.registration_id)
    .bind(&payload.last_name)
    .bind(&payload.first_name)
    .bind(payload.gender.as_str())
    .bind(&payload.class_id)
    .bind(&payload.school_id)
    .fetch_one(&state.pool)
    .await?;
    Ok(ApiResponse::created(row))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(registration_id): Path<String>,
    Json(update): Json<StudentUpdate>,
) -> ApiResult<Student> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let existing: Option<Student> =
        sqlx::query_as("SELECT * FROM students WHERE registration_id = $1")
            .bind(&registration_id)
            .fetch_optional(&state.pool)
            .await?;
    let existing = existing
        .ok_or_else(|| ApiError::not_found(format!("Student {} not found", registration_id)))?;

    let last_name = match update.last_name {
        Some(ref n) => required_text("last_name", n)?,
        None => existing.last_name,
    };
    let first_name = match update.first_name {
        Some(ref n) => required_text("first_name", n)?,
        None => existing.first_name,
    };
    let gender = update.gender.unwrap_or(existing.gender);
    let class_id = match update.class_id {
        Some(ref c) => {
            let c = required_text("class_id", c)?;
            ensure_exists(&state.pool, "classes", "id", &c, "Class").await?;
            c
        }
        None => existing.class_id,
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

    let row: Student = sqlx::query_as(
        "UPDATE students SET last_name = $2, first_name = $3, gender = $4, class_id = $5,
                school_id = $6, updated_at = now()
         WHERE registration_id = $1 RETURNING *",
    )
    .bind(&registration_id)
    .bind(&last_name)
    .bind(&first_name)
    .bind(gender.as_str())
    .bind(&class_id)
    .bind(&school_id)
    .fetch_one(&state.pool)
    .await?;
    Ok(ApiResponse::success(row))
}

/// Cascades: deleting a student removes their notes, averages and results.
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(registration_id): Path<String>,
) -> ApiResult<serde_json::Value> {
    Guard::admin().check(&user, None, &state.pool).await?;

    let result = sqlx::query("DELETE FROM students WHERE registration_id = $1")
        .bind(&registration_id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!(
            "Student {} not found",
            registration_id
        )));
    }
    Ok(ApiResponse::success(json!({ "deleted": registration_id })))
}
