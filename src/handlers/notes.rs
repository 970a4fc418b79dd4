use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use serde_json::json;
use sqlx::PgPool;

use crate::database::meta;
use crate::database::models::note::{Note, NotePayload, NoteUpdate};
use crate::database::models::user::Role;
use crate::error::ApiError;
use crate::guard::{Guard, OwnershipResolver};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, ListResponse};
use crate::query::ApiQuery;
use crate::AppState;

use super::ensure_exists;

/// Notes carry no school column of their own; ownership goes through the
/// graded student's school.
pub struct StudentSchoolResolver;

#[async_trait]
impl OwnershipResolver for StudentSchoolResolver {
    async fn resolve(
        &self,
        identity: &AuthUser,
        resource_id: &str,
        pool: &PgPool,
    ) -> Result<bool, ApiError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT school_id FROM students WHERE registration_id = $1")
                .bind(resource_id)
                .fetch_optional(pool)
                .await?;
        match row {
            Some((school,)) => Ok(identity.school_id.as_deref() == Some(school.as_str())),
            None => Err(ApiError::not_found(format!(
                "Student {} not found",
                resource_id
            ))),
        }
    }
}

fn teacher_guard() -> Guard {
    Guard::roles(&[Role::Teacher]).custom_ownership(Arc::new(StudentSchoolResolver))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<ListResponse, ApiError> {
    Guard::any().check(&user, None, &state.pool).await?;

    let query = ApiQuery::new(&meta::NOTES, params);
    let rows = query.execute(&state.pool).await?;
    let total = query.count(&state.pool).await?;
    Ok(ListResponse::new("notes", rows, total, query.page_size()))
}

/// GET /notes/eleve/:studentId - every grade recorded for one student.
pub async fn list_for_student(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(student_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<ListResponse, ApiError> {
    Guard::any().check(&user, None, &state.pool).await?;

    ensure_exists(&state.pool, "students", "registration_id", &student_id, "Student").await?;

    let query = ApiQuery::new(&meta::NOTES, params).scope("student_id", student_id.as_str())?;
    let rows = query.execute(&state.pool).await?;
    let total = query.count(&state.pool).await?;
    Ok(ListResponse::new("notes", rows, total, query.page_size()))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<NotePayload>,
) -> ApiResult<Note> {
    let payload = payload.validate()?;
    teacher_guard()
        .check(&user, Some(&payload.student_id), &state.pool)
        .await?;

    ensure_exists(
        &state.pool,
        "evaluation_types",
        "code",
        &payload.evaluation_code,
        "Evaluation type",
    )
    .await?;
    ensure_exists(
        &state.pool,
        "compositions",
        "code",
        &payload.composition_code,
        "Composition",
    )
    .await?;

    let row: Note = sqlx::query_as(
        "INSERT INTO notes (student_id, evaluation_code, composition_code, value)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(&payload.student_id)
    .bind(&payload.evaluation_code)
    .bind(&payload.composition_code)
    .bind(payload.value)
    .fetch_one(&state.pool)
    .await?;
    Ok(ApiResponse::created(row))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((student_id, evaluation_code, composition_code)): Path<(String, String, String)>,
    Json(update): Json<NoteUpdate>,
) -> ApiResult<Note> {
    let update = update.validate()?;
    teacher_guard()
        .check(&user, Some(&student_id), &state.pool)
        .await?;

    let row: Option<Note> = sqlx::query_as(
        "UPDATE notes SET value = $4, updated_at = now()
         WHERE student_id = $1 AND evaluation_code = $2 AND composition_code = $3
         RETURNING *",
    )
    .bind(&student_id)
    .bind(&evaluation_code)
    .bind(&composition_code)
    .bind(update.value)
    .fetch_optional(&state.pool)
    .await?;
    let row = row.ok_or_else(|| {
        ApiError::not_found(format!(
            "Note for student {} on {}/{} not found",
            student_id, evaluation_code, composition_code
        ))
    })?;
    Ok(ApiResponse::success(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((student_id, evaluation_code, composition_code)): Path<(String, String, String)>,
) -> ApiResult<serde_json::Value> {
    teacher_guard()
        .check(&user, Some(&student_id), &state.pool)
        .await?;

    let result = sqlx::query(
        "DELETE FROM notes
         WHERE student_id = $1 AND evaluation_code = $2 AND composition_code = $3",
    )
    .bind(&student_id)
    .bind(&evaluation_code)
    .bind(&composition_code)
    .execute(&state.pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found(format!(
            "Note for student {} on {}/{} not found",
            student_id, evaluation_code, composition_code
        )));
    }
    Ok(ApiResponse::success(json!({
        "deleted": {
            "student_id": student_id,
            "evaluation_code": evaluation_code,
            "composition_code": composition_code,
        }
    })))
}
