pub mod auth;
pub mod averages;
pub mod classes;
pub mod compositions;
pub mod evaluation_types;
pub mod notes;
pub mod results;
pub mod school_years;
pub mod schools;
pub mod students;
pub mod users;

use sqlx::PgPool;

use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::query::ApiQuery;

/// Narrow a list query to the caller's school unless the caller is an
/// administrator. A scoped caller without a school sees an empty list.
pub(crate) fn scope_to_school(query: ApiQuery, user: &AuthUser) -> Result<ApiQuery, ApiError> {
    if user.role.is_admin() {
        return Ok(query);
    }
    match &user.school_id {
        Some(school) => query.scope("school_id", school.as_str()),
        None => Ok(query.scope_match_nothing()),
    }
}

/// Foreign-key precheck: referenced rows must exist before a write, so the
/// client sees a named 404 instead of a bare constraint conflict.
pub(crate) async fn ensure_exists(
    pool: &PgPool,
    table: &'static str,
    id_column: &'static str,
    id: &str,
    what: &str,
) -> Result<(), ApiError> {
    // Identifiers are static strings from the handlers, never client input.
    let sql = format!(
        "SELECT 1 FROM \"{}\" WHERE \"{}\" = $1",
        table, id_column
    );
    let row: Option<(i32,)> = sqlx::query_as(&sql).bind(id).fetch_optional(pool).await?;
    match row {
        Some(_) => Ok(()),
        None => Err(ApiError::not_found(format!("{} {} not found", what, id))),
    }
}
