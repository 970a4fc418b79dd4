// HTTP API error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

/// HTTP API error with the status codes and client-facing codes used across
/// every endpoint. Constraint violations coming out of the database are
/// remapped here so driver text never reaches clients.
///
/// The derived `Display` is the log form; response bodies go through
/// `to_json`, which masks server errors in production.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // 400 Bad Request
    #[error("VALIDATION_ERROR: {message}")]
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    // 401 Unauthorized
    #[error("AUTH_REQUIRED: {0}")]
    AuthRequired(String),
    #[error("INVALID_CREDENTIALS: invalid username or password")]
    InvalidCredentials,
    #[error("TOKEN_EXPIRED: authentication token has expired")]
    TokenExpired,
    #[error("TOKEN_MALFORMED: {0}")]
    TokenMalformed(String),
    #[error("USER_NOT_FOUND: authenticated user no longer exists")]
    UserNotFound,

    // 403 Forbidden
    #[error("FORBIDDEN: {0}")]
    Forbidden(String),
    #[error("OWNERSHIP_REQUIRED: {0}")]
    OwnershipRequired(String),

    // 404 Not Found
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("NO_GRADES: {0}")]
    NoGrades(String),

    // 409 Conflict
    #[error("UNIQUE_VIOLATION: {0}")]
    UniqueViolation(String),
    #[error("FK_VIOLATION: {0}")]
    FkViolation(String),

    // 500 Internal Server Error
    #[error("AUTH_CONFIG_ERROR: {0}")]
    AuthConfigError(String),
    #[error("SERVER_ERROR: {0}")]
    ServerError(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            ApiError::AuthRequired(_)
            | ApiError::InvalidCredentials
            | ApiError::TokenExpired
            | ApiError::TokenMalformed(_)
            | ApiError::UserNotFound => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) | ApiError::OwnershipRequired(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) | ApiError::NoGrades(_) => StatusCode::NOT_FOUND,
            ApiError::UniqueViolation(_) | ApiError::FkViolation(_) => StatusCode::CONFLICT,
            ApiError::AuthConfigError(_) | ApiError::ServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::AuthRequired(_) => "AUTH_REQUIRED",
            ApiError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApiError::TokenExpired => "TOKEN_EXPIRED",
            ApiError::TokenMalformed(_) => "TOKEN_MALFORMED",
            ApiError::UserNotFound => "USER_NOT_FOUND",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::OwnershipRequired(_) => "OWNERSHIP_REQUIRED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::NoGrades(_) => "NO_GRADES",
            ApiError::UniqueViolation(_) => "UNIQUE_VIOLATION",
            ApiError::FkViolation(_) => "FK_VIOLATION",
            ApiError::AuthConfigError(_) => "AUTH_CONFIG_ERROR",
            ApiError::ServerError(_) => "SERVER_ERROR",
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::ValidationError { message, .. } => message.clone(),
            ApiError::AuthRequired(msg) => msg.clone(),
            ApiError::InvalidCredentials => "Invalid username or password".to_string(),
            ApiError::TokenExpired => "Authentication token has expired".to_string(),
            ApiError::TokenMalformed(msg) => msg.clone(),
            ApiError::UserNotFound => "Authenticated user no longer exists".to_string(),
            ApiError::Forbidden(msg) => msg.clone(),
            ApiError::OwnershipRequired(msg) => msg.clone(),
            ApiError::NotFound(msg) => msg.clone(),
            ApiError::NoGrades(msg) => msg.clone(),
            ApiError::UniqueViolation(msg) => msg.clone(),
            ApiError::FkViolation(msg) => msg.clone(),
            ApiError::AuthConfigError(msg) => msg.clone(),
            ApiError::ServerError(msg) => {
                if crate::config::config().is_production() {
                    "An error occurred while processing your request".to_string()
                } else {
                    msg.clone()
                }
            }
        }
    }

    pub fn to_json(&self) -> Value {
        let mut error = json!({
            "code": self.error_code(),
            "message": self.message(),
        });
        if let ApiError::ValidationError {
            field_errors: Some(fields),
            ..
        } = self
        {
            error["details"] = json!(fields);
        }
        json!({ "success": false, "error": error })
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors: None,
        }
    }

    pub fn validation_fields(
        message: impl Into<String>,
        field_errors: HashMap<String, String>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors: Some(field_errors),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        ApiError::ServerError(message.into())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::not_found("Record not found"),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                // Postgres class 23: integrity constraint violations
                Some("23505") => {
                    ApiError::UniqueViolation("A record with this key already exists".to_string())
                }
                Some("23503") => ApiError::FkViolation(
                    "Operation conflicts with related records".to_string(),
                ),
                Some("23514") => ApiError::validation("Value rejected by a data constraint"),
                _ => {
                    tracing::error!("database error: {}", db_err);
                    ApiError::server_error("Database error occurred")
                }
            },
            _ => {
                tracing::error!("sqlx error: {}", err);
                ApiError::server_error("Database error occurred")
            }
        }
    }
}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_expected_status() {
        assert_eq!(ApiError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::OwnershipRequired("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(ApiError::NoGrades("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::UniqueViolation("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::AuthConfigError("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn envelope_carries_code_and_message() {
        let err = ApiError::NoGrades("No grades recorded for this student".into());
        let body = err.to_json();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "NO_GRADES");
        assert_eq!(body["error"]["message"], "No grades recorded for this student");
    }

    #[test]
    fn display_form_carries_the_error_code() {
        let err = ApiError::NoGrades("No grades recorded".into());
        assert_eq!(err.to_string(), "NO_GRADES: No grades recorded");
        let err = ApiError::validation("rank must be a positive integer");
        assert_eq!(
            err.to_string(),
            "VALIDATION_ERROR: rank must be a positive integer"
        );
    }

    #[test]
    fn validation_details_surface_field_errors() {
        let mut fields = HashMap::new();
        fields.insert("note".to_string(), "must be between 0 and 10".to_string());
        let body = ApiError::validation_fields("Invalid payload", fields).to_json();
        assert_eq!(body["error"]["details"]["note"], "must be between 0 and 10");
    }
}
