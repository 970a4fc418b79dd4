use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use sqlx::FromRow;

use crate::auth::verify_token;
use crate::config;
use crate::database::models::user::Role;
use crate::error::ApiError;
use crate::AppState;

/// Authenticated identity attached to every protected request.
#[derive(Clone, Debug, FromRow)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub school_id: Option<String>,
}

/// Bearer-token authentication middleware: verifies the token, re-resolves
/// the user from the database (a deleted user's token must stop working) and
/// injects `AuthUser` into request extensions.
pub async fn authenticate(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(&headers)?;
    let secret = &config::config().security.jwt_secret;
    let claims = verify_token(&token, secret)?;

    let user: Option<AuthUser> = sqlx::query_as(
        "SELECT id, username, role, school_id FROM users WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(claims.sub)
    .fetch_optional(&state.pool)
    .await?;

    let auth_user = user.ok_or(ApiError::UserNotFound)?;
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<String, ApiError> {
    let header = headers
        .get("authorization")
        .or_else(|| headers.get("Authorization"))
        .ok_or_else(|| ApiError::AuthRequired("Missing Authorization header".to_string()))?;

    let value = header
        .to_str()
        .map_err(|_| ApiError::AuthRequired("Invalid Authorization header".to_string()))?;

    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(ApiError::AuthRequired(
            "Authorization header must use the Bearer scheme".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_header_is_auth_required() {
        let headers = HeaderMap::new();
        match extract_bearer(&headers) {
            Err(ApiError::AuthRequired(_)) => {}
            other => panic!("expected AuthRequired, got {:?}", other),
        }
    }

    #[test]
    fn bearer_token_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn non_bearer_scheme_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcg=="));
        assert!(extract_bearer(&headers).is_err());

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer   "));
        assert!(extract_bearer(&headers).is_err());
    }
}
