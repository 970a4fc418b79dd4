use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::database::models::user::{Role, User};
use crate::error::ApiError;

pub const TOKEN_ISSUER: &str = "ecole-api";
pub const TOKEN_AUDIENCE: &str = "ecole-api-clients";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: user id.
    pub sub: i64,
    pub username: String,
    pub role: Role,
    /// School the user belongs to; used for ownership scoping.
    pub school: Option<String>,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn for_user(user: &User, expiry_hours: u64) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            school: Some(user.school_id.clone()),
            iss: TOKEN_ISSUER.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(expiry_hours as i64)).timestamp(),
        }
    }
}

/// Sign a token with the configured secret. The secret is passed in rather
/// than read here so token logic stays testable without process-global state.
pub fn issue_token(claims: &Claims, secret: &str) -> Result<String, ApiError> {
    if secret.is_empty() {
        return Err(ApiError::AuthConfigError(
            "JWT signing secret is not configured".to_string(),
        ));
    }
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::AuthConfigError(format!("Failed to sign token: {}", e)))
}

/// Verify signature, expiry, issuer and audience; distinguishes an expired
/// token from a malformed one so clients can refresh instead of re-login.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    if secret.is_empty() {
        return Err(ApiError::AuthConfigError(
            "JWT signing secret is not configured".to_string(),
        ));
    }
    let mut validation = Validation::default();
    validation.set_issuer(&[TOKEN_ISSUER]);
    validation.set_audience(&[TOKEN_AUDIENCE]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => ApiError::TokenExpired,
        _ => ApiError::TokenMalformed(format!("Invalid token: {}", e)),
    })
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, ApiError> {
    bcrypt::hash(password, cost)
        .map_err(|e| ApiError::server_error(format!("Password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    bcrypt::verify(password, hash)
        .map_err(|e| ApiError::server_error(format!("Password verification failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::user::Role;

    fn sample_claims(expiry_hours: i64) -> Claims {
        let now = Utc::now();
        Claims {
            sub: 7,
            username: "mdiallo".to_string(),
            role: Role::Teacher,
            school: Some("EC001".to_string()),
            iss: TOKEN_ISSUER.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(expiry_hours)).timestamp(),
        }
    }

    #[test]
    fn token_round_trip_preserves_identity() {
        let claims = sample_claims(1);
        let token = issue_token(&claims, "unit-test-secret").unwrap();
        let decoded = verify_token(&token, "unit-test-secret").unwrap();
        assert_eq!(decoded.sub, 7);
        assert_eq!(decoded.username, "mdiallo");
        assert_eq!(decoded.role, Role::Teacher);
        assert_eq!(decoded.school.as_deref(), Some("EC001"));
    }

    #[test]
    fn expired_token_reports_token_expired() {
        let claims = sample_claims(-2);
        let token = issue_token(&claims, "unit-test-secret").unwrap();
        match verify_token(&token, "unit-test-secret") {
            Err(ApiError::TokenExpired) => {}
            other => panic!("expected TokenExpired, got {:?}", other),
        }
    }

    #[test]
    fn wrong_secret_reports_malformed() {
        let token = issue_token(&sample_claims(1), "secret-a").unwrap();
        match verify_token(&token, "secret-b") {
            Err(ApiError::TokenMalformed(_)) => {}
            other => panic!("expected TokenMalformed, got {:?}", other),
        }
    }

    #[test]
    fn empty_secret_is_a_config_error() {
        match issue_token(&sample_claims(1), "") {
            Err(ApiError::AuthConfigError(_)) => {}
            other => panic!("expected AuthConfigError, got {:?}", other),
        }
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("s3cret!", 4).unwrap();
        assert!(verify_password("s3cret!", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }
}
