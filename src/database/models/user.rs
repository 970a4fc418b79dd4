use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{check_school_id_format, required_text};
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum Role {
    Administrator,
    Teacher,
    Other,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Administrator)
    }

    /// String form bound to the TEXT `role` column; the values match the
    /// column's CHECK constraint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "Administrator",
            Role::Teacher => "Teacher",
            Role::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub school_id: String,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UserPayload {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
    pub school_id: String,
}

impl UserPayload {
    pub fn validate(self) -> Result<Self, ApiError> {
        let username = required_text("username", &self.username)?;
        check_username_format(&username)?;
        if self.password.len() < 8 {
            return Err(ApiError::validation(
                "password must be at least 8 characters",
            ));
        }
        let school_id = required_text("school_id", &self.school_id)?;
        check_school_id_format(&school_id)?;
        Ok(Self {
            username,
            password: self.password,
            role: self.role,
            school_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub school_id: Option<String>,
}

/// Usernames: 3-50 characters, alphanumeric plus underscore and hyphen,
/// starting with a letter or digit.
pub fn check_username_format(username: &str) -> Result<(), ApiError> {
    if username.len() < 3 || username.len() > 50 {
        return Err(ApiError::validation(
            "username must be between 3 and 50 characters",
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ApiError::validation(
            "username may only contain letters, numbers, underscore and hyphen",
        ));
    }
    if !username.chars().next().unwrap().is_ascii_alphanumeric() {
        return Err(ApiError::validation(
            "username must start with a letter or number",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_binds_the_values_the_schema_allows() {
        // Must stay in sync with the CHECK constraint on users.role.
        assert_eq!(Role::Administrator.as_str(), "Administrator");
        assert_eq!(Role::Teacher.as_str(), "Teacher");
        assert_eq!(Role::Other.as_str(), "Other");
    }

    #[test]
    fn username_rules() {
        assert!(check_username_format("mdiallo").is_ok());
        assert!(check_username_format("m-diallo_2").is_ok());
        assert!(check_username_format("ab").is_err());
        assert!(check_username_format("-lead").is_err());
        assert!(check_username_format("bad name").is_err());
        assert!(check_username_format(&"x".repeat(51)).is_err());
    }
}
