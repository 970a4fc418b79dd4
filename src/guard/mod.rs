//! Role and ownership authorization.
//!
//! Every protected route declares a `Guard`: the roles allowed through and,
//! where the route touches a school-owned resource, an ownership policy.
//! Administrators bypass ownership checks; Teachers are confined to resources
//! under their own school.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::database::models::user::Role;
use crate::error::ApiError;
use crate::middleware::AuthUser;

/// Ownership policies are an explicit, exhaustively-matched set: either the
/// resource row carries a school column to compare against the caller's
/// school, or a custom resolver walks an indirection (e.g. note -> student ->
/// school).
#[derive(Clone)]
pub enum OwnershipPolicy {
    SchoolColumn {
        table: &'static str,
        id_column: &'static str,
        school_column: &'static str,
    },
    Custom(Arc<dyn OwnershipResolver>),
}

#[async_trait]
pub trait OwnershipResolver: Send + Sync {
    async fn resolve(
        &self,
        identity: &AuthUser,
        resource_id: &str,
        pool: &PgPool,
    ) -> Result<bool, ApiError>;
}

#[derive(Clone)]
pub struct Guard {
    roles: &'static [Role],
    ownership: Option<OwnershipPolicy>,
}

impl Guard {
    /// Any authenticated user.
    pub fn any() -> Self {
        Self {
            roles: &[],
            ownership: None,
        }
    }

    pub fn roles(roles: &'static [Role]) -> Self {
        Self {
            roles,
            ownership: None,
        }
    }

    pub fn admin() -> Self {
        Self::roles(&[Role::Administrator])
    }

    pub fn own_school(
        self,
        table: &'static str,
        id_column: &'static str,
        school_column: &'static str,
    ) -> Self {
        Self {
            ownership: Some(OwnershipPolicy::SchoolColumn {
                table,
                id_column,
                school_column,
            }),
            ..self
        }
    }

    pub fn custom_ownership(self, resolver: Arc<dyn OwnershipResolver>) -> Self {
        Self {
            ownership: Some(OwnershipPolicy::Custom(resolver)),
            ..self
        }
    }

    /// Role membership only; pure so it is testable without a database.
    pub fn check_role(&self, role: Role) -> Result<(), ApiError> {
        if self.roles.is_empty() || self.roles.contains(&role) {
            return Ok(());
        }
        Err(ApiError::forbidden(
            "Your role does not allow this operation",
        ))
    }

    /// Full gate: role membership, then ownership where required.
    pub async fn check(
        &self,
        identity: &AuthUser,
        resource_id: Option<&str>,
        pool: &PgPool,
    ) -> Result<(), ApiError> {
        self.check_role(identity.role)?;

        let Some(policy) = &self.ownership else {
            return Ok(());
        };
        if identity.role.is_admin() {
            return Ok(());
        }

        // A guard demanding ownership on a route that resolves no resource id
        // is a wiring bug, not a client error.
        let resource_id = resource_id.ok_or_else(|| {
            ApiError::AuthConfigError(
                "ownership check configured without a resource identifier".to_string(),
            )
        })?;

        let owned = match policy {
            OwnershipPolicy::SchoolColumn {
                table,
                id_column,
                school_column,
            } => {
                let school =
                    school_of_resource(pool, table, id_column, school_column, resource_id)
                        .await?;
                identity.school_id.as_deref() == Some(school.as_str())
            }
            OwnershipPolicy::Custom(resolver) => {
                resolver.resolve(identity, resource_id, pool).await?
            }
        };

        if owned {
            Ok(())
        } else {
            Err(ApiError::OwnershipRequired(
                "This resource belongs to another school".to_string(),
            ))
        }
    }
}

async fn school_of_resource(
    pool: &PgPool,
    table: &str,
    id_column: &str,
    school_column: &str,
    resource_id: &str,
) -> Result<String, ApiError> {
    // Identifiers come from static guard declarations, never client input.
    let sql = format!(
        "SELECT \"{}\" FROM \"{}\" WHERE \"{}\" = $1",
        school_column, table, id_column
    );
    let row: Option<(String,)> = sqlx::query_as(&sql)
        .bind(resource_id)
        .fetch_optional(pool)
        .await?;
    match row {
        Some((school,)) => Ok(school),
        None => Err(ApiError::not_found("Resource not found")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_role_list_admits_any_role() {
        let guard = Guard::any();
        assert!(guard.check_role(Role::Teacher).is_ok());
        assert!(guard.check_role(Role::Other).is_ok());
    }

    #[test]
    fn role_list_excludes_non_members() {
        let guard = Guard::admin();
        assert!(guard.check_role(Role::Administrator).is_ok());
        match guard.check_role(Role::Teacher) {
            Err(ApiError::Forbidden(_)) => {}
            other => panic!("expected Forbidden, got {:?}", other),
        }
    }

    #[test]
    fn teacher_routes_admit_teachers_only() {
        let guard = Guard::roles(&[Role::Teacher]);
        assert!(guard.check_role(Role::Teacher).is_ok());
        assert!(guard.check_role(Role::Administrator).is_err());
    }
}
