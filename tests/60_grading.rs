use anyhow::Result;

use ecole_api::aggregation::{round_grade, weighted_average};
use ecole_api::auth::{issue_token, verify_token, Claims, TOKEN_AUDIENCE, TOKEN_ISSUER};
use ecole_api::database::models::user::Role;
use ecole_api::guard::Guard;

#[test]
fn composition_average_weights_by_coefficient() {
    // Two written tests (coefficient 2) at 8, one oral (coefficient 1) at 6.
    let pairs = [(8.0, 2.0), (8.0, 2.0), (6.0, 1.0)];
    assert_eq!(round_grade(weighted_average(&pairs)), 7.6);
}

#[test]
fn degenerate_coefficients_do_not_break_grading() {
    assert_eq!(weighted_average(&[(8.0, 0.0)]), 0.0);
}

#[test]
fn role_policy_matches_route_declarations() {
    // Administrative CRUD.
    assert!(Guard::admin().check_role(Role::Administrator).is_ok());
    assert!(Guard::admin().check_role(Role::Teacher).is_err());
    assert!(Guard::admin().check_role(Role::Other).is_err());

    // Grade entry is reserved to teachers.
    let grading = Guard::roles(&[Role::Teacher]);
    assert!(grading.check_role(Role::Teacher).is_ok());
    assert!(grading.check_role(Role::Administrator).is_err());

    // Reads admit any authenticated role.
    assert!(Guard::any().check_role(Role::Other).is_ok());
}

#[test]
fn issued_token_carries_the_school_for_ownership_checks() -> Result<()> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: 42,
        username: "ndiaye".to_string(),
        role: Role::Teacher,
        school: Some("EC007".to_string()),
        iss: TOKEN_ISSUER.to_string(),
        aud: TOKEN_AUDIENCE.to_string(),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::hours(1)).timestamp(),
    };

    let token = issue_token(&claims, "integration-secret")?;
    let decoded = verify_token(&token, "integration-secret")?;
    assert_eq!(decoded.school.as_deref(), Some("EC007"));
    assert_eq!(decoded.role, Role::Teacher);
    Ok(())
}
