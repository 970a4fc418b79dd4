//! Database-backed behavior: aggregation upserts, ownership resolution and
//! the schema's integrity rules. Each test runs against its own migrated
//! database.

use anyhow::Result;
use sqlx::PgPool;

use ecole_api::aggregation::{compute_average, upsert_result};
use ecole_api::database::models::result::{Decision, ResultPayload};
use ecole_api::database::models::user::Role;
use ecole_api::error::ApiError;
use ecole_api::guard::Guard;
use ecole_api::middleware::AuthUser;

/// One school with a class, a student and two evaluation types (coefficients
/// 2 and 1) in a composition, plus a second school for ownership checks.
async fn seed(pool: &PgPool) -> Result<()> {
    sqlx::query("INSERT INTO schools (id, name) VALUES ('EC001', 'Ecole A'), ('EC002', 'Ecole B')")
        .execute(pool)
        .await?;
    sqlx::query("INSERT INTO school_years (code, label) VALUES ('2024-2025', 'Annee 2024-2025')")
        .execute(pool)
        .await?;
    sqlx::query(
        "INSERT INTO classes (id, label, level, school_year_code, school_id)
         VALUES ('C1', 'CM2-A', 'CM2', '2024-2025', 'EC001')",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "INSERT INTO students (registration_id, last_name, first_name, gender, class_id, school_id)
         VALUES ('R0001', 'Traore', 'Awa', 'F', 'C1', 'EC001')",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "INSERT INTO evaluation_types (code, name, coefficient)
         VALUES ('DEV', 'Devoir', 2.0), ('ORL', 'Oral', 1.0)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "INSERT INTO compositions (code, label, held_on, kind, school_year_code)
         VALUES ('COMP1', 'Composition 1', '2024-10-15', 'Monthly', '2024-2025')",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn grade(pool: &PgPool, evaluation: &str, value: f64) -> Result<()> {
    sqlx::query(
        "INSERT INTO notes (student_id, evaluation_code, composition_code, value)
         VALUES ('R0001', $1, 'COMP1', $2)
         ON CONFLICT (student_id, evaluation_code, composition_code)
         DO UPDATE SET value = EXCLUDED.value",
    )
    .bind(evaluation)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

fn teacher_of(school: &str) -> AuthUser {
    AuthUser {
        id: 1,
        username: "mdiallo".to_string(),
        role: Role::Teacher,
        school_id: Some(school.to_string()),
    }
}

#[sqlx::test]
async fn average_without_grades_is_a_named_miss(pool: PgPool) -> Result<()> {
    seed(&pool).await?;
    match compute_average(&pool, "R0001", "COMP1").await {
        Err(ApiError::NoGrades(msg)) => assert!(msg.contains("R0001")),
        other => panic!("expected NoGrades, got {:?}", other),
    }
    Ok(())
}

#[sqlx::test]
async fn average_rollup_creates_then_overwrites(pool: PgPool) -> Result<()> {
    seed(&pool).await?;
    grade(&pool, "DEV", 8.0).await?;
    grade(&pool, "ORL", 6.5).await?;

    // (8*2 + 6.5*1) / 3 = 7.5, created on first compute.
    let first = compute_average(&pool, "R0001", "COMP1").await?;
    assert!(first.created);
    assert_eq!(first.average.value, 7.5);

    // A corrected grade recomputes in place rather than adding a row.
    grade(&pool, "ORL", 9.5).await?;
    let second = compute_average(&pool, "R0001", "COMP1").await?;
    assert!(!second.created);
    assert_eq!(second.average.value, 8.5);

    let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM averages")
        .fetch_one(&pool)
        .await?;
    assert_eq!(rows, 1);
    Ok(())
}

#[sqlx::test]
async fn annual_result_upsert_is_create_then_overwrite(pool: PgPool) -> Result<()> {
    seed(&pool).await?;

    let payload = ResultPayload {
        student_id: "R0001".to_string(),
        school_year_code: "2024-2025".to_string(),
        decision: Decision::Admitted,
        rank: 3,
        annual_average: 7.25,
    }
    .validate()?;
    let (row, created) = upsert_result(&pool, &payload).await?;
    assert!(created);
    assert_eq!(row.rank, 3);

    let revised = ResultPayload {
        decision: Decision::Passage,
        rank: 2,
        annual_average: 7.4,
        ..payload
    };
    let (row, created) = upsert_result(&pool, &revised).await?;
    assert!(!created);
    assert_eq!(row.rank, 2);
    assert_eq!(row.decision, Decision::Passage);

    let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM results")
        .fetch_one(&pool)
        .await?;
    assert_eq!(rows, 1);
    Ok(())
}

#[sqlx::test]
async fn ownership_gate_confines_teachers_to_their_school(pool: PgPool) -> Result<()> {
    seed(&pool).await?;
    let guard = Guard::roles(&[Role::Teacher, Role::Administrator]).own_school(
        "students",
        "registration_id",
        "school_id",
    );

    // The student belongs to EC001.
    assert!(guard
        .check(&teacher_of("EC001"), Some("R0001"), &pool)
        .await
        .is_ok());

    match guard.check(&teacher_of("EC002"), Some("R0001"), &pool).await {
        Err(ApiError::OwnershipRequired(_)) => {}
        other => panic!("expected OwnershipRequired, got {:?}", other),
    }

    // Administrators bypass ownership even from another school.
    let admin = AuthUser {
        role: Role::Administrator,
        ..teacher_of("EC002")
    };
    assert!(guard.check(&admin, Some("R0001"), &pool).await.is_ok());

    match guard.check(&teacher_of("EC001"), Some("R9999"), &pool).await {
        Err(ApiError::NotFound(_)) => {}
        other => panic!("expected NotFound, got {:?}", other),
    }
    Ok(())
}

#[sqlx::test]
async fn duplicate_grade_maps_to_a_conflict(pool: PgPool) -> Result<()> {
    seed(&pool).await?;
    grade(&pool, "DEV", 8.0).await?;

    let err = sqlx::query(
        "INSERT INTO notes (student_id, evaluation_code, composition_code, value)
         VALUES ('R0001', 'DEV', 'COMP1', 6.0)",
    )
    .execute(&pool)
    .await
    .unwrap_err();
    match ApiError::from(err) {
        ApiError::UniqueViolation(_) => {}
        other => panic!("expected UniqueViolation, got {:?}", other),
    }
    Ok(())
}

#[sqlx::test]
async fn evaluation_type_in_use_cannot_be_deleted(pool: PgPool) -> Result<()> {
    seed(&pool).await?;
    grade(&pool, "DEV", 8.0).await?;

    let err = sqlx::query("DELETE FROM evaluation_types WHERE code = 'DEV'")
        .execute(&pool)
        .await
        .unwrap_err();
    match ApiError::from(err) {
        ApiError::FkViolation(_) => {}
        other => panic!("expected FkViolation, got {:?}", other),
    }
    Ok(())
}

#[sqlx::test]
async fn removing_a_student_drops_their_grades(pool: PgPool) -> Result<()> {
    seed(&pool).await?;
    grade(&pool, "DEV", 8.0).await?;
    compute_average(&pool, "R0001", "COMP1").await?;

    sqlx::query("DELETE FROM students WHERE registration_id = 'R0001'")
        .execute(&pool)
        .await?;

    let (notes,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notes")
        .fetch_one(&pool)
        .await?;
    let (averages,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM averages")
        .fetch_one(&pool)
        .await?;
    assert_eq!((notes, averages), (0, 0));
    Ok(())
}
