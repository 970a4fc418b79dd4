//! Grade aggregation: weighted composition averages and annual results.

use sqlx::PgPool;
use tracing::warn;

use crate::database::models::average::Average;
use crate::database::models::result::{ResultPayload, SchoolResult};
use crate::error::ApiError;

/// Weighted mean of (value, coefficient) pairs: sum(v*c) / sum(c).
///
/// A zero total weight yields 0 rather than an error; a degenerate
/// configuration (all coefficients zero) must not take grading down.
pub fn weighted_average(pairs: &[(f64, f64)]) -> f64 {
    let total_weight: f64 = pairs.iter().map(|(_, c)| c).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    let weighted_sum: f64 = pairs.iter().map(|(v, c)| v * c).sum();
    weighted_sum / total_weight
}

/// Stored averages keep two decimals.
pub fn round_grade(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug)]
pub struct ComputedAverage {
    pub average: Average,
    /// True when the row was created rather than overwritten; drives the
    /// 201-vs-200 response status.
    pub created: bool,
}

/// Roll a student's notes for one composition up into the stored average.
///
/// Finds the notes joined to their evaluation-type coefficients, computes the
/// weighted mean and creates-or-overwrites the (student, composition) row.
/// Concurrent calls for the same pair race on the insert; the composite
/// primary key rejects the loser as a unique violation.
pub async fn compute_average(
    pool: &PgPool,
    student_id: &str,
    composition_code: &str,
) -> Result<ComputedAverage, ApiError> {
    let pairs: Vec<(f64, f64)> = sqlx::query_as(
        "SELECT n.value, e.coefficient
         FROM notes n
         JOIN evaluation_types e ON e.code = n.evaluation_code
         WHERE n.student_id = $1 AND n.composition_code = $2",
    )
    .bind(student_id)
    .bind(composition_code)
    .fetch_all(pool)
    .await?;

    if pairs.is_empty() {
        return Err(ApiError::NoGrades(format!(
            "No grades recorded for student {} in composition {}",
            student_id, composition_code
        )));
    }

    let total_weight: f64 = pairs.iter().map(|(_, c)| c).sum();
    if total_weight <= 0.0 {
        warn!(
            student_id,
            composition_code, "total coefficient weight is zero; average defaults to 0"
        );
    }
    let value = round_grade(weighted_average(&pairs));

    let existing: Option<Average> = sqlx::query_as(
        "SELECT * FROM averages WHERE student_id = $1 AND composition_code = $2",
    )
    .bind(student_id)
    .bind(composition_code)
    .fetch_optional(pool)
    .await?;

    let (average, created) = match existing {
        None => {
            let row: Average = sqlx::query_as(
                "INSERT INTO averages (student_id, composition_code, value)
                 VALUES ($1, $2, $3) RETURNING *",
            )
            .bind(student_id)
            .bind(composition_code)
            .bind(value)
            .fetch_one(pool)
            .await?;
            (row, true)
        }
        Some(_) => {
            let row: Average = sqlx::query_as(
                "UPDATE averages SET value = $3, updated_at = now()
                 WHERE student_id = $1 AND composition_code = $2 RETURNING *",
            )
            .bind(student_id)
            .bind(composition_code)
            .bind(value)
            .fetch_one(pool)
            .await?;
            (row, false)
        }
    };

    Ok(ComputedAverage { average, created })
}

/// Create-or-overwrite the annual result for (student, school year). Decision
/// and rank are administrator-supplied; only range/enum validity is enforced
/// (done by the payload before this call).
pub async fn upsert_result(
    pool: &PgPool,
    payload: &ResultPayload,
) -> Result<(SchoolResult, bool), ApiError> {
    let existing: Option<SchoolResult> = sqlx::query_as(
        "SELECT * FROM results WHERE student_id = $1 AND school_year_code = $2",
    )
    .bind(&payload.student_id)
    .bind(&payload.school_year_code)
    .fetch_optional(pool)
    .await?;

    match existing {
        None => {
            let row: SchoolResult = sqlx::query_as(
                "INSERT INTO results (student_id, school_year_code, decision, rank, annual_average)
                 VALUES ($1, $2, $3, $4, $5) RETURNING *",
            )
            .bind(&payload.student_id)
            .bind(&payload.school_year_code)
            .bind(payload.decision.as_str())
            .bind(payload.rank)
            .bind(payload.annual_average)
            .fetch_one(pool)
            .await?;
            Ok((row, true))
        }
        Some(_) => {
            let row: SchoolResult = sqlx::query_as(
                "UPDATE results SET decision = $3, rank = $4, annual_average = $5, updated_at = now()
                 WHERE student_id = $1 AND school_year_code = $2 RETURNING *",
            )
            .bind(&payload.student_id)
            .bind(&payload.school_year_code)
            .bind(payload.decision.as_str())
            .bind(payload.rank)
            .bind(payload.annual_average)
            .fetch_one(pool)
            .await?;
            Ok((row, false))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_average_uses_coefficients() {
        // (8*2 + 6*1) / 3 = 7.333...
        let pairs = [(8.0, 2.0), (6.0, 1.0)];
        let avg = weighted_average(&pairs);
        assert!((avg - 22.0 / 3.0).abs() < 1e-9);
        assert_eq!(round_grade(avg), 7.33);
    }

    #[test]
    fn single_note_average_is_the_note() {
        assert_eq!(weighted_average(&[(9.5, 4.0)]), 9.5);
    }

    #[test]
    fn zero_total_weight_defaults_to_zero() {
        assert_eq!(weighted_average(&[(8.0, 0.0), (6.0, 0.0)]), 0.0);
        assert_eq!(weighted_average(&[]), 0.0);
    }

    #[test]
    fn rounding_keeps_two_decimals() {
        assert_eq!(round_grade(22.0 / 3.0), 7.33);
        assert_eq!(round_grade(26.0 / 3.0), 8.67);
        assert_eq!(round_grade(10.0), 10.0);
    }
}
