use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{check_grade_range, check_year_code_format, required_text};
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
pub enum Decision {
    Admitted,
    Refused,
    Passage,
}

impl Decision {
    /// String form bound to the TEXT `decision` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Admitted => "Admitted",
            Decision::Refused => "Refused",
            Decision::Passage => "Passage",
        }
    }
}

/// Annual outcome for one student in one school year. Decision and rank are
/// administrator-supplied; the system validates and persists them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SchoolResult {
    pub student_id: String,
    pub school_year_code: String,
    pub decision: Decision,
    pub rank: i32,
    pub annual_average: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ResultPayload {
    pub student_id: String,
    pub school_year_code: String,
    pub decision: Decision,
    pub rank: i32,
    pub annual_average: f64,
}

impl ResultPayload {
    pub fn validate(self) -> Result<Self, ApiError> {
        if self.rank < 1 {
            return Err(ApiError::validation("rank must be a positive integer"));
        }
        check_grade_range("annual_average", self.annual_average)?;
        let school_year_code = required_text("school_year_code", &self.school_year_code)?;
        check_year_code_format(&school_year_code)?;
        Ok(Self {
            student_id: required_text("student_id", &self.student_id)?,
            school_year_code,
            decision: self.decision,
            rank: self.rank,
            annual_average: self.annual_average,
        })
    }
}
