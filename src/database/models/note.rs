use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{check_grade_range, required_text};
use crate::error::ApiError;

/// One raw grade: a student's score on one evaluation type within one
/// composition. Keyed by the (student, evaluation, composition) triple.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Note {
    pub student_id: String,
    pub evaluation_code: String,
    pub composition_code: String,
    pub value: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct NotePayload {
    pub student_id: String,
    pub evaluation_code: String,
    pub composition_code: String,
    pub value: f64,
}

impl NotePayload {
    pub fn validate(self) -> Result<Self, ApiError> {
        check_grade_range("value", self.value)?;
        Ok(Self {
            student_id: required_text("student_id", &self.student_id)?,
            evaluation_code: required_text("evaluation_code", &self.evaluation_code)?,
            composition_code: required_text("composition_code", &self.composition_code)?,
            value: self.value,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct NoteUpdate {
    pub value: f64,
}

impl NoteUpdate {
    pub fn validate(self) -> Result<Self, ApiError> {
        check_grade_range("value", self.value)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(value: f64) -> NotePayload {
        NotePayload {
            student_id: "R0001".to_string(),
            evaluation_code: "DEV".to_string(),
            composition_code: "C1".to_string(),
            value,
        }
    }

    #[test]
    fn value_outside_range_is_rejected_before_persistence() {
        assert!(payload(7.5).validate().is_ok());
        assert!(payload(10.5).validate().is_err());
        assert!(payload(-1.0).validate().is_err());
    }
}
