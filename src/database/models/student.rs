use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{check_school_id_format, required_text};
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum Gender {
    M,
    F,
}

impl Gender {
    /// String form bound to the TEXT `gender` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::M => "M",
            Gender::F => "F",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub registration_id: String,
    pub last_name: String,
    pub first_name: String,
    pub gender: Gender,
    pub class_id: String,
    pub school_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct StudentPayload {
    pub registration_id: String,
    pub last_name: String,
    pub first_name: String,
    pub gender: Gender,
    pub class_id: String,
    pub school_id: String,
}

impl StudentPayload {
    pub fn validate(self) -> Result<Self, ApiError> {
        let school_id = required_text("school_id", &self.school_id)?;
        check_school_id_format(&school_id)?;
        Ok(Self {
            registration_id: required_text("registration_id", &self.registration_id)?,
            last_name: required_text("last_name", &self.last_name)?,
            first_name: required_text("first_name", &self.first_name)?,
            gender: self.gender,
            class_id: required_text("class_id", &self.class_id)?,
            school_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct StudentUpdate {
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub gender: Option<Gender>,
    pub class_id: Option<String>,
    pub school_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_binds_the_values_the_schema_allows() {
        // Must stay in sync with the CHECK constraint on students.gender.
        assert_eq!(Gender::M.as_str(), "M");
        assert_eq!(Gender::F.as_str(), "F");
    }
}
