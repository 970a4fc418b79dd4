use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{check_school_id_format, check_year_code_format, required_text};
use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SchoolClass {
    pub id: String,
    pub label: String,
    pub level: String,
    pub school_year_code: String,
    pub school_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ClassPayload {
    pub id: String,
    pub label: String,
    pub level: String,
    pub school_year_code: String,
    pub school_id: String,
}

impl ClassPayload {
    pub fn validate(self) -> Result<Self, ApiError> {
        let school_id = required_text("school_id", &self.school_id)?;
        check_school_id_format(&school_id)?;
        let school_year_code = required_text("school_year_code", &self.school_year_code)?;
        check_year_code_format(&school_year_code)?;
        Ok(Self {
            id: required_text("id", &self.id)?,
            label: required_text("label", &self.label)?,
            level: required_text("level", &self.level)?,
            school_year_code,
            school_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ClassUpdate {
    pub label: Option<String>,
    pub level: Option<String>,
    pub school_year_code: Option<String>,
    pub school_id: Option<String>,
}
