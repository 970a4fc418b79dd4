use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{check_year_code_format, required_text};
use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SchoolYear {
    pub code: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SchoolYearPayload {
    pub code: String,
    pub label: String,
}

impl SchoolYearPayload {
    pub fn validate(self) -> Result<Self, ApiError> {
        let code = required_text("code", &self.code)?;
        check_year_code_format(&code)?;
        Ok(Self {
            code,
            label: required_text("label", &self.label)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SchoolYearUpdate {
    pub label: Option<String>,
}
