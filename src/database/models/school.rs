use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{check_school_id_format, optional_text, required_text};
use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct School {
    pub id: String,
    pub name: String,
    pub district: Option<String>,
    pub city: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SchoolPayload {
    pub id: String,
    pub name: String,
    pub district: Option<String>,
    pub city: Option<String>,
}

impl SchoolPayload {
    pub fn validate(self) -> Result<Self, ApiError> {
        let id = required_text("id", &self.id)?;
        check_school_id_format(&id)?;
        Ok(Self {
            id,
            name: required_text("name", &self.name)?,
            district: optional_text(self.district.as_deref()),
            city: optional_text(self.city.as_deref()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SchoolUpdate {
    pub name: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
}
