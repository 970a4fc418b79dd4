use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{check_year_code_format, required_text};
use crate::error::ApiError;

/// Kind of grading period: a monthly test, a programme exam or a promotion
/// (passage) exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum CompositionKind {
    Monthly,
    Programme,
    Passage,
}

impl CompositionKind {
    /// String form bound to the TEXT `kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositionKind::Monthly => "Monthly",
            CompositionKind::Programme => "Programme",
            CompositionKind::Passage => "Passage",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Composition {
    pub code: String,
    pub label: String,
    pub held_on: NaiveDate,
    pub kind: CompositionKind,
    pub school_year_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CompositionPayload {
    pub code: String,
    pub label: String,
    pub held_on: NaiveDate,
    pub kind: CompositionKind,
    pub school_year_code: String,
}

impl CompositionPayload {
    pub fn validate(self) -> Result<Self, ApiError> {
        let school_year_code = required_text("school_year_code", &self.school_year_code)?;
        check_year_code_format(&school_year_code)?;
        Ok(Self {
            code: required_text("code", &self.code)?,
            label: required_text("label", &self.label)?,
            held_on: self.held_on,
            kind: self.kind,
            school_year_code,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CompositionUpdate {
    pub label: Option<String>,
    pub held_on: Option<NaiveDate>,
    pub kind: Option<CompositionKind>,
    pub school_year_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_binds_the_values_the_schema_allows() {
        // Must stay in sync with the CHECK constraint on compositions.kind.
        assert_eq!(CompositionKind::Monthly.as_str(), "Monthly");
        assert_eq!(CompositionKind::Programme.as_str(), "Programme");
        assert_eq!(CompositionKind::Passage.as_str(), "Passage");
    }
}
