use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::required_text;
use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EvaluationType {
    pub code: String,
    pub name: String,
    /// Weight applied when rolling notes up into a composition average.
    pub coefficient: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct EvaluationTypePayload {
    pub code: String,
    pub name: String,
    pub coefficient: f64,
}

impl EvaluationTypePayload {
    pub fn validate(self) -> Result<Self, ApiError> {
        if !self.coefficient.is_finite() || self.coefficient <= 0.0 {
            return Err(ApiError::validation(
                "coefficient must be strictly positive",
            ));
        }
        Ok(Self {
            code: required_text("code", &self.code)?,
            name: required_text("name", &self.name)?,
            coefficient: self.coefficient,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct EvaluationTypeUpdate {
    pub name: Option<String>,
    pub coefficient: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coefficient_must_be_positive() {
        let base = |coefficient| EvaluationTypePayload {
            code: "DEV".to_string(),
            name: "Devoir".to_string(),
            coefficient,
        };
        assert!(base(2.0).validate().is_ok());
        assert!(base(0.0).validate().is_err());
        assert!(base(-1.0).validate().is_err());
    }
}
