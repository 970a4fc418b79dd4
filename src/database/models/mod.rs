pub mod average;
pub mod class;
pub mod composition;
pub mod evaluation_type;
pub mod note;
pub mod result;
pub mod school;
pub mod school_year;
pub mod student;
pub mod user;

use crate::error::ApiError;

/// Trim and require a non-empty value; string inputs are normalized here so
/// the rest of the stack only sees trimmed text.
pub fn required_text(field: &str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// School ids follow the `EC` + 3 digits format, e.g. EC042.
pub fn check_school_id_format(id: &str) -> Result<(), ApiError> {
    let valid = id.len() == 5
        && id.starts_with("EC")
        && id[2..].chars().all(|c| c.is_ascii_digit());
    if !valid {
        return Err(ApiError::validation(format!(
            "school id must match EC followed by 3 digits, got '{}'",
            id
        )));
    }
    Ok(())
}

/// School year codes follow the `YYYY-YYYY` format, e.g. 2024-2025.
pub fn check_year_code_format(code: &str) -> Result<(), ApiError> {
    let parts: Vec<&str> = code.split('-').collect();
    let valid = parts.len() == 2
        && parts
            .iter()
            .all(|p| p.len() == 4 && p.chars().all(|c| c.is_ascii_digit()));
    if !valid {
        return Err(ApiError::validation(format!(
            "school year code must match YYYY-YYYY, got '{}'",
            code
        )));
    }
    Ok(())
}

/// Grades, averages and annual averages live in the closed interval [0,10].
/// Out-of-range values are rejected, never clamped.
pub fn check_grade_range(field: &str, value: f64) -> Result<(), ApiError> {
    if !value.is_finite() || !(0.0..=10.0).contains(&value) {
        return Err(ApiError::validation(format!(
            "{} must be between 0 and 10",
            field
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn school_id_format() {
        assert!(check_school_id_format("EC001").is_ok());
        assert!(check_school_id_format("EC1234").is_err());
        assert!(check_school_id_format("XX001").is_err());
        assert!(check_school_id_format("EC0a1").is_err());
    }

    #[test]
    fn year_code_format() {
        assert!(check_year_code_format("2024-2025").is_ok());
        assert!(check_year_code_format("2024/2025").is_err());
        assert!(check_year_code_format("24-25").is_err());
    }

    #[test]
    fn grade_range_rejects_out_of_bounds() {
        assert!(check_grade_range("note", 0.0).is_ok());
        assert!(check_grade_range("note", 10.0).is_ok());
        assert!(check_grade_range("note", 10.5).is_err());
        assert!(check_grade_range("note", -1.0).is_err());
        assert!(check_grade_range("note", f64::NAN).is_err());
    }

    #[test]
    fn required_text_trims() {
        assert_eq!(required_text("name", "  Alpha  ").unwrap(), "Alpha");
        assert!(required_text("name", "   ").is_err());
    }
}
