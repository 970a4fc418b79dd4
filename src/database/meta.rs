//! Per-collection query metadata.
//!
//! Each entity collection declares its table, columns, searchable fields and
//! default-hidden fields in one static struct. The registry is validated once
//! at startup so the query layer can trust every identifier it interpolates.

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Int,
    Float,
    Bool,
    Date,
    Timestamp,
}

#[derive(Debug)]
pub struct CollectionMeta {
    pub table: &'static str,
    pub columns: &'static [(&'static str, ColumnKind)],
    /// Fields matched by the `keyword` search parameter. Empty disables search.
    pub searchable: &'static [&'static str],
    /// Fields excluded from responses unless explicitly requested.
    pub hidden: &'static [&'static str],
    /// Logical deletion: listing appends `deleted_at IS NULL`.
    pub soft_delete: bool,
    /// Default sort key (descending) when no `sort` parameter is given.
    pub created_column: &'static str,
}

impl CollectionMeta {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(c, _)| *c == name)
    }

    pub fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        self.columns
            .iter()
            .find(|(c, _)| *c == name)
            .map(|(_, k)| *k)
    }

    /// Column set projected when the request has no `fields` parameter.
    pub fn default_projection(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .map(|(c, _)| *c)
            .filter(|c| !self.hidden.contains(c))
            .collect()
    }
}

use ColumnKind::*;

pub static SCHOOLS: CollectionMeta = CollectionMeta {
    table: "schools",
    columns: &[
        ("id", Text),
        ("name", Text),
        ("district", Text),
        ("city", Text),
        ("created_at", Timestamp),
        ("updated_at", Timestamp),
    ],
    searchable: &["name", "city", "district"],
    hidden: &["created_at", "updated_at"],
    soft_delete: false,
    created_column: "created_at",
};

pub static USERS: CollectionMeta = CollectionMeta {
    table: "users",
    columns: &[
        ("id", Int),
        ("username", Text),
        ("password_hash", Text),
        ("role", Text),
        ("school_id", Text),
        ("last_login", Timestamp),
        ("created_at", Timestamp),
        ("updated_at", Timestamp),
        ("deleted_at", Timestamp),
    ],
    searchable: &["username"],
    hidden: &["password_hash", "deleted_at", "created_at", "updated_at"],
    soft_delete: true,
    created_column: "created_at",
};

pub static SCHOOL_YEARS: CollectionMeta = CollectionMeta {
    table: "school_years",
    columns: &[
        ("code", Text),
        ("label", Text),
        ("created_at", Timestamp),
        ("updated_at", Timestamp),
    ],
    searchable: &["label"],
    hidden: &["created_at", "updated_at"],
    soft_delete: false,
    created_column: "created_at",
};

pub static CLASSES: CollectionMeta = CollectionMeta {
    table: "classes",
    columns: &[
        ("id", Text),
        ("label", Text),
        ("level", Text),
        ("school_year_code", Text),
        ("school_id", Text),
        ("created_at", Timestamp),
        ("updated_at", Timestamp),
    ],
    searchable: &["label", "level"],
    hidden: &["created_at", "updated_at"],
    soft_delete: false,
    created_column: "created_at",
};

pub static STUDENTS: CollectionMeta = CollectionMeta {
    table: "students",
    columns: &[
        ("registration_id", Text),
        ("last_name", Text),
        ("first_name", Text),
        ("gender", Text),
        ("class_id", Text),
        ("school_id", Text),
        ("created_at", Timestamp),
        ("updated_at", Timestamp),
    ],
    searchable: &["last_name", "first_name"],
    hidden: &["created_at", "updated_at"],
    soft_delete: false,
    created_column: "created_at",
};

pub static EVALUATION_TYPES: CollectionMeta = CollectionMeta {
    table: "evaluation_types",
    columns: &[
        ("code", Text),
        ("name", Text),
        ("coefficient", Float),
        ("created_at", Timestamp),
        ("updated_at", Timestamp),
    ],
    searchable: &["name"],
    hidden: &["created_at", "updated_at"],
    soft_delete: false,
    created_column: "created_at",
};

pub static COMPOSITIONS: CollectionMeta = CollectionMeta {
    table: "compositions",
    columns: &[
        ("code", Text),
        ("label", Text),
        ("held_on", Date),
        ("kind", Text),
        ("school_year_code", Text),
        ("created_at", Timestamp),
        ("updated_at", Timestamp),
    ],
    searchable: &["label"],
    hidden: &["created_at", "updated_at"],
    soft_delete: false,
    created_column: "created_at",
};

pub static NOTES: CollectionMeta = CollectionMeta {
    table: "notes",
    columns: &[
        ("student_id", Text),
        ("evaluation_code", Text),
        ("composition_code", Text),
        ("value", Float),
        ("created_at", Timestamp),
        ("updated_at", Timestamp),
    ],
    searchable: &[],
    hidden: &["created_at", "updated_at"],
    soft_delete: false,
    created_column: "created_at",
};

pub static AVERAGES: CollectionMeta = CollectionMeta {
    table: "averages",
    columns: &[
        ("student_id", Text),
        ("composition_code", Text),
        ("value", Float),
        ("created_at", Timestamp),
        ("updated_at", Timestamp),
    ],
    searchable: &[],
    hidden: &["created_at", "updated_at"],
    soft_delete: false,
    created_column: "created_at",
};

pub static RESULTS: CollectionMeta = CollectionMeta {
    table: "results",
    columns: &[
        ("student_id", Text),
        ("school_year_code", Text),
        ("decision", Text),
        ("rank", Int),
        ("annual_average", Float),
        ("created_at", Timestamp),
        ("updated_at", Timestamp),
    ],
    searchable: &[],
    hidden: &["created_at", "updated_at"],
    soft_delete: false,
    created_column: "created_at",
};

fn registry() -> [&'static CollectionMeta; 10] {
    [
        &SCHOOLS,
        &USERS,
        &SCHOOL_YEARS,
        &CLASSES,
        &STUDENTS,
        &EVALUATION_TYPES,
        &COMPOSITIONS,
        &NOTES,
        &AVERAGES,
        &RESULTS,
    ]
}

pub fn valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Check every declared meta once at startup. A bad declaration is a
/// programming error, so callers abort on failure.
pub fn validate_registry() -> Result<(), ApiError> {
    for meta in registry() {
        if !valid_identifier(meta.table) {
            return Err(ApiError::server_error(format!(
                "invalid table name in collection meta: {}",
                meta.table
            )));
        }
        for (column, _) in meta.columns {
            if !valid_identifier(column) {
                return Err(ApiError::server_error(format!(
                    "invalid column name {} in collection {}",
                    column, meta.table
                )));
            }
        }
        for field in meta.searchable.iter().chain(meta.hidden.iter()) {
            if !meta.has_column(field) {
                return Err(ApiError::server_error(format!(
                    "collection {} declares unknown field {}",
                    meta.table, field
                )));
            }
        }
        if !meta.has_column(meta.created_column) {
            return Err(ApiError::server_error(format!(
                "collection {} default sort column {} is not declared",
                meta.table, meta.created_column
            )));
        }
        if meta.soft_delete && !meta.has_column("deleted_at") {
            return Err(ApiError::server_error(format!(
                "collection {} is soft-deleting but has no deleted_at column",
                meta.table
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_well_formed() {
        validate_registry().expect("collection registry must validate");
    }

    #[test]
    fn hidden_fields_drop_out_of_default_projection() {
        let projected = USERS.default_projection();
        assert!(projected.contains(&"username"));
        assert!(!projected.contains(&"password_hash"));
        assert!(!projected.contains(&"deleted_at"));
        assert!(!projected.contains(&"created_at"));
    }

    #[test]
    fn identifier_validation_rejects_injection_shapes() {
        assert!(valid_identifier("school_id"));
        assert!(!valid_identifier("1abc"));
        assert!(!valid_identifier("name; DROP TABLE users"));
        assert!(!valid_identifier(""));
    }
}
