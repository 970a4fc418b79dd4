//! Query-string driven query building.
//!
//! `ApiQuery` turns the parsed query parameters of a list request into one
//! parameterized SQL statement against a declared collection: keyword search,
//! field filters with operator prefixes, multi-key sort, field projection and
//! pagination, plus caller-imposed ownership scopes merged into the same
//! WHERE plan.

pub mod params;

use std::collections::HashMap;

use serde_json::{Map, Value};
use sqlx::{postgres::PgArguments, PgPool, Row};

use crate::database::meta::{ColumnKind, CollectionMeta};
use crate::error::ApiError;
use params::{
    coerce_scalar, parse_fields, parse_limit, parse_page, parse_predicate, parse_sort, Predicate,
    RESERVED_KEYS,
};

#[derive(Debug)]
pub struct QueryPlan {
    pub sql: String,
    pub params: Vec<Value>,
    pub projection: Vec<(&'static str, ColumnKind)>,
}

pub struct ApiQuery {
    meta: &'static CollectionMeta,
    params: HashMap<String, String>,
    default_page_size: i64,
    max_page_size: i64,
    scopes: Vec<(&'static str, Value)>,
    match_nothing: bool,
}

impl ApiQuery {
    pub fn new(meta: &'static CollectionMeta, params: HashMap<String, String>) -> Self {
        let api = &crate::config::config().api;
        Self::with_page_sizes(meta, params, api.default_page_size, api.max_page_size)
    }

    pub fn with_page_sizes(
        meta: &'static CollectionMeta,
        params: HashMap<String, String>,
        default_page_size: i64,
        max_page_size: i64,
    ) -> Self {
        Self {
            meta,
            params,
            default_page_size,
            max_page_size,
            scopes: vec![],
            match_nothing: false,
        }
    }

    /// Merge a caller-imposed equality predicate (e.g. ownership narrowing)
    /// into the WHERE plan. Merged, never replacing client filters.
    pub fn scope(mut self, column: &'static str, value: impl Into<Value>) -> Result<Self, ApiError> {
        if !self.meta.has_column(column) {
            return Err(ApiError::server_error(format!(
                "scope column {} is not declared for {}",
                column, self.meta.table
            )));
        }
        self.scopes.push((column, value.into()));
        Ok(self)
    }

    /// Scope that matches no rows; used when a scoped caller has nothing to
    /// be scoped to (a teacher without a school sees an empty list).
    pub fn scope_match_nothing(mut self) -> Self {
        self.match_nothing = true;
        self
    }

    pub fn page(&self) -> i64 {
        parse_page(self.params.get("page").map(String::as_str))
    }

    pub fn page_size(&self) -> i64 {
        parse_limit(
            self.params.get("limit").map(String::as_str),
            self.default_page_size,
            self.max_page_size,
        )
    }

    fn projection(&self) -> Result<Vec<(&'static str, ColumnKind)>, ApiError> {
        let names: Vec<String> = match self.params.get("fields") {
            Some(raw) => parse_fields(raw),
            None => vec![],
        };

        if names.is_empty() {
            return Ok(self
                .meta
                .default_projection()
                .into_iter()
                .map(|c| (c, self.meta.column_kind(c).unwrap()))
                .collect());
        }

        let mut projection = Vec::with_capacity(names.len());
        for name in &names {
            match self
                .meta
                .columns
                .iter()
                .find(|(c, _)| c == name)
            {
                Some((c, k)) => projection.push((*c, *k)),
                None => {
                    return Err(ApiError::validation(format!(
                        "unknown field '{}' for {}",
                        name, self.meta.table
                    )))
                }
            }
        }
        Ok(projection)
    }

    fn where_clauses(&self, bound: &mut Vec<Value>) -> Result<Vec<String>, ApiError> {
        let mut clauses = vec![];
        let push = |bound: &mut Vec<Value>, v: Value| {
            bound.push(v);
            format!("${}", bound.len())
        };

        if self.meta.soft_delete {
            clauses.push("\"deleted_at\" IS NULL".to_string());
        }
        if self.match_nothing {
            clauses.push("1=0".to_string());
        }

        for (column, value) in &self.scopes {
            let placeholder = push(bound, value.clone());
            clauses.push(format!("\"{}\" = {}", column, placeholder));
        }

        // Keyword search: OR of case-insensitive substring matches across the
        // collection's searchable fields.
        if let Some(keyword) = self.params.get("keyword").map(|s| s.trim()) {
            if !keyword.is_empty() && !self.meta.searchable.is_empty() {
                let pattern = format!("%{}%", keyword);
                let mut ors = Vec::with_capacity(self.meta.searchable.len());
                for column in self.meta.searchable {
                    let placeholder = push(bound, Value::String(pattern.clone()));
                    ors.push(format!("\"{}\" ILIKE {}", column, placeholder));
                }
                clauses.push(format!("({})", ors.join(" OR ")));
            }
        }

        // Field filters: every non-reserved parameter, keys sorted so the
        // generated SQL is deterministic.
        let mut keys: Vec<&String> = self
            .params
            .keys()
            .filter(|k| !RESERVED_KEYS.contains(&k.as_str()))
            .collect();
        keys.sort();

        for key in keys {
            if !self.meta.has_column(key) {
                return Err(ApiError::validation(format!(
                    "unknown filter field '{}' for {}",
                    key, self.meta.table
                )));
            }
            let quoted = format!("\"{}\"", key);
            // Values bind by the column's declared kind, so a numeric-looking
            // value on a text column still binds as text.
            let kind = self.meta.column_kind(key).unwrap();
            let coerce = |raw: &str| {
                coerce_scalar(raw, kind).ok_or_else(|| {
                    ApiError::validation(format!("invalid value '{}' for field '{}'", raw, key))
                })
            };
            match parse_predicate(&self.params[key]) {
                Predicate::Eq(v) => {
                    let p = push(bound, coerce(&v)?);
                    clauses.push(format!("{} = {}", quoted, p));
                }
                Predicate::Gte(v) => {
                    let p = push(bound, coerce(&v)?);
                    clauses.push(format!("{} >= {}", quoted, p));
                }
                Predicate::Gt(v) => {
                    let p = push(bound, coerce(&v)?);
                    clauses.push(format!("{} > {}", quoted, p));
                }
                Predicate::Lte(v) => {
                    let p = push(bound, coerce(&v)?);
                    clauses.push(format!("{} <= {}", quoted, p));
                }
                Predicate::Lt(v) => {
                    let p = push(bound, coerce(&v)?);
                    clauses.push(format!("{} < {}", quoted, p));
                }
                Predicate::In(values) => {
                    if values.is_empty() {
                        clauses.push("1=0".to_string());
                    } else {
                        let mut placeholders = Vec::with_capacity(values.len());
                        for v in &values {
                            placeholders.push(push(bound, coerce(v)?));
                        }
                        clauses.push(format!("{} IN ({})", quoted, placeholders.join(", ")));
                    }
                }
                Predicate::NotIn(values) => {
                    if !values.is_empty() {
                        let mut placeholders = Vec::with_capacity(values.len());
                        for v in &values {
                            placeholders.push(push(bound, coerce(v)?));
                        }
                        clauses
                            .push(format!("{} NOT IN ({})", quoted, placeholders.join(", ")));
                    }
                }
            }
        }

        Ok(clauses)
    }

    fn order_clause(&self) -> Result<String, ApiError> {
        let keys = match self.params.get("sort") {
            Some(raw) => parse_sort(raw),
            None => vec![],
        };

        if keys.is_empty() {
            return Ok(format!(
                "ORDER BY \"{}\" DESC",
                self.meta.created_column
            ));
        }

        let mut parts = Vec::with_capacity(keys.len());
        for key in keys {
            if !self.meta.has_column(&key.column) {
                return Err(ApiError::validation(format!(
                    "unknown sort field '{}' for {}",
                    key.column, self.meta.table
                )));
            }
            let direction = if key.descending { "DESC" } else { "ASC" };
            parts.push(format!("\"{}\" {}", key.column, direction));
        }
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }

    pub fn plan(&self) -> Result<QueryPlan, ApiError> {
        let projection = self.projection()?;
        let select = projection
            .iter()
            .map(|(c, _)| format!("\"{}\"", c))
            .collect::<Vec<_>>()
            .join(", ");

        let mut bound = vec![];
        let clauses = self.where_clauses(&mut bound)?;
        let order = self.order_clause()?;

        let limit = self.page_size();
        let offset = (self.page() - 1) * limit;

        let mut sql = format!("SELECT {} FROM \"{}\"", select, self.meta.table);
        if !clauses.is_empty() {
            sql.push_str(&format!(" WHERE {}", clauses.join(" AND ")));
        }
        sql.push_str(&format!(" {} LIMIT {} OFFSET {}", order, limit, offset));

        Ok(QueryPlan {
            sql,
            params: bound,
            projection,
        })
    }

    /// Same WHERE plan without pagination, for the list envelope's total.
    pub fn count_plan(&self) -> Result<QueryPlan, ApiError> {
        let mut bound = vec![];
        let clauses = self.where_clauses(&mut bound)?;
        let mut sql = format!("SELECT COUNT(*) as count FROM \"{}\"", self.meta.table);
        if !clauses.is_empty() {
            sql.push_str(&format!(" WHERE {}", clauses.join(" AND ")));
        }
        Ok(QueryPlan {
            sql,
            params: bound,
            projection: vec![],
        })
    }

    pub async fn execute(&self, pool: &PgPool) -> Result<Vec<Map<String, Value>>, ApiError> {
        let plan = self.plan()?;
        let mut query = sqlx::query(&plan.sql);
        for param in plan.params.iter() {
            query = bind_param(query, param);
        }
        let rows = query.fetch_all(pool).await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let mut record = Map::new();
            for (i, (column, kind)) in plan.projection.iter().enumerate() {
                record.insert(column.to_string(), decode_column(&row, i, *kind)?);
            }
            records.push(record);
        }
        Ok(records)
    }

    pub async fn count(&self, pool: &PgPool) -> Result<i64, ApiError> {
        let plan = self.count_plan()?;
        let mut query = sqlx::query(&plan.sql);
        for param in plan.params.iter() {
            query = bind_param(query, param);
        }
        let row = query.fetch_one(pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count)
    }
}

/// Decode one projected column into JSON by its declared kind.
fn decode_column(
    row: &sqlx::postgres::PgRow,
    index: usize,
    kind: ColumnKind,
) -> Result<Value, ApiError> {
    let value = match kind {
        ColumnKind::Text => row
            .try_get::<Option<String>, _>(index)?
            .map(Value::String)
            .unwrap_or(Value::Null),
        ColumnKind::Int => match row.try_get::<Option<i64>, _>(index) {
            Ok(v) => v.map(Value::from).unwrap_or(Value::Null),
            // Smaller integer columns (e.g. rank) decode as i32.
            Err(_) => row
                .try_get::<Option<i32>, _>(index)?
                .map(Value::from)
                .unwrap_or(Value::Null),
        },
        ColumnKind::Float => row
            .try_get::<Option<f64>, _>(index)?
            .and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
            .unwrap_or(Value::Null),
        ColumnKind::Bool => row
            .try_get::<Option<bool>, _>(index)?
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        ColumnKind::Date => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)?
            .map(|d| Value::String(d.to_string()))
            .unwrap_or(Value::Null),
        ColumnKind::Timestamp => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)?
            .map(|t| Value::String(t.to_rfc3339()))
            .unwrap_or(Value::Null),
    };
    Ok(value)
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        // Lists are expanded into individual placeholders before binding.
        Value::Array(_) | Value::Object(_) => q,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::meta::{STUDENTS, USERS};
    use serde_json::json;

    fn query_for(
        meta: &'static CollectionMeta,
        pairs: &[(&str, &str)],
    ) -> ApiQuery {
        let params = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiQuery::with_page_sizes(meta, params, 25, 1000)
    }

    #[test]
    fn default_plan_hides_columns_and_sorts_by_creation() {
        let plan = query_for(&USERS, &[]).plan().unwrap();
        assert!(!plan.sql.contains("password_hash"));
        assert!(plan.sql.contains("\"username\""));
        assert!(plan.sql.contains("\"deleted_at\" IS NULL"));
        assert!(plan.sql.contains("ORDER BY \"created_at\" DESC"));
        assert!(plan.sql.ends_with("LIMIT 25 OFFSET 0"));
    }

    #[test]
    fn operator_prefixes_translate_to_sql_predicates() {
        let plan = query_for(&USERS, &[("id", "gte18")]).plan().unwrap();
        assert!(plan.sql.contains("\"id\" >= $1"));
        assert_eq!(plan.params, vec![json!(18)]);

        let plan = query_for(&USERS, &[("role", "in Teacher,Administrator")])
            .plan()
            .unwrap();
        assert!(plan.sql.contains("\"role\" IN ($1, $2)"));
        assert_eq!(plan.params, vec![json!("Teacher"), json!("Administrator")]);

        let plan = query_for(&USERS, &[("username", "neArchived")]).plan().unwrap();
        assert!(plan.sql.contains("\"username\" NOT IN ($1)"));
        assert_eq!(plan.params, vec![json!("Archived")]);
    }

    #[test]
    fn filters_bind_by_declared_column_kind() {
        // classes.label is text; "2024" must not bind as an integer.
        let plan = query_for(&crate::database::meta::CLASSES, &[("label", "2024")])
            .plan()
            .unwrap();
        assert!(plan.sql.contains("\"label\" = $1"));
        assert_eq!(plan.params, vec![json!("2024")]);

        // Range operators on text columns compare as text.
        let plan = query_for(&crate::database::meta::SCHOOLS, &[("id", "gte100")])
            .plan()
            .unwrap();
        assert!(plan.sql.contains("\"id\" >= $1"));
        assert_eq!(plan.params, vec![json!("100")]);
    }

    #[test]
    fn unrepresentable_filter_value_is_rejected() {
        let err = query_for(&USERS, &[("id", "abc")]).plan().unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        let err = query_for(&crate::database::meta::NOTES, &[("value", "in 7.5,high")])
            .plan()
            .unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn unknown_filter_field_is_rejected() {
        let err = query_for(&USERS, &[("nope", "1")]).plan().unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn keyword_search_ors_searchable_fields() {
        let plan = query_for(&STUDENTS, &[("keyword", "Traore")]).plan().unwrap();
        assert!(plan
            .sql
            .contains("(\"last_name\" ILIKE $1 OR \"first_name\" ILIKE $2)"));
        assert_eq!(plan.params, vec![json!("%Traore%"), json!("%Traore%")]);
    }

    #[test]
    fn keyword_is_a_no_op_without_searchable_fields() {
        let plan = query_for(&crate::database::meta::NOTES, &[("keyword", "x")])
            .plan()
            .unwrap();
        assert!(!plan.sql.contains("ILIKE"));
    }

    #[test]
    fn scope_merges_with_client_filters() {
        let plan = query_for(&STUDENTS, &[("gender", "M")])
            .scope("school_id", "EC001")
            .unwrap()
            .plan()
            .unwrap();
        assert!(plan.sql.contains("\"school_id\" = $1"));
        assert!(plan.sql.contains("\"gender\" = $2"));
        assert_eq!(plan.params, vec![json!("EC001"), json!("M")]);
    }

    #[test]
    fn match_nothing_scope_returns_empty_plan() {
        let plan = query_for(&STUDENTS, &[]).scope_match_nothing().plan().unwrap();
        assert!(plan.sql.contains("1=0"));
    }

    #[test]
    fn sort_parameter_builds_multi_key_order() {
        let plan = query_for(&STUDENTS, &[("sort", "-last_name,first_name")])
            .plan()
            .unwrap();
        assert!(plan
            .sql
            .contains("ORDER BY \"last_name\" DESC, \"first_name\" ASC"));
    }

    #[test]
    fn fields_parameter_projects_requested_columns() {
        let plan = query_for(&STUDENTS, &[("fields", "registration_id,last_name")])
            .plan()
            .unwrap();
        assert!(plan.sql.starts_with("SELECT \"registration_id\", \"last_name\" FROM"));
        let err = query_for(&STUDENTS, &[("fields", "secret")]).plan().unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn pagination_caps_limit_and_floors_page() {
        let q = query_for(&STUDENTS, &[("limit", "5000"), ("page", "0")]);
        assert_eq!(q.page_size(), 1000);
        assert_eq!(q.page(), 1);
        let plan = q.plan().unwrap();
        assert!(plan.sql.ends_with("LIMIT 1000 OFFSET 0"));

        let q = query_for(&STUDENTS, &[("limit", "10"), ("page", "3")]);
        let plan = q.plan().unwrap();
        assert!(plan.sql.ends_with("LIMIT 10 OFFSET 20"));
    }

    #[test]
    fn count_plan_shares_where_but_drops_pagination() {
        let q = query_for(&STUDENTS, &[("gender", "F"), ("limit", "5")]);
        let plan = q.count_plan().unwrap();
        assert!(plan.sql.starts_with("SELECT COUNT(*)"));
        assert!(plan.sql.contains("\"gender\" = $1"));
        assert!(!plan.sql.contains("LIMIT"));
    }
}
