//! Query-string parameter parsing: operator prefixes, sort specs, field
//! projection lists and pagination coercion.

use serde_json::Value;

use crate::database::meta::ColumnKind;

/// Control keys never treated as field filters.
pub const RESERVED_KEYS: &[&str] = &["page", "sort", "limit", "fields", "keyword"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Eq(String),
    Gte(String),
    Gt(String),
    Lte(String),
    Lt(String),
    In(Vec<String>),
    NotIn(Vec<String>),
}

/// Parse a raw parameter value into a predicate. The value is scanned
/// left-to-right for an operator prefix (`gte`, `gt`, `lte`, `lt`, `in`,
/// `ne`); anything else is an exact-equality match. `in` and `ne` take a
/// comma-separated value list.
///
/// The scan cannot tell an operator from a text value that happens to start
/// with one: `?username=nelson` reads as `ne` + `lson`, not an equality on
/// "nelson". There is no escape syntax; exact matches on such values need the
/// `keyword` search instead.
pub fn parse_predicate(raw: &str) -> Predicate {
    let raw = raw.trim();

    // Longest prefixes first so gte/lte win over gt/lt.
    for (prefix, list) in [
        ("gte", false),
        ("lte", false),
        ("gt", false),
        ("lt", false),
        ("in", true),
        ("ne", true),
    ] {
        if let Some(rest) = raw.strip_prefix(prefix) {
            let rest = rest.trim();
            if rest.is_empty() {
                continue;
            }
            if list {
                let values = parse_value_list(rest);
                return match prefix {
                    "in" => Predicate::In(values),
                    _ => Predicate::NotIn(values),
                };
            }
            return match prefix {
                "gte" => Predicate::Gte(rest.to_string()),
                "lte" => Predicate::Lte(rest.to_string()),
                "gt" => Predicate::Gt(rest.to_string()),
                _ => Predicate::Lt(rest.to_string()),
            };
        }
    }

    Predicate::Eq(raw.to_string())
}

fn parse_value_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Coerce a raw filter value by the target column's declared kind, so a
/// numeric-looking value on a text column (a label "2024") still binds as
/// text. `None` means the value cannot be represented in that kind.
pub fn coerce_scalar(raw: &str, kind: ColumnKind) -> Option<Value> {
    let raw = raw.trim();
    match kind {
        ColumnKind::Int => raw.parse::<i64>().ok().map(Value::from),
        ColumnKind::Float => raw
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::from),
        ColumnKind::Bool => match raw {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        ColumnKind::Text | ColumnKind::Date | ColumnKind::Timestamp => {
            Some(Value::String(raw.to_string()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

/// Comma-separated sort list; a `-` prefix flips that key to descending.
pub fn parse_sort(raw: &str) -> Vec<SortKey> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "-")
        .map(|part| match part.strip_prefix('-') {
            Some(column) => SortKey {
                column: column.trim().to_string(),
                descending: true,
            },
            None => SortKey {
                column: part.to_string(),
                descending: false,
            },
        })
        .collect()
}

pub fn parse_fields(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `page` coerced to an integer >= 1; unparseable input falls back to 1.
pub fn parse_page(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .map(|p| p.max(1))
        .unwrap_or(1)
}

/// `limit` coerced to an integer in [1, max]; unparseable input falls back
/// to the caller default.
pub fn parse_limit(raw: Option<&str>, default: i64, max: i64) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(default)
        .clamp(1, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn gte_prefix_parses_comparison() {
        assert_eq!(parse_predicate("gte18"), Predicate::Gte("18".to_string()));
        assert_eq!(parse_predicate("gt7.5"), Predicate::Gt("7.5".to_string()));
        assert_eq!(parse_predicate("lte10"), Predicate::Lte("10".to_string()));
        assert_eq!(
            parse_predicate("lt2024-2025"),
            Predicate::Lt("2024-2025".to_string())
        );
    }

    #[test]
    fn in_prefix_parses_membership_list() {
        assert_eq!(
            parse_predicate("in Teacher,Administrator"),
            Predicate::In(vec!["Teacher".to_string(), "Administrator".to_string()])
        );
    }

    #[test]
    fn ne_prefix_parses_not_in_list() {
        assert_eq!(
            parse_predicate("neArchived"),
            Predicate::NotIn(vec!["Archived".to_string()])
        );
    }

    #[test]
    fn plain_value_is_equality() {
        assert_eq!(parse_predicate("EC001"), Predicate::Eq("EC001".to_string()));
        assert_eq!(parse_predicate("42"), Predicate::Eq("42".to_string()));
    }

    #[test]
    fn bare_operator_token_falls_back_to_equality() {
        assert_eq!(parse_predicate("ne"), Predicate::Eq("ne".to_string()));
    }

    #[test]
    fn coercion_follows_the_column_kind() {
        use ColumnKind::*;
        assert_eq!(coerce_scalar("18", Int), Some(json!(18)));
        assert_eq!(coerce_scalar("7.5", Float), Some(json!(7.5)));
        assert_eq!(coerce_scalar("18", Float), Some(json!(18.0)));
        assert_eq!(coerce_scalar("true", Bool), Some(json!(true)));
        // A numeric-looking value on a text column stays text.
        assert_eq!(coerce_scalar("2024", Text), Some(json!("2024")));
        assert_eq!(coerce_scalar("2024-03-01", Date), Some(json!("2024-03-01")));
    }

    #[test]
    fn unrepresentable_values_coerce_to_none() {
        use ColumnKind::*;
        assert_eq!(coerce_scalar("abc", Int), None);
        assert_eq!(coerce_scalar("7.5", Int), None);
        assert_eq!(coerce_scalar("abc", Float), None);
        assert_eq!(coerce_scalar("yes", Bool), None);
    }

    #[test]
    fn sort_list_preserves_order_and_direction() {
        let keys = parse_sort("-value,last_name");
        assert_eq!(
            keys,
            vec![
                SortKey { column: "value".to_string(), descending: true },
                SortKey { column: "last_name".to_string(), descending: false },
            ]
        );
    }

    #[test]
    fn pagination_bounds() {
        assert_eq!(parse_page(Some("0")), 1);
        assert_eq!(parse_page(Some("-3")), 1);
        assert_eq!(parse_page(Some("abc")), 1);
        assert_eq!(parse_page(Some("4")), 4);

        assert_eq!(parse_limit(Some("5000"), 25, 1000), 1000);
        assert_eq!(parse_limit(Some("abc"), 25, 1000), 25);
        assert_eq!(parse_limit(None, 25, 1000), 25);
        assert_eq!(parse_limit(Some("10"), 25, 1000), 10);
    }
}
