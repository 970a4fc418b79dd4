use std::collections::HashMap;

use anyhow::Result;
use serde_json::json;

use ecole_api::database::meta;
use ecole_api::query::ApiQuery;

fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// A teacher browsing their students: ownership scope, keyword search, a field
// filter, projection, sort and pagination all land in one parameterized plan.
#[test]
fn scoped_search_request_builds_one_plan() -> Result<()> {
    let query = ApiQuery::with_page_sizes(
        &meta::STUDENTS,
        params(&[
            ("keyword", "Tra"),
            ("gender", "F"),
            ("fields", "registration_id,last_name,first_name"),
            ("sort", "last_name"),
            ("page", "2"),
            ("limit", "50"),
        ]),
        25,
        1000,
    )
    .scope("school_id", "EC001")?;

    let plan = query.plan()?;
    assert_eq!(
        plan.sql,
        "SELECT \"registration_id\", \"last_name\", \"first_name\" FROM \"students\" \
         WHERE \"school_id\" = $1 AND (\"last_name\" ILIKE $2 OR \"first_name\" ILIKE $3) \
         AND \"gender\" = $4 ORDER BY \"last_name\" ASC LIMIT 50 OFFSET 50"
    );
    assert_eq!(
        plan.params,
        vec![json!("EC001"), json!("%Tra%"), json!("%Tra%"), json!("F")]
    );

    // The envelope total reuses the same WHERE without pagination.
    let count = query.count_plan()?;
    assert_eq!(count.params, plan.params);
    assert!(!count.sql.contains("LIMIT"));
    Ok(())
}

// A teacher without a school reference gets a plan that matches nothing
// instead of an error or a cross-school leak.
#[test]
fn unassigned_teacher_sees_an_empty_collection() -> Result<()> {
    let query = ApiQuery::with_page_sizes(&meta::CLASSES, params(&[]), 25, 1000)
        .scope_match_nothing();
    let plan = query.plan()?;
    assert!(plan.sql.contains("WHERE 1=0"));
    Ok(())
}

// Soft-deleted users stay invisible even when the client filters and
// projects explicitly.
#[test]
fn user_listing_always_excludes_tombstones() -> Result<()> {
    let query = ApiQuery::with_page_sizes(
        &meta::USERS,
        params(&[("role", "inTeacher,Administrator"), ("fields", "id,username,role")]),
        25,
        1000,
    );
    let plan = query.plan()?;
    assert!(plan.sql.contains("\"deleted_at\" IS NULL"));
    assert!(plan.sql.contains("\"role\" IN ($1, $2)"));
    assert!(!plan.sql.contains("password_hash"));
    Ok(())
}
