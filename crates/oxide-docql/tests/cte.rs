//! Tests for CTE preprocessing, including how rewritten queries feed the
//! clause translators.

mod common;
use common::*;

use oxide_docql::cte;
use proptest::prelude::*;
use serde_json::json;

// ===================================================================
// Folding into the defining query
// ===================================================================

#[test]
fn single_binding_folds_into_its_query() {
    let sql = "WITH t AS (SELECT name FROM customers WHERE id=1) SELECT * FROM t";
    assert_eq!(cte::preprocess(sql), "SELECT name FROM customers WHERE id=1");

    let with_tail = format!("{sql} ORDER BY name LIMIT 10");
    assert_eq!(
        cte::preprocess(&with_tail),
        "SELECT name FROM customers WHERE id=1 ORDER BY name LIMIT 10"
    );
}

#[test]
fn rewritten_query_feeds_clause_translators() {
    let sql = "WITH recent AS (SELECT id, status, created FROM orders WHERE status = 'open') \
               SELECT * FROM recent WHERE recent.created > 5 ORDER BY created DESC";
    let rewritten = cte::preprocess(sql);
    assert!(!cte::needs_preprocessing(&rewritten));

    let (_, where_part) = rewritten.split_once(" WHERE ").unwrap();
    assert_eq!(
        filter(where_part),
        json!({"status": "open", "created": {"$gt": 5}})
    );
    assert_eq!(sort(&rewritten), json!({"created": -1}));
}

#[test]
fn outer_clauses_override_inner_ones() {
    let sql = "WITH t AS (SELECT a, b FROM x ORDER BY a) SELECT * FROM t ORDER BY b DESC";
    assert_eq!(cte::preprocess(sql), "SELECT a, b FROM x ORDER BY b DESC");
}

// ===================================================================
// Inlining
// ===================================================================

#[test]
fn join_against_binding_is_inlined() {
    let sql = "WITH big AS (SELECT id FROM orders WHERE total > 100) \
               SELECT c.name FROM customers c JOIN big ON big.id = c.id";
    assert_eq!(
        cte::preprocess(sql),
        "SELECT c.name FROM customers c JOIN (SELECT id FROM orders WHERE total > 100) AS big ON big.id = c.id"
    );
}

#[test]
fn filter_on_computed_column_is_inlined() {
    let sql = "WITH t AS (SELECT price * 2 AS p FROM items) SELECT * FROM t WHERE p > 5";
    assert_eq!(
        cte::preprocess(sql),
        "SELECT * FROM (SELECT price * 2 AS p FROM items) AS t WHERE p > 5"
    );
}

#[test]
fn aggregates_over_a_limited_binding_are_inlined() {
    let cases = [
        (
            "WITH t AS (SELECT a FROM x LIMIT 5) SELECT COUNT(*) FROM t",
            "SELECT COUNT(*) FROM (SELECT a FROM x LIMIT 5) AS t",
        ),
        (
            "WITH t AS (SELECT a FROM x LIMIT 5) SELECT SUM(a) FROM t",
            "SELECT SUM(a) FROM (SELECT a FROM x LIMIT 5) AS t",
        ),
        (
            "WITH t AS (SELECT a FROM x LIMIT 5) SELECT DISTINCT a FROM t",
            "SELECT DISTINCT a FROM (SELECT a FROM x LIMIT 5) AS t",
        ),
    ];
    for (sql, expected) in cases {
        assert_eq!(cte::preprocess(sql), expected, "{sql}");
    }
}

#[test]
fn multiple_bindings() {
    let sql = "WITH a AS (SELECT id, total FROM orders WHERE total > 100), \
               b AS (SELECT id FROM a WHERE id > 5), \
               c AS (SELECT 1 FROM dual) \
               SELECT * FROM b";
    assert_eq!(
        cte::preprocess(sql),
        "SELECT id FROM (SELECT id, total FROM orders WHERE total > 100) AS a WHERE id > 5"
    );
}

// ===================================================================
// Recursive bindings
// ===================================================================

#[test]
fn recursive_binding_uses_base_case() {
    let sql = "WITH RECURSIVE n(x) AS (SELECT 1 FROM dual UNION ALL SELECT x + 1 FROM n WHERE x < 5) \
               SELECT * FROM n";
    assert_eq!(cte::preprocess(sql), "SELECT 1 AS x FROM dual");

    let parsed = cte::parse_with(sql).unwrap();
    assert!(parsed.recursive);
    assert!(parsed.bindings[0].recursive);
}

#[test]
fn recursive_keyword_without_self_reference() {
    let sql = "WITH RECURSIVE t AS (SELECT a FROM x) SELECT * FROM t";
    let parsed = cte::parse_with(sql).unwrap();
    assert!(parsed.recursive);
    assert!(!parsed.bindings[0].recursive);
    assert_eq!(cte::preprocess(sql), "SELECT a FROM x");
}

// ===================================================================
// Pass-through
// ===================================================================

#[test]
fn unsupported_shapes_are_returned_unchanged() {
    for sql in [
        "WITH t AS SELECT 1 SELECT * FROM t",
        "WITH t AS (SELECT a FROM x SELECT * FROM t",
        "WITH t AS (SELECT a FROM x) UPDATE t SET a = 1",
        "WITH RECURSIVE r AS (SELECT id FROM r UNION SELECT id FROM r) SELECT * FROM r",
        "WITH t AS (SELECT city, COUNT(*) AS n FROM c GROUP BY city) SELECT * FROM t WHERE n > 1",
    ] {
        assert_eq!(cte::preprocess(sql), sql);
    }
}

#[test]
fn with_inside_literals_is_not_a_cte() {
    let sql = "SELECT * FROM notes WHERE body = 'WITH t AS (SELECT 1)'";
    assert!(!cte::needs_preprocessing(sql));
    assert_eq!(cte::preprocess(sql), sql);
}

#[test]
fn preprocessing_is_idempotent() {
    for sql in [
        "WITH t AS (SELECT name FROM customers WHERE id=1) SELECT * FROM t ORDER BY name",
        "WITH a AS (SELECT id FROM x), b AS (SELECT id FROM y) SELECT a.id FROM a JOIN b ON a.id = b.id",
        "SELECT * FROM plain",
    ] {
        let once = cte::preprocess(sql);
        assert_eq!(cte::preprocess(&once), once, "{sql}");
    }
}

proptest! {
    #[test]
    fn queries_without_with_pass_through(
        table in "[a-z]{1,8}",
        column in "[a-z]{1,8}",
        n in 0u32..1000,
    ) {
        prop_assume!(!table.eq_ignore_ascii_case("with") && !column.eq_ignore_ascii_case("with"));
        let sql = format!("SELECT {column} FROM {table} WHERE {column} > {n} ORDER BY {column}");
        prop_assert_eq!(cte::preprocess(&sql), sql);
    }
}
