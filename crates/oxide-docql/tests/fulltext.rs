//! Tests for MATCH ... AGAINST parsing, search rewriting and ranking.

use oxide_docql::fulltext::{self, rewrite_boolean, ExpansionTable, TermExpansion};
use oxide_docql::{eval, FulltextTranslator, SearchMode};
use serde_json::{json, Value};

fn search(text: &str) -> Value {
    let expr = fulltext::parse(text).unwrap_or_else(|| panic!("no fulltext in: {text}"));
    Value::Object(FulltextTranslator::new().filter(&expr))
}

// ===================================================================
// Modes
// ===================================================================

#[test]
fn modes_are_detected() {
    let cases = [
        ("MATCH(title) AGAINST('rust')", SearchMode::NaturalLanguage),
        (
            "MATCH(title) AGAINST('rust' IN NATURAL LANGUAGE MODE)",
            SearchMode::NaturalLanguage,
        ),
        ("match (title) against ('+rust' in boolean mode)", SearchMode::Boolean),
        (
            "MATCH(title) AGAINST('rust' WITH QUERY EXPANSION)",
            SearchMode::QueryExpansion,
        ),
        (
            "MATCH(title) AGAINST('rust' IN NATURAL LANGUAGE MODE WITH QUERY EXPANSION)",
            SearchMode::QueryExpansion,
        ),
    ];
    for (text, mode) in cases {
        assert_eq!(fulltext::parse(text).map(|e| e.mode), Some(mode), "{text}");
    }
}

#[test]
fn columns_and_search_text() {
    let expr = fulltext::parse("WHERE MATCH(a.title, `body`) AGAINST(\"it's \\\"here\\\"\") > 0").unwrap();
    assert_eq!(expr.columns, ["a.title", "body"]);
    assert_eq!(expr.search, "it's \"here\"");

    let doubled = fulltext::parse("MATCH(t) AGAINST('it''s')").unwrap();
    assert_eq!(doubled.search, "it's");
}

#[test]
fn no_match_expression() {
    assert!(fulltext::parse("title LIKE '%rust%'").is_none());
    assert!(fulltext::parse("MATCH() AGAINST('rust')").is_none());
    assert!(fulltext::parse("MATCH(title) AGAINST('  ')").is_none());
}

// ===================================================================
// Search strings
// ===================================================================

#[test]
fn natural_language_passes_through() {
    assert_eq!(
        search("MATCH(body) AGAINST('  database tuning ')"),
        json!({"$text": {"$search": "database tuning"}})
    );
}

#[test]
fn boolean_operators_are_rewritten() {
    assert_eq!(rewrite_boolean("+mongodb -mysql"), "\"mongodb\" -mysql");
    assert_eq!(rewrite_boolean("+\"exact phrase\" data*"), "\"exact phrase\" data");
    assert_eq!(rewrite_boolean(">fast <slow ~maybe"), "fast slow maybe");
    assert_eq!(rewrite_boolean("+ - keep"), "keep");
}

#[test]
fn boolean_search_selects_documents() {
    let expr = fulltext::parse("MATCH(title, body) AGAINST('+mongodb -mysql' IN BOOLEAN MODE)").unwrap();
    let filter = FulltextTranslator::new().filter(&expr);
    assert!(eval::matches(&filter, &json!({"title": "MongoDB basics"})));
    assert!(!eval::matches(&filter, &json!({"title": "MongoDB vs MySQL"})));
    assert!(!eval::matches(&filter, &json!({"title": "Postgres"})));
}

#[test]
fn builtin_expansion() {
    assert_eq!(
        search("MATCH(body) AGAINST('MongoDB' WITH QUERY EXPANSION)"),
        json!({"$text": {"$search": "MongoDB nosql document database"}})
    );
    assert_eq!(
        search("MATCH(body) AGAINST('gardening' WITH QUERY EXPANSION)"),
        json!({"$text": {"$search": "gardening"}})
    );
}

#[test]
fn expansion_adds_each_term_once() {
    let table = ExpansionTable::empty()
        .with_entry("rust", ["cargo", "crates"])
        .with_entry("cargo", ["crates", "rust"]);
    assert_eq!(
        fulltext::expand_terms("Rust cargo", &table),
        "Rust cargo crates"
    );
}

struct Synonyms;

impl TermExpansion for Synonyms {
    fn related(&self, term: &str) -> Vec<String> {
        vec![format!("{term}s")]
    }
}

#[test]
fn custom_expansion_source() {
    let translator = FulltextTranslator::new().with_expansions(Synonyms);
    let expr = fulltext::parse("MATCH(body) AGAINST('cat dog' WITH QUERY EXPANSION)").unwrap();
    assert_eq!(translator.search_string(&expr), "cat dog cats dogs");
}

// ===================================================================
// Ranking
// ===================================================================

#[test]
fn ranking_pipeline() {
    let expr = fulltext::parse("MATCH(body) AGAINST('rust')").unwrap();
    let translator = FulltextTranslator::new().with_score_field("relevance");
    assert_eq!(translator.score_field(), "relevance");
    let stages: Vec<Value> = translator
        .pipeline(&expr)
        .into_iter()
        .map(Value::Object)
        .collect();
    assert_eq!(
        stages,
        [
            json!({"$match": {"$text": {"$search": "rust"}}}),
            json!({"$addFields": {"relevance": {"$meta": "textScore"}}}),
            json!({"$sort": {"relevance": -1}}),
        ]
    );
}

#[test]
fn default_score_field() {
    let stages = FulltextTranslator::new().ranking_stages();
    assert_eq!(stages.len(), 2);
    assert_eq!(Value::Object(stages[1].clone()), json!({"$sort": {"score": -1}}));
}

#[test]
fn search_without_terms_builds_nothing() {
    let expr = fulltext::parse("MATCH(body) AGAINST('* +' IN BOOLEAN MODE)").unwrap();
    let translator = FulltextTranslator::new();
    assert_eq!(translator.text_filter(&expr), None);
    assert!(translator.filter(&expr).is_empty());
    assert!(translator.pipeline(&expr).is_empty());
}
