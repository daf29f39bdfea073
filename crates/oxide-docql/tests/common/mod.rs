#![allow(dead_code)]

use oxide_docql::functions::{map_function, FunctionArg, FunctionOutput};
use oxide_docql::order_by::{self, SortTranslator};
use oxide_docql::where_clause::{self, like_to_regex};
use oxide_docql::{eval, Document, TargetExpr};
use regex::Regex;
use serde_json::Value;

/// Parses and translates a WHERE clause with the default configuration.
pub fn filter(text: &str) -> Value {
    Value::Object(where_clause::translate(&where_clause::parse(text)).filter)
}

pub fn filter_doc(text: &str) -> Document {
    where_clause::translate(&where_clause::parse(text)).filter
}

/// True if the translated WHERE clause selects `doc`.
pub fn selects(text: &str, doc: &Value) -> bool {
    eval::matches(&filter_doc(text), doc)
}

/// Compiles a LIKE pattern the way the destination would run it.
pub fn like(pattern: &str) -> Regex {
    let source = like_to_regex(pattern);
    Regex::new(&format!("(?i){source}"))
        .unwrap_or_else(|e| panic!("LIKE {pattern:?} compiled to invalid regex {source:?}: {e}"))
}

/// Sort document for the ORDER BY of `sql`.
pub fn sort(sql: &str) -> Value {
    let clause = order_by::parse(sql).unwrap_or_else(|| panic!("no ORDER BY in: {sql}"));
    Value::Object(SortTranslator::new().translate(&clause))
}

pub fn expression(name: &str, args: &[FunctionArg]) -> TargetExpr {
    match map_function(name, args) {
        Ok(FunctionOutput::Expression(expr)) => expr,
        other => panic!("Expected an expression for {name}, got {other:?}"),
    }
}

/// Maps and evaluates a server-side call against `doc`.
pub fn evaluate(name: &str, args: &[FunctionArg], doc: &Value) -> Value {
    eval::evaluate(&expression(name, args), doc)
        .unwrap_or_else(|e| panic!("Failed to evaluate {name}: {e}"))
}
