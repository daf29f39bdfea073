//! Filter-document matching.

use std::cmp::Ordering;

use regex::RegexBuilder;
use serde_json::Value;
use tracing::debug;

use super::{compare, equal, lookup};
use crate::document::Document;

/// Tests whether `doc` satisfies a filter document.
///
/// Supports the operators the WHERE translator emits: `$eq`, `$ne`, `$gt`,
/// `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$regex` with `$options`, `$not`,
/// `$exists`, `$and`, `$or`, `$nor`, plus `$text`, approximated as "every
/// required term and at least one other term occurs in some string field".
/// Unknown operators never match.
#[must_use]
pub fn matches(filter: &Document, doc: &Value) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$and" => branches(condition).all(|branch| matches(branch, doc)),
        "$or" => branches(condition).any(|branch| matches(branch, doc)),
        "$nor" => !branches(condition).any(|branch| matches(branch, doc)),
        "$text" => condition
            .get("$search")
            .and_then(Value::as_str)
            .is_some_and(|search| text_matches(search, doc)),
        field => field_matches(lookup(doc, field), condition),
    })
}

fn branches(condition: &Value) -> impl Iterator<Item = &Document> {
    condition
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn is_operator_document(condition: &Value) -> bool {
    condition
        .as_object()
        .is_some_and(|doc| !doc.is_empty() && doc.keys().all(|key| key.starts_with('$')))
}

fn field_matches(value: Option<&Value>, condition: &Value) -> bool {
    let Some(operators) = condition.as_object().filter(|_| is_operator_document(condition)) else {
        return equals(value, condition);
    };
    operators.iter().all(|(op, operand)| match op.as_str() {
        "$eq" => equals(value, operand),
        "$ne" => !equals(value, operand),
        "$gt" => ordered(value, operand, Ordering::is_gt),
        "$gte" => ordered(value, operand, Ordering::is_ge),
        "$lt" => ordered(value, operand, Ordering::is_lt),
        "$lte" => ordered(value, operand, Ordering::is_le),
        "$in" => operand
            .as_array()
            .is_some_and(|items| items.iter().any(|item| equals(value, item))),
        "$nin" => operand
            .as_array()
            .is_some_and(|items| !items.iter().any(|item| equals(value, item))),
        "$regex" => regex_matches(value, operand, operators.get("$options")),
        "$options" => true,
        "$not" => !field_matches(value, operand),
        "$exists" => operand.as_bool().unwrap_or(true) == value.is_some(),
        other => {
            debug!(operator = other, "unsupported filter operator");
            false
        }
    })
}

/// `null` matches missing fields; arrays match if any element does.
fn equals(value: Option<&Value>, target: &Value) -> bool {
    match value {
        None | Some(Value::Null) => target.is_null(),
        Some(Value::Array(items)) if !target.is_array() => {
            items.iter().any(|item| equal(item, target))
        }
        Some(v) => equal(v, target),
    }
}

fn ordered(value: Option<&Value>, operand: &Value, accept: fn(Ordering) -> bool) -> bool {
    value
        .and_then(|v| compare(v, operand))
        .is_some_and(accept)
}

fn regex_matches(value: Option<&Value>, pattern: &Value, options: Option<&Value>) -> bool {
    let (Some(text), Some(pattern)) = (value.and_then(Value::as_str), pattern.as_str()) else {
        return false;
    };
    let flags = options.and_then(Value::as_str).unwrap_or("");
    match RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
    {
        Ok(regex) => regex.is_match(text),
        Err(err) => {
            debug!(%err, "invalid regex in filter");
            false
        }
    }
}

fn text_matches(search: &str, doc: &Value) -> bool {
    let mut haystack = String::new();
    collect_text(doc, &mut haystack);
    let haystack = haystack.to_lowercase();

    let mut optional = Vec::new();
    for term in phrases(search) {
        let lowered = term.text.to_lowercase();
        match (term.required, term.excluded) {
            (_, true) if haystack.contains(&lowered) => return false,
            (_, true) => {}
            (true, false) if !haystack.contains(&lowered) => return false,
            (true, false) => {}
            (false, false) => optional.push(lowered),
        }
    }
    optional.is_empty() || optional.iter().any(|term| haystack.contains(term.as_str()))
}

fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push_str(s);
            out.push(' ');
        }
        Value::Array(items) => items.iter().for_each(|item| collect_text(item, out)),
        Value::Object(fields) => fields.values().for_each(|item| collect_text(item, out)),
        _ => {}
    }
}

struct Term {
    text: String,
    required: bool,
    excluded: bool,
}

/// Splits a `$search` string into quoted phrases and bare words.
fn phrases(search: &str) -> Vec<Term> {
    let mut terms = Vec::new();
    let mut rest = search.trim();
    while !rest.is_empty() {
        let excluded = rest.starts_with('-');
        let body = rest.trim_start_matches('-');
        if let Some(quoted) = body.strip_prefix('"') {
            let end = quoted.find('"').unwrap_or(quoted.len());
            terms.push(Term {
                text: quoted[..end].to_string(),
                required: !excluded,
                excluded,
            });
            rest = quoted.get(end + 1..).unwrap_or("").trim_start();
        } else {
            let end = body.find(char::is_whitespace).unwrap_or(body.len());
            if end > 0 {
                terms.push(Term {
                    text: body[..end].to_string(),
                    required: false,
                    excluded,
                });
            }
            rest = body[end..].trim_start();
        }
    }
    terms
}
