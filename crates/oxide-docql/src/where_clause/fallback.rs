//! Textual WHERE fallback.
//!
//! Splits the text on the first operator found, checking operators in a fixed
//! order: the null checks, list membership, pattern matching, then the
//! two-character comparisons before the one-character ones so that `>=`
//! is never split as `>` followed by `=`.

use super::{CompareOp, CompoundPredicate, Predicate};
use crate::value::{strip_quotes, Value};

/// Keyword patterns, matched case-insensitively with the surrounding spaces.
const KEYWORD_PATTERNS: &[(&str, CompareOp)] = &[
    (" IS NOT NULL", CompareOp::IsNotNull),
    (" IS NULL", CompareOp::IsNull),
    (" NOT IN (", CompareOp::NotIn),
    (" IN (", CompareOp::In),
    (" NOT LIKE ", CompareOp::NotLike),
    (" LIKE ", CompareOp::Like),
];

/// Symbolic operators, longest first.
const SYMBOL_PATTERNS: &[&str] = &[">=", "<=", "!=", "<>", ">", "<", "="];

pub(super) fn parse(text: &str) -> Option<CompoundPredicate> {
    let text = text.trim();
    let upper = text.to_ascii_uppercase();

    for (pattern, op) in KEYWORD_PATTERNS {
        let Some(at) = upper.find(pattern) else {
            continue;
        };
        let Some(field) = field_path(&text[..at]) else {
            continue;
        };
        let rest = &text[at + pattern.len()..];
        let value = match op {
            CompareOp::IsNull | CompareOp::IsNotNull => {
                if !rest.trim().is_empty() {
                    continue;
                }
                Value::Null
            }
            CompareOp::In | CompareOp::NotIn => {
                let Some(inner) = rest.trim_end().strip_suffix(')') else {
                    continue;
                };
                Value::List(split_list(inner).into_iter().map(Value::from_text).collect())
            }
            _ => Value::from_text(rest),
        };
        return Some(CompoundPredicate::new(Predicate::new(field, *op, value)));
    }

    for symbol in SYMBOL_PATTERNS {
        let Some(at) = text.find(symbol) else {
            continue;
        };
        let Some(field) = field_path(&text[..at]) else {
            continue;
        };
        let rest = text[at + symbol.len()..].trim();
        if rest.is_empty() {
            continue;
        }
        let op = if *symbol == "<>" { "!=" } else { symbol };
        return Some(CompoundPredicate::new(Predicate::from_parts(
            field,
            op,
            Value::from_text(rest),
        )));
    }
    None
}

/// Accepts a bare dotted path or a single quoted name.
fn field_path(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Some(inner) = strip_quotes(raw).filter(|_| !raw.starts_with('\'')) {
        return (!inner.is_empty()).then(|| inner.to_string());
    }
    let valid = !raw.is_empty()
        && !raw.starts_with('.')
        && !raw.ends_with('.')
        && raw
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.'))
        && !raw.chars().next().is_some_and(|c| c.is_ascii_digit());
    valid.then(|| raw.to_string())
}

/// Splits a list body on commas outside single or double quotes.
fn split_list(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, ',') => {
                parts.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(inner[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(text: &str) -> Predicate {
        let compound = parse(text).unwrap_or_else(|| panic!("no predicate for {text:?}"));
        assert_eq!(compound.len(), 1);
        match &compound.children()[0] {
            super::super::PredicateNode::Leaf(predicate) => predicate.clone(),
            other => panic!("expected leaf, got {other:?}"),
        }
    }

    #[test]
    fn test_two_character_operators_win() {
        assert_eq!(single("age >= 30"), Predicate::new("age", CompareOp::GtEq, 30_i64));
        assert_eq!(single("age <= 30"), Predicate::new("age", CompareOp::LtEq, 30_i64));
        assert_eq!(single("age != 30"), Predicate::new("age", CompareOp::NotEq, 30_i64));
        assert_eq!(single("age <> 30"), Predicate::new("age", CompareOp::NotEq, 30_i64));
        assert_eq!(single("age = 30"), Predicate::new("age", CompareOp::Eq, 30_i64));
    }

    #[test]
    fn test_null_checks_before_comparisons() {
        assert_eq!(single("deleted_at is not null"), Predicate::is_not_null("deleted_at"));
        assert_eq!(single("`deleted_at` IS NULL"), Predicate::is_null("deleted_at"));
    }

    #[test]
    fn test_in_lists() {
        assert_eq!(
            single("tag NOT IN ('a,b', 'c', 3)"),
            Predicate::new(
                "tag",
                CompareOp::NotIn,
                Value::List(vec!["a,b".into(), "c".into(), Value::Int(3)])
            )
        );
    }

    #[test]
    fn test_like_value_is_unquoted() {
        assert_eq!(
            single("name LIKE '%=%'"),
            Predicate::new("name", CompareOp::Like, "%=%")
        );
    }

    #[test]
    fn test_operator_inside_value_does_not_split_field() {
        assert_eq!(
            single("title = 'a>b'"),
            Predicate::new("title", CompareOp::Eq, "a>b")
        );
    }

    #[test]
    fn test_unrecognized_text() {
        assert!(parse("MATCH(title) AGAINST('x')").is_none());
        assert!(parse("just words").is_none());
        assert!(parse("= 5").is_none());
    }
}
