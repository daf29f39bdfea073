//! Predicate tree to filter document.

use serde_json::{json, Value as Json};
use tracing::{debug, warn};

use super::{CompareOp, CompoundPredicate, Connector, Predicate, PredicateNode, WhereClause};
use crate::document::Document;
use crate::fulltext::{self, FulltextExpression, FulltextTranslator};
use crate::value::Value;

/// A filter plus the non-fatal diagnostics produced while building it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslatedFilter {
    /// The filter document; empty means "match everything".
    pub filter: Document,
    /// Degradations the caller may want to surface.
    pub warnings: Vec<String>,
}

/// Translates [`WhereClause`]s into filter documents.
#[derive(Debug, Clone, Default)]
pub struct WhereTranslator {
    fulltext: FulltextTranslator,
}

/// Translates with the default configuration.
#[must_use]
pub fn translate(clause: &WhereClause) -> TranslatedFilter {
    WhereTranslator::new().translate(clause)
}

impl WhereTranslator {
    /// Creates a translator with the default fulltext configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `fulltext` for `MATCH ... AGAINST` predicates.
    #[must_use]
    pub fn with_fulltext(mut self, fulltext: FulltextTranslator) -> Self {
        self.fulltext = fulltext;
        self
    }

    /// Translates a parsed or raw WHERE clause.
    ///
    /// Raw text is tried as a fulltext search; if that fails too the result
    /// is an empty filter and a warning, never an error.
    #[must_use]
    pub fn translate(&self, clause: &WhereClause) -> TranslatedFilter {
        let mut warnings = Vec::new();
        let filter = match clause {
            WhereClause::Parsed(compound) => self.translate_compound(compound, &mut warnings),
            WhereClause::Raw(text) if text.trim().is_empty() => Document::new(),
            WhereClause::Raw(text) => match fulltext::parse(text) {
                Some(expr) => self.translate_fulltext(&expr, &mut warnings),
                None => {
                    warn!(%text, "unsupported WHERE clause, query runs unfiltered");
                    warnings.push(format!("unsupported WHERE clause ignored: {text}"));
                    Document::new()
                }
            },
        };
        TranslatedFilter { filter, warnings }
    }

    fn translate_compound(
        &self,
        compound: &CompoundPredicate,
        warnings: &mut Vec<String>,
    ) -> Document {
        let mut children = compound.children().iter();
        let Some(first) = children.next() else {
            return Document::new();
        };
        let mut acc = self.translate_node(first, warnings);
        for (connector, child) in compound.connectors().iter().zip(children) {
            let next = self.translate_node(child, warnings);
            acc = match connector {
                Connector::And => merge_and(acc, next, warnings),
                Connector::Or => merge_or(acc, next),
            };
        }
        acc
    }

    fn translate_node(&self, node: &PredicateNode, warnings: &mut Vec<String>) -> Document {
        match node {
            PredicateNode::Leaf(predicate) => translate_predicate(predicate),
            PredicateNode::Group(group) => self.translate_compound(group, warnings),
            PredicateNode::Fulltext(expr) => self.translate_fulltext(expr, warnings),
        }
    }

    fn translate_fulltext(
        &self,
        expr: &FulltextExpression,
        warnings: &mut Vec<String>,
    ) -> Document {
        self.fulltext.text_filter(expr).unwrap_or_else(|| {
            warnings.push(format!(
                "fulltext search {:?} has no searchable terms and was ignored",
                expr.search
            ));
            Document::new()
        })
    }
}

/// Translates one comparison.
#[must_use]
pub fn translate_predicate(predicate: &Predicate) -> Document {
    let value = predicate.value.to_json();
    let condition = match predicate.op {
        CompareOp::Eq => value,
        CompareOp::NotEq => json!({ "$ne": value }),
        CompareOp::Lt => json!({ "$lt": value }),
        CompareOp::LtEq => json!({ "$lte": value }),
        CompareOp::Gt => json!({ "$gt": value }),
        CompareOp::GtEq => json!({ "$gte": value }),
        CompareOp::Like => regex_condition(like_to_regex(&pattern_text(&predicate.value))),
        CompareOp::NotLike => json!({
            "$not": regex_condition(like_to_regex(&pattern_text(&predicate.value)))
        }),
        CompareOp::Regexp => regex_condition(pattern_text(&predicate.value)),
        CompareOp::NotRegexp => json!({ "$not": regex_condition(pattern_text(&predicate.value)) }),
        CompareOp::In => json!({ "$in": predicate.value.clone().into_list() }),
        CompareOp::NotIn => json!({ "$nin": predicate.value.clone().into_list() }),
        CompareOp::Between => match &predicate.value {
            Value::List(bounds) if bounds.len() == 2 => {
                json!({ "$gte": bounds[0], "$lte": bounds[1] })
            }
            other => {
                debug!(field = %predicate.field, value = %other, "BETWEEN without two bounds");
                other.to_json()
            }
        },
        CompareOp::IsNull => Json::Null,
        CompareOp::IsNotNull => json!({ "$ne": null }),
    };
    let mut doc = Document::new();
    doc.insert(predicate.field.clone(), condition);
    doc
}

fn regex_condition(pattern: String) -> Json {
    json!({ "$regex": pattern, "$options": "i" })
}

fn pattern_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Compiles a SQL LIKE pattern into an anchored regular expression.
///
/// Every character is escaped first; only then do `%` and `_` become `.*` and
/// `.`. A backslash makes the following character literal, so `\%` matches a
/// percent sign.
///
/// ```
/// use oxide_docql::where_clause::like_to_regex;
///
/// assert_eq!(like_to_regex("50%.com"), r"^50.*\.com$");
/// assert_eq!(like_to_regex(r"100\%"), "^100%$");
/// ```
#[must_use]
pub fn like_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 2);
    out.push('^');
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => out.push_str(&regex::escape(&escaped.to_string())),
                None => out.push_str(r"\\"),
            },
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    out
}

/// AND: fields are merged into one document. Operator keys (`$or`, `$text`,
/// ...) that collide cannot be merged, so both sides are wrapped in `$and`;
/// a plain field constrained twice keeps the later condition.
fn merge_and(mut acc: Document, next: Document, warnings: &mut Vec<String>) -> Document {
    if next.keys().any(|key| key.starts_with('$') && acc.contains_key(key)) {
        let mut branches = match take_sole(&mut acc, "$and") {
            Some(Json::Array(branches)) => branches,
            _ => vec![Json::Object(acc)],
        };
        branches.push(Json::Object(next));
        let mut doc = Document::new();
        doc.insert("$and".to_string(), Json::Array(branches));
        return doc;
    }
    for (key, value) in next {
        if acc.contains_key(&key) {
            warn!(field = %key, "field constrained twice with AND, later condition wins");
            warnings.push(format!(
                "field `{key}` constrained twice with AND; the later condition wins"
            ));
        }
        acc.insert(key, value);
    }
    acc
}

/// OR: builds a single `$or`, flattening either side that already is one.
fn merge_or(mut acc: Document, mut next: Document) -> Document {
    let mut branches = match take_sole(&mut acc, "$or") {
        Some(Json::Array(branches)) => branches,
        _ => vec![Json::Object(acc)],
    };
    match take_sole(&mut next, "$or") {
        Some(Json::Array(more)) => branches.extend(more),
        _ => branches.push(Json::Object(next)),
    }
    let mut doc = Document::new();
    doc.insert("$or".to_string(), Json::Array(branches));
    doc
}

/// Removes and returns `key` if it is the document's only key.
fn take_sole(doc: &mut Document, key: &str) -> Option<Json> {
    if doc.len() == 1 && doc.contains_key(key) {
        doc.remove(key)
    } else {
        None
    }
}
