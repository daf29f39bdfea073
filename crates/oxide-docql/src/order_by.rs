//! ORDER BY parsing and sort-document translation.
//!
//! ```
//! use oxide_docql::order_by::{self, SortTranslator};
//!
//! let clause = order_by::parse("SELECT * FROM t ORDER BY ROUND(price, 2) DESC, t.name LIMIT 5").unwrap();
//! assert_eq!(clause.fields.len(), 2);
//!
//! let sort = SortTranslator::new().translate(&clause);
//! assert_eq!(
//!     serde_json::Value::Object(sort),
//!     serde_json::json!({"ROUND(price, 2)": -1, "name": 1})
//! );
//! ```

use std::collections::HashMap;
use std::fmt;

use serde_json::json;
use tracing::debug;

use crate::document::Document;
use crate::lexer::{tokenize, Keyword, Token, TokenKind};
use crate::value::strip_quotes;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    /// Ascending order (default).
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl OrderDirection {
    /// Returns the SQL representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Returns the sort value used in sort documents.
    #[must_use]
    pub const fn sort_value(&self) -> i32 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderField {
    /// Column name, or the raw text of an expression.
    pub field: String,
    /// The direction.
    pub direction: OrderDirection,
}

impl OrderField {
    /// Creates a term.
    #[must_use]
    pub fn new(field: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Returns true if the term is an expression (such as a function call)
    /// rather than a plain column.
    #[must_use]
    pub fn is_expression(&self) -> bool {
        self.field.contains('(')
    }
}

impl fmt::Display for OrderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.direction.as_str())
    }
}

/// An ordered list of ORDER BY terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderByClause {
    /// Terms in priority order.
    pub fields: Vec<OrderField>,
}

impl OrderByClause {
    /// Returns true if there are no terms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Finds the top-level `ORDER BY` of a query and parses its terms.
///
/// Returns `None` when the query has no ORDER BY or the clause is empty.
#[must_use]
pub fn parse(sql: &str) -> Option<OrderByClause> {
    let tokens = tokenize(sql);
    let mut depth = 0usize;
    let start = tokens.windows(2).position(|pair| {
        match pair[0].kind {
            TokenKind::LeftParen => depth += 1,
            TokenKind::RightParen => depth = depth.saturating_sub(1),
            _ => {}
        }
        depth == 0 && pair[0].is(Keyword::Order) && pair[1].is(Keyword::By)
    })?;
    let clause = collect_terms(sql, &tokens[start + 2..]);
    if clause.is_empty() {
        debug!("ORDER BY without terms");
        return None;
    }
    Some(clause)
}

/// Parses a bare term list such as `name DESC, id`; a leading `ORDER BY` is
/// accepted.
#[must_use]
pub fn parse_clause(text: &str) -> OrderByClause {
    let tokens = tokenize(text);
    let skip = if tokens.len() > 2 && tokens[0].is(Keyword::Order) && tokens[1].is(Keyword::By) {
        2
    } else {
        0
    };
    collect_terms(text, &tokens[skip..])
}

/// Collects terms up to the end of the clause, splitting on commas outside
/// parentheses.
fn collect_terms(source: &str, tokens: &[Token]) -> OrderByClause {
    let mut fields = Vec::new();
    let mut depth = 0usize;
    let mut term_start = 0;
    let mut end = tokens.len();

    for (i, token) in tokens.iter().enumerate() {
        match &token.kind {
            TokenKind::LeftParen => depth += 1,
            TokenKind::RightParen if depth == 0 => {
                end = i;
                break;
            }
            TokenKind::RightParen => depth -= 1,
            TokenKind::Comma if depth == 0 => {
                fields.extend(build_term(source, &tokens[term_start..i]));
                term_start = i + 1;
            }
            TokenKind::Keyword(
                Keyword::Limit | Keyword::Offset | Keyword::Group | Keyword::Having | Keyword::Union,
            )
            | TokenKind::Semicolon
            | TokenKind::Eof
                if depth == 0 =>
            {
                end = i;
                break;
            }
            _ => {}
        }
    }
    fields.extend(build_term(source, &tokens[term_start..end.max(term_start)]));
    OrderByClause { fields }
}

fn build_term(source: &str, tokens: &[Token]) -> Option<OrderField> {
    let (direction, tokens) = match tokens.split_last() {
        Some((last, rest)) if last.is(Keyword::Desc) => (OrderDirection::Desc, rest),
        Some((last, rest)) if last.is(Keyword::Asc) => (OrderDirection::Asc, rest),
        _ => (OrderDirection::Asc, tokens),
    };
    let (first, last) = (tokens.first()?, tokens.last()?);

    // `t.col`, `` `t`.`col` ``, `t.doc.path`: drop the table qualifier.
    let is_path = tokens.iter().enumerate().all(|(i, token)| {
        if i % 2 == 0 {
            token.name().is_some()
        } else {
            matches!(token.kind, TokenKind::Dot)
        }
    }) && tokens.len() % 2 == 1;
    if is_path {
        let names: Vec<&str> = tokens.iter().filter_map(|t| t.spelled(source)).collect();
        let field = if names.len() > 1 {
            names[1..].join(".")
        } else {
            names.join(".")
        };
        return Some(OrderField::new(field, direction));
    }

    let text = source[first.span.start..last.span.end].trim();
    let field = strip_quotes(text).unwrap_or(text);
    (!field.is_empty()).then(|| OrderField::new(field, direction))
}

/// Builds sort documents, optionally renaming fields.
///
/// Renames come from an explicit mapping table first, then from a schema
/// (exact match, then case-insensitive); anything else passes through.
#[derive(Debug, Clone, Default)]
pub struct SortTranslator {
    mapping: HashMap<String, String>,
    schema: Option<Vec<String>>,
}

impl SortTranslator {
    /// Creates a translator that keeps field names as written.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds explicit renames (`from` → `to`).
    #[must_use]
    pub fn with_mapping<I, K, V>(mut self, mapping: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.mapping
            .extend(mapping.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sets the schema's canonical field names.
    #[must_use]
    pub fn with_schema<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Returns the destination name for `field`.
    #[must_use]
    pub fn resolve<'a>(&'a self, field: &'a str) -> &'a str {
        if let Some(mapped) = self.mapping.get(field) {
            return mapped;
        }
        let Some(schema) = &self.schema else {
            return field;
        };
        schema
            .iter()
            .find(|name| name.as_str() == field)
            .or_else(|| schema.iter().find(|name| name.eq_ignore_ascii_case(field)))
            .map_or(field, String::as_str)
    }

    /// Translates a clause into a sort document. A field named twice keeps
    /// its first direction.
    #[must_use]
    pub fn translate(&self, clause: &OrderByClause) -> Document {
        let mut sort = Document::new();
        for term in &clause.fields {
            sort.entry(self.resolve(&term.field).to_string())
                .or_insert_with(|| json!(term.direction.sort_value()));
        }
        sort
    }

    /// Returns the `$sort` stage, or `None` for an empty clause.
    #[must_use]
    pub fn to_stage(&self, clause: &OrderByClause) -> Option<Document> {
        if clause.is_empty() {
            return None;
        }
        let mut stage = Document::new();
        stage.insert(
            "$sort".to_string(),
            serde_json::Value::Object(self.translate(clause)),
        );
        Some(stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commas_inside_calls_do_not_split() {
        let clause = parse("SELECT * FROM p ORDER BY ROUND(price,2) DESC, name").unwrap();
        assert_eq!(
            clause.fields,
            vec![
                OrderField::new("ROUND(price,2)", OrderDirection::Desc),
                OrderField::new("name", OrderDirection::Asc),
            ]
        );
        assert!(clause.fields[0].is_expression());
    }

    #[test]
    fn test_terminators() {
        for sql in [
            "SELECT a FROM t ORDER BY a LIMIT 10",
            "SELECT a FROM t ORDER BY a;",
            "SELECT a FROM t ORDER BY a",
        ] {
            assert_eq!(parse(sql).unwrap().fields, vec![OrderField::new("a", OrderDirection::Asc)]);
        }
    }

    #[test]
    fn test_nested_order_by_is_ignored() {
        let sql = "SELECT * FROM (SELECT a FROM t ORDER BY a DESC) AS s ORDER BY b";
        assert_eq!(
            parse(sql).unwrap().fields,
            vec![OrderField::new("b", OrderDirection::Asc)]
        );
        assert_eq!(parse("SELECT * FROM (SELECT a FROM t ORDER BY a) AS s"), None);
    }

    #[test]
    fn test_quotes_and_qualifiers() {
        let clause = parse_clause("`u`.`created at` desc, \"weird\", o.meta.rank ASC");
        assert_eq!(
            clause.fields,
            vec![
                OrderField::new("created at", OrderDirection::Desc),
                OrderField::new("weird", OrderDirection::Asc),
                OrderField::new("meta.rank", OrderDirection::Asc),
            ]
        );
    }

    #[test]
    fn test_missing_or_empty_clause() {
        assert_eq!(parse("SELECT * FROM t"), None);
        assert_eq!(parse("SELECT * FROM t ORDER BY LIMIT 3"), None);
        assert!(parse_clause("").is_empty());
    }

    #[test]
    fn test_schema_resolution() {
        let translator = SortTranslator::new()
            .with_schema(["createdAt", "Name"])
            .with_mapping([("nm", "fullName")]);
        let clause = parse_clause("CREATEDAT DESC, name, nm, other");
        assert_eq!(
            serde_json::Value::Object(translator.translate(&clause)),
            json!({"createdAt": -1, "Name": 1, "fullName": 1, "other": 1})
        );
    }

    #[test]
    fn test_stage() {
        let translator = SortTranslator::new();
        assert_eq!(translator.to_stage(&OrderByClause::default()), None);
        let stage = translator.to_stage(&parse_clause("a DESC")).unwrap();
        assert_eq!(serde_json::Value::Object(stage), json!({"$sort": {"a": -1}}));
    }

    #[test]
    fn test_duplicate_field_keeps_first() {
        let sort = SortTranslator::new().translate(&parse_clause("a DESC, a ASC"));
        assert_eq!(serde_json::Value::Object(sort), json!({"a": -1}));
    }
}
