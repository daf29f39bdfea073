//! WHERE clause parsing and translation.
//!
//! Parsing is two-staged. The structured parser walks the token stream and
//! builds a [`CompoundPredicate`]; when it cannot make sense of the input it
//! returns `None` and the textual fallback splits the raw text on the first
//! operator it recognizes. Text neither stage understands is kept verbatim as
//! [`WhereClause::Raw`] so the translator can still try it as a fulltext
//! search.
//!
//! ```
//! use oxide_docql::where_clause::{self, WhereClause};
//!
//! let clause = where_clause::parse("age >= 18 AND name LIKE 'A%'");
//! assert!(matches!(clause, WhereClause::Parsed(_)));
//!
//! let filter = where_clause::translate(&clause).filter;
//! assert_eq!(
//!     serde_json::Value::Object(filter),
//!     serde_json::json!({"age": {"$gte": 18}, "name": {"$regex": "^A.*$", "$options": "i"}})
//! );
//! ```

mod fallback;
mod parser;
mod translator;

use std::fmt;
use std::str::FromStr;

use tracing::debug;

pub use translator::{
    like_to_regex, translate, translate_predicate, TranslatedFilter, WhereTranslator,
};

use crate::fulltext::FulltextExpression;
use crate::lexer::{tokenize, Keyword, TokenKind};
use crate::value::Value;

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
    NotLike,
    /// `REGEXP`, `REGEX` or `RLIKE`.
    Regexp,
    NotRegexp,
    In,
    NotIn,
    /// Inclusive range; the value is a two-element list.
    Between,
    IsNull,
    IsNotNull,
}

impl CompareOp {
    /// Returns the SQL spelling of the operator.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::Regexp => "REGEXP",
            Self::NotRegexp => "NOT REGEXP",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Between => "BETWEEN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }

    /// Returns true if the operator takes no value.
    #[must_use]
    pub const fn is_null_check(&self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an operator spelling is not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownOperator(pub String);

impl FromStr for CompareOp {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        Ok(match normalized.to_ascii_uppercase().as_str() {
            "=" | "==" => Self::Eq,
            "!=" | "<>" => Self::NotEq,
            "<" => Self::Lt,
            "<=" => Self::LtEq,
            ">" => Self::Gt,
            ">=" => Self::GtEq,
            "LIKE" => Self::Like,
            "NOT LIKE" => Self::NotLike,
            "REGEXP" | "REGEX" | "RLIKE" => Self::Regexp,
            "NOT REGEXP" | "NOT REGEX" | "NOT RLIKE" => Self::NotRegexp,
            "IN" => Self::In,
            "NOT IN" => Self::NotIn,
            "BETWEEN" => Self::Between,
            "IS NULL" => Self::IsNull,
            "IS NOT NULL" => Self::IsNotNull,
            _ => return Err(UnknownOperator(s.to_string())),
        })
    }
}

/// One leaf comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Dotted field path, never empty.
    pub field: String,
    /// The operator.
    pub op: CompareOp,
    /// The compared value; `Null` for the IS NULL variants.
    pub value: Value,
}

impl Predicate {
    /// Creates a predicate.
    #[must_use]
    pub fn new(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Creates a predicate from an operator spelling; unknown operators are
    /// treated as equality.
    #[must_use]
    pub fn from_parts(field: impl Into<String>, op: &str, value: Value) -> Self {
        let op = op.parse().unwrap_or_else(|UnknownOperator(op)| {
            debug!(op, "unrecognized operator, using equality");
            CompareOp::Eq
        });
        Self::new(field, op, value)
    }

    /// `field IS NULL`.
    #[must_use]
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, CompareOp::IsNull, Value::Null)
    }

    /// `field IS NOT NULL`.
    #[must_use]
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, CompareOp::IsNotNull, Value::Null)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            CompareOp::IsNull | CompareOp::IsNotNull => write!(f, "{} {}", self.field, self.op),
            CompareOp::Between => match &self.value {
                Value::List(bounds) if bounds.len() == 2 => write!(
                    f,
                    "{} BETWEEN {} AND {}",
                    self.field, bounds[0], bounds[1]
                ),
                other => write!(f, "{} BETWEEN {other}", self.field),
            },
            _ => write!(f, "{} {} {}", self.field, self.op, self.value),
        }
    }
}

/// How two neighbouring children of a [`CompoundPredicate`] combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::And => "AND",
            Self::Or => "OR",
        })
    }
}

/// A child of a [`CompoundPredicate`].
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateNode {
    /// A single comparison.
    Leaf(Predicate),
    /// A parenthesized group.
    Group(CompoundPredicate),
    /// A `MATCH ... AGAINST` search.
    Fulltext(FulltextExpression),
}

impl From<Predicate> for PredicateNode {
    fn from(predicate: Predicate) -> Self {
        Self::Leaf(predicate)
    }
}

impl From<CompoundPredicate> for PredicateNode {
    fn from(group: CompoundPredicate) -> Self {
        Self::Group(group)
    }
}

/// A chain of predicates joined by AND/OR, applied strictly left to right.
///
/// There is always at least one child and exactly one connector between each
/// pair of neighbouring children.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundPredicate {
    children: Vec<PredicateNode>,
    connectors: Vec<Connector>,
}

impl CompoundPredicate {
    /// Starts a chain with its first child.
    #[must_use]
    pub fn new(first: impl Into<PredicateNode>) -> Self {
        Self {
            children: vec![first.into()],
            connectors: Vec::new(),
        }
    }

    /// Appends a child joined by `connector`.
    pub fn push(&mut self, connector: Connector, child: impl Into<PredicateNode>) {
        self.connectors.push(connector);
        self.children.push(child.into());
    }

    /// Builder form of [`push`](Self::push).
    #[must_use]
    pub fn with(mut self, connector: Connector, child: impl Into<PredicateNode>) -> Self {
        self.push(connector, child);
        self
    }

    /// Returns the children in order.
    #[must_use]
    pub fn children(&self) -> &[PredicateNode] {
        &self.children
    }

    /// Returns the connectors; `connectors()[i]` joins children `i` and `i + 1`.
    #[must_use]
    pub fn connectors(&self) -> &[Connector] {
        &self.connectors
    }

    /// Returns the number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl fmt::Display for CompoundPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                write!(f, " {} ", self.connectors[i - 1])?;
            }
            match child {
                PredicateNode::Leaf(predicate) => write!(f, "{predicate}")?,
                PredicateNode::Group(group) => write!(f, "({group})")?,
                PredicateNode::Fulltext(expr) => write!(
                    f,
                    "MATCH({}) AGAINST({})",
                    expr.columns.join(", "),
                    Value::String(expr.search.clone())
                )?,
            }
        }
        Ok(())
    }
}

/// Result of parsing a WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereClause {
    /// A predicate tree.
    Parsed(CompoundPredicate),
    /// Text neither parser understood, kept verbatim.
    Raw(String),
}

/// Parses WHERE clause text (with or without the leading `WHERE` keyword).
///
/// Never fails: unparseable text comes back as [`WhereClause::Raw`].
#[must_use]
pub fn parse(text: &str) -> WhereClause {
    let region = isolate(text);
    if let Some(compound) = parser::parse(region) {
        return WhereClause::Parsed(compound);
    }
    debug!(text = region, "structured WHERE parse failed, trying textual fallback");
    if let Some(compound) = fallback::parse(region) {
        return WhereClause::Parsed(compound);
    }
    debug!(text = region, "WHERE clause kept as raw text");
    WhereClause::Raw(region.to_string())
}

/// Cuts `text` down to the WHERE condition: a leading `WHERE` is skipped and
/// everything from a top-level `GROUP BY`, `ORDER BY`, `HAVING`, `LIMIT` or `;`
/// onwards is dropped.
fn isolate(text: &str) -> &str {
    let tokens = tokenize(text);
    let mut start = 0;
    let mut end = text.len();
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        match &token.kind {
            TokenKind::Keyword(Keyword::Where) if i == 0 => start = token.span.end,
            TokenKind::LeftParen => depth += 1,
            TokenKind::RightParen => depth = depth.saturating_sub(1),
            TokenKind::Keyword(Keyword::Group | Keyword::Order)
                if depth == 0 && tokens.get(i + 1).is_some_and(|next| next.is(Keyword::By)) =>
            {
                end = token.span.start;
                break;
            }
            TokenKind::Keyword(Keyword::Having | Keyword::Limit) | TokenKind::Semicolon
                if depth == 0 =>
            {
                end = token.span.start;
                break;
            }
            _ => {}
        }
    }
    text[start..end.max(start)].trim()
}
