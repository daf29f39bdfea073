//! Target-side artifacts: filter/sort documents, expression trees and
//! client-side evaluation markers.

use serde::{Serialize, Serializer};
use serde_json::json;

use crate::value::Value;

/// An ordered JSON object: filters, sort specifications and pipeline stages.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Operands of an expression operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Operands {
    /// Positional operands, rendered as a JSON array.
    List(Vec<TargetExpr>),
    /// Named operands, rendered as a JSON object (e.g. `$trim: {input: ..}`).
    Named(Vec<(&'static str, TargetExpr)>),
}

/// A node of the destination aggregation-expression language.
///
/// Built once by the function mappers and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetExpr {
    /// A constant.
    Literal(serde_json::Value),
    /// A reference to a document field (dotted path, rendered as `"$path"`).
    Field(String),
    /// An operator applied to operands.
    Operator {
        /// Operator key, including the leading `$`.
        op: &'static str,
        /// The operands.
        operands: Operands,
    },
}

impl TargetExpr {
    /// Creates a field reference.
    #[must_use]
    pub fn field(path: impl Into<String>) -> Self {
        Self::Field(path.into())
    }

    /// Creates a literal from a SQL value.
    #[must_use]
    pub fn literal(value: &Value) -> Self {
        Self::Literal(value.to_json())
    }

    /// Creates an integer literal.
    #[must_use]
    pub fn int(i: i64) -> Self {
        Self::Literal(json!(i))
    }

    /// Creates an operator with positional operands.
    #[must_use]
    pub const fn op(op: &'static str, operands: Vec<Self>) -> Self {
        Self::Operator {
            op,
            operands: Operands::List(operands),
        }
    }

    /// Creates an operator with named operands.
    #[must_use]
    pub const fn named(op: &'static str, operands: Vec<(&'static str, Self)>) -> Self {
        Self::Operator {
            op,
            operands: Operands::Named(operands),
        }
    }

    /// Returns the operator key, if this node is an operator.
    #[must_use]
    pub const fn operator(&self) -> Option<&'static str> {
        match self {
            Self::Operator { op, .. } => Some(*op),
            _ => None,
        }
    }

    /// Renders the expression as JSON.
    ///
    /// String literals starting with `$` are wrapped in `$literal` so they are
    /// not mistaken for field paths.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Literal(serde_json::Value::String(s)) if s.starts_with('$') => {
                json!({ "$literal": s })
            }
            Self::Literal(value) => value.clone(),
            Self::Field(path) => serde_json::Value::String(format!("${path}")),
            Self::Operator { op, operands } => {
                let rendered = match operands {
                    Operands::List(items) => {
                        serde_json::Value::Array(items.iter().map(Self::to_json).collect())
                    }
                    Operands::Named(items) => serde_json::Value::Object(
                        items
                            .iter()
                            .map(|(key, expr)| ((*key).to_string(), expr.to_json()))
                            .collect(),
                    ),
                };
                let mut doc = Document::new();
                doc.insert((*op).to_string(), rendered);
                serde_json::Value::Object(doc)
            }
        }
    }
}

impl Serialize for TargetExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Functions the destination cannot compute; the execution layer evaluates
/// them after fetching raw field values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientFunction {
    Md5,
    Sha1,
    Sha2,
    AesEncrypt,
    AesDecrypt,
    Reverse,
    Repeat,
    Space,
}

impl ClientFunction {
    /// Returns the SQL name of the function.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA1",
            Self::Sha2 => "SHA2",
            Self::AesEncrypt => "AES_ENCRYPT",
            Self::AesDecrypt => "AES_DECRYPT",
            Self::Reverse => "REVERSE",
            Self::Repeat => "REPEAT",
            Self::Space => "SPACE",
        }
    }
}

/// One argument of a client-side call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientArg {
    /// A literal passed through verbatim.
    Literal(Value),
    /// A field whose value is read from the fetched document.
    Field(String),
    /// A server-side expression whose result feeds the call.
    Expression(TargetExpr),
    /// Another client-side call evaluated first.
    Call(Box<ClientSideCall>),
}

/// Marker telling the execution layer to compute a value itself.
///
/// Serializes as `{"type": "MD5", "args": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientSideCall {
    /// The function to evaluate.
    #[serde(rename = "type")]
    pub function: ClientFunction,
    /// Resolved arguments.
    pub args: Vec<ClientArg>,
}

impl ClientSideCall {
    /// Renders the marker as JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
