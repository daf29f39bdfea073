//! Scalar values carried by predicates and function arguments.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Number;

/// A literal value taken from SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    String(String),
    /// Parenthesized value list (IN, BETWEEN bounds).
    List(Vec<Value>),
}

impl Value {
    /// Interprets an unquoted textual value the way the fallback parser does:
    /// NULL, booleans and numbers are recognized, anything else stays text.
    #[must_use]
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some(unquoted) = strip_quotes(trimmed) {
            return Self::String(unquoted.to_string());
        }
        match trimmed.to_ascii_uppercase().as_str() {
            "NULL" => return Self::Null,
            "TRUE" => return Self::Bool(true),
            "FALSE" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            Self::Int(i)
        } else if let Ok(f) = trimmed.parse::<f64>() {
            Self::Float(f)
        } else {
            Self::String(trimmed.to_string())
        }
    }

    /// Wraps a scalar into a one-element list; lists are returned unchanged.
    #[must_use]
    pub fn into_list(self) -> Vec<Self> {
        match self {
            Self::List(items) => items,
            other => vec![other],
        }
    }

    /// Returns true for `Value::Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the text content of a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Converts into the JSON representation used in target documents.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::Number(Number::from(*i)),
            Self::Float(f) => {
                Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number)
            }
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Returns the content of `s` if it is wrapped in matching single, double or
/// backtick quotes.
#[must_use]
pub fn strip_quotes(s: &str) -> Option<&str> {
    let mut chars = s.chars();
    let first = chars.next()?;
    let last = chars.next_back()?;
    if first == last && matches!(first, '\'' | '"' | '`') {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}
