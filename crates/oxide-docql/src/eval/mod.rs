//! In-process evaluation of the artifacts the translators emit.
//!
//! The destination database normally runs filters and expressions; this
//! module runs them locally against `serde_json` documents so an execution
//! layer can finish client-side markers, and so translations can be checked
//! semantically rather than by shape alone.
//!
//! ```
//! use oxide_docql::eval;
//! use oxide_docql::functions::{map_function, FunctionArg};
//! use serde_json::json;
//!
//! let instr = map_function("INSTR", &[FunctionArg::field("s"), FunctionArg::lit("b")])
//!     .unwrap()
//!     .into_expression()
//!     .unwrap();
//! assert_eq!(eval::evaluate(&instr, &json!({"s": "abcabc"})).unwrap(), json!(2));
//! ```

mod client;
mod expr;
mod filter;

use std::cmp::Ordering;

use serde_json::{json, Value};

pub use client::evaluate_client;
pub use expr::evaluate;
pub use filter::matches;

static NULL: Value = Value::Null;

/// Resolves a dotted path inside a document.
fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |value, segment| value.get(segment))
}

/// Renders a float as JSON, using an integer when it has no fractional part.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn number(f: f64) -> Value {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        json!(f as i64)
    } else {
        serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number)
    }
}

/// Returns a whole number, accepting integral floats.
#[allow(clippy::cast_possible_truncation)]
fn as_int(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.is_finite())
            .map(|f| f as i64)
    })
}

/// Orders two scalars of the same kind; numbers compare by value.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Equality where `1` and `1.0` are the same value.
fn equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}
