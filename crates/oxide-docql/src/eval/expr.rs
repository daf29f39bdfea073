//! Aggregation-expression evaluation.

use std::cmp::Ordering;

use serde_json::{json, Value};

use super::{as_int, compare, equal, lookup, number, NULL};
use crate::document::{Operands, TargetExpr};
use crate::error::{Result, TranslateError};

/// Evaluates an expression against a document.
///
/// Missing fields read as `null`, and `null` operands make arithmetic and
/// string operators yield `null`.
///
/// # Errors
///
/// Returns [`TranslateError::Eval`] for operators this evaluator does not
/// implement and for operands of the wrong type.
pub fn evaluate(expr: &TargetExpr, doc: &Value) -> Result<Value> {
    match expr {
        TargetExpr::Literal(value) => Ok(value.clone()),
        TargetExpr::Field(path) => Ok(lookup(doc, path).cloned().unwrap_or(Value::Null)),
        TargetExpr::Operator {
            op,
            operands: Operands::List(items),
        } => {
            let args = items
                .iter()
                .map(|item| evaluate(item, doc))
                .collect::<Result<Vec<_>>>()?;
            apply(op, &args)
        }
        TargetExpr::Operator {
            op,
            operands: Operands::Named(items),
        } => {
            let mut named = Vec::with_capacity(items.len());
            for (key, item) in items {
                named.push((*key, evaluate(item, doc)?));
            }
            apply_named(op, &named)
        }
    }
}

fn fail(op: &'static str, message: impl Into<String>) -> TranslateError {
    TranslateError::Eval {
        op,
        message: message.into(),
    }
}

fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&NULL)
}

fn float(op: &'static str, value: &Value) -> Result<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        other => Err(fail(op, format!("expected a number, got {other}"))),
    }
}

fn text<'a>(op: &'static str, value: &'a Value) -> Result<Option<&'a str>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        other => Err(fail(op, format!("expected a string, got {other}"))),
    }
}

fn unary(op: &'static str, args: &[Value], f: fn(f64) -> f64) -> Result<Value> {
    Ok(float(op, arg(args, 0))?.map_or(Value::Null, |x| number(f(x))))
}

fn binary(op: &'static str, args: &[Value], f: fn(f64, f64) -> f64) -> Result<Value> {
    match (float(op, arg(args, 0))?, float(op, arg(args, 1))?) {
        (Some(a), Some(b)) => Ok(number(f(a, b))),
        _ => Ok(Value::Null),
    }
}

/// Folds all operands; any `null` makes the result `null`.
fn fold(op: &'static str, args: &[Value], f: fn(f64, f64) -> f64) -> Result<Value> {
    let mut acc: Option<f64> = None;
    for value in args {
        let Some(x) = float(op, value)? else {
            return Ok(Value::Null);
        };
        acc = Some(acc.map_or(x, |a| f(a, x)));
    }
    Ok(acc.map_or(Value::Null, number))
}

/// `$max` / `$min` skip nulls.
fn extreme(args: &[Value], wanted: Ordering) -> Value {
    args.iter()
        .filter(|value| !value.is_null())
        .fold(None::<&Value>, |best, value| match best {
            Some(b) if compare(value, b) != Some(wanted) => Some(b),
            _ => Some(value),
        })
        .cloned()
        .unwrap_or(Value::Null)
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn scaled(op: &'static str, args: &[Value], f: fn(f64) -> f64) -> Result<Value> {
    let Some(x) = float(op, arg(args, 0))? else {
        return Ok(Value::Null);
    };
    let places = as_int(arg(args, 1)).unwrap_or(0);
    let factor = 10f64.powi(places.clamp(-20, 20) as i32);
    Ok(number(f(x * factor) / factor))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => true,
    }
}

fn comparison(args: &[Value], accept: fn(Ordering) -> bool) -> Value {
    let (a, b) = (arg(args, 0), arg(args, 1));
    // Null sorts before every other value.
    let ordering = match (a.is_null(), b.is_null()) {
        (true, true) => Some(Ordering::Equal),
        (true, false) => Some(Ordering::Less),
        (false, true) => Some(Ordering::Greater),
        (false, false) => compare(a, b),
    };
    Value::Bool(ordering.is_some_and(accept))
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn substr(op: &'static str, args: &[Value]) -> Result<Value> {
    let Some(s) = text(op, arg(args, 0))? else {
        return Ok(json!(""));
    };
    let start = as_int(arg(args, 1)).unwrap_or(0).max(0) as usize;
    let length = as_int(arg(args, 2)).unwrap_or(0).max(0) as usize;
    Ok(Value::String(s.chars().skip(start).take(length).collect()))
}

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn index_of(op: &'static str, args: &[Value]) -> Result<Value> {
    let (Some(haystack), Some(needle)) = (text(op, arg(args, 0))?, text(op, arg(args, 1))?) else {
        return Ok(Value::Null);
    };
    let from = as_int(arg(args, 2)).unwrap_or(0).max(0) as usize;
    let chars: Vec<char> = haystack.chars().collect();
    let pattern: Vec<char> = needle.chars().collect();
    if from > chars.len() {
        return Ok(json!(-1));
    }
    let found = if pattern.is_empty() {
        Some(from)
    } else {
        chars[from..]
            .windows(pattern.len())
            .position(|window| window == pattern.as_slice())
            .map(|i| i + from)
    };
    Ok(found.map_or(json!(-1), |i| json!(i)))
}

fn apply(op: &'static str, args: &[Value]) -> Result<Value> {
    match op {
        "$abs" => unary(op, args, f64::abs),
        "$ceil" => unary(op, args, f64::ceil),
        "$floor" => unary(op, args, f64::floor),
        "$sqrt" => unary(op, args, f64::sqrt),
        "$exp" => unary(op, args, f64::exp),
        "$ln" => unary(op, args, f64::ln),
        "$log10" => unary(op, args, f64::log10),
        "$sin" => unary(op, args, f64::sin),
        "$cos" => unary(op, args, f64::cos),
        "$tan" => unary(op, args, f64::tan),
        "$asin" => unary(op, args, f64::asin),
        "$acos" => unary(op, args, f64::acos),
        "$atan" => unary(op, args, f64::atan),
        "$radiansToDegrees" => unary(op, args, f64::to_degrees),
        "$degreesToRadians" => unary(op, args, f64::to_radians),
        "$log" => binary(op, args, f64::log),
        "$pow" => binary(op, args, f64::powf),
        "$atan2" => binary(op, args, f64::atan2),
        "$mod" => binary(op, args, |a, b| a % b),
        "$subtract" => binary(op, args, |a, b| a - b),
        // Division by zero is NULL, as in MySQL.
        "$divide" => match (float(op, arg(args, 0))?, float(op, arg(args, 1))?) {
            (Some(a), Some(b)) if b != 0.0 => Ok(number(a / b)),
            _ => Ok(Value::Null),
        },
        "$add" => fold(op, args, |a, b| a + b),
        "$multiply" => fold(op, args, |a, b| a * b),
        "$round" => scaled(op, args, f64::round),
        "$trunc" => scaled(op, args, f64::trunc),
        "$max" => Ok(extreme(args, Ordering::Greater)),
        "$min" => Ok(extreme(args, Ordering::Less)),
        "$eq" => Ok(Value::Bool(equal(arg(args, 0), arg(args, 1)))),
        "$ne" => Ok(Value::Bool(!equal(arg(args, 0), arg(args, 1)))),
        "$gt" => Ok(comparison(args, Ordering::is_gt)),
        "$gte" => Ok(comparison(args, Ordering::is_ge)),
        "$lt" => Ok(comparison(args, Ordering::is_lt)),
        "$lte" => Ok(comparison(args, Ordering::is_le)),
        "$cond" => Ok(if truthy(arg(args, 0)) {
            arg(args, 1).clone()
        } else {
            arg(args, 2).clone()
        }),
        "$toUpper" => Ok(json!(text(op, arg(args, 0))?.unwrap_or("").to_uppercase())),
        "$toLower" => Ok(json!(text(op, arg(args, 0))?.unwrap_or("").to_lowercase())),
        "$strLenBytes" => Ok(text(op, arg(args, 0))?.map_or(Value::Null, |s| json!(s.len()))),
        "$strLenCP" => Ok(text(op, arg(args, 0))?.map_or(Value::Null, |s| json!(s.chars().count()))),
        "$concat" => {
            let mut out = String::new();
            for value in args {
                let Some(s) = text(op, value)? else {
                    return Ok(Value::Null);
                };
                out.push_str(s);
            }
            Ok(Value::String(out))
        }
        "$substrCP" => substr(op, args),
        "$indexOfCP" => index_of(op, args),
        "$strcasecmp" => {
            let a = text(op, arg(args, 0))?.unwrap_or("").to_lowercase();
            let b = text(op, arg(args, 1))?.unwrap_or("").to_lowercase();
            Ok(json!(match a.cmp(&b) {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            }))
        }
        other => Err(fail(other, "unsupported operator")),
    }
}

fn apply_named(op: &'static str, operands: &[(&'static str, Value)]) -> Result<Value> {
    let get = |key: &str| {
        operands
            .iter()
            .find(|(name, _)| *name == key)
            .map_or(&NULL, |(_, value)| value)
    };
    match op {
        "$rand" => Ok(number(rand::random::<f64>())),
        "$trim" | "$ltrim" | "$rtrim" => {
            let Some(input) = text(op, get("input"))? else {
                return Ok(Value::Null);
            };
            let trimmed = match op {
                "$ltrim" => input.trim_start(),
                "$rtrim" => input.trim_end(),
                _ => input.trim(),
            };
            Ok(json!(trimmed))
        }
        "$replaceAll" => {
            let input = text(op, get("input"))?;
            let find = text(op, get("find"))?;
            let replacement = text(op, get("replacement"))?;
            match (input, find, replacement) {
                (Some(input), Some(find), Some(replacement)) if !find.is_empty() => {
                    Ok(json!(input.replace(find, replacement)))
                }
                (Some(input), Some(_), Some(_)) => Ok(json!(input)),
                _ => Ok(Value::Null),
            }
        }
        other => Err(fail(other, "unsupported operator")),
    }
}
