//! String functions.
//!
//! Positions are 1-based in SQL and 0-based in the destination, so every
//! position argument and result is shifted by one on the way through.

use serde_json::Value as Json;

use super::{next_arg, Arity, FunctionSpec, Mapping};
use crate::document::{ClientFunction, TargetExpr};

const fn unary(name: &'static str, op: &'static str) -> FunctionSpec {
    FunctionSpec {
        name,
        aliases: &[],
        arity: Arity::Exactly(1),
        mapping: Mapping::Expression(op),
    }
}

const fn custom(name: &'static str, arity: Arity, build: super::BuildFn) -> FunctionSpec {
    FunctionSpec {
        name,
        aliases: &[],
        arity,
        mapping: Mapping::Custom(build),
    }
}

const fn client(name: &'static str, arity: Arity, function: ClientFunction) -> FunctionSpec {
    FunctionSpec {
        name,
        aliases: &[],
        arity,
        mapping: Mapping::ClientSide(function),
    }
}

pub(super) const FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        aliases: &["UCASE"],
        ..unary("UPPER", "$toUpper")
    },
    FunctionSpec {
        aliases: &["LCASE"],
        ..unary("LOWER", "$toLower")
    },
    FunctionSpec {
        aliases: &["OCTET_LENGTH"],
        ..unary("LENGTH", "$strLenBytes")
    },
    FunctionSpec {
        aliases: &["CHARACTER_LENGTH"],
        ..unary("CHAR_LENGTH", "$strLenCP")
    },
    FunctionSpec {
        name: "CONCAT",
        aliases: &[],
        arity: Arity::AtLeast(2),
        mapping: Mapping::Expression("$concat"),
    },
    custom("CONCAT_WS", Arity::AtLeast(2), concat_ws),
    FunctionSpec {
        aliases: &["SUBSTR", "MID"],
        ..custom("SUBSTRING", Arity::Range(2, 3), substring)
    },
    custom("LEFT", Arity::Exactly(2), left),
    custom("RIGHT", Arity::Exactly(2), right),
    custom("TRIM", Arity::Exactly(1), trim),
    custom("LTRIM", Arity::Exactly(1), ltrim),
    custom("RTRIM", Arity::Exactly(1), rtrim),
    custom("REPLACE", Arity::Exactly(3), replace),
    custom("INSTR", Arity::Exactly(2), instr),
    custom("LOCATE", Arity::Range(2, 3), locate),
    custom("POSITION", Arity::Exactly(2), locate),
    FunctionSpec {
        name: "STRCMP",
        aliases: &[],
        arity: Arity::Exactly(2),
        mapping: Mapping::Expression("$strcasecmp"),
    },
    client("REVERSE", Arity::Exactly(1), ClientFunction::Reverse),
    client("REPEAT", Arity::Exactly(2), ClientFunction::Repeat),
    client("SPACE", Arity::Exactly(1), ClientFunction::Space),
];

/// An integer literal, if `expr` is one.
fn int_literal(expr: &TargetExpr) -> Option<i64> {
    match expr {
        TargetExpr::Literal(Json::Number(n)) => n.as_i64(),
        _ => None,
    }
}

fn sub_one(position: TargetExpr) -> TargetExpr {
    TargetExpr::op("$subtract", vec![position, TargetExpr::int(1)])
}

/// Turns a 0-based index result (-1 when absent) into SQL's 1-based one (0 when absent).
fn one_based(index: TargetExpr) -> TargetExpr {
    TargetExpr::op("$add", vec![index, TargetExpr::int(1)])
}

fn str_len(s: TargetExpr) -> TargetExpr {
    TargetExpr::op("$strLenCP", vec![s])
}

fn concat_ws(args: Vec<TargetExpr>) -> TargetExpr {
    let mut args = args.into_iter();
    let separator = next_arg(&mut args);
    let mut parts = Vec::new();
    for (i, part) in args.enumerate() {
        if i > 0 {
            parts.push(separator.clone());
        }
        parts.push(part);
    }
    TargetExpr::op("$concat", parts)
}

/// `SUBSTRING(s, pos[, len])`. A negative `pos` counts back from the end,
/// `pos` 0 selects nothing, and a start before the first character gives `''`.
fn substring(args: Vec<TargetExpr>) -> TargetExpr {
    let mut args = args.into_iter();
    let s = next_arg(&mut args);
    let position = next_arg(&mut args);
    let length = args.next().unwrap_or_else(|| str_len(s.clone()));
    let from_end = || TargetExpr::op("$add", vec![str_len(s.clone()), position.clone()]);
    let (start, length) = match int_literal(&position) {
        Some(p) if p > 0 => (TargetExpr::int(p - 1), length),
        Some(0) => (TargetExpr::int(0), TargetExpr::int(0)),
        Some(_) => (
            TargetExpr::op("$max", vec![TargetExpr::int(0), from_end()]),
            TargetExpr::op(
                "$cond",
                vec![
                    TargetExpr::op("$lt", vec![from_end(), TargetExpr::int(0)]),
                    TargetExpr::int(0),
                    length,
                ],
            ),
        ),
        None => (
            TargetExpr::op(
                "$cond",
                vec![
                    TargetExpr::op("$gt", vec![position.clone(), TargetExpr::int(0)]),
                    sub_one(position.clone()),
                    TargetExpr::op("$max", vec![TargetExpr::int(0), from_end()]),
                ],
            ),
            TargetExpr::op(
                "$cond",
                vec![
                    TargetExpr::op("$eq", vec![position.clone(), TargetExpr::int(0)]),
                    TargetExpr::int(0),
                    TargetExpr::op(
                        "$cond",
                        vec![
                            TargetExpr::op("$lt", vec![from_end(), TargetExpr::int(0)]),
                            TargetExpr::int(0),
                            length,
                        ],
                    ),
                ],
            ),
        ),
    };
    TargetExpr::op("$substrCP", vec![s, start, length])
}

fn left(args: Vec<TargetExpr>) -> TargetExpr {
    let mut args = args.into_iter();
    let s = next_arg(&mut args);
    let n = next_arg(&mut args);
    TargetExpr::op("$substrCP", vec![s, TargetExpr::int(0), n])
}

/// Starts at `max(0, length(s) - n)`; the offset depends on the data.
fn right(args: Vec<TargetExpr>) -> TargetExpr {
    let mut args = args.into_iter();
    let s = next_arg(&mut args);
    let n = next_arg(&mut args);
    let start = TargetExpr::op(
        "$max",
        vec![
            TargetExpr::int(0),
            TargetExpr::op("$subtract", vec![str_len(s.clone()), n.clone()]),
        ],
    );
    TargetExpr::op("$substrCP", vec![s, start, n])
}

fn trim_with(op: &'static str, args: Vec<TargetExpr>) -> TargetExpr {
    TargetExpr::named(op, vec![("input", next_arg(&mut args.into_iter()))])
}

fn trim(args: Vec<TargetExpr>) -> TargetExpr {
    trim_with("$trim", args)
}

fn ltrim(args: Vec<TargetExpr>) -> TargetExpr {
    trim_with("$ltrim", args)
}

fn rtrim(args: Vec<TargetExpr>) -> TargetExpr {
    trim_with("$rtrim", args)
}

fn replace(args: Vec<TargetExpr>) -> TargetExpr {
    let mut args = args.into_iter();
    TargetExpr::named(
        "$replaceAll",
        vec![
            ("input", next_arg(&mut args)),
            ("find", next_arg(&mut args)),
            ("replacement", next_arg(&mut args)),
        ],
    )
}

/// `INSTR(str, substr)`.
fn instr(args: Vec<TargetExpr>) -> TargetExpr {
    let mut args = args.into_iter();
    let haystack = next_arg(&mut args);
    let needle = next_arg(&mut args);
    one_based(TargetExpr::op("$indexOfCP", vec![haystack, needle]))
}

/// `LOCATE(substr, str[, pos])` and `POSITION(substr IN str)`. A `pos` below
/// 1 finds nothing.
fn locate(args: Vec<TargetExpr>) -> TargetExpr {
    let mut args = args.into_iter();
    let needle = next_arg(&mut args);
    let haystack = next_arg(&mut args);
    let Some(position) = args.next() else {
        return one_based(TargetExpr::op("$indexOfCP", vec![haystack, needle]));
    };
    match int_literal(&position) {
        Some(p) if p >= 1 => one_based(TargetExpr::op(
            "$indexOfCP",
            vec![haystack, needle, TargetExpr::int(p - 1)],
        )),
        Some(_) => TargetExpr::int(0),
        None => TargetExpr::op(
            "$cond",
            vec![
                TargetExpr::op("$lt", vec![position.clone(), TargetExpr::int(1)]),
                TargetExpr::int(0),
                one_based(TargetExpr::op(
                    "$indexOfCP",
                    vec![haystack, needle, sub_one(position)],
                )),
            ],
        ),
    }
}
