//! Mathematical functions.

use super::{next_arg, Arity, FunctionSpec, Mapping};
use crate::document::{Operands, TargetExpr};

const fn unary(name: &'static str, op: &'static str) -> FunctionSpec {
    FunctionSpec {
        name,
        aliases: &[],
        arity: Arity::Exactly(1),
        mapping: Mapping::Expression(op),
    }
}

const fn binary(name: &'static str, op: &'static str) -> FunctionSpec {
    FunctionSpec {
        name,
        aliases: &[],
        arity: Arity::Exactly(2),
        mapping: Mapping::Expression(op),
    }
}

pub(super) const FUNCTIONS: &[FunctionSpec] = &[
    unary("ABS", "$abs"),
    FunctionSpec {
        aliases: &["CEILING"],
        ..unary("CEIL", "$ceil")
    },
    unary("FLOOR", "$floor"),
    unary("SQRT", "$sqrt"),
    unary("EXP", "$exp"),
    unary("LN", "$ln"),
    unary("LOG10", "$log10"),
    unary("SIN", "$sin"),
    unary("COS", "$cos"),
    unary("TAN", "$tan"),
    unary("ASIN", "$asin"),
    unary("ACOS", "$acos"),
    unary("DEGREES", "$radiansToDegrees"),
    unary("RADIANS", "$degreesToRadians"),
    FunctionSpec {
        aliases: &["POW"],
        ..binary("POWER", "$pow")
    },
    binary("MOD", "$mod"),
    binary("ATAN2", "$atan2"),
    FunctionSpec {
        name: "ATAN",
        aliases: &[],
        arity: Arity::Range(1, 2),
        mapping: Mapping::Custom(atan),
    },
    FunctionSpec {
        name: "LOG",
        aliases: &[],
        arity: Arity::Range(1, 2),
        mapping: Mapping::Custom(log),
    },
    FunctionSpec {
        name: "LOG2",
        aliases: &[],
        arity: Arity::Exactly(1),
        mapping: Mapping::Custom(log2),
    },
    FunctionSpec {
        name: "ROUND",
        aliases: &[],
        arity: Arity::Range(1, 2),
        mapping: Mapping::Custom(round),
    },
    FunctionSpec {
        name: "TRUNCATE",
        aliases: &[],
        arity: Arity::Range(1, 2),
        mapping: Mapping::Custom(truncate),
    },
    FunctionSpec {
        name: "COT",
        aliases: &[],
        arity: Arity::Exactly(1),
        mapping: Mapping::Custom(cot),
    },
    FunctionSpec {
        name: "SIGN",
        aliases: &[],
        arity: Arity::Exactly(1),
        mapping: Mapping::Custom(sign),
    },
    FunctionSpec {
        name: "GREATEST",
        aliases: &[],
        arity: Arity::AtLeast(2),
        mapping: Mapping::Expression("$max"),
    },
    FunctionSpec {
        name: "LEAST",
        aliases: &[],
        arity: Arity::AtLeast(2),
        mapping: Mapping::Expression("$min"),
    },
    FunctionSpec {
        name: "RAND",
        aliases: &[],
        arity: Arity::Any,
        mapping: Mapping::Custom(rand),
    },
    FunctionSpec {
        name: "PI",
        aliases: &[],
        arity: Arity::Exactly(0),
        mapping: Mapping::Constant(std::f64::consts::PI),
    },
];

/// `[value]` or `[value, precision]` with an implicit precision of 0.
fn with_precision(op: &'static str, args: Vec<TargetExpr>) -> TargetExpr {
    let mut args = args.into_iter();
    let value = next_arg(&mut args);
    let precision = args.next().unwrap_or_else(|| TargetExpr::int(0));
    TargetExpr::op(op, vec![value, precision])
}

fn round(args: Vec<TargetExpr>) -> TargetExpr {
    with_precision("$round", args)
}

fn truncate(args: Vec<TargetExpr>) -> TargetExpr {
    with_precision("$trunc", args)
}

/// `LOG(x)` is the natural log; `LOG(b, x)` is log base `b` of `x`.
fn log(args: Vec<TargetExpr>) -> TargetExpr {
    let mut args = args.into_iter();
    let first = next_arg(&mut args);
    match args.next() {
        Some(value) => TargetExpr::op("$log", vec![value, first]),
        None => TargetExpr::op("$ln", vec![first]),
    }
}

fn log2(args: Vec<TargetExpr>) -> TargetExpr {
    let mut args = args.into_iter();
    TargetExpr::op("$log", vec![next_arg(&mut args), TargetExpr::int(2)])
}

/// `ATAN(y, x)` is MySQL's spelling of `ATAN2(y, x)`.
fn atan(args: Vec<TargetExpr>) -> TargetExpr {
    if args.len() == 2 {
        TargetExpr::op("$atan2", args)
    } else {
        TargetExpr::op("$atan", args)
    }
}

fn cot(args: Vec<TargetExpr>) -> TargetExpr {
    let x = next_arg(&mut args.into_iter());
    TargetExpr::op(
        "$divide",
        vec![
            TargetExpr::op("$cos", vec![x.clone()]),
            TargetExpr::op("$sin", vec![x]),
        ],
    )
}

fn sign(args: Vec<TargetExpr>) -> TargetExpr {
    let x = next_arg(&mut args.into_iter());
    TargetExpr::op(
        "$cond",
        vec![
            TargetExpr::op("$gt", vec![x.clone(), TargetExpr::int(0)]),
            TargetExpr::int(1),
            TargetExpr::op(
                "$cond",
                vec![
                    TargetExpr::op("$eq", vec![x, TargetExpr::int(0)]),
                    TargetExpr::int(0),
                    TargetExpr::int(-1),
                ],
            ),
        ],
    )
}

/// Seeds are not transferable; any arguments are dropped.
#[allow(clippy::needless_pass_by_value)]
fn rand(_args: Vec<TargetExpr>) -> TargetExpr {
    TargetExpr::Operator {
        op: "$rand",
        operands: Operands::Named(Vec::new()),
    }
}
