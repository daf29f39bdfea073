//! Scalar function mapping.
//!
//! Every supported SQL function lives in exactly one domain registry (math,
//! string, encryption, fulltext). A registry entry names the canonical
//! function, the argument shapes it accepts and how it maps:
//!
//! - [`Mapping::Expression`]: a native operator applied to the arguments
//! - [`Mapping::Custom`]: a builder assembling an operator tree
//! - [`Mapping::Constant`]: a fixed literal (`PI()`)
//! - [`Mapping::ClientSide`]: no native equivalent, evaluated after fetch
//! - [`Mapping::RequiresPairing`]: `MATCH`, meaningful only with `AGAINST`
//!
//! Registries are built once and never mutated, so lookups need no locking.
//!
//! ```
//! use oxide_docql::functions::{FunctionArg, map_function};
//!
//! let out = map_function("ABS", &[FunctionArg::field("delta")]).unwrap();
//! assert_eq!(out.to_json(), serde_json::json!({"$abs": ["$delta"]}));
//! ```

mod call;
mod encryption;
mod fulltext;
mod math;
mod string;

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use serde_json::json;

pub use call::parse_call;

use crate::document::{ClientArg, ClientFunction, ClientSideCall, TargetExpr};
use crate::error::{Result, TranslateError};
use crate::value::Value;

/// Accepted argument counts for a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many arguments.
    Exactly(usize),
    /// Between the two bounds, inclusive.
    Range(usize, usize),
    /// At least this many arguments.
    AtLeast(usize),
    /// Any number; arguments may be ignored.
    Any,
}

impl Arity {
    /// Returns true if `count` arguments satisfy this shape.
    #[must_use]
    pub const fn accepts(&self, count: usize) -> bool {
        match *self {
            Self::Exactly(n) => count == n,
            Self::Range(lo, hi) => count >= lo && count <= hi,
            Self::AtLeast(n) => count >= n,
            Self::Any => true,
        }
    }
}

const fn plural(n: usize) -> &'static str {
    if n == 1 { "argument" } else { "arguments" }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Exactly(n) => write!(f, "requires exactly {n} {}", plural(n)),
            Self::Range(lo, hi) if hi == lo + 1 => {
                write!(f, "requires {lo} or {hi} arguments")
            }
            Self::Range(lo, hi) => write!(f, "requires between {lo} and {hi} arguments"),
            Self::AtLeast(n) => write!(f, "requires at least {n} {}", plural(n)),
            Self::Any => write!(f, "accepts any number of arguments"),
        }
    }
}

/// Builds an expression from already-resolved arguments.
///
/// Builders run only after the arity check, so they may rely on the
/// argument count their registry entry declares.
pub type BuildFn = fn(Vec<TargetExpr>) -> TargetExpr;

/// How a registry entry maps to the destination.
#[derive(Debug, Clone, Copy)]
pub enum Mapping {
    /// Native operator applied to the arguments in order.
    Expression(&'static str),
    /// Custom builder.
    Custom(BuildFn),
    /// Fixed numeric constant.
    Constant(f64),
    /// Computed by the execution layer after fetching documents.
    ClientSide(ClientFunction),
    /// Only valid as the left half of `MATCH ... AGAINST`.
    RequiresPairing,
}

/// One registry entry.
#[derive(Debug, Clone, Copy)]
pub struct FunctionSpec {
    /// Canonical name used in diagnostics.
    pub name: &'static str,
    /// Alternative spellings.
    pub aliases: &'static [&'static str],
    /// Accepted argument counts.
    pub arity: Arity,
    /// Mapping rule.
    pub mapping: Mapping,
}

/// Function domains, searched in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Math,
    String,
    Encryption,
    Fulltext,
}

impl Domain {
    /// All domains.
    pub const ALL: [Self; 4] = [Self::Math, Self::String, Self::Encryption, Self::Fulltext];

    /// Returns the registry for this domain.
    #[must_use]
    pub fn registry(self) -> &'static Registry {
        static MATH: LazyLock<Registry> = LazyLock::new(|| Registry::new(math::FUNCTIONS));
        static STRING: LazyLock<Registry> = LazyLock::new(|| Registry::new(string::FUNCTIONS));
        static ENCRYPTION: LazyLock<Registry> =
            LazyLock::new(|| Registry::new(encryption::FUNCTIONS));
        static FULLTEXT: LazyLock<Registry> =
            LazyLock::new(|| Registry::new(fulltext::FUNCTIONS));

        match self {
            Self::Math => &MATH,
            Self::String => &STRING,
            Self::Encryption => &ENCRYPTION,
            Self::Fulltext => &FULLTEXT,
        }
    }

    /// Maps a call using only this domain's registry.
    ///
    /// # Errors
    ///
    /// `UnsupportedFunction` if the name is not in this domain, `Arity` if the
    /// argument count is wrong, or any error from mapping nested calls.
    pub fn map(self, name: &str, args: &[FunctionArg]) -> Result<FunctionOutput> {
        let upper = name.to_ascii_uppercase();
        let spec = self
            .registry()
            .lookup(&upper)
            .ok_or(TranslateError::UnsupportedFunction { name: upper })?;
        map_with_spec(spec, args)
    }
}

/// Uppercased-name lookup table over a static list of entries.
#[derive(Debug)]
pub struct Registry {
    by_name: HashMap<&'static str, &'static FunctionSpec>,
}

impl Registry {
    fn new(specs: &'static [FunctionSpec]) -> Self {
        let mut by_name = HashMap::new();
        for spec in specs {
            by_name.insert(spec.name, spec);
            for alias in spec.aliases {
                by_name.insert(*alias, spec);
            }
        }
        Self { by_name }
    }

    /// Looks up an uppercased name.
    #[must_use]
    pub fn lookup(&self, upper_name: &str) -> Option<&'static FunctionSpec> {
        self.by_name.get(upper_name).copied()
    }

    /// Returns every name (canonical and alias) in the registry.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_name.keys().copied()
    }
}

/// A function call argument.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionArg {
    /// Quoted or numeric literal.
    Literal(Value),
    /// Unquoted name, treated as a field reference.
    Field(String),
    /// Nested call.
    Call(FunctionCall),
}

impl FunctionArg {
    /// Creates a literal argument.
    #[must_use]
    pub fn lit(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Creates a field-reference argument.
    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }
}

/// One scalar function invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// Function name as written.
    pub name: String,
    /// Arguments in order.
    pub args: Vec<FunctionArg>,
}

impl FunctionCall {
    /// Creates a call.
    #[must_use]
    pub fn new(name: impl Into<String>, args: Vec<FunctionArg>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Maps this call through the registries.
    ///
    /// # Errors
    ///
    /// See [`map_function`].
    pub fn map(&self) -> Result<FunctionOutput> {
        map_function(&self.name, &self.args)
    }
}

/// Result of mapping a function call.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionOutput {
    /// A destination expression.
    Expression(TargetExpr),
    /// A marker for client-side evaluation.
    ClientSide(ClientSideCall),
    /// A standalone `MATCH(...)`; the caller must pair it with `AGAINST`.
    RequiresPairing {
        /// The MATCH column list.
        columns: Vec<String>,
    },
}

impl FunctionOutput {
    /// Returns the expression, if the call mapped to one.
    #[must_use]
    pub fn into_expression(self) -> Option<TargetExpr> {
        match self {
            Self::Expression(expr) => Some(expr),
            _ => None,
        }
    }

    /// Renders the output as JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Expression(expr) => expr.to_json(),
            Self::ClientSide(call) => call.to_json(),
            Self::RequiresPairing { columns } => {
                json!({ "type": "MATCH", "requires": "AGAINST", "columns": columns })
            }
        }
    }
}

/// Finds the registry entry for `name` across all domains.
#[must_use]
pub fn lookup(name: &str) -> Option<(Domain, &'static FunctionSpec)> {
    let upper = name.to_ascii_uppercase();
    Domain::ALL
        .into_iter()
        .find_map(|domain| domain.registry().lookup(&upper).map(|spec| (domain, spec)))
}

/// Maps a function call to a destination expression or marker.
///
/// # Errors
///
/// - `UnsupportedFunction` if no registry knows the name
/// - `Arity` if the argument count violates the entry's shape
/// - `NestedClientSide` / `UnpairedMatch` for nested calls that cannot be
///   expressed inside a server-side expression
pub fn map_function(name: &str, args: &[FunctionArg]) -> Result<FunctionOutput> {
    let (_, spec) = lookup(name).ok_or_else(|| TranslateError::UnsupportedFunction {
        name: name.to_ascii_uppercase(),
    })?;
    map_with_spec(spec, args)
}

fn map_with_spec(spec: &'static FunctionSpec, args: &[FunctionArg]) -> Result<FunctionOutput> {
    if !spec.arity.accepts(args.len()) {
        return Err(TranslateError::Arity {
            name: spec.name,
            expected: spec.arity,
            got: args.len(),
        });
    }

    match spec.mapping {
        Mapping::Expression(op) => Ok(FunctionOutput::Expression(TargetExpr::op(
            op,
            server_args(spec.name, args)?,
        ))),
        Mapping::Custom(build) => Ok(FunctionOutput::Expression(build(server_args(
            spec.name, args,
        )?))),
        Mapping::Constant(value) => Ok(FunctionOutput::Expression(TargetExpr::Literal(json!(
            value
        )))),
        Mapping::ClientSide(function) => Ok(FunctionOutput::ClientSide(ClientSideCall {
            function,
            args: args.iter().map(client_arg).collect::<Result<_>>()?,
        })),
        Mapping::RequiresPairing => Ok(FunctionOutput::RequiresPairing {
            columns: args
                .iter()
                .filter_map(|arg| match arg {
                    FunctionArg::Field(name) => Some(name.clone()),
                    _ => None,
                })
                .collect(),
        }),
    }
}

fn server_args(outer: &'static str, args: &[FunctionArg]) -> Result<Vec<TargetExpr>> {
    args.iter()
        .map(|arg| match arg {
            FunctionArg::Literal(value) => Ok(TargetExpr::literal(value)),
            FunctionArg::Field(name) => Ok(TargetExpr::field(name.clone())),
            FunctionArg::Call(call) => match call.map()? {
                FunctionOutput::Expression(expr) => Ok(expr),
                FunctionOutput::ClientSide(inner) => Err(TranslateError::NestedClientSide {
                    outer,
                    inner: inner.function.as_str(),
                }),
                FunctionOutput::RequiresPairing { .. } => {
                    Err(TranslateError::UnpairedMatch { outer })
                }
            },
        })
        .collect()
}

fn client_arg(arg: &FunctionArg) -> Result<ClientArg> {
    match arg {
        FunctionArg::Literal(value) => Ok(ClientArg::Literal(value.clone())),
        FunctionArg::Field(name) => Ok(ClientArg::Field(name.clone())),
        FunctionArg::Call(call) => match call.map()? {
            FunctionOutput::Expression(expr) => Ok(ClientArg::Expression(expr)),
            FunctionOutput::ClientSide(inner) => Ok(ClientArg::Call(Box::new(inner))),
            FunctionOutput::RequiresPairing { .. } => Err(TranslateError::UnpairedMatch {
                outer: "a client-side function",
            }),
        },
    }
}

/// Takes the next resolved argument; builders only call this within their arity.
fn next_arg(args: &mut impl Iterator<Item = TargetExpr>) -> TargetExpr {
    args.next()
        .unwrap_or(TargetExpr::Literal(serde_json::Value::Null))
}
