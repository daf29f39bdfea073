//! Error types for clause translation.
//!
//! Only structural input errors surface here. Best-effort stages (CTE
//! rewriting, WHERE fallback parsing, raw WHERE translation) recover locally
//! and never produce one of these.

use std::fmt;

use thiserror::Error;

use crate::functions::Arity;
use crate::lexer::{Span, TokenKind};

/// A parse error with the position it was detected at.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// The error message.
    pub message: String,
    /// The location of the error.
    pub span: Span,
    /// The actual token found.
    pub found: Option<TokenKind>,
}

impl ParseError {
    /// Creates a new parse error.
    #[must_use]
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            found: None,
        }
    }

    /// Creates an "unexpected token" error.
    #[must_use]
    pub fn unexpected(expected: &str, found: TokenKind, span: Span) -> Self {
        let message = if found == TokenKind::Eof {
            format!("Unexpected end of input: expected {expected}")
        } else {
            format!("Unexpected token: expected {expected}, found {found:?}")
        };
        Self {
            message,
            span,
            found: Some(found),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at position {}..{}",
            self.message, self.span.start, self.span.end
        )
    }
}

impl std::error::Error for ParseError {}

/// Errors that abort a single translation call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranslateError {
    /// The function name is not known to any registry.
    #[error("unsupported function: {name}")]
    UnsupportedFunction {
        /// Function name as written, uppercased.
        name: String,
    },

    /// A known function was called with the wrong number of arguments.
    #[error("{name} {expected}, got {got}")]
    Arity {
        /// Canonical function name.
        name: &'static str,
        /// The accepted argument shape.
        expected: Arity,
        /// Number of arguments supplied.
        got: usize,
    },

    /// Function call text could not be parsed.
    #[error("invalid function call: {0}")]
    InvalidCall(#[from] ParseError),

    /// A client-side function was used as an argument of a server-side one.
    #[error("{inner} must be evaluated client-side and cannot be nested inside {outer}")]
    NestedClientSide {
        /// The enclosing server-side function.
        outer: &'static str,
        /// The nested client-side function.
        inner: &'static str,
    },

    /// `MATCH(...)` appeared somewhere an `AGAINST(...)` cannot follow it.
    #[error("MATCH must be paired with AGAINST and cannot be used inside {outer}")]
    UnpairedMatch {
        /// The function the MATCH call was nested in.
        outer: &'static str,
    },

    /// An expression operator could not be evaluated locally.
    #[error("cannot evaluate {op}: {message}")]
    Eval {
        /// The operator key, including the leading `$`.
        op: &'static str,
        /// What went wrong.
        message: String,
    },

    /// A client-side marker could not be evaluated.
    #[error("client-side evaluation of {function} failed: {message}")]
    ClientEval {
        /// The function being evaluated.
        function: &'static str,
        /// What went wrong.
        message: String,
    },
}

/// Result type for translation operations.
pub type Result<T> = std::result::Result<T, TranslateError>;
