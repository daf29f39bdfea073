//! # oxide-docql
//!
//! Translates SQL clause fragments into the filter, sort and expression
//! documents of a document database.
//!
//! This crate provides:
//! - A CTE preprocessor rewriting `WITH ... SELECT` into plain SQL
//! - A WHERE parser with a textual fallback, and a filter translator
//! - An ORDER BY parser and sort translator
//! - Scalar function mapping over per-domain registries
//! - MATCH ... AGAINST fulltext translation
//! - A local evaluator for the emitted documents and client-side markers
//!
//! ## Translating a WHERE clause
//!
//! ```rust
//! use oxide_docql::where_clause;
//! use serde_json::json;
//!
//! let clause = where_clause::parse("status = 'active' OR score > 90");
//! let translated = where_clause::translate(&clause);
//! assert_eq!(
//!     serde_json::Value::Object(translated.filter),
//!     json!({"$or": [{"status": "active"}, {"score": {"$gt": 90}}]})
//! );
//! ```
//!
//! ## Mapping a function call
//!
//! ```rust
//! use oxide_docql::functions::parse_call;
//! use serde_json::json;
//!
//! let output = parse_call("UPPER(name)").unwrap().map().unwrap();
//! assert_eq!(output.to_json(), json!({"$toUpper": ["$name"]}));
//! ```

pub mod cte;
pub mod document;
pub mod error;
pub mod eval;
pub mod fulltext;
pub mod functions;
pub mod lexer;
pub mod order_by;
pub mod value;
pub mod where_clause;

pub use document::{ClientSideCall, Document, TargetExpr};
pub use error::{ParseError, Result, TranslateError};
pub use fulltext::{FulltextTranslator, SearchMode};
pub use functions::{map_function, FunctionArg, FunctionCall, FunctionOutput};
pub use order_by::{OrderByClause, SortTranslator};
pub use value::Value;
pub use where_clause::{TranslatedFilter, WhereClause, WhereTranslator};
