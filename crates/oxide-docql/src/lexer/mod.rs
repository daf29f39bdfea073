//! SQL Lexer/Tokenizer
//!
//! A hand-written lexer for MySQL-flavoured SQL fragments. Every token keeps
//! its byte span so callers can slice the original text back out.

mod span;
mod token;
mod tokenizer;

pub use span::Span;
pub use token::{Keyword, Token, TokenClass, TokenKind};
pub use tokenizer::Lexer;

/// Tokenizes `input` to the end, including the trailing EOF token.
#[must_use]
pub fn tokenize(input: &str) -> Vec<Token> {
    Lexer::new(input).tokenize()
}
