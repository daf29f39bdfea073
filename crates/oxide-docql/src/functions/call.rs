//! Parsing SQL call text such as `ROUND(price, 2)` into a [`FunctionCall`].
//!
//! Only the argument forms the registries understand are accepted: literals
//! (optionally negated numbers), `TRUE`/`FALSE`/`NULL`, field references
//! (dotted, backtick-quoted) and nested calls.

use super::{FunctionArg, FunctionCall};
use crate::error::ParseError;
use crate::lexer::{Keyword, Lexer, Span, Token, TokenKind};
use crate::value::Value;

/// Parses a complete function call.
///
/// `POSITION(sub IN str)` is accepted; `IN` separates arguments like a comma.
///
/// # Errors
///
/// Returns a `ParseError` if the text is not a single call, or if anything
/// follows the closing parenthesis.
///
/// ```
/// use oxide_docql::functions::{parse_call, FunctionArg};
///
/// let call = parse_call("UPPER(users.name)").unwrap();
/// assert_eq!(call.name, "UPPER");
/// assert_eq!(call.args, vec![FunctionArg::field("users.name")]);
/// ```
pub fn parse_call(text: &str) -> Result<FunctionCall, ParseError> {
    let mut parser = CallParser::new(text);
    let name = parser.expect_function_name()?;
    let call = parser.parse_call_tail(name)?;
    if !parser.current.is_eof() && !matches!(parser.current.kind, TokenKind::Semicolon) {
        return Err(ParseError::unexpected(
            "end of input",
            parser.current.kind.clone(),
            parser.current.span,
        ));
    }
    Ok(call)
}

struct CallParser<'a> {
    input: &'a str,
    lexer: Lexer<'a>,
    current: Token,
    previous: Token,
}

impl<'a> CallParser<'a> {
    fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        Self {
            input,
            lexer,
            current,
            previous: Token::new(TokenKind::Eof, Span::new(0, 0)),
        }
    }

    /// Parses `( args )` after the function name has been consumed.
    fn parse_call_tail(&mut self, name: String) -> Result<FunctionCall, ParseError> {
        self.expect(&TokenKind::LeftParen, "'('")?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                args.push(self.parse_argument()?);
                if self.check(&TokenKind::Comma) || self.check_keyword(Keyword::In) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen, "')'")?;
        Ok(FunctionCall::new(name, args))
    }

    fn parse_argument(&mut self) -> Result<FunctionArg, ParseError> {
        match self.current.kind.clone() {
            TokenKind::Integer(i) => {
                self.advance();
                Ok(FunctionArg::lit(i))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(FunctionArg::lit(f))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(FunctionArg::lit(s))
            }
            TokenKind::QuotedIdentifier { value, quote: '"' } => {
                self.advance();
                Ok(FunctionArg::lit(value))
            }
            TokenKind::Minus => {
                self.advance();
                match self.current.kind {
                    TokenKind::Integer(i) => {
                        self.advance();
                        Ok(FunctionArg::lit(-i))
                    }
                    TokenKind::Float(f) => {
                        self.advance();
                        Ok(FunctionArg::lit(-f))
                    }
                    _ => Err(ParseError::unexpected(
                        "number",
                        self.current.kind.clone(),
                        self.current.span,
                    )),
                }
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(FunctionArg::Literal(Value::Null))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(FunctionArg::lit(true))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(FunctionArg::lit(false))
            }
            _ => {
                let name = self.expect_function_name()?;
                if self.check(&TokenKind::LeftParen) {
                    return Ok(FunctionArg::Call(self.parse_call_tail(name)?));
                }
                let mut path = if self.previous.is_keyword() {
                    self.previous.span.slice(self.input).to_string()
                } else {
                    name
                };
                while self.check(&TokenKind::Dot) {
                    self.advance();
                    path.push('.');
                    path.push_str(&self.expect_name()?);
                }
                Ok(FunctionArg::Field(path))
            }
        }
    }

    /// Function names may be identifiers or any keyword (`LEFT`, `MATCH`, ...).
    fn expect_function_name(&mut self) -> Result<String, ParseError> {
        let name = match &self.current.kind {
            TokenKind::Identifier(name) => name.clone(),
            TokenKind::QuotedIdentifier { value, quote: '`' } => value.clone(),
            TokenKind::Keyword(kw) => kw.as_str().to_string(),
            _ => {
                return Err(ParseError::unexpected(
                    "function name or column",
                    self.current.kind.clone(),
                    self.current.span,
                ))
            }
        };
        self.advance();
        Ok(name)
    }

    fn expect_name(&mut self) -> Result<String, ParseError> {
        if let Some(name) = self.current.spelled(self.input) {
            let name = name.to_string();
            self.advance();
            Ok(name)
        } else {
            Err(ParseError::unexpected(
                "column name",
                self.current.kind.clone(),
                self.current.span,
            ))
        }
    }

    fn advance(&mut self) {
        self.previous = core::mem::replace(&mut self.current, self.lexer.next_token());
    }

    fn check(&self, kind: &TokenKind) -> bool {
        core::mem::discriminant(&self.current.kind) == core::mem::discriminant(kind)
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.current.is(keyword)
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::unexpected(
                expected,
                self.current.kind.clone(),
                self.current.span,
            ))
        }
    }
}
