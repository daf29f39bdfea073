//! Token-driven WHERE parser.
//!
//! Returns `None` whenever the input falls outside the shapes it knows, which
//! tells the caller to try the textual fallback instead.

use super::{CompareOp, CompoundPredicate, Connector, Predicate, PredicateNode};
use crate::fulltext;
use crate::lexer::{tokenize, Keyword, Token, TokenKind};
use crate::value::Value;

pub(super) fn parse(text: &str) -> Option<CompoundPredicate> {
    let tokens = tokenize(text);
    let mut parser = WhereParser {
        source: text,
        tokens: &tokens,
        pos: 0,
    };
    let compound = parser.parse_chain()?;
    parser.at_end().then_some(compound)
}

struct WhereParser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl WhereParser<'_> {
    fn parse_chain(&mut self) -> Option<CompoundPredicate> {
        let mut compound = CompoundPredicate::new(self.parse_term()?);
        loop {
            let connector = if self.eat_keyword(Keyword::And) {
                Connector::And
            } else if self.eat_keyword(Keyword::Or) {
                Connector::Or
            } else {
                return Some(compound);
            };
            compound.push(connector, self.parse_term()?);
        }
    }

    fn parse_term(&mut self) -> Option<PredicateNode> {
        if self.eat(&TokenKind::LeftParen) {
            let group = self.parse_chain()?;
            if !self.eat(&TokenKind::RightParen) {
                return None;
            }
            return Some(if group.len() == 1 {
                group.children[0].clone()
            } else {
                PredicateNode::Group(group)
            });
        }
        if self.current().is(Keyword::Match) {
            return self.parse_fulltext().map(PredicateNode::Fulltext);
        }
        self.parse_comparison().map(PredicateNode::Leaf)
    }

    /// `MATCH(...) AGAINST(...)`, optionally followed by a score comparison
    /// such as `> 0`, which a text filter already implies.
    fn parse_fulltext(&mut self) -> Option<fulltext::FulltextExpression> {
        let start = self.current().span.start;
        self.advance();
        self.skip_parenthesized()?;
        if !self.eat_keyword(Keyword::Against) {
            return None;
        }
        let end = self.skip_parenthesized()?;
        let expr = fulltext::parse(&self.source[start..end])?;
        if matches!(self.current().kind, TokenKind::Gt | TokenKind::GtEq)
            && matches!(
                self.peek(1).kind,
                TokenKind::Integer(_) | TokenKind::Float(_)
            )
        {
            self.pos += 2;
        }
        Some(expr)
    }

    /// Skips a balanced parenthesized group, returning the end offset of the
    /// closing parenthesis.
    fn skip_parenthesized(&mut self) -> Option<usize> {
        if !matches!(self.current().kind, TokenKind::LeftParen) {
            return None;
        }
        let mut depth = 0usize;
        loop {
            let token = self.current();
            match token.kind {
                TokenKind::LeftParen => depth += 1,
                TokenKind::RightParen => {
                    depth -= 1;
                    if depth == 0 {
                        let end = token.span.end;
                        self.advance();
                        return Some(end);
                    }
                }
                TokenKind::Eof => return None,
                _ => {}
            }
            self.advance();
        }
    }

    fn parse_comparison(&mut self) -> Option<Predicate> {
        let field = self.parse_field()?;
        let negated = self.eat_keyword(Keyword::Not);

        let token = self.current().clone();
        let (op, value) = match &token.kind {
            TokenKind::Eq if !negated => (CompareOp::Eq, self.after(1).parse_value()?),
            TokenKind::NotEq if !negated => (CompareOp::NotEq, self.after(1).parse_value()?),
            TokenKind::Lt if !negated => (CompareOp::Lt, self.after(1).parse_value()?),
            TokenKind::LtEq if !negated => (CompareOp::LtEq, self.after(1).parse_value()?),
            TokenKind::Gt if !negated => (CompareOp::Gt, self.after(1).parse_value()?),
            TokenKind::GtEq if !negated => (CompareOp::GtEq, self.after(1).parse_value()?),
            TokenKind::Keyword(Keyword::Like) => {
                let op = if negated { CompareOp::NotLike } else { CompareOp::Like };
                (op, self.after(1).parse_value()?)
            }
            TokenKind::Keyword(Keyword::Regexp | Keyword::Rlike) => {
                let op = if negated {
                    CompareOp::NotRegexp
                } else {
                    CompareOp::Regexp
                };
                (op, self.after(1).parse_value()?)
            }
            TokenKind::Identifier(word) if word.eq_ignore_ascii_case("REGEX") => {
                let op = if negated {
                    CompareOp::NotRegexp
                } else {
                    CompareOp::Regexp
                };
                (op, self.after(1).parse_value()?)
            }
            TokenKind::Keyword(Keyword::In) => {
                let op = if negated { CompareOp::NotIn } else { CompareOp::In };
                (op, self.after(1).parse_list()?)
            }
            TokenKind::Keyword(Keyword::Between) if !negated => {
                self.advance();
                let low = self.parse_value()?;
                if !self.eat_keyword(Keyword::And) {
                    return None;
                }
                let high = self.parse_value()?;
                (CompareOp::Between, Value::List(vec![low, high]))
            }
            TokenKind::Keyword(Keyword::Is) if !negated => {
                self.advance();
                let op = if self.eat_keyword(Keyword::Not) {
                    CompareOp::IsNotNull
                } else {
                    CompareOp::IsNull
                };
                if !self.eat_keyword(Keyword::Null) {
                    return None;
                }
                (op, Value::Null)
            }
            _ => return None,
        };
        Some(Predicate::new(field, op, value))
    }

    /// A possibly dotted column name. Function calls and literals on the left
    /// are not fields.
    fn parse_field(&mut self) -> Option<String> {
        let mut path = self.current().spelled(self.source)?.to_string();
        self.advance();
        while matches!(self.current().kind, TokenKind::Dot) {
            self.advance();
            path.push('.');
            path.push_str(self.current().spelled(self.source)?);
            self.advance();
        }
        if matches!(self.current().kind, TokenKind::LeftParen) {
            return None;
        }
        Some(path)
    }

    fn parse_value(&mut self) -> Option<Value> {
        let value = match &self.current().kind {
            TokenKind::Integer(i) => Value::Int(*i),
            TokenKind::Float(f) => Value::Float(*f),
            TokenKind::String(s) | TokenKind::QuotedIdentifier { value: s, quote: '"' } => {
                Value::String(s.clone())
            }
            TokenKind::Keyword(Keyword::Null) => Value::Null,
            TokenKind::Keyword(Keyword::True) => Value::Bool(true),
            TokenKind::Keyword(Keyword::False) => Value::Bool(false),
            TokenKind::Minus => match self.peek(1).kind {
                TokenKind::Integer(i) => {
                    self.advance();
                    Value::Int(-i)
                }
                TokenKind::Float(f) => {
                    self.advance();
                    Value::Float(-f)
                }
                _ => return None,
            },
            _ => return None,
        };
        self.advance();
        Some(value)
    }

    fn parse_list(&mut self) -> Option<Value> {
        if !self.eat(&TokenKind::LeftParen) {
            return None;
        }
        let mut items = vec![self.parse_value()?];
        while self.eat(&TokenKind::Comma) {
            items.push(self.parse_value()?);
        }
        self.eat(&TokenKind::RightParen).then_some(Value::List(items))
    }

    fn current(&self) -> &Token {
        self.peek(0)
    }

    fn peek(&self, offset: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + offset).min(last)]
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn after(&mut self, count: usize) -> &mut Self {
        for _ in 0..count {
            self.advance();
        }
        self
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        let found =
            core::mem::discriminant(&self.current().kind) == core::mem::discriminant(kind);
        if found {
            self.advance();
        }
        found
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        let found = self.current().is(keyword);
        if found {
            self.advance();
        }
        found
    }

    fn at_end(&self) -> bool {
        self.current().is_eof()
    }
}
