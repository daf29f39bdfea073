//! SQL Tokenizer implementation.

use super::{Keyword, Span, Token, TokenKind};

/// A lexer that tokenizes SQL input.
pub struct Lexer<'a> {
    /// The input source code.
    input: &'a str,
    /// The current byte position.
    pos: usize,
    /// The byte position of the start of the current token.
    start: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            start: 0,
        }
    }

    /// Returns the current character without advancing.
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Returns the next character without advancing.
    fn peek_next(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    /// Advances to the next character and returns it.
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Skips whitespace and comments.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.peek().is_some_and(char::is_whitespace) {
                self.advance();
            }

            // -- line comment, and MySQL's # line comment
            let line_comment = (self.peek() == Some('-') && self.peek_next() == Some('-'))
                || self.peek() == Some('#');
            if line_comment {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.advance();
                }
                continue;
            }

            if self.peek() == Some('/') && self.peek_next() == Some('*') {
                self.advance();
                self.advance();
                loop {
                    match self.advance() {
                        Some('*') if self.peek() == Some('/') => {
                            self.advance();
                            break;
                        }
                        None => break,
                        _ => {}
                    }
                }
                continue;
            }

            break;
        }
    }

    /// Creates a span from start to current position.
    fn make_span(&self) -> Span {
        Span::new(self.start, self.pos)
    }

    /// Creates a token with the current span.
    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.make_span())
    }

    /// Scans an identifier or keyword.
    fn scan_identifier(&mut self) -> Token {
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
        {
            self.advance();
        }

        let text = &self.input[self.start..self.pos];

        if let Some(keyword) = Keyword::from_str(text) {
            self.make_token(TokenKind::Keyword(keyword))
        } else {
            self.make_token(TokenKind::Identifier(String::from(text)))
        }
    }

    /// Scans a quoted word (`"text"` or `` `column` ``).
    fn scan_quoted_identifier(&mut self, quote: char) -> Token {
        self.advance(); // opening quote
        let mut value = String::new();

        loop {
            match self.peek() {
                Some(c) if c == quote => {
                    if self.peek_next() == Some(quote) {
                        value.push(quote);
                        self.advance();
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some('\\') if quote == '"' => {
                    self.advance();
                    if let Some(escaped) = self.advance() {
                        value.push(unescape(escaped));
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
                None => {
                    return self.make_token(TokenKind::Error(format!(
                        "Unterminated quoted identifier starting with {quote}"
                    )));
                }
            }
        }

        self.advance(); // closing quote
        self.make_token(TokenKind::QuotedIdentifier { value, quote })
    }

    /// Scans a number (integer or float).
    fn scan_number(&mut self) -> Token {
        let mut is_float = false;

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        if self.peek().is_some_and(|c| c == 'e' || c == 'E')
            && self
                .peek_next()
                .is_some_and(|c| c.is_ascii_digit() || c == '+' || c == '-')
        {
            is_float = true;
            self.advance();
            if self.peek().is_some_and(|c| c == '+' || c == '-') {
                self.advance();
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text = &self.input[self.start..self.pos];

        if is_float {
            match text.parse::<f64>() {
                Ok(f) => self.make_token(TokenKind::Float(f)),
                Err(e) => self.make_token(TokenKind::Error(format!("Invalid float: {e}"))),
            }
        } else {
            match text.parse::<i64>() {
                Ok(i) => self.make_token(TokenKind::Integer(i)),
                Err(e) => self.make_token(TokenKind::Error(format!("Invalid integer: {e}"))),
            }
        }
    }

    /// Scans a single-quoted string literal, honouring `''` and backslash escapes.
    fn scan_string(&mut self) -> Token {
        self.advance(); // opening quote
        let mut value = String::new();

        loop {
            match self.peek() {
                Some('\'') => {
                    if self.peek_next() == Some('\'') {
                        value.push('\'');
                        self.advance();
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some('\\') => {
                    self.advance();
                    match self.advance() {
                        // MySQL keeps \% and \_ intact so LIKE can see the escape.
                        Some(escaped @ ('%' | '_')) => {
                            value.push('\\');
                            value.push(escaped);
                        }
                        Some(escaped) => value.push(unescape(escaped)),
                        None => {}
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
                None => {
                    return self.make_token(TokenKind::Error(String::from(
                        "Unterminated string literal",
                    )));
                }
            }
        }

        self.advance(); // closing quote
        self.make_token(TokenKind::String(value))
    }

    /// Scans the next token.
    #[must_use]
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        self.start = self.pos;

        let Some(c) = self.advance() else {
            return self.make_token(TokenKind::Eof);
        };

        match c {
            '(' => self.make_token(TokenKind::LeftParen),
            ')' => self.make_token(TokenKind::RightParen),
            ',' => self.make_token(TokenKind::Comma),
            ';' => self.make_token(TokenKind::Semicolon),
            '+' => self.make_token(TokenKind::Plus),
            '-' => self.make_token(TokenKind::Minus),
            '*' => self.make_token(TokenKind::Star),
            '/' => self.make_token(TokenKind::Slash),
            '%' => self.make_token(TokenKind::Percent),
            '?' => self.make_token(TokenKind::Question),
            '@' => self.make_token(TokenKind::At),
            '.' => self.make_token(TokenKind::Dot),
            '=' => self.make_token(TokenKind::Eq),
            '<' => match self.peek() {
                Some('=') => {
                    self.advance();
                    self.make_token(TokenKind::LtEq)
                }
                Some('>') => {
                    self.advance();
                    self.make_token(TokenKind::NotEq)
                }
                _ => self.make_token(TokenKind::Lt),
            },
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.make_token(TokenKind::GtEq)
                } else {
                    self.make_token(TokenKind::Gt)
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    self.make_token(TokenKind::NotEq)
                } else {
                    self.make_token(TokenKind::Error(String::from("Unexpected character: !")))
                }
            }
            '|' if self.peek() == Some('|') => {
                self.advance();
                self.make_token(TokenKind::Concat)
            }
            '\'' => {
                self.pos = self.start;
                self.scan_string()
            }
            '"' | '`' => {
                self.pos = self.start;
                self.scan_quoted_identifier(c)
            }
            c if c.is_ascii_digit() => {
                self.pos = self.start;
                self.scan_number()
            }
            c if c.is_alphabetic() || c == '_' => {
                self.pos = self.start;
                self.scan_identifier()
            }
            _ => self.make_token(TokenKind::Error(format!("Unexpected character: {c}"))),
        }
    }

    /// Tokenizes the entire input and returns all tokens.
    #[must_use]
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.is_eof();
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }
}

/// Maps the character after a backslash to the character it stands for.
const fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
    }
}
