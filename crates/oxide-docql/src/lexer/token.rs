//! Token types for the SQL lexer.

use super::Span;

/// SQL keywords recognized by the clause translators.
///
/// Only words that steer clause parsing are keywords; everything else lexes
/// as an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    // Query structure
    Select,
    From,
    Where,
    Order,
    By,
    Group,
    Having,
    Limit,
    Offset,
    Distinct,
    All,
    Union,

    // Joins
    Join,
    Inner,
    Left,
    Right,
    Outer,
    Cross,
    On,

    // Predicates
    And,
    Or,
    Not,
    In,
    Between,
    Like,
    Regexp,
    Rlike,
    Is,
    Null,
    True,
    False,
    Exists,

    // Ordering
    Asc,
    Desc,

    // Common table expressions
    As,
    With,
    Recursive,

    // Fulltext search
    Match,
    Against,
    Boolean,
    Mode,
    Natural,
    Language,
    Query,
    Expansion,
}

impl Keyword {
    /// Attempts to parse a keyword from a string (case-insensitive).
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SELECT" => Some(Self::Select),
            "FROM" => Some(Self::From),
            "WHERE" => Some(Self::Where),
            "ORDER" => Some(Self::Order),
            "BY" => Some(Self::By),
            "GROUP" => Some(Self::Group),
            "HAVING" => Some(Self::Having),
            "LIMIT" => Some(Self::Limit),
            "OFFSET" => Some(Self::Offset),
            "DISTINCT" => Some(Self::Distinct),
            "ALL" => Some(Self::All),
            "UNION" => Some(Self::Union),
            "JOIN" => Some(Self::Join),
            "INNER" => Some(Self::Inner),
            "LEFT" => Some(Self::Left),
            "RIGHT" => Some(Self::Right),
            "OUTER" => Some(Self::Outer),
            "CROSS" => Some(Self::Cross),
            "ON" => Some(Self::On),
            "AND" => Some(Self::And),
            "OR" => Some(Self::Or),
            "NOT" => Some(Self::Not),
            "IN" => Some(Self::In),
            "BETWEEN" => Some(Self::Between),
            "LIKE" => Some(Self::Like),
            "REGEXP" => Some(Self::Regexp),
            "RLIKE" => Some(Self::Rlike),
            "IS" => Some(Self::Is),
            "NULL" => Some(Self::Null),
            "TRUE" => Some(Self::True),
            "FALSE" => Some(Self::False),
            "EXISTS" => Some(Self::Exists),
            "ASC" => Some(Self::Asc),
            "DESC" => Some(Self::Desc),
            "AS" => Some(Self::As),
            "WITH" => Some(Self::With),
            "RECURSIVE" => Some(Self::Recursive),
            "MATCH" => Some(Self::Match),
            "AGAINST" => Some(Self::Against),
            "BOOLEAN" => Some(Self::Boolean),
            "MODE" => Some(Self::Mode),
            "NATURAL" => Some(Self::Natural),
            "LANGUAGE" => Some(Self::Language),
            "QUERY" => Some(Self::Query),
            "EXPANSION" => Some(Self::Expansion),
            _ => None,
        }
    }

    /// Returns the keyword as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::From => "FROM",
            Self::Where => "WHERE",
            Self::Order => "ORDER",
            Self::By => "BY",
            Self::Group => "GROUP",
            Self::Having => "HAVING",
            Self::Limit => "LIMIT",
            Self::Offset => "OFFSET",
            Self::Distinct => "DISTINCT",
            Self::All => "ALL",
            Self::Union => "UNION",
            Self::Join => "JOIN",
            Self::Inner => "INNER",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Outer => "OUTER",
            Self::Cross => "CROSS",
            Self::On => "ON",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::In => "IN",
            Self::Between => "BETWEEN",
            Self::Like => "LIKE",
            Self::Regexp => "REGEXP",
            Self::Rlike => "RLIKE",
            Self::Is => "IS",
            Self::Null => "NULL",
            Self::True => "TRUE",
            Self::False => "FALSE",
            Self::Exists => "EXISTS",
            Self::Asc => "ASC",
            Self::Desc => "DESC",
            Self::As => "AS",
            Self::With => "WITH",
            Self::Recursive => "RECURSIVE",
            Self::Match => "MATCH",
            Self::Against => "AGAINST",
            Self::Boolean => "BOOLEAN",
            Self::Mode => "MODE",
            Self::Natural => "NATURAL",
            Self::Language => "LANGUAGE",
            Self::Query => "QUERY",
            Self::Expansion => "EXPANSION",
        }
    }

    /// Returns true for keywords that are never valid as a bare column name.
    ///
    /// Words like `MODE` or `QUERY` only matter inside `AGAINST (...)` and are
    /// perfectly ordinary field names elsewhere.
    #[must_use]
    pub const fn is_reserved(&self) -> bool {
        !matches!(
            self,
            Self::Left
                | Self::Right
                | Self::Boolean
                | Self::Mode
                | Self::Natural
                | Self::Language
                | Self::Query
                | Self::Expansion
                | Self::Against
        )
    }
}

/// The kind of token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    /// Integer literal (e.g., 42)
    Integer(i64),
    /// Float literal (e.g., 3.14)
    Float(f64),
    /// Single-quoted string literal (e.g., 'hello')
    String(String),

    // Identifiers and keywords
    /// Bare identifier (e.g., column_name)
    Identifier(String),
    /// Double-quoted or backtick-quoted word.
    QuotedIdentifier {
        /// Unescaped content between the quotes.
        value: String,
        /// The quote character used.
        quote: char,
    },
    /// SQL keyword
    Keyword(Keyword),

    // Operators
    /// +
    Plus,
    /// -
    Minus,
    /// *
    Star,
    /// /
    Slash,
    /// %
    Percent,
    /// ||
    Concat,
    /// =
    Eq,
    /// != or <>
    NotEq,
    /// <
    Lt,
    /// <=
    LtEq,
    /// >
    Gt,
    /// >=
    GtEq,

    // Delimiters
    /// (
    LeftParen,
    /// )
    RightParen,
    /// ,
    Comma,
    /// ;
    Semicolon,
    /// .
    Dot,
    /// ?
    Question,
    /// @
    At,

    // Special
    /// End of input
    Eof,
    /// Invalid/unknown token
    Error(String),
}

/// Coarse classification of a token, independent of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Keyword,
    Name,
    StringLiteral,
    NumberLiteral,
    Punctuation,
    Comparison,
    Operator,
    End,
    Invalid,
}

/// A token with its span in the source code.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token.
    pub kind: TokenKind,
    /// The location in the source code.
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Returns true if this is an EOF token.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    /// Returns true if this is a keyword.
    #[must_use]
    pub const fn is_keyword(&self) -> bool {
        matches!(self.kind, TokenKind::Keyword(_))
    }

    /// Returns the keyword if this is a keyword token.
    #[must_use]
    pub const fn as_keyword(&self) -> Option<Keyword> {
        match &self.kind {
            TokenKind::Keyword(kw) => Some(*kw),
            _ => None,
        }
    }

    /// Returns true if this token is the given keyword.
    #[must_use]
    pub fn is(&self, keyword: Keyword) -> bool {
        self.as_keyword() == Some(keyword)
    }

    /// Returns the token's classification.
    #[must_use]
    pub const fn class(&self) -> TokenClass {
        match &self.kind {
            TokenKind::Keyword(_) => TokenClass::Keyword,
            TokenKind::Identifier(_) | TokenKind::QuotedIdentifier { quote: '`', .. } => {
                TokenClass::Name
            }
            TokenKind::String(_) | TokenKind::QuotedIdentifier { .. } => TokenClass::StringLiteral,
            TokenKind::Integer(_) | TokenKind::Float(_) => TokenClass::NumberLiteral,
            TokenKind::Eq
            | TokenKind::NotEq
            | TokenKind::Lt
            | TokenKind::LtEq
            | TokenKind::Gt
            | TokenKind::GtEq => TokenClass::Comparison,
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Percent
            | TokenKind::Concat => TokenClass::Operator,
            TokenKind::LeftParen
            | TokenKind::RightParen
            | TokenKind::Comma
            | TokenKind::Semicolon
            | TokenKind::Dot
            | TokenKind::Question
            | TokenKind::At => TokenClass::Punctuation,
            TokenKind::Eof => TokenClass::End,
            TokenKind::Error(_) => TokenClass::Invalid,
        }
    }

    /// Returns the name this token spells when used as a column or function name.
    ///
    /// Bare identifiers, backtick-quoted identifiers and non-reserved keywords
    /// qualify; double-quoted words are string literals in MySQL and do not.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Identifier(name) => Some(name),
            TokenKind::QuotedIdentifier { value, quote: '`' } => Some(value),
            TokenKind::Keyword(kw) if !kw.is_reserved() => Some(kw.as_str()),
            _ => None,
        }
    }

    /// Like [`name`](Self::name), but keeps a non-reserved keyword as it was
    /// written in `source`, so a column called `mode` stays lowercase.
    #[must_use]
    pub fn spelled<'a>(&'a self, source: &'a str) -> Option<&'a str> {
        match &self.kind {
            TokenKind::Keyword(_) => self.name().map(|_| self.span.slice(source)),
            _ => self.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_from_str() {
        assert_eq!(Keyword::from_str("SELECT"), Some(Keyword::Select));
        assert_eq!(Keyword::from_str("rlike"), Some(Keyword::Rlike));
        assert_eq!(Keyword::from_str("AgAiNsT"), Some(Keyword::Against));
        assert_eq!(Keyword::from_str("not_a_keyword"), None);
    }

    #[test]
    fn test_keyword_as_str() {
        assert_eq!(Keyword::Regexp.as_str(), "REGEXP");
        assert_eq!(Keyword::Recursive.as_str(), "RECURSIVE");
    }

    #[test]
    fn test_soft_keywords_are_names() {
        let mode = Token::new(TokenKind::Keyword(Keyword::Mode), Span::new(0, 4));
        let and = Token::new(TokenKind::Keyword(Keyword::And), Span::new(0, 3));
        assert_eq!(mode.name(), Some("MODE"));
        assert_eq!(mode.spelled("mode = 1"), Some("mode"));
        assert_eq!(and.name(), None);
        assert_eq!(and.spelled("and"), None);
    }

    #[test]
    fn test_token_class() {
        let quoted = Token::new(
            TokenKind::QuotedIdentifier {
                value: String::from("x"),
                quote: '"',
            },
            Span::new(0, 3),
        );
        let ticked = Token::new(
            TokenKind::QuotedIdentifier {
                value: String::from("x"),
                quote: '`',
            },
            Span::new(0, 3),
        );
        assert_eq!(quoted.class(), TokenClass::StringLiteral);
        assert_eq!(ticked.class(), TokenClass::Name);
        assert_eq!(
            Token::new(TokenKind::GtEq, Span::new(0, 2)).class(),
            TokenClass::Comparison
        );
    }
}
