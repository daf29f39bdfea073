//! Splitting a simple SELECT into its top-level clauses.

use std::fmt;

use crate::lexer::{tokenize, Keyword, Token, TokenKind};

/// Top-level clauses of a single SELECT, in the order SQL requires them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Clause {
    From,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Limit,
}

/// A SELECT broken into clause bodies (the text after each keyword).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct SelectQuery {
    pub distinct: bool,
    pub projection: String,
    pub from: String,
    pub condition: Option<String>,
    pub group_by: Option<String>,
    pub having: Option<String>,
    pub order_by: Option<String>,
    /// Includes any `OFFSET` part.
    pub limit: Option<String>,
}

impl SelectQuery {
    /// Splits `sql`; returns `None` for anything but one plain SELECT with a
    /// FROM clause (UNIONs, misordered or repeated clauses, unbalanced parens).
    pub fn parse(sql: &str) -> Option<Self> {
        let tokens = tokenize(sql);
        if !tokens.first()?.is(Keyword::Select) {
            return None;
        }
        let mut idx = 1;
        let distinct = tokens.get(idx).is_some_and(|t| t.is(Keyword::Distinct));
        if distinct || tokens.get(idx).is_some_and(|t| t.is(Keyword::All)) {
            idx += 1;
        }
        let projection_start = tokens.get(idx)?.span.start;

        // (clause, keyword start, body start)
        let mut marks: Vec<(Clause, usize, usize)> = Vec::new();
        let mut end = sql.len();
        let mut depth = 0usize;
        let mut i = idx;
        while i < tokens.len() {
            let token = &tokens[i];
            let next = tokens.get(i + 1);
            let by_follows = next.is_some_and(|t| t.is(Keyword::By));
            let clause = match &token.kind {
                TokenKind::LeftParen => {
                    depth += 1;
                    None
                }
                TokenKind::RightParen => {
                    depth = depth.checked_sub(1)?;
                    None
                }
                _ if depth > 0 => None,
                TokenKind::Keyword(Keyword::Union) => return None,
                TokenKind::Semicolon | TokenKind::Eof => {
                    end = token.span.start;
                    break;
                }
                TokenKind::Keyword(Keyword::From) => Some((Clause::From, token.span.end)),
                TokenKind::Keyword(Keyword::Where) => Some((Clause::Where, token.span.end)),
                TokenKind::Keyword(Keyword::Group) if by_follows => {
                    i += 1;
                    Some((Clause::GroupBy, tokens[i].span.end))
                }
                TokenKind::Keyword(Keyword::Having) => Some((Clause::Having, token.span.end)),
                TokenKind::Keyword(Keyword::Order) if by_follows => {
                    i += 1;
                    Some((Clause::OrderBy, tokens[i].span.end))
                }
                TokenKind::Keyword(Keyword::Limit) => Some((Clause::Limit, token.span.end)),
                _ => None,
            };
            if let Some((clause, body_start)) = clause {
                if marks.last().is_some_and(|(last, _, _)| *last >= clause) {
                    return None;
                }
                marks.push((clause, token.span.start, body_start));
            }
            i += 1;
        }
        if depth != 0 || marks.first().map(|(c, _, _)| *c) != Some(Clause::From) {
            return None;
        }

        let mut query = Self {
            distinct,
            projection: sql[projection_start..marks[0].1].trim().to_string(),
            from: String::new(),
            condition: None,
            group_by: None,
            having: None,
            order_by: None,
            limit: None,
        };
        if query.projection.is_empty() {
            return None;
        }
        for (n, (clause, _, body_start)) in marks.iter().enumerate() {
            let body_end = marks.get(n + 1).map_or(end, |(_, start, _)| *start);
            let body = sql[*body_start..body_end].trim();
            if body.is_empty() {
                return None;
            }
            let body = Some(body.to_string());
            match clause {
                Clause::From => query.from = body.unwrap_or_default(),
                Clause::Where => query.condition = body,
                Clause::GroupBy => query.group_by = body,
                Clause::Having => query.having = body,
                Clause::OrderBy => query.order_by = body,
                Clause::Limit => query.limit = body,
            }
        }
        Some(query)
    }

    /// Returns true if any clause follows FROM.
    pub fn has_tail(&self) -> bool {
        self.condition.is_some()
            || self.group_by.is_some()
            || self.having.is_some()
            || self.order_by.is_some()
            || self.limit.is_some()
    }

    /// Returns true if the query aggregates rows.
    pub fn is_grouped(&self) -> bool {
        self.group_by.is_some() || self.having.is_some()
    }
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        write!(f, "{} FROM {}", self.projection, self.from)?;
        for (keyword, body) in [
            ("WHERE", &self.condition),
            ("GROUP BY", &self.group_by),
            ("HAVING", &self.having),
            ("ORDER BY", &self.order_by),
            ("LIMIT", &self.limit),
        ] {
            if let Some(body) = body {
                write!(f, " {keyword} {body}")?;
            }
        }
        Ok(())
    }
}

/// One item of a projection list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ProjectionItem {
    /// The item as written.
    pub text: String,
    /// The item without its alias.
    pub expr: String,
    /// Alias as written (`AS x` or implicit `x`).
    pub alias: Option<String>,
    /// Last segment of a bare column path (`t.col` gives `col`).
    pub column: Option<String>,
    /// `*` or `t.*`.
    pub wildcard: bool,
}

impl ProjectionItem {
    /// The column name this item produces in the result set.
    pub fn produces(&self) -> Option<&str> {
        self.alias.as_deref().map(unquote).or(self.column.as_deref())
    }

    /// Renders the item under a new name.
    pub fn renamed(&self, name: &str) -> String {
        format!("{} AS {name}", self.expr)
    }
}

/// Splits a projection list into items, or `None` if it is empty or
/// unbalanced.
pub(super) fn projection_items(projection: &str) -> Option<Vec<ProjectionItem>> {
    let tokens = tokenize(projection);
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LeftParen => depth += 1,
            TokenKind::RightParen => depth = depth.checked_sub(1)?,
            TokenKind::Comma | TokenKind::Eof if depth == 0 => {
                items.push(projection_item(projection, &tokens[start..i])?);
                start = i + 1;
            }
            _ => {}
        }
    }
    (depth == 0).then_some(items)
}

fn projection_item(source: &str, tokens: &[Token]) -> Option<ProjectionItem> {
    let first = tokens.first()?;
    let last = tokens.last()?;
    let text = source[first.span.start..last.span.end].to_string();

    let wildcard = matches!(last.kind, TokenKind::Star)
        && (tokens.len() == 1 || matches!(tokens[tokens.len() - 2].kind, TokenKind::Dot));
    if wildcard {
        return Some(ProjectionItem {
            expr: text.clone(),
            text,
            alias: None,
            column: None,
            wildcard: true,
        });
    }

    let mut expr_end = tokens.len();
    let mut alias = None;
    if tokens.len() >= 3 && tokens[tokens.len() - 2].is(Keyword::As) && last.name().is_some() {
        expr_end = tokens.len() - 2;
        alias = Some(last.span.slice(source).to_string());
    } else if tokens.len() >= 2 && is_alias_token(last) {
        let prev = &tokens[tokens.len() - 2];
        if matches!(
            prev.kind,
            TokenKind::RightParen
                | TokenKind::Identifier(_)
                | TokenKind::QuotedIdentifier { .. }
                | TokenKind::String(_)
                | TokenKind::Integer(_)
                | TokenKind::Float(_)
        ) {
            expr_end = tokens.len() - 1;
            alias = Some(last.span.slice(source).to_string());
        }
    }
    let expr_tokens = &tokens[..expr_end];
    let expr = source[first.span.start..expr_tokens.last()?.span.end].to_string();

    Some(ProjectionItem {
        text,
        expr,
        alias,
        column: path_column(source, expr_tokens),
        wildcard: false,
    })
}

/// An implicit alias must be an identifier, not a keyword or a literal.
fn is_alias_token(token: &Token) -> bool {
    matches!(
        token.kind,
        TokenKind::Identifier(_) | TokenKind::QuotedIdentifier { quote: '`', .. }
    )
}

/// If `tokens` spell `name(.name)*`, returns the last name.
fn path_column(source: &str, tokens: &[Token]) -> Option<String> {
    if tokens.len() % 2 == 0 {
        return None;
    }
    for (i, token) in tokens.iter().enumerate() {
        let ok = if i % 2 == 0 {
            token.name().is_some()
        } else {
            matches!(token.kind, TokenKind::Dot)
        };
        if !ok {
            return None;
        }
    }
    tokens.last()?.spelled(source).map(str::to_string)
}

fn unquote(name: &str) -> &str {
    name.strip_prefix('`')
        .and_then(|n| n.strip_suffix('`'))
        .unwrap_or(name)
}

/// Rewrites `sql` so its projection carries the given column names, as a CTE
/// column list (`WITH t(a, b) AS (...)`) requires.
pub(super) fn rename_columns(sql: &str, columns: &[String]) -> Option<String> {
    let mut query = SelectQuery::parse(sql)?;
    let items = projection_items(&query.projection)?;
    if items.len() != columns.len() || items.iter().any(|item| item.wildcard) {
        return None;
    }
    query.projection = items
        .iter()
        .zip(columns)
        .map(|(item, name)| item.renamed(name))
        .collect::<Vec<_>>()
        .join(", ");
    Some(query.to_string())
}
