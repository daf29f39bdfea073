//! Inlining CTE references as derived tables.

use tracing::debug;

use super::select::rename_columns;
use super::CteSpec;
use crate::lexer::{tokenize, Keyword, TokenKind};

/// Replaces every table reference to one of `bindings` in `sql` with
/// `(<query>) AS <name>`.
///
/// A reference is a name directly after `FROM` or `JOIN`, or after a comma
/// inside a FROM list. An existing alias is kept instead of adding one.
/// Returns `None` if the text is unbalanced or a column list cannot be
/// applied.
pub(super) fn inline_references(sql: &str, bindings: &[CteSpec]) -> Option<String> {
    if bindings.is_empty() {
        return Some(sql.to_string());
    }
    let tokens = tokenize(sql);
    // One entry per paren depth: are we inside a FROM list?
    let mut in_from = vec![false];
    let mut out = String::with_capacity(sql.len());
    let mut copied = 0;

    for (i, token) in tokens.iter().enumerate() {
        match &token.kind {
            TokenKind::LeftParen => in_from.push(false),
            TokenKind::RightParen => {
                in_from.pop();
                if in_from.is_empty() {
                    return None;
                }
            }
            TokenKind::Keyword(Keyword::From) => *in_from.last_mut()? = true,
            TokenKind::Keyword(
                Keyword::Where
                | Keyword::Group
                | Keyword::Having
                | Keyword::Order
                | Keyword::Limit
                | Keyword::On
                | Keyword::Union
                | Keyword::Select,
            ) => *in_from.last_mut()? = false,
            _ => {}
        }

        let Some(name) = token.name() else {
            continue;
        };
        let Some(binding) = bindings
            .iter()
            .find(|binding| binding.name.eq_ignore_ascii_case(name))
        else {
            continue;
        };
        let is_table_position = i > 0
            && match &tokens[i - 1].kind {
                TokenKind::Keyword(Keyword::From | Keyword::Join) => true,
                TokenKind::Comma => *in_from.last()?,
                _ => false,
            };
        let next = tokens.get(i + 1).map(|t| &t.kind);
        if !is_table_position || matches!(next, Some(TokenKind::Dot | TokenKind::LeftParen)) {
            continue;
        }

        let query = if binding.columns.is_empty() {
            binding.query.clone()
        } else {
            rename_columns(&binding.query, &binding.columns)?
        };
        let has_alias = matches!(
            next,
            Some(
                TokenKind::Keyword(Keyword::As)
                    | TokenKind::Identifier(_)
                    | TokenKind::QuotedIdentifier { quote: '`', .. }
            )
        );
        debug!(name = %binding.name, "inlining CTE reference as derived table");
        out.push_str(&sql[copied..token.span.start]);
        out.push('(');
        out.push_str(&query);
        out.push(')');
        if !has_alias {
            out.push_str(" AS ");
            out.push_str(token.span.slice(sql));
        }
        copied = token.span.end;
    }
    if in_from.len() != 1 {
        return None;
    }
    out.push_str(&sql[copied..]);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(name: &str, query: &str) -> CteSpec {
        CteSpec {
            name: name.into(),
            columns: Vec::new(),
            query: query.into(),
            recursive: false,
        }
    }

    #[test]
    fn test_inline_join_and_subquery_references() {
        let bindings = [binding("big", "SELECT id FROM orders WHERE total > 100")];
        assert_eq!(
            inline_references(
                "SELECT c.name FROM customers c JOIN big b ON b.id = c.id",
                &bindings
            )
            .as_deref(),
            Some(
                "SELECT c.name FROM customers c JOIN (SELECT id FROM orders WHERE total > 100) b ON b.id = c.id"
            )
        );
        assert_eq!(
            inline_references("SELECT * FROM t WHERE id IN (SELECT id FROM big)", &bindings)
                .as_deref(),
            Some("SELECT * FROM t WHERE id IN (SELECT id FROM (SELECT id FROM orders WHERE total > 100) AS big)")
        );
    }

    #[test]
    fn test_comma_joins_and_columns_named_like_bindings() {
        let bindings = [binding("a", "SELECT 1 AS x FROM dual")];
        assert_eq!(
            inline_references("SELECT a.x, y.a FROM y, a WHERE y.a = 1", &bindings).as_deref(),
            Some("SELECT a.x, y.a FROM y, (SELECT 1 AS x FROM dual) AS a WHERE y.a = 1")
        );
    }

    #[test]
    fn test_column_list_applied() {
        let mut spec = binding("t", "SELECT id, name FROM users");
        spec.columns = vec!["uid".into(), "uname".into()];
        assert_eq!(
            inline_references("SELECT uid FROM t", &[spec]).as_deref(),
            Some("SELECT uid FROM (SELECT id AS uid, name AS uname FROM users) AS t")
        );
    }

    #[test]
    fn test_unbalanced() {
        assert_eq!(inline_references("SELECT * FROM t)", &[binding("t", "SELECT 1")]), None);
    }
}
