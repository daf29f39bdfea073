//! Common Table Expression preprocessing.
//!
//! `WITH name AS (query) SELECT ...` is rewritten into plain SQL so the
//! downstream SELECT compiler never sees a CTE. The rewrite is textual and
//! deliberately narrow:
//!
//! - a main query of the form `SELECT ... FROM <name> [tail]` is folded into
//!   the binding's defining query;
//! - any other reference is inlined as a derived table `(<query>) AS <name>`;
//! - bindings may reference earlier ones and are resolved in order;
//! - bindings the main query never mentions are dropped;
//! - a recursive binding is reduced to its non-recursive base case.
//!
//! Anything outside these shapes leaves the query untouched.
//!
//! ```
//! use oxide_docql::cte;
//!
//! let sql = "WITH t AS (SELECT name FROM customers WHERE id=1) SELECT * FROM t ORDER BY name";
//! assert!(cte::needs_preprocessing(sql));
//! assert_eq!(
//!     cte::preprocess(sql),
//!     "SELECT name FROM customers WHERE id=1 ORDER BY name"
//! );
//! ```

mod inline;
mod merge;
mod select;

use tracing::{debug, warn};

use crate::lexer::{tokenize, Keyword, TokenKind};
use inline::inline_references;
use merge::{merge, Merge};

/// One `name [(columns)] AS (query)` binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CteSpec {
    /// The binding name.
    pub name: String,
    /// Optional column list renaming the query's output columns.
    pub columns: Vec<String>,
    /// The defining query, without the surrounding parentheses.
    pub query: String,
    /// True if the binding was declared under `WITH RECURSIVE` and refers to
    /// itself.
    pub recursive: bool,
}

/// A split `WITH` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithQuery {
    /// True if the query starts with `WITH RECURSIVE`.
    pub recursive: bool,
    /// Bindings in declaration order.
    pub bindings: Vec<CteSpec>,
    /// The query following the last binding.
    pub main: String,
}

/// Returns true if `sql` contains the `WITH` keyword anywhere.
#[must_use]
pub fn needs_preprocessing(sql: &str) -> bool {
    tokenize(sql).iter().any(|token| token.is(Keyword::With))
}

/// Rewrites a CTE query into plain SQL.
///
/// Queries without `WITH` and queries the rewrite cannot handle are returned
/// unchanged.
#[must_use]
pub fn preprocess(sql: &str) -> String {
    if !needs_preprocessing(sql) {
        return sql.to_string();
    }
    let Some(query) = parse_with(sql) else {
        debug!("WITH clause not recognized, leaving query unchanged");
        return sql.to_string();
    };
    match rewrite(&query) {
        Some(rewritten) => {
            debug!(bindings = query.bindings.len(), "CTE query rewritten");
            rewritten
        }
        None => {
            debug!("CTE rewrite abandoned, leaving query unchanged");
            sql.to_string()
        }
    }
}

/// Splits a `WITH` query into its bindings and main query.
///
/// Returns `None` if `sql` does not start with `WITH`, a binding lacks `AS`
/// or a parenthesized query, parentheses are unbalanced, or no SELECT follows.
#[must_use]
pub fn parse_with(sql: &str) -> Option<WithQuery> {
    let tokens = tokenize(sql);
    if !tokens.first()?.is(Keyword::With) {
        return None;
    }
    let mut i = 1;
    let recursive = tokens.get(i)?.is(Keyword::Recursive);
    if recursive {
        i += 1;
    }

    let mut bindings = Vec::new();
    loop {
        let name = tokens.get(i)?.spelled(sql)?.to_string();
        i += 1;

        let mut columns = Vec::new();
        if matches!(tokens.get(i)?.kind, TokenKind::LeftParen) {
            i += 1;
            loop {
                columns.push(tokens.get(i)?.spelled(sql)?.to_string());
                i += 1;
                match tokens.get(i)?.kind {
                    TokenKind::Comma => i += 1,
                    TokenKind::RightParen => {
                        i += 1;
                        break;
                    }
                    _ => return None,
                }
            }
        }

        if !tokens.get(i)?.is(Keyword::As) {
            return None;
        }
        i += 1;
        let open = tokens.get(i)?;
        if !matches!(open.kind, TokenKind::LeftParen) {
            return None;
        }
        let mut depth = 0usize;
        let close = tokens[i..].iter().position(|token| {
            match token.kind {
                TokenKind::LeftParen => depth += 1,
                TokenKind::RightParen => depth -= 1,
                _ => {}
            }
            depth == 0
        })? + i;
        let query = sql[open.span.end..tokens[close].span.start].trim();
        if query.is_empty() {
            return None;
        }
        bindings.push(CteSpec {
            recursive: recursive && references(query, &name),
            name,
            columns,
            query: query.to_string(),
        });
        i = close + 1;

        if matches!(tokens.get(i)?.kind, TokenKind::Comma) {
            i += 1;
        } else {
            break;
        }
    }

    let start = tokens.get(i)?;
    if !(start.is(Keyword::Select) || matches!(start.kind, TokenKind::LeftParen)) {
        return None;
    }
    let main = sql[start.span.start..].trim().trim_end_matches(';').trim_end();
    Some(WithQuery {
        recursive,
        bindings,
        main: main.to_string(),
    })
}

fn rewrite(query: &WithQuery) -> Option<String> {
    let mut resolved: Vec<CteSpec> = Vec::with_capacity(query.bindings.len());
    for binding in &query.bindings {
        let mut defining = binding.query.clone();
        if binding.recursive {
            defining = base_case(&defining, &binding.name)?;
            warn!(name = %binding.name, "recursive CTE reduced to its base case");
        }
        let defining = inline_references(&defining, &resolved)?;
        resolved.push(CteSpec {
            name: binding.name.clone(),
            columns: binding.columns.clone(),
            query: defining,
            recursive: false,
        });
    }

    let (used, unused): (Vec<CteSpec>, Vec<CteSpec>) = resolved
        .into_iter()
        .partition(|binding| references(&query.main, &binding.name));
    for binding in &unused {
        warn!(name = %binding.name, "dropping CTE not referenced by the main query");
    }

    if let [binding] = used.as_slice() {
        match merge(&query.main, binding) {
            Merge::Done(sql) => return Some(sql),
            Merge::Abandon => return None,
            Merge::Inline => {}
        }
    }
    inline_references(&query.main, &used)
}

/// Returns true if any name token in `text` is `name`.
fn references(text: &str, name: &str) -> bool {
    tokenize(text)
        .iter()
        .any(|token| token.name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
}

/// The anchor part of `anchor UNION [ALL] recursive-part`, or `None` if there
/// is no top-level UNION or the anchor itself refers to `name`.
fn base_case(query: &str, name: &str) -> Option<String> {
    let tokens = tokenize(query);
    let mut depth = 0usize;
    let union = tokens.iter().find(|token| {
        match token.kind {
            TokenKind::LeftParen => depth += 1,
            TokenKind::RightParen => depth = depth.saturating_sub(1),
            _ => {}
        }
        depth == 0 && token.is(Keyword::Union)
    })?;
    let anchor = query[..union.span.start].trim();
    if anchor.is_empty() || references(anchor, name) {
        return None;
    }
    Some(anchor.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_preprocessing() {
        assert!(needs_preprocessing("with t as (select 1) select * from t"));
        assert!(!needs_preprocessing("SELECT 'WITH' FROM t"));
        assert!(!needs_preprocessing("SELECT * FROM t"));
    }

    #[test]
    fn test_single_binding() {
        assert_eq!(
            preprocess("WITH t AS (SELECT name FROM customers WHERE id=1) SELECT * FROM t"),
            "SELECT name FROM customers WHERE id=1"
        );
        assert_eq!(
            preprocess(
                "WITH t AS (SELECT name FROM customers WHERE id=1) SELECT * FROM t ORDER BY name;"
            ),
            "SELECT name FROM customers WHERE id=1 ORDER BY name"
        );
    }

    #[test]
    fn test_parse_with() {
        let query = parse_with(
            "WITH RECURSIVE a(x, y) AS (SELECT 1, 2 FROM dual), b AS ((SELECT x FROM a)) SELECT * FROM b;",
        )
        .unwrap();
        assert!(query.recursive);
        assert_eq!(query.bindings.len(), 2);
        assert_eq!(query.bindings[0].columns, vec!["x", "y"]);
        assert!(!query.bindings[0].recursive);
        assert_eq!(query.bindings[1].query, "(SELECT x FROM a)");
        assert_eq!(query.main, "SELECT * FROM b");
    }

    #[test]
    fn test_chained_bindings() {
        let sql = "WITH a AS (SELECT id, total FROM orders WHERE total > 100), \
                   b AS (SELECT id FROM a WHERE id > 5) SELECT * FROM b";
        assert_eq!(
            preprocess(sql),
            "SELECT id FROM (SELECT id, total FROM orders WHERE total > 100) AS a WHERE id > 5"
        );
    }

    #[test]
    fn test_two_referenced_bindings_are_inlined() {
        let sql = "WITH a AS (SELECT id FROM x), b AS (SELECT id FROM y) \
                   SELECT a.id FROM a JOIN b ON a.id = b.id";
        assert_eq!(
            preprocess(sql),
            "SELECT a.id FROM (SELECT id FROM x) AS a JOIN (SELECT id FROM y) AS b ON a.id = b.id"
        );
    }

    #[test]
    fn test_unreferenced_binding_dropped() {
        let sql = "WITH a AS (SELECT 1 AS x FROM dual), unused AS (SELECT 2 FROM dual) SELECT x FROM a";
        assert_eq!(preprocess(sql), "SELECT 1 AS x FROM dual");
    }

    #[test]
    fn test_recursive_reduced_to_base_case() {
        let sql = "WITH RECURSIVE tree AS (\
                   SELECT id, parent FROM nodes WHERE parent IS NULL \
                   UNION ALL SELECT n.id, n.parent FROM nodes n JOIN tree t ON n.parent = t.id) \
                   SELECT * FROM tree";
        assert_eq!(preprocess(sql), "SELECT id, parent FROM nodes WHERE parent IS NULL");

        let no_union = "WITH RECURSIVE r AS (SELECT id FROM r) SELECT * FROM r";
        assert_eq!(preprocess(no_union), no_union);
    }

    #[test]
    fn test_column_list() {
        assert_eq!(
            preprocess("WITH t(uid, uname) AS (SELECT id, name FROM users) SELECT * FROM t"),
            "SELECT id AS uid, name AS uname FROM users"
        );
    }

    #[test]
    fn test_failures_return_original() {
        for sql in [
            "WITH t AS SELECT 1 SELECT * FROM t",
            "WITH t AS (SELECT a FROM x SELECT * FROM t",
            "WITH t AS () SELECT * FROM t",
            "WITH t AS (SELECT a FROM x) DELETE FROM t",
            "WITH t AS (SELECT city, COUNT(*) AS n FROM c GROUP BY city) SELECT * FROM t WHERE n > 1",
            "SELECT * FROM docs WHERE MATCH(body) AGAINST('x' WITH QUERY EXPANSION)",
        ] {
            assert_eq!(preprocess(sql), sql);
        }
    }

    #[test]
    fn test_idempotent_on_rewritten_query() {
        let once = preprocess("WITH t AS (SELECT name FROM customers WHERE id=1) SELECT * FROM t");
        assert_eq!(preprocess(&once), once);
    }
}
