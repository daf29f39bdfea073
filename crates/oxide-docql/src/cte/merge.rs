//! Folding `SELECT ... FROM <cte> [tail]` into the CTE's defining query.

use tracing::debug;

use super::select::{projection_items, rename_columns, ProjectionItem, SelectQuery};
use super::CteSpec;
use crate::lexer::{tokenize, Keyword, Token, TokenKind};

/// Outcome of trying to merge the main query into one binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Merge {
    /// The merged query.
    Done(String),
    /// The shapes do not combine; inline the binding as a derived table.
    Inline,
    /// The rewrite would change the query's meaning; keep the original.
    Abandon,
}

pub(super) fn merge(main: &str, binding: &CteSpec) -> Merge {
    let Some(outer) = SelectQuery::parse(main) else {
        return Merge::Inline;
    };
    if !selects_only_from(&outer.from, &binding.name) {
        return Merge::Inline;
    }

    if outer.projection == "*" && !outer.distinct && !outer.has_tail() {
        return if binding.columns.is_empty() {
            Merge::Done(binding.query.clone())
        } else {
            rename_columns(&binding.query, &binding.columns).map_or(Merge::Abandon, Merge::Done)
        };
    }

    let Some(inner) = SelectQuery::parse(&binding.query) else {
        return Merge::Inline;
    };
    let Some(mut items) = projection_items(&inner.projection) else {
        return Merge::Inline;
    };
    if !binding.columns.is_empty() {
        if items.len() != binding.columns.len() || items.iter().any(|item| item.wildcard) {
            return Merge::Abandon;
        }
        for (item, name) in items.iter_mut().zip(&binding.columns) {
            item.text = item.renamed(name);
            item.alias = Some(name.clone());
        }
    }

    if outer.condition.is_some() && inner.is_grouped() {
        debug!(name = %binding.name, "outer WHERE cannot be pushed below GROUP BY");
        return Merge::Abandon;
    }
    if inner.limit.is_some()
        && (outer.has_tail() || outer.distinct || !passes_through(&outer.projection))
        || outer.is_grouped() && inner.is_grouped()
        || inner.distinct && outer.projection != "*"
    {
        return Merge::Inline;
    }

    let computed: Vec<&str> = items
        .iter()
        .filter(|item| item.column.is_none() || item.alias.is_some())
        .filter_map(ProjectionItem::produces)
        .collect();
    if outer
        .condition
        .as_deref()
        .is_some_and(|condition| mentions_any(condition, &computed))
    {
        return Merge::Inline;
    }

    let (projection, visible) = if outer.projection == "*" {
        let rendered: Vec<&str> = items.iter().map(|item| item.text.as_str()).collect();
        (rendered.join(", "), produced(&items))
    } else {
        let Some(outer_items) = projection_items(&outer.projection) else {
            return Merge::Inline;
        };
        let mut rendered = Vec::with_capacity(outer_items.len());
        for item in &outer_items {
            match reuse(item, &items, &binding.name) {
                Some(text) => rendered.push(text),
                None if inner.is_grouped() || mentions_any(&item.expr, &computed) => {
                    return Merge::Inline;
                }
                None => rendered.push(strip_qualifier(&item.text, &binding.name)),
            }
        }
        (rendered.join(", "), produced(&outer_items))
    };

    // Outer clauses may only use computed names that survive the merge.
    let hidden: Vec<&str> = computed
        .iter()
        .copied()
        .filter(|name| !visible.iter().any(|v| v.eq_ignore_ascii_case(name)))
        .collect();
    if [&outer.group_by, &outer.having, &outer.order_by]
        .into_iter()
        .flatten()
        .any(|clause| mentions_any(clause, &hidden))
    {
        return Merge::Inline;
    }

    let strip = |clause: &Option<String>| {
        clause
            .as_deref()
            .map(|text| strip_qualifier(text, &binding.name))
    };
    let merged = SelectQuery {
        distinct: inner.distinct || outer.distinct,
        projection,
        from: inner.from.clone(),
        condition: and_join(inner.condition.clone(), strip(&outer.condition)),
        group_by: strip(&outer.group_by).or_else(|| inner.group_by.clone()),
        having: strip(&outer.having).or_else(|| inner.having.clone()),
        order_by: strip(&outer.order_by).or_else(|| inner.order_by.clone()),
        limit: outer.limit.clone().or_else(|| inner.limit.clone()),
    };
    Merge::Done(merged.to_string())
}

fn produced(items: &[ProjectionItem]) -> Vec<String> {
    items
        .iter()
        .filter_map(ProjectionItem::produces)
        .map(str::to_string)
        .collect()
}

/// True if every outer item is a bare column or a wildcard, so the outer
/// query neither aggregates nor computes over the limited rows.
fn passes_through(projection: &str) -> bool {
    projection_items(projection)
        .is_some_and(|items| items.iter().all(|item| item.wildcard || item.column.is_some()))
}

/// True if the FROM body is exactly the binding name.
fn selects_only_from(from: &str, name: &str) -> bool {
    let tokens = tokenize(from);
    matches!(
        tokens.as_slice(),
        [table, end] if end.is_eof() && table.name().is_some_and(|t| t.eq_ignore_ascii_case(name))
    )
}

/// Maps a plain outer column onto the inner item producing it.
fn reuse(item: &ProjectionItem, inner: &[ProjectionItem], binding: &str) -> Option<String> {
    let column = item.column.as_deref()?;
    let qualifier_ok = {
        let tokens = tokenize(&item.expr);
        let names: Vec<&str> = tokens.iter().filter_map(Token::name).collect();
        names.len() == 1 || names.len() == 2 && names[0].eq_ignore_ascii_case(binding)
    };
    if !qualifier_ok {
        return None;
    }
    let source = inner
        .iter()
        .find(|candidate| candidate.produces().is_some_and(|p| p.eq_ignore_ascii_case(column)));
    let outer_alias = item.alias.as_deref();
    match (source, outer_alias) {
        (Some(source), Some(alias)) => Some(source.renamed(alias)),
        (Some(source), None) => Some(source.text.clone()),
        (None, Some(alias)) if inner.iter().any(|i| i.wildcard) => {
            Some(format!("{column} AS {alias}"))
        }
        (None, None) if inner.iter().any(|i| i.wildcard) => Some(column.to_string()),
        (None, _) => None,
    }
}

/// True if `text` uses any of `names` as a column.
fn mentions_any(text: &str, names: &[&str]) -> bool {
    tokenize(text).iter().any(|token| {
        token
            .name()
            .is_some_and(|name| names.iter().any(|n| n.eq_ignore_ascii_case(name)))
    })
}

/// Removes `binding.` qualifiers, which mean nothing inside the defining query.
fn strip_qualifier(text: &str, binding: &str) -> String {
    let tokens = tokenize(text);
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    for pair in tokens.windows(2) {
        let (name, dot) = (&pair[0], &pair[1]);
        if matches!(dot.kind, TokenKind::Dot)
            && name.name().is_some_and(|n| n.eq_ignore_ascii_case(binding))
        {
            out.push_str(&text[copied..name.span.start]);
            copied = dot.span.end;
        }
    }
    out.push_str(&text[copied..]);
    out
}

/// Joins two optional conditions with AND, parenthesizing any side that has a
/// top-level OR.
fn and_join(inner: Option<String>, outer: Option<String>) -> Option<String> {
    match (inner, outer) {
        (Some(a), Some(b)) => Some(format!("{} AND {}", group_or(&a), group_or(&b))),
        (a, b) => a.or(b),
    }
}

fn group_or(condition: &str) -> String {
    let mut depth = 0usize;
    let has_or = tokenize(condition).iter().any(|token| {
        match token.kind {
            TokenKind::LeftParen => depth += 1,
            TokenKind::RightParen => depth = depth.saturating_sub(1),
            _ => {}
        }
        depth == 0 && token.is(Keyword::Or)
    });
    if has_or {
        format!("({condition})")
    } else {
        condition.to_string()
    }
}
