//! `MATCH(cols) AGAINST('text' [modifier])` parsing and translation.
//!
//! The destination has a single text index per collection, so the column list
//! is informational: every mode becomes a `$text` search over the (possibly
//! rewritten) search string. Relevance ranking is an optional pair of stages
//! that project the text score and sort on it.
//!
//! ```
//! use oxide_docql::fulltext::{self, FulltextTranslator, SearchMode};
//!
//! let expr = fulltext::parse("MATCH(title) AGAINST('+rust -java' IN BOOLEAN MODE)").unwrap();
//! assert_eq!(expr.mode, SearchMode::Boolean);
//!
//! let filter = FulltextTranslator::new().filter(&expr);
//! assert_eq!(
//!     serde_json::Value::Object(filter),
//!     serde_json::json!({"$text": {"$search": "\"rust\" -java"}})
//! );
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};
use serde_json::json;
use tracing::{debug, warn};

use crate::document::Document;
use crate::value::strip_quotes;

/// Fulltext search semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// `IN NATURAL LANGUAGE MODE`, also the default.
    NaturalLanguage,
    /// `IN BOOLEAN MODE`.
    Boolean,
    /// `WITH QUERY EXPANSION`.
    QueryExpansion,
}

/// One `MATCH ... AGAINST` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulltextExpression {
    /// Columns named in `MATCH(...)`, never empty.
    pub columns: Vec<String>,
    /// The search text, never empty.
    pub search: String,
    /// Search mode.
    pub mode: SearchMode,
}

const MATCH_PREFIX: &str =
    r#"(?is)\bMATCH\s*\(([^)]*)\)\s*AGAINST\s*\(\s*(?:'((?:[^'\\]|\\.|'')*)'|"((?:[^"\\]|\\.|"")*)")"#;

fn compile(suffix: &str) -> Regex {
    Regex::new(&format!("{MATCH_PREFIX}{suffix}")).expect("valid fulltext pattern")
}

static BOOLEAN: LazyLock<Regex> = LazyLock::new(|| compile(r"\s+IN\s+BOOLEAN\s+MODE\s*\)"));
static EXPANSION: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"\s+(?:IN\s+NATURAL\s+LANGUAGE\s+MODE\s+)?WITH\s+QUERY\s+EXPANSION\s*\)")
});
static NATURAL: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?:\s+IN\s+NATURAL\s+LANGUAGE\s+MODE)?\s*\)"));

/// Finds the first `MATCH ... AGAINST` expression in `text`.
///
/// Forms are tried in priority order: boolean mode, query expansion, then the
/// natural-language default. Returns `None` when no form matches or when the
/// column list or search text is empty.
#[must_use]
pub fn parse(text: &str) -> Option<FulltextExpression> {
    let (caps, mode) = [
        (&*BOOLEAN, SearchMode::Boolean),
        (&*EXPANSION, SearchMode::QueryExpansion),
        (&*NATURAL, SearchMode::NaturalLanguage),
    ]
    .into_iter()
    .find_map(|(re, mode)| re.captures(text).map(|caps| (caps, mode)))?;

    let columns: Vec<String> = caps[1]
        .split(',')
        .map(str::trim)
        .map(|col| strip_quotes(col).unwrap_or(col))
        .filter(|col| !col.is_empty())
        .map(str::to_string)
        .collect();
    let search = search_text(&caps);

    if columns.is_empty() || search.trim().is_empty() {
        debug!(text, "MATCH ... AGAINST with empty columns or search text");
        return None;
    }
    Some(FulltextExpression {
        columns,
        search,
        mode,
    })
}

fn search_text(caps: &Captures<'_>) -> String {
    let (raw, quote) = caps
        .get(2)
        .map(|m| (m.as_str(), '\''))
        .or_else(|| caps.get(3).map(|m| (m.as_str(), '"')))
        .unwrap_or(("", '\''));
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            c if c == quote && chars.peek() == Some(&quote) => {
                chars.next();
                out.push(quote);
            }
            c => out.push(c),
        }
    }
    out
}

/// Rewrites boolean-mode syntax for the destination's `$text` search.
///
/// `+word` becomes the required phrase `"word"`; `-word` and quoted phrases
/// pass through; wildcard `*` markers and the ranking operators `> < ~` are
/// dropped because they have no equivalent.
#[must_use]
pub fn rewrite_boolean(search: &str) -> String {
    search
        .split_whitespace()
        .filter_map(|word| {
            let word: String = word.chars().filter(|c| *c != '*').collect();
            let word = word.trim_start_matches(['>', '<', '~']);
            match word.strip_prefix('+') {
                Some("") => None,
                Some(required) if required.starts_with('"') => Some(required.to_string()),
                Some(required) => Some(format!("\"{required}\"")),
                None if word.is_empty() || word == "-" => None,
                None => Some(word.to_string()),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Expands search terms with related terms.
///
/// Query expansion in MySQL re-runs the search with words taken from the best
/// matching rows. The destination cannot do that, so a fixed table stands in
/// for the corpus; implement this trait to plug in a better source.
pub trait TermExpansion: Send + Sync {
    /// Returns terms related to `term` (lowercase), excluding `term` itself.
    fn related(&self, term: &str) -> Vec<String>;
}

const BUILTIN_EXPANSIONS: &[(&str, &[&str])] = &[
    ("database", &["data", "storage", "db"]),
    ("mongodb", &["nosql", "document", "database"]),
    ("mysql", &["sql", "relational", "database"]),
    ("search", &["find", "query", "lookup"]),
    ("performance", &["speed", "optimization", "efficiency"]),
    ("security", &["authentication", "encryption", "protection"]),
    ("index", &["indexing", "lookup"]),
    ("query", &["search", "select"]),
];

/// A fixed lookup table of related terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionTable {
    entries: HashMap<String, Vec<String>>,
}

impl ExpansionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates the built-in table of common technical terms.
    #[must_use]
    pub fn builtin() -> Self {
        BUILTIN_EXPANSIONS
            .iter()
            .fold(Self::empty(), |table, (term, related)| {
                table.with_entry(term, related.iter().copied())
            })
    }

    /// Adds or replaces the related terms for `term`.
    #[must_use]
    pub fn with_entry<I, S>(mut self, term: &str, related: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.insert(
            term.to_lowercase(),
            related.into_iter().map(Into::into).collect(),
        );
        self
    }
}

impl TermExpansion for ExpansionTable {
    fn related(&self, term: &str) -> Vec<String> {
        self.entries.get(term).cloned().unwrap_or_default()
    }
}

/// Expands every word of `search`, keeping the original words first and
/// adding each related term once.
#[must_use]
pub fn expand_terms(search: &str, expansion: &dyn TermExpansion) -> String {
    let words: Vec<String> = search.split_whitespace().map(str::to_string).collect();
    let mut out = words.clone();
    for word in &words {
        for related in expansion.related(&word.to_lowercase()) {
            if !out.iter().any(|w| w.eq_ignore_ascii_case(&related)) {
                out.push(related);
            }
        }
    }
    out.join(" ")
}

/// Turns [`FulltextExpression`]s into `$text` filters and ranking stages.
#[derive(Clone)]
pub struct FulltextTranslator {
    expansion: Arc<dyn TermExpansion>,
    score_field: String,
}

impl fmt::Debug for FulltextTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FulltextTranslator")
            .field("score_field", &self.score_field)
            .finish_non_exhaustive()
    }
}

impl Default for FulltextTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl FulltextTranslator {
    /// Creates a translator with the built-in expansion table and a `score`
    /// relevance field.
    #[must_use]
    pub fn new() -> Self {
        Self {
            expansion: Arc::new(ExpansionTable::builtin()),
            score_field: "score".to_string(),
        }
    }

    /// Replaces the query-expansion source.
    #[must_use]
    pub fn with_expansions(mut self, expansion: impl TermExpansion + 'static) -> Self {
        self.expansion = Arc::new(expansion);
        self
    }

    /// Sets the field the relevance score is projected into.
    #[must_use]
    pub fn with_score_field(mut self, field: impl Into<String>) -> Self {
        self.score_field = field.into();
        self
    }

    /// Returns the relevance score field.
    #[must_use]
    pub fn score_field(&self) -> &str {
        &self.score_field
    }

    /// Returns the search string sent to the destination for `expr`.
    #[must_use]
    pub fn search_string(&self, expr: &FulltextExpression) -> String {
        match expr.mode {
            SearchMode::NaturalLanguage => expr.search.trim().to_string(),
            SearchMode::Boolean => rewrite_boolean(&expr.search),
            SearchMode::QueryExpansion => expand_terms(&expr.search, self.expansion.as_ref()),
        }
    }

    /// Builds the `$text` filter, or `None` when nothing searchable is left
    /// (e.g. a boolean search made only of operators and wildcards).
    #[must_use]
    pub fn text_filter(&self, expr: &FulltextExpression) -> Option<Document> {
        debug!(columns = ?expr.columns, mode = ?expr.mode, "translating fulltext search");
        let search = self.search_string(expr);
        if search.is_empty() {
            warn!(search = %expr.search, "fulltext search has no searchable terms");
            return None;
        }
        let mut doc = Document::new();
        doc.insert("$text".to_string(), json!({ "$search": search }));
        Some(doc)
    }

    /// Like [`text_filter`](Self::text_filter), with an empty filter for a
    /// search that has no terms.
    #[must_use]
    pub fn filter(&self, expr: &FulltextExpression) -> Document {
        self.text_filter(expr).unwrap_or_default()
    }

    /// Builds the two ranking stages: project the text score, then sort on it
    /// descending.
    #[must_use]
    pub fn ranking_stages(&self) -> Vec<Document> {
        let field = self.score_field.as_str();
        vec![
            stage("$addFields", json!({ field: { "$meta": "textScore" } })),
            stage("$sort", json!({ field: -1 })),
        ]
    }

    /// Builds a complete pipeline: `$match` on the filter followed by the
    /// ranking stages. Empty when the search has no terms, since there is no
    /// text score to rank on.
    #[must_use]
    pub fn pipeline(&self, expr: &FulltextExpression) -> Vec<Document> {
        let Some(filter) = self.text_filter(expr) else {
            return Vec::new();
        };
        let mut stages = vec![stage("$match", serde_json::Value::Object(filter))];
        stages.extend(self.ranking_stages());
        stages
    }
}

fn stage(name: &str, body: serde_json::Value) -> Document {
    let mut doc = Document::new();
    doc.insert(name.to_string(), body);
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_natural_language_default() {
        let expr = parse("MATCH(title, `body`) AGAINST('mongodb tips')").unwrap();
        assert_eq!(expr.columns, vec!["title", "body"]);
        assert_eq!(expr.search, "mongodb tips");
        assert_eq!(expr.mode, SearchMode::NaturalLanguage);

        let expr =
            parse("match (title) against ('x' in natural language mode)").unwrap();
        assert_eq!(expr.mode, SearchMode::NaturalLanguage);
    }

    #[test]
    fn test_parse_modes_in_priority_order() {
        let expr = parse("MATCH(a) AGAINST('x' IN BOOLEAN MODE)").unwrap();
        assert_eq!(expr.mode, SearchMode::Boolean);
        let expr = parse("MATCH(a) AGAINST('x' WITH QUERY EXPANSION)").unwrap();
        assert_eq!(expr.mode, SearchMode::QueryExpansion);
        let expr =
            parse("MATCH(a) AGAINST('x' IN NATURAL LANGUAGE MODE WITH QUERY EXPANSION)").unwrap();
        assert_eq!(expr.mode, SearchMode::QueryExpansion);
    }

    #[test]
    fn test_parse_unescapes_search_text() {
        let expr = parse(r#"MATCH(a) AGAINST('it''s \"quoted\"')"#).unwrap();
        assert_eq!(expr.search, "it's \"quoted\"");
        let expr = parse(r#"MATCH(a) AGAINST("double")"#).unwrap();
        assert_eq!(expr.search, "double");
    }

    #[test]
    fn test_parse_rejects_incomplete_forms() {
        assert_eq!(parse("title = 'x'"), None);
        assert_eq!(parse("MATCH(title)"), None);
        assert_eq!(parse("MATCH() AGAINST('x')"), None);
        assert_eq!(parse("MATCH(a) AGAINST('  ')"), None);
    }

    #[test]
    fn test_boolean_rewrite() {
        assert_eq!(rewrite_boolean("+mongo* -mysql data"), "\"mongo\" -mysql data");
        assert_eq!(rewrite_boolean("+\"exact phrase\" ~low"), "\"exact phrase\" low");
        assert_eq!(rewrite_boolean("* + -"), "");
    }

    #[test]
    fn test_query_expansion() {
        let translator = FulltextTranslator::new();
        let expr = parse("MATCH(a) AGAINST('MongoDB search' WITH QUERY EXPANSION)").unwrap();
        assert_eq!(
            translator.search_string(&expr),
            "MongoDB search nosql document database find query lookup"
        );
    }

    #[test]
    fn test_custom_expansion_table() {
        let translator = FulltextTranslator::new()
            .with_expansions(ExpansionTable::empty().with_entry("Rust", ["cargo"]));
        let expr = parse("MATCH(a) AGAINST('rust' WITH QUERY EXPANSION)").unwrap();
        assert_eq!(translator.search_string(&expr), "rust cargo");
    }

    #[test]
    fn test_pipeline_stages() {
        let translator = FulltextTranslator::new().with_score_field("relevance");
        let expr = parse("MATCH(a) AGAINST('term')").unwrap();
        let stages: Vec<serde_json::Value> = translator
            .pipeline(&expr)
            .into_iter()
            .map(serde_json::Value::Object)
            .collect();
        assert_eq!(
            stages,
            vec![
                json!({"$match": {"$text": {"$search": "term"}}}),
                json!({"$addFields": {"relevance": {"$meta": "textScore"}}}),
                json!({"$sort": {"relevance": -1}}),
            ]
        );
    }
}
