//! oxide-docql CLI
//!
//! Command-line inspector that prints what each translator produces for a
//! piece of SQL.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_docql::fulltext::{self, FulltextTranslator};
use oxide_docql::functions::{parse_call, FunctionOutput};
use oxide_docql::order_by::{self, SortTranslator};
use oxide_docql::{cte, eval, where_clause, WhereTranslator};

/// Translate SQL fragments into document-database queries.
#[derive(Parser)]
#[command(name = "oxide-docql")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true, env = "DOCQL_VERBOSE")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite a WITH query into plain SQL.
    Preprocess {
        /// The full query.
        sql: String,
    },

    /// Translate a WHERE clause into a filter document.
    Where {
        /// The clause, with or without the leading WHERE.
        text: String,

        /// Emit a pipeline that ranks fulltext matches by relevance.
        #[arg(short, long)]
        rank: bool,

        /// Field the fulltext relevance score is projected into.
        #[arg(long, default_value = "score", requires = "rank")]
        score_field: String,
    },

    /// Translate an ORDER BY clause into a sort stage.
    OrderBy {
        /// A full query or a bare term list.
        sql: String,

        /// Canonical schema field names, comma separated.
        #[arg(short, long, value_delimiter = ',')]
        schema: Vec<String>,

        /// Explicit renames, as `from=to`. May be repeated.
        #[arg(short, long = "map")]
        mappings: Vec<String>,
    },

    /// Map a scalar function call.
    Function {
        /// The call, e.g. `SUBSTRING(name, 2, 3)`.
        call: String,

        /// Evaluate the result against this JSON document.
        #[arg(long)]
        doc: Option<String>,
    },

    /// Translate a MATCH ... AGAINST expression.
    Fulltext {
        /// The expression.
        text: String,

        /// Emit the full pipeline with relevance ranking.
        #[arg(short, long)]
        rank: bool,

        /// Field the relevance score is projected into.
        #[arg(long, default_value = "score")]
        score_field: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Preprocess { sql } => {
            if !cte::needs_preprocessing(&sql) {
                info!("No WITH clause found; query unchanged.");
            }
            println!("{}", cte::preprocess(&sql));
        }

        Commands::Where {
            text,
            rank,
            score_field,
        } => {
            let clause = where_clause::parse(&text);
            let fulltext = FulltextTranslator::new().with_score_field(score_field);
            let translated = WhereTranslator::new()
                .with_fulltext(fulltext.clone())
                .translate(&clause);
            for warning in &translated.warnings {
                warn!("{warning}");
            }
            let filter = serde_json::Value::Object(translated.filter);
            if rank {
                print_json(&ranked(filter, &fulltext)?)?;
            } else {
                print_json(&filter)?;
            }
        }

        Commands::OrderBy {
            sql,
            schema,
            mappings,
        } => {
            let clause = order_by::parse(&sql).unwrap_or_else(|| order_by::parse_clause(&sql));
            if clause.is_empty() {
                bail!("no ORDER BY terms found in {sql:?}");
            }
            let mut translator = SortTranslator::new().with_mapping(parse_mappings(&mappings)?);
            if !schema.is_empty() {
                translator = translator.with_schema(schema);
            }
            if let Some(stage) = translator.to_stage(&clause) {
                print_json(&stage)?;
            }
        }

        Commands::Function { call, doc } => {
            let output = parse_call(&call)?.map()?;
            match doc {
                None => print_json(&output.to_json())?,
                Some(doc) => {
                    let doc: serde_json::Value =
                        serde_json::from_str(&doc).context("--doc is not valid JSON")?;
                    let value = match &output {
                        FunctionOutput::Expression(expr) => eval::evaluate(expr, &doc)?,
                        FunctionOutput::ClientSide(marker) => eval::evaluate_client(marker, &doc)?,
                        FunctionOutput::RequiresPairing { .. } => {
                            bail!("MATCH cannot be evaluated without AGAINST")
                        }
                    };
                    print_json(&value)?;
                }
            }
        }

        Commands::Fulltext {
            text,
            rank,
            score_field,
        } => {
            let Some(expr) = fulltext::parse(&text) else {
                bail!("no MATCH ... AGAINST expression found in {text:?}");
            };
            info!(mode = ?expr.mode, columns = ?expr.columns, "Parsed fulltext search.");
            let translator = FulltextTranslator::new().with_score_field(score_field);
            if rank {
                print_json(&translator.pipeline(&expr))?;
            } else {
                print_json(&translator.filter(&expr))?;
            }
        }
    }

    Ok(())
}

fn parse_mappings(raw: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    raw.iter()
        .map(|pair| {
            let (from, to) = pair
                .split_once('=')
                .with_context(|| format!("mapping {pair:?} is not of the form from=to"))?;
            Ok((from.trim().to_string(), to.trim().to_string()))
        })
        .collect()
}

/// `$match` on `filter` followed by the relevance ranking stages.
fn ranked(
    filter: serde_json::Value,
    fulltext: &FulltextTranslator,
) -> anyhow::Result<Vec<serde_json::Value>> {
    if !has_text_search(&filter) {
        bail!("--rank needs a MATCH ... AGAINST search in the WHERE clause");
    }
    let mut stages = vec![serde_json::json!({ "$match": filter })];
    stages.extend(fulltext.ranking_stages().into_iter().map(serde_json::Value::Object));
    Ok(stages)
}

/// True if a `$text` search appears anywhere in `filter`.
fn has_text_search(filter: &serde_json::Value) -> bool {
    match filter {
        serde_json::Value::Object(map) => map
            .iter()
            .any(|(key, value)| key == "$text" || has_text_search(value)),
        serde_json::Value::Array(items) => items.iter().any(has_text_search),
        _ => false,
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
