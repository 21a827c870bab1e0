//! Database setup statements per tier.
//!
//! Returns idempotent DDL (extensions, generated columns, indexes) that makes
//! the configured tier fast. Nothing here runs automatically; callers apply
//! the statements with their own migration tooling or through
//! [`DataStore::execute`](super::store::QueryExecutor::execute).

use super::config::EngineConfig;
use super::sql::{quote_ident, text_search_config};
use super::types::{DEFAULT_LANGUAGE, Tier};

/// DDL for `config.tier`. `hybrid` adds full-text indexes for non-plain,
/// non-semantic tiers: a generated `tsvector` column plus GIN index when
/// `fts_field` is configured, otherwise one expression index per field.
///
/// Full-text indexes are built for the default language's configuration;
/// requests in other languages still work but fall back to sequential scans.
pub fn setup_statements(config: &EngineConfig, hybrid: bool) -> Vec<String> {
    let dimensions = config.embedder.as_ref().map(|embedder| embedder.dimensions());
    setup_statements_with_dimensions(config, hybrid, dimensions)
}

/// Like [`setup_statements`], with the vector column size given explicitly.
/// Without a size the semantic tier assumes the column already exists.
pub fn setup_statements_with_dimensions(
    config: &EngineConfig,
    hybrid: bool,
    dimensions: Option<usize>,
) -> Vec<String> {
    let table = quote_ident(&config.table);
    let mut statements = Vec::new();

    if hybrid && matches!(config.tier, Tier::TrigramFuzzy | Tier::Normalized) {
        statements.extend(full_text_statements(config, &table));
    }

    match config.tier {
        Tier::Plain => {}
        Tier::TrigramFuzzy => {
            statements.push("CREATE EXTENSION IF NOT EXISTS pg_trgm".to_string());
            for field in &config.search_fields {
                statements.push(format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {table} USING GIN ({} gin_trgm_ops)",
                    index_name(&config.table, &[field.as_str(), "trgm"]),
                    quote_ident(field),
                ));
            }
        }
        Tier::Normalized => {
            statements.push("CREATE EXTENSION IF NOT EXISTS pg_trgm".to_string());
            statements.push("CREATE EXTENSION IF NOT EXISTS rum".to_string());
            for field in &config.search_fields {
                statements.push(format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {table} USING RUM ({} rum_trgm_ops)",
                    index_name(&config.table, &[field.as_str(), "rum"]),
                    quote_ident(field),
                ));
            }
        }
        Tier::Semantic => {
            let column = quote_ident(&config.vector_field);
            statements.push("CREATE EXTENSION IF NOT EXISTS vector".to_string());
            if let Some(dimensions) = dimensions {
                statements.push(format!(
                    "ALTER TABLE {table} ADD COLUMN IF NOT EXISTS {column} vector({dimensions})"
                ));
            }
            statements.push(format!(
                "CREATE INDEX IF NOT EXISTS {} ON {table} USING hnsw ({column} vector_cosine_ops)",
                index_name(&config.table, &["vector"]),
            ));
        }
    }

    statements
}

fn full_text_statements(config: &EngineConfig, table: &str) -> Vec<String> {
    let ts_config = text_search_config(DEFAULT_LANGUAGE);
    match &config.fts_field {
        Some(fts_field) => {
            let document = config
                .search_fields
                .iter()
                .map(|field| format!("coalesce({}, '')", quote_ident(field)))
                .collect::<Vec<_>>()
                .join(" || ' ' || ");
            vec![
                format!(
                    "ALTER TABLE {table} ADD COLUMN IF NOT EXISTS {} tsvector \
                     GENERATED ALWAYS AS (to_tsvector('{ts_config}'::regconfig, {document})) STORED",
                    quote_ident(fts_field),
                ),
                format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {table} USING GIN ({})",
                    index_name(&config.table, &[fts_field.as_str()]),
                    quote_ident(fts_field),
                ),
            ]
        }
        None => config
            .search_fields
            .iter()
            .map(|field| {
                format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {table} \
                     USING GIN (to_tsvector('{ts_config}'::regconfig, {}))",
                    index_name(&config.table, &[field.as_str(), "fts"]),
                    quote_ident(field),
                )
            })
            .collect(),
    }
}

/// `idx_<table>_<parts>` with anything outside `[a-z0-9_]` folded to `_`.
fn index_name(table: &str, parts: &[&str]) -> String {
    let raw = std::iter::once("idx")
        .chain(std::iter::once(table))
        .chain(parts.iter().copied())
        .collect::<Vec<_>>()
        .join("_");
    let sanitized: String = raw
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' }
        })
        .collect();
    quote_ident(&sanitized)
}
