//! Trigram word-similarity matching.
//!
//! Runs in a transaction so the similarity threshold for `<%` stays local to
//! this search: `set_config(..., true)` is scoped to the transaction.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{SearchStrategy, StrategyContext, StrategyKind};
use crate::error::SearchError;
use crate::search::normalize::NormalizedQuery;
use crate::search::sql::{StatementBuilder, contains_pattern, quote_ident};
use crate::search::store::{Statement, transaction_body};
use crate::search::threshold;
use crate::search::types::{QueryOptions, SearchResult};

/// How per-field similarity scores combine into a row's relevance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuzzyScoring {
    /// Best single field wins.
    Greatest,
    /// Average across all search fields.
    Mean,
}

pub struct FuzzyStrategy {
    ctx: StrategyContext,
    scoring: FuzzyScoring,
}

impl FuzzyStrategy {
    pub fn new(ctx: StrategyContext, scoring: FuzzyScoring) -> Self {
        Self { ctx, scoring }
    }

    pub fn scoring(&self) -> FuzzyScoring {
        self.scoring
    }

    /// Statement pinning the word-similarity threshold for the transaction.
    pub fn threshold_statement(threshold: f32) -> Statement {
        Statement::new(
            "SELECT set_config('pg_trgm.word_similarity_threshold', $1, true)",
            vec![Value::String(threshold.to_string())],
        )
    }

    pub fn statement(&self, query: &NormalizedQuery, options: &QueryOptions) -> Statement {
        let config = self.ctx.config();
        let mut b = StatementBuilder::new();

        let text = b.bind(query.as_str());
        let pattern = b.bind(contains_pattern(query.as_str()));
        let fields: Vec<String> = config.search_fields.iter().map(|f| quote_ident(f)).collect();

        let scores: Vec<String> = fields
            .iter()
            .map(|field| format!("word_similarity({text}, {field})"))
            .collect();
        let relevance = match self.scoring {
            FuzzyScoring::Greatest => format!("GREATEST({})", scores.join(", ")),
            FuzzyScoring::Mean => format!("({}) / {}.0", scores.join(" + "), scores.len()),
        };
        let matches = fields
            .iter()
            .map(|field| format!("({field} ILIKE {pattern} OR {text} <% {field})"))
            .collect::<Vec<_>>()
            .join(" OR ");

        let mut predicates = vec![format!("({matches})")];
        predicates.extend(b.filter_predicates(config, options));
        let page = b.page_clause(options);

        let sql = format!(
            "SELECT *, {relevance} AS relevance, COUNT(*) OVER() AS total_count FROM {table} \
             WHERE {predicates} ORDER BY relevance DESC {page}",
            table = quote_ident(&config.table),
            predicates = predicates.join(" AND "),
        );
        b.finish(sql)
    }
}

#[async_trait]
impl SearchStrategy for FuzzyStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Fuzzy
    }

    async fn search(
        &self,
        query: &NormalizedQuery,
        options: &QueryOptions,
        cancel: &CancellationToken,
    ) -> Result<SearchResult, SearchError> {
        let threshold = threshold::calculate(query);
        debug!(query = %query, threshold, scoring = ?self.scoring, "fuzzy search");

        let set_threshold = Self::threshold_statement(threshold);
        let statement = self.statement(query, options);
        let token = cancel.clone();
        let body = transaction_body(move |tx| {
            Box::pin(async move {
                tx.execute(&set_threshold, &token).await?;
                tx.query(&statement, &token).await
            })
        });
        self.ctx.transaction_page(body, options, cancel).await
    }
}
