//! Postgres full-text search ranked by cover density.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{SearchStrategy, StrategyContext, StrategyKind};
use crate::error::SearchError;
use crate::search::normalize::NormalizedQuery;
use crate::search::sql::{StatementBuilder, quote_ident, text_search_config};
use crate::search::store::Statement;
use crate::search::types::{QueryOptions, SearchResult};

/// `ts_rank_cd` normalization: rank / (rank + 1).
const RANK_NORMALIZATION: u32 = 32;

pub struct FullTextStrategy {
    ctx: StrategyContext,
}

impl FullTextStrategy {
    pub fn new(ctx: StrategyContext) -> Self {
        Self { ctx }
    }

    pub fn statement(&self, query: &NormalizedQuery, options: &QueryOptions) -> Statement {
        let config = self.ctx.config();
        let mut b = StatementBuilder::new();

        let ts_config = b.bind(text_search_config(&options.language));
        let text = b.bind(query.as_str());
        let tsquery = format!("websearch_to_tsquery({ts_config}::regconfig, {text})");
        let document = match &config.fts_field {
            Some(field) => quote_ident(field),
            None => config
                .search_fields
                .iter()
                .map(|field| format!("to_tsvector({ts_config}::regconfig, {})", quote_ident(field)))
                .collect::<Vec<_>>()
                .join(" || "),
        };

        let mut predicates = vec![format!("({document}) @@ {tsquery}")];
        predicates.extend(b.filter_predicates(config, options));
        let page = b.page_clause(options);

        let sql = format!(
            "WITH search_results AS (\
               SELECT *, ts_rank_cd({document}, {tsquery}, {RANK_NORMALIZATION}) AS relevance \
               FROM {table} WHERE {predicates}\
             ) \
             SELECT *, COUNT(*) OVER() AS total_count FROM search_results \
             ORDER BY relevance DESC {page}",
            table = quote_ident(&config.table),
            predicates = predicates.join(" AND "),
        );
        b.finish(sql)
    }
}

#[async_trait]
impl SearchStrategy for FullTextStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::FullText
    }

    async fn search(
        &self,
        query: &NormalizedQuery,
        options: &QueryOptions,
        cancel: &CancellationToken,
    ) -> Result<SearchResult, SearchError> {
        let statement = self.statement(query, options);
        self.ctx.query_page(&statement, options, cancel).await
    }
}
