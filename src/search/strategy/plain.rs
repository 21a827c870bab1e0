//! Case-insensitive substring scan.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{SearchStrategy, StrategyContext, StrategyKind};
use crate::error::SearchError;
use crate::search::normalize::NormalizedQuery;
use crate::search::sql::{StatementBuilder, contains_pattern, quote_ident, where_clause};
use crate::search::store::Statement;
use crate::search::types::{QueryOptions, SearchResult};

pub struct PlainStrategy {
    ctx: StrategyContext,
}

impl PlainStrategy {
    pub fn new(ctx: StrategyContext) -> Self {
        Self { ctx }
    }

    pub fn statement(&self, query: &NormalizedQuery, options: &QueryOptions) -> Statement {
        let config = self.ctx.config();
        let mut b = StatementBuilder::new();

        let mut predicates = b.filter_predicates(config, options);
        let pattern = b.bind(contains_pattern(query.as_str()));
        let any_field = config
            .search_fields
            .iter()
            .map(|field| format!("{} ILIKE {pattern}", quote_ident(field)))
            .collect::<Vec<_>>()
            .join(" OR ");
        predicates.push(format!("({any_field})"));
        let page = b.page_clause(options);

        let sql = format!(
            "SELECT *, COUNT(*) OVER() AS total_count FROM {table} {filter} ORDER BY {id} ASC {page}",
            table = quote_ident(&config.table),
            filter = where_clause(&predicates),
            id = quote_ident(&config.id_field),
        );
        b.finish(sql)
    }
}

#[async_trait]
impl SearchStrategy for PlainStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Plain
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
