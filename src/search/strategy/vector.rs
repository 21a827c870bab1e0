//! Embedding-distance search over a pgvector column.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{SearchStrategy, StrategyContext, StrategyKind, cancellable};
use crate::error::SearchError;
use crate::search::embedder::{EmbedderInfo, vector_literal};
use crate::search::normalize::NormalizedQuery;
use crate::search::sql::{StatementBuilder, quote_ident, where_clause};
use crate::search::store::Statement;
use crate::search::types::{QueryOptions, SearchResult};

pub struct VectorStrategy {
    ctx: StrategyContext,
}

impl VectorStrategy {
    pub fn new(ctx: StrategyContext) -> Self {
        Self { ctx }
    }

    /// Statement ordering rows by cosine distance to `embedding`.
    pub fn statement(&self, embedding: &[f32], options: &QueryOptions) -> Statement {
        let config = self.ctx.config();
        let mut b = StatementBuilder::new();

        let target = format!("{}::vector", b.bind(vector_literal(embedding)));
        let column = quote_ident(&config.vector_field);
        let predicates = b.filter_predicates(config, options);
        let page = b.page_clause(options);

        let sql = format!(
            "SELECT *, 1 - ({column} <=> {target}) AS relevance, COUNT(*) OVER() AS total_count \
             FROM {table} {filter} ORDER BY {column} <=> {target} ASC {page}",
            table = quote_ident(&config.table),
            filter = where_clause(&predicates),
        );
        b.finish(sql)
    }
}

#[async_trait]
impl SearchStrategy for VectorStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Vector
    }

    async fn search(
        &self,
        query: &NormalizedQuery,
        options: &QueryOptions,
        cancel: &CancellationToken,
    ) -> Result<SearchResult, SearchError> {
        let embedder = self.ctx.config().embedder.clone().ok_or_else(|| {
            SearchError::Configuration("an embedding provider is required for vector search".into())
        })?;

        let embedding = cancellable(cancel, async {
            embedder
                .generate_embedding(query.as_str())
                .await
                .map_err(SearchError::from)
        })
        .await?;

        let expected = embedder.dimensions();
        if embedding.len() != expected {
            return Err(SearchError::Configuration(format!(
                "embedder {} returned {} dimensions",
                EmbedderInfo::from_provider(embedder.as_ref()),
                embedding.len()
            )));
        }
        debug!(embedder = embedder.id(), dimensions = expected, "vector search");

        let statement = self.statement(&embedding, options);
        self.ctx.query_page(&statement, options, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::testing::*;
    use super::*;
    use crate::search::config::EngineConfig;
    use crate::search::embedder::{EmbeddingError, EmbeddingProvider};
    use crate::search::normalize::normalize;
    use crate::search::types::{Row, SearchRequest};
    use serde_json::json;

    struct StubEmbedder {
        dims: usize,
        returned: Vec<f32>,
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        fn id(&self) -> &str {
            "stub"
        }

        fn dimensions(&self) -> usize {
            self.dims
        }

        async fn generate_embedding(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(self.returned.clone())
        }
    }

    fn config_with(embedder: StubEmbedder) -> EngineConfig {
        EngineConfig::new("hadiths", ["text"]).with_embedder(Arc::new(embedder))
    }

    #[test]
    fn statement_orders_by_distance() {
        let config = EngineConfig::new("hadiths", ["text"]).with_vector_field("vec");
        let s = VectorStrategy::new(context(RecordingStore::with_rows(Vec::new()), config));
        let stmt = s.statement(&[0.5, 0.25], &SearchRequest::new("q").options(20));
        assert_eq!(
            squash(&stmt.sql),
            "SELECT *, 1 - (\"vec\" <=> $1::vector) AS relevance, COUNT(*) OVER() AS total_count \
             FROM \"hadiths\" ORDER BY \"vec\" <=> $1::vector ASC LIMIT $2 OFFSET $3"
        );
        assert_eq!(stmt.params, vec![json!("[0.5,0.25]"), json!(20), json!(0)]);
    }

    #[tokio::test]
    async fn missing_embedder_is_configuration_error() {
        let s = VectorStrategy::new(context(
            RecordingStore::with_rows(Vec::new()),
            EngineConfig::new("t", ["a"]),
        ));
        let err = s
            .search(&normalize("prayer"), &SearchRequest::new("q").options(20), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Configuration(_)));
    }

    #[tokio::test]
    async fn wrong_dimension_is_configuration_error() {
        let store = RecordingStore::with_rows(Vec::new());
        let config = config_with(StubEmbedder { dims: 3, returned: vec![1.0] });
        let s = VectorStrategy::new(context(store.clone(), config));
        let err = s
            .search(&normalize("prayer"), &SearchRequest::new("q").options(20), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Configuration(msg) if msg.contains("1 dimensions")));
        assert!(store.queries.lock().is_empty());
    }

    #[tokio::test]
    async fn embeds_then_queries() {
        let row: Row = json!({"id": 1, "relevance": 0.9, "total_count": 1})
            .as_object()
            .cloned()
            .unwrap();
        let store = RecordingStore::with_rows(vec![row]);
        let config = config_with(StubEmbedder { dims: 2, returned: vec![0.1, 0.2] });
        let s = VectorStrategy::new(context(store.clone(), config));
        let result = s
            .search(&normalize("prayer"), &SearchRequest::new("q").options(20), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.total(), 1);
        assert_eq!(store.last_query().params[0], json!("[0.1,0.2]"));
    }
}
