//! Search strategies.
//!
//! Each strategy turns a normalized query plus paging/filter options into one
//! statement (or one transaction) against the [`DataStore`] and maps the rows
//! into a [`SearchResult`]. The engine selects strategies through a
//! [`StrategySet`] keyed by [`Tier`].

mod fts;
mod fuzzy;
mod plain;
mod vector;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::config::EngineConfig;
use super::normalize::NormalizedQuery;
use super::store::{DataStore, Statement, TransactionBody};
use super::types::{QueryOptions, SearchResult, Tier};
use crate::error::SearchError;

pub use fts::FullTextStrategy;
pub use fuzzy::{FuzzyScoring, FuzzyStrategy};
pub use plain::PlainStrategy;
pub use vector::VectorStrategy;

/// Which algorithm a strategy implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Plain,
    Fuzzy,
    FullText,
    Vector,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Fuzzy => "fuzzy",
            Self::FullText => "full_text",
            Self::Vector => "vector",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common contract for all search techniques.
#[async_trait]
pub trait SearchStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Run one search. Fails with [`SearchError::Cancelled`] if `cancel`
    /// fires before the store answers; no partial result is returned.
    async fn search(
        &self,
        query: &NormalizedQuery,
        options: &QueryOptions,
        cancel: &CancellationToken,
    ) -> Result<SearchResult, SearchError>;
}

/// Await `fut` unless `cancel` fires first.
///
/// Cancellation is polled first, so an already-cancelled token never lets
/// the future start.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, SearchError>
where
    F: Future<Output = Result<T, SearchError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SearchError::Cancelled),
        res = fut => res,
    }
}

/// Shared handles every strategy needs.
#[derive(Clone)]
pub struct StrategyContext {
    store: Arc<dyn DataStore>,
    config: Arc<EngineConfig>,
}

impl StrategyContext {
    pub fn new(store: Arc<dyn DataStore>, config: Arc<EngineConfig>) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn query_page(
        &self,
        statement: &Statement,
        options: &QueryOptions,
        cancel: &CancellationToken,
    ) -> Result<SearchResult, SearchError> {
        let rows = cancellable(cancel, async {
            self.store
                .query(statement, cancel)
                .await
                .map_err(SearchError::from)
        })
        .await?;
        Ok(SearchResult::from_rows(rows, options.page, options.limit))
    }

    async fn transaction_page(
        &self,
        body: TransactionBody,
        options: &QueryOptions,
        cancel: &CancellationToken,
    ) -> Result<SearchResult, SearchError> {
        let rows = cancellable(cancel, async {
            self.store
                .transaction(body, cancel)
                .await
                .map_err(SearchError::from)
        })
        .await?;
        Ok(SearchResult::from_rows(rows, options.page, options.limit))
    }
}

/// Dispatch table from tier to strategy.
///
/// Built once per engine; strategies are shared so the hybrid race can move
/// clones into spawned tasks.
#[derive(Clone)]
pub struct StrategySet {
    pub plain: Arc<dyn SearchStrategy>,
    /// Greatest-score fuzzy matcher used by the fallback chain.
    pub fuzzy: Arc<dyn SearchStrategy>,
    /// Mean-score fuzzy matcher backing [`Tier::Normalized`].
    pub normalized: Arc<dyn SearchStrategy>,
    pub full_text: Arc<dyn SearchStrategy>,
    pub vector: Arc<dyn SearchStrategy>,
}

impl StrategySet {
    pub fn new(ctx: StrategyContext) -> Self {
        Self {
            plain: Arc::new(PlainStrategy::new(ctx.clone())),
            fuzzy: Arc::new(FuzzyStrategy::new(ctx.clone(), FuzzyScoring::Greatest)),
            normalized: Arc::new(FuzzyStrategy::new(ctx.clone(), FuzzyScoring::Mean)),
            full_text: Arc::new(FullTextStrategy::new(ctx.clone())),
            vector: Arc::new(VectorStrategy::new(ctx)),
        }
    }

    /// The one strategy a non-hybrid tier runs; `None` for the hybrid tier.
    pub fn single(&self, tier: Tier) -> Option<&Arc<dyn SearchStrategy>> {
        match tier {
            Tier::Plain => Some(&self.plain),
            Tier::Normalized => Some(&self.normalized),
            Tier::Semantic => Some(&self.vector),
            Tier::TrigramFuzzy => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording store for strategy unit tests.

    use super::*;
    use crate::search::store::{QueryExecutor, StoreError, StoreResult};
    use crate::search::types::Row;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct RecordingStore {
        pub rows: Mutex<Vec<Row>>,
        pub queries: Mutex<Vec<Statement>>,
        pub executes: Mutex<Vec<Statement>>,
        pub transactions: Mutex<usize>,
    }

    impl RecordingStore {
        pub fn with_rows(rows: Vec<Row>) -> Arc<Self> {
            Arc::new(Self {
                rows: Mutex::new(rows),
                ..Default::default()
            })
        }

        pub fn last_query(&self) -> Statement {
            self.queries.lock().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl QueryExecutor for RecordingStore {
        async fn query(
            &self,
            statement: &Statement,
            cancel: &CancellationToken,
        ) -> StoreResult<Vec<Row>> {
            if cancel.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            self.queries.lock().push(statement.clone());
            Ok(self.rows.lock().clone())
        }

        async fn execute(&self, statement: &Statement, _cancel: &CancellationToken) -> StoreResult<()> {
            self.executes.lock().push(statement.clone());
            Ok(())
        }
    }

    #[async_trait]
    impl DataStore for RecordingStore {
        async fn transaction(
            &self,
            body: TransactionBody,
            _cancel: &CancellationToken,
        ) -> StoreResult<Vec<Row>> {
            *self.transactions.lock() += 1;
            let tx: &dyn QueryExecutor = self;
            body(tx).await
        }
    }

    pub fn context(store: Arc<RecordingStore>, config: EngineConfig) -> StrategyContext {
        StrategyContext::new(store, Arc::new(config))
    }

    /// Collapse whitespace so assertions don't depend on statement layout.
    pub fn squash(sql: &str) -> String {
        sql.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
