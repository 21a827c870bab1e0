//! Search orchestration.
//!
//! [`SearchEngine::search`] moves each request through a fixed sequence:
//!
//! ```text
//! validate ─→ normalize ─→ cache lookup ─┬─→ single strategy (plain / normalized / semantic)
//!                                        │
//!                                        └─→ hybrid race ─→ fuzzy fallback ─→ layout fallback
//!                                                                  │
//!                                              cache write ←───────┘
//! ```
//!
//! # Hybrid race
//!
//! Full-text and the substring scan are spawned together under one child of
//! the caller's token. Full-text is always awaited first; when it finds
//! matches the race token is cancelled and the scan's handle is dropped, so
//! its outcome (including the cancellation failure) is never observed. When
//! full-text finds nothing the already-running scan is awaited instead.
//!
//! # Cancellation
//!
//! Cancelling the caller's token cancels the race token too. Any
//! [`SearchError::Cancelled`] that surfaces while the caller's token is
//! cancelled is converted into an empty result.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::cache::{CacheGate, CacheKey};
use super::config::EngineConfig;
use super::normalize::{NormalizedQuery, convert_layout, is_layout_candidate, normalize, validate};
use super::store::DataStore;
use super::strategy::{SearchStrategy, StrategyContext, StrategySet, cancellable};
use super::types::{QueryOptions, ResultMetadata, SearchRequest, SearchResult, Tier};
use crate::error::SearchError;

/// Language code that enables the keyboard-layout fallback.
const LAYOUT_FALLBACK_LANGUAGE: &str = "ru";

/// Entry point for running searches against one table.
///
/// Cheap to share behind an `Arc`; holds no per-request state.
pub struct SearchEngine {
    config: Arc<EngineConfig>,
    strategies: StrategySet,
    cache: Option<CacheGate>,
}

impl SearchEngine {
    /// Validate `config` and build the engine.
    pub fn new(store: Arc<dyn DataStore>, config: EngineConfig) -> Result<Self, SearchError> {
        config.validate()?;
        let config = Arc::new(config);
        let cache = config
            .cache
            .clone()
            .map(|provider| CacheGate::new(provider, config.cache_ttl));
        let strategies = StrategySet::new(StrategyContext::new(store, Arc::clone(&config)));
        debug!(
            table = %config.table,
            tier = %config.tier,
            fields = config.search_fields.len(),
            cached = cache.is_some(),
            "search engine ready"
        );
        Ok(Self {
            config,
            strategies,
            cache,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tier(&self) -> Tier {
        self.config.tier
    }

    /// Cache key a request would use, or `None` when the query is rejected by validation.
    pub fn cache_key(&self, request: &SearchRequest) -> Option<CacheKey> {
        if !validate(request.query()).is_valid() {
            return None;
        }
        let options = request.options(self.config.default_limit);
        Some(CacheKey::new(
            &self.config.table,
            &normalize(request.query()),
            &options,
        ))
    }

    /// Run a search.
    ///
    /// Rejected queries and caller cancellation yield an empty page. Store,
    /// cache, and embedding failures propagate unchanged.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResult, SearchError> {
        let options = request.options(self.config.default_limit);

        if let Some(reason) = validate(request.query()).reason {
            debug!(table = %self.config.table, %reason, "query rejected");
            return Ok(SearchResult::empty(options.page, options.limit));
        }

        let query = normalize(request.query());
        let cancel = request.cancellation();
        match self.run(&query, &options, cancel).await {
            Err(SearchError::Cancelled) if cancel.is_cancelled() => {
                warn!(table = %self.config.table, query = %query, "search cancelled by caller");
                Ok(SearchResult::empty(options.page, options.limit))
            }
            other => other,
        }
    }

    /// Run a search and deserialize each row into `T`.
    pub async fn search_as<T: DeserializeOwned>(
        &self,
        request: &SearchRequest,
    ) -> Result<SearchResult<T>, SearchError> {
        Ok(self.search(request).await?.decode()?)
    }

    /// Drop the cached page for `request`. Returns whether a delete was issued.
    pub async fn invalidate(&self, request: &SearchRequest) -> Result<bool, SearchError> {
        let (Some(gate), Some(key)) = (&self.cache, self.cache_key(request)) else {
            return Ok(false);
        };
        gate.invalidate(&key).await?;
        debug!(cache_key = %key, "invalidated cached search");
        Ok(true)
    }

    /// Clear every entry in the configured cache.
    pub async fn clear_cache(&self) -> Result<(), SearchError> {
        if let Some(gate) = &self.cache {
            gate.clear().await?;
            debug!(table = %self.config.table, "search cache cleared");
        }
        Ok(())
    }

    async fn run(
        &self,
        query: &NormalizedQuery,
        options: &QueryOptions,
        cancel: &CancellationToken,
    ) -> Result<SearchResult, SearchError> {
        let key = CacheKey::new(&self.config.table, query, options);
        if let Some(gate) = &self.cache
            && let Some(hit) =
                cancellable(cancel, async { gate.lookup(&key).await.map_err(SearchError::from) })
                    .await?
        {
            return Ok(hit);
        }

        let tier = self.config.tier;
        let result = match self.strategies.single(tier) {
            Some(strategy) => {
                debug!(tier = %tier, strategy = %strategy.kind(), query = %query, "routing to single strategy");
                strategy.search(query, options, cancel).await?
            }
            None => {
                let raced = self.race(query, options, cancel).await?;
                self.fallbacks(query, options, cancel, raced).await?
            }
        };

        if let Some(gate) = &self.cache {
            gate.store(&key, &result).await?;
        }
        debug!(tier = %tier, query = %query, total = result.total(), "search complete");
        Ok(result)
    }

    /// Full-text raced against the substring scan.
    async fn race(
        &self,
        query: &NormalizedQuery,
        options: &QueryOptions,
        cancel: &CancellationToken,
    ) -> Result<SearchResult, SearchError> {
        let race = cancel.child_token();
        // Stops whichever branch is still running if this future is dropped or errors out.
        let _stop_losers = race.clone().drop_guard();

        let full_text = spawn_branch(&self.strategies.full_text, query, options, &race);
        let standard = spawn_branch(&self.strategies.plain, query, options, &race);

        let fts = full_text.await??;
        if !fts.is_empty() {
            race.cancel();
            drop(standard);
            debug!(query = %query, total = fts.total(), branch = "full_text", "fast-track");
            return Ok(fts);
        }

        let scanned = standard.await??;
        debug!(query = %query, total = scanned.total(), branch = "standard", "full-text empty, using scan");
        Ok(scanned)
    }

    /// Fuzzy retry, then keyboard-layout correction for Russian requests.
    async fn fallbacks(
        &self,
        query: &NormalizedQuery,
        options: &QueryOptions,
        cancel: &CancellationToken,
        mut result: SearchResult,
    ) -> Result<SearchResult, SearchError> {
        if result.is_empty() {
            let fuzzy = self.strategies.fuzzy.search(query, options, cancel).await?;
            debug!(query = %query, total = fuzzy.total(), "fuzzy fallback");
            if !fuzzy.is_empty() {
                result = fuzzy;
            }
        }

        if result.is_empty()
            && options.language.eq_ignore_ascii_case(LAYOUT_FALLBACK_LANGUAGE)
            && is_layout_candidate(query.as_str())
        {
            let converted = normalize(&convert_layout(query.as_str()));
            if converted != *query {
                let corrected = self.strategies.fuzzy.search(&converted, options, cancel).await?;
                debug!(
                    query = %query,
                    converted = %converted,
                    total = corrected.total(),
                    "layout fallback"
                );
                if !corrected.is_empty() {
                    result = corrected;
                    result.metadata = Some(ResultMetadata {
                        corrected_from: Some(query.to_string()),
                    });
                }
            }
        }

        Ok(result)
    }
}

fn spawn_branch(
    strategy: &Arc<dyn SearchStrategy>,
    query: &NormalizedQuery,
    options: &QueryOptions,
    token: &CancellationToken,
) -> JoinHandle<Result<SearchResult, SearchError>> {
    let strategy = Arc::clone(strategy);
    let query = query.clone();
    let options = options.clone();
    let token = token.clone();
    tokio::spawn(async move { strategy.search(&query, &options, &token).await })
}
