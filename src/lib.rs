//! Query orchestration over Postgres search backends.
//!
//! A [`SearchEngine`] owns one table's configuration and runs every request
//! through validation, normalization, an optional result cache, and the
//! strategy selected by its [`Tier`]. The default tier races Postgres
//! full-text search against a substring scan, then retries with trigram
//! fuzzy matching and, for Russian requests typed on a Latin keyboard
//! layout, with the layout-corrected query.
//!
//! The crate never opens a database connection itself: callers implement
//! [`DataStore`] over their client of choice and, optionally,
//! [`CacheProvider`] and [`EmbeddingProvider`].
//!
//! ```ignore
//! use std::sync::Arc;
//! use pg_smart_search::{EngineConfig, MemoryCache, SearchEngine, SearchRequest};
//!
//! let config = EngineConfig::new("hadiths", ["arabic_text", "translation"])
//!     .with_language_field("language_code")
//!     .with_cache(Arc::new(MemoryCache::default()));
//! let engine = SearchEngine::new(store, config)?;
//!
//! let page = engine
//!     .search(&SearchRequest::new("vjkbndf").with_language("ru"))
//!     .await?;
//! assert_eq!(page.corrected_from(), Some("vjkbndf"));
//! ```

pub mod cli;
pub mod error;
pub mod search;

pub use error::SearchError;
pub use search::cache::{CacheKey, CacheProvider, MemoryCache};
pub use search::config::{ConfigError, EngineConfig, EngineSettings};
pub use search::embedder::{EmbeddingError, EmbeddingProvider};
pub use search::engine::SearchEngine;
pub use search::normalize::{NormalizedQuery, Validation, normalize, validate};
pub use search::setup::setup_statements;
pub use search::store::{DataStore, QueryExecutor, Statement, StoreError};
pub use search::types::{
    Filters, Pagination, ResultMetadata, Row, SearchRequest, SearchResult, Tier,
};
