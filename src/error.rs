//! Error taxonomy for search orchestration.
//!
//! Input rejection is not represented here: [`crate::search::normalize::validate`]
//! reports it and the engine degrades to an empty result. Everything in
//! [`SearchError`] either reaches the caller or, for [`SearchError::Cancelled`]
//! raised by the caller's own token, is converted into an empty result.

use thiserror::Error;

use crate::search::cache::CacheError;
use crate::search::embedder::EmbeddingError;
use crate::search::store::StoreError;

/// Errors surfaced by [`crate::SearchEngine`] and the individual strategies.
#[derive(Error, Debug)]
pub enum SearchError {
    /// A collaborator or field required by the selected tier is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A cancellation token fired before the operation completed.
    #[error("search cancelled")]
    Cancelled,

    #[error("data store error: {0}")]
    Store(#[source] StoreError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("failed to (de)serialize search result: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A racing branch panicked or was torn down by the runtime.
    #[error("search task failed: {0}")]
    Task(String),
}

impl SearchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SearchError::Cancelled)
    }
}

impl From<StoreError> for SearchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Cancelled => SearchError::Cancelled,
            other => SearchError::Store(other),
        }
    }
}

impl From<tokio::task::JoinError> for SearchError {
    fn from(err: tokio::task::JoinError) -> Self {
        SearchError::Task(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_cancellation_maps_to_cancelled() {
        let err: SearchError = StoreError::Cancelled.into();
        assert!(err.is_cancelled());
    }

    #[test]
    fn store_failure_is_wrapped_unchanged() {
        let err: SearchError = StoreError::Query("relation \"docs\" does not exist".into()).into();
        match &err {
            SearchError::Store(StoreError::Query(msg)) => assert!(msg.contains("docs")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("data store error"));
    }

    #[test]
    fn configuration_error_display() {
        let err = SearchError::Configuration("embedding provider is required".into());
        assert_eq!(
            err.to_string(),
            "configuration error: embedding provider is required"
        );
        assert!(!err.is_cancelled());
    }
}
