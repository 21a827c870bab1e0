//! Data-store collaborator.
//!
//! The engine never talks to a database driver directly. Callers implement
//! [`DataStore`] over whatever client they use (sqlx, tokio-postgres, an ORM's
//! raw-query escape hatch) and hand it to [`crate::SearchEngine::new`]. The
//! same store is shared by every concurrent search, so implementations must be
//! safe for concurrent use.
//!
//! Every call receives a [`CancellationToken`]. Implementations should abort
//! the in-flight statement and return [`StoreError::Cancelled`] when it fires;
//! the engine additionally stops waiting on its own, so a store that ignores
//! the token only wastes backend work.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::types::Row;

/// A parameterized SQL statement. Placeholders are positional (`$1`, `$2`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Errors reported by a [`DataStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// The statement was abandoned because its cancellation token fired.
    #[error("statement cancelled")]
    Cancelled,

    /// The backend rejected or failed to run the statement.
    #[error("query failed: {0}")]
    Query(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Work run inside [`DataStore::transaction`]; receives the transaction-scoped handle.
pub type TransactionBody =
    Box<dyn for<'tx> FnOnce(&'tx dyn QueryExecutor) -> BoxFuture<'tx, StoreResult<Vec<Row>>> + Send>;

/// Box a closure as a [`TransactionBody`], pinning down its higher-ranked signature.
pub fn transaction_body<F>(body: F) -> TransactionBody
where
    F: for<'tx> FnOnce(&'tx dyn QueryExecutor) -> BoxFuture<'tx, StoreResult<Vec<Row>>>
        + Send
        + 'static,
{
    Box::new(body)
}

/// Statement execution, available both on the store and inside a transaction.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a statement and return its rows.
    async fn query(&self, statement: &Statement, cancel: &CancellationToken)
    -> StoreResult<Vec<Row>>;

    /// Run a statement for its side effects.
    async fn execute(&self, statement: &Statement, cancel: &CancellationToken) -> StoreResult<()>;
}

/// The shared data-store client.
#[async_trait]
pub trait DataStore: QueryExecutor {
    /// Run `body` inside a transaction, committing when it returns `Ok`.
    ///
    /// Session settings issued through the handle (e.g. a similarity
    /// threshold) must not leak to other callers of the store.
    async fn transaction(
        &self,
        body: TransactionBody,
        cancel: &CancellationToken,
    ) -> StoreResult<Vec<Row>>;
}
