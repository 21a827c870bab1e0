use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pg_smart_search::search::cache::{CacheError, CacheResult};
use pg_smart_search::search::embedder::EmbeddingError;
use pg_smart_search::search::store::{StoreResult, TransactionBody};
use pg_smart_search::{
    CacheProvider, DataStore, EmbeddingProvider, MemoryCache, QueryExecutor, Row, Statement,
    StoreError,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Which strategy issued a statement, recovered from its SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    FullText,
    Fuzzy,
    Vector,
    Plain,
}

impl Branch {
    pub fn classify(sql: &str) -> Self {
        if sql.contains("websearch_to_tsquery") {
            Self::FullText
        } else if sql.contains("word_similarity") {
            Self::Fuzzy
        } else if sql.contains("<=>") {
            Self::Vector
        } else {
            Self::Plain
        }
    }
}

/// How the scripted store answers a statement.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum Reply {
    Rows(Vec<Row>),
    Delayed(Duration, Vec<Row>),
    /// Never answers; only cancellation ends the call.
    Hang,
    Fail(String),
}

struct Rule {
    branch: Branch,
    needle: Option<String>,
    reply: Reply,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub branch: Branch,
    pub statement: Statement,
}

/// In-memory [`DataStore`] answering by strategy and query text.
#[derive(Default)]
pub struct ScriptedStore {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Call>>,
    executes: Mutex<Vec<Statement>>,
    abandoned: Arc<Mutex<Vec<Branch>>>,
    transactions: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reply for every statement of `branch`.
    pub fn on(&self, branch: Branch, reply: Reply) -> &Self {
        self.rules.lock().push(Rule {
            branch,
            needle: None,
            reply,
        });
        self
    }

    /// Reply for statements of `branch` with a bound string parameter containing `needle`.
    /// Rules are matched in insertion order, so register specific rules first.
    pub fn on_query(&self, branch: Branch, needle: &str, reply: Reply) -> &Self {
        self.rules.lock().push(Rule {
            branch,
            needle: Some(needle.to_string()),
            reply,
        });
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn branches(&self) -> Vec<Branch> {
        self.calls.lock().iter().map(|c| c.branch).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn executes(&self) -> Vec<Statement> {
        self.executes.lock().clone()
    }

    pub fn transactions(&self) -> usize {
        self.transactions.load(Ordering::SeqCst)
    }

    pub fn abandoned(&self) -> Vec<Branch> {
        self.abandoned.lock().clone()
    }

    /// Yield until `branch` has been abandoned mid-call, or give up.
    pub async fn wait_for_abandoned(&self, branch: Branch) -> bool {
        for _ in 0..200 {
            if self.abandoned.lock().contains(&branch) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        false
    }

    fn reply_for(&self, branch: Branch, statement: &Statement) -> Reply {
        let rules = self.rules.lock();
        rules
            .iter()
            .find(|rule| {
                rule.branch == branch
                    && rule.needle.as_deref().is_none_or(|needle| {
                        statement
                            .params
                            .iter()
                            .any(|p| p.as_str().is_some_and(|s| s.contains(needle)))
                    })
            })
            .map(|rule| rule.reply.clone())
            .unwrap_or(Reply::Rows(Vec::new()))
    }
}

/// Records the branch as abandoned if the call future is dropped or cancelled
/// before it produced an answer.
struct InFlight {
    branch: Branch,
    sink: Arc<Mutex<Vec<Branch>>>,
    done: bool,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.done {
            self.sink.lock().push(self.branch);
        }
    }
}

#[async_trait]
impl QueryExecutor for ScriptedStore {
    async fn query(&self, statement: &Statement, cancel: &CancellationToken) -> StoreResult<Vec<Row>> {
        let branch = Branch::classify(&statement.sql);
        self.calls.lock().push(Call {
            branch,
            statement: statement.clone(),
        });
        let reply = self.reply_for(branch, statement);
        let mut in_flight = InFlight {
            branch,
            sink: Arc::clone(&self.abandoned),
            done: false,
        };

        let outcome = match reply {
            Reply::Rows(rows) => Ok(rows),
            Reply::Delayed(delay, rows) => tokio::select! {
                _ = cancel.cancelled() => return Err(StoreError::Cancelled),
                _ = tokio::time::sleep(delay) => Ok(rows),
            },
            Reply::Hang => {
                cancel.cancelled().await;
                return Err(StoreError::Cancelled);
            }
            Reply::Fail(message) => Err(StoreError::Query(message)),
        };
        in_flight.done = true;
        outcome
    }

    async fn execute(&self, statement: &Statement, cancel: &CancellationToken) -> StoreResult<()> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        self.executes.lock().push(statement.clone());
        Ok(())
    }
}

#[async_trait]
impl DataStore for ScriptedStore {
    async fn transaction(
        &self,
        body: TransactionBody,
        _cancel: &CancellationToken,
    ) -> StoreResult<Vec<Row>> {
        self.transactions.fetch_add(1, Ordering::SeqCst);
        let tx: &dyn QueryExecutor = self;
        body(tx).await
    }
}

/// [`MemoryCache`] wrapper counting calls, optionally failing every one.
#[derive(Default)]
pub struct CountingCache {
    inner: MemoryCache,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
    pub deletes: AtomicUsize,
    pub clears: AtomicUsize,
    pub fail: bool,
}

#[allow(dead_code)]
impl CountingCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    fn check(&self) -> CacheResult<()> {
        if self.fail {
            Err(CacheError::Unavailable("cache offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheProvider for CountingCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.delete(key).await
    }

    async fn clear(&self) -> CacheResult<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.clear().await
    }
}

/// Embedder returning a fixed vector.
#[allow(dead_code)]
pub struct FakeEmbedder {
    pub dims: usize,
    pub vector: Vec<f32>,
    pub calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakeEmbedder {
    pub fn new(vector: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            dims: vector.len(),
            vector,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn id(&self) -> &str {
        "fake-embedder"
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn generate_embedding(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector.clone())
    }
}

/// One result row carrying `total_count`.
#[allow(dead_code)]
pub fn row(id: u64, text: &str, total: u64) -> Row {
    match json!({"id": id, "text": text, "total_count": total}) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
