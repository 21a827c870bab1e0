//! Result caching.
//!
//! - [`CacheProvider`]: the external cache collaborator (get/set/delete/clear with TTL).
//! - [`MemoryCache`]: sharded in-process LRU with per-entry expiry.
//! - [`CacheKey`]: deterministic fingerprint of everything that shapes a result page.
//! - [`CacheGate`]: read-before/write-after policy used by the engine. Only
//!   non-empty results are written.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use rustc_hash::FxHasher;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::normalize::NormalizedQuery;
use super::types::{QueryOptions, SearchResult};

/// TTL applied when neither the engine nor the caller specifies one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Prefix of every key written by the engine.
pub const KEY_PREFIX: &str = "ss";

const NUM_SHARDS: usize = 16;
const DEFAULT_CAPACITY_PER_SHARD: usize = 256;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// External cache collaborator. Values are opaque JSON strings.
#[async_trait]
pub trait CacheProvider: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value`; `None` means the provider's default TTL.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    async fn clear(&self) -> CacheResult<()>;
}

/// Cache statistics for monitoring.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub expirations: AtomicU64,
}

impl CacheStats {
    /// (hits, misses, expirations)
    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.expirations.load(Ordering::Relaxed),
        )
    }

    /// Share of lookups served from the cache; `0.0` before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let (hits, misses, _) = self.get();
        match hits + misses {
            0 => 0.0,
            lookups => hits as f64 / lookups as f64,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-process [`CacheProvider`]: sharded LRU, entries expire lazily on read.
pub struct MemoryCache {
    shards: [Mutex<LruCache<String, CacheEntry>>; NUM_SHARDS],
    default_ttl: Duration,
    stats: CacheStats,
}

impl MemoryCache {
    pub fn new(capacity_per_shard: usize) -> Self {
        Self::with_default_ttl(capacity_per_shard, DEFAULT_TTL)
    }

    pub fn with_default_ttl(capacity_per_shard: usize, default_ttl: Duration) -> Self {
        Self {
            shards: std::array::from_fn(|_| {
                Mutex::new(LruCache::new(
                    NonZeroUsize::new(capacity_per_shard).unwrap_or(NonZeroUsize::MIN),
                ))
            }),
            default_ttl,
            stats: CacheStats::default(),
        }
    }

    /// Capacity from `SMART_SEARCH_CACHE_CAPACITY` (entries per shard), else the default.
    pub fn from_env() -> Self {
        let capacity = dotenvy::var("SMART_SEARCH_CACHE_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CAPACITY_PER_SHARD);
        Self::new(capacity)
    }

    #[inline]
    fn shard(&self, key: &str) -> &Mutex<LruCache<String, CacheEntry>> {
        let mut hasher = FxHasher::default();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % NUM_SHARDS]
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Entries currently held, including ones that expired but were not read since.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY_PER_SHARD)
    }
}

#[async_trait]
impl CacheProvider for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut shard = self.shard(key).lock();
        let now = Instant::now();
        let lookup = shard
            .get(key)
            .map(|entry| (entry.expires_at > now).then(|| entry.value.clone()));
        let value = match lookup {
            Some(Some(value)) => Some(value),
            Some(None) => {
                shard.pop(key);
                self.stats.expirations.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => None,
        };
        let counter = if value.is_some() {
            &self.stats.hits
        } else {
            &self.stats.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> CacheResult<()> {
        let expires_at = Instant::now() + ttl.unwrap_or(self.default_ttl);
        self.shard(key)
            .lock()
            .put(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.shard(key).lock().pop(key);
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        for shard in &self.shards {
            shard.lock().clear();
        }
        Ok(())
    }
}

/// Deterministic fingerprint of a search request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// `ss:{table}:{digest}` where the digest covers query, language, page,
    /// limit, and filters. Filters are sorted, so insertion order never matters.
    pub fn new(table: &str, query: &NormalizedQuery, options: &QueryOptions) -> Self {
        let fingerprint = serde_json::json!([
            query.as_str(),
            options.language,
            options.page,
            options.limit,
            options.filters,
        ]);
        let digest = blake3::hash(fingerprint.to_string().as_bytes());
        Self(format!("{KEY_PREFIX}:{table}:{}", digest.to_hex()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Get-before/set-after policy around a [`CacheProvider`].
#[derive(Clone)]
pub struct CacheGate {
    provider: Arc<dyn CacheProvider>,
    ttl: Option<Duration>,
}

impl CacheGate {
    pub fn new(provider: Arc<dyn CacheProvider>, ttl: Option<Duration>) -> Self {
        Self { provider, ttl }
    }

    pub fn provider(&self) -> &Arc<dyn CacheProvider> {
        &self.provider
    }

    /// Fetch a cached page. An entry that no longer decodes counts as a miss.
    pub async fn lookup(&self, key: &CacheKey) -> CacheResult<Option<SearchResult>> {
        let Some(raw) = self.provider.get(key.as_str()).await? else {
            debug!(cache_key = %key, "cache miss");
            return Ok(None);
        };
        match serde_json::from_str::<SearchResult>(&raw) {
            Ok(result) => {
                debug!(cache_key = %key, total = result.total(), "cache hit");
                Ok(Some(result))
            }
            Err(err) => {
                warn!(cache_key = %key, error = %err, "discarding undecodable cache entry");
                Ok(None)
            }
        }
    }

    /// Write a page if it has matches. Returns whether anything was written.
    pub async fn store(&self, key: &CacheKey, result: &SearchResult) -> CacheResult<bool> {
        if result.is_empty() {
            return Ok(false);
        }
        let encoded = serde_json::to_string(result)
            .map_err(|err| CacheError::Backend(anyhow::Error::new(err)))?;
        self.provider.set(key.as_str(), encoded, self.ttl).await?;
        debug!(cache_key = %key, total = result.total(), ttl = ?self.ttl, "cached search result");
        Ok(true)
    }

    pub async fn invalidate(&self, key: &CacheKey) -> CacheResult<()> {
        self.provider.delete(key.as_str()).await
    }

    pub async fn clear(&self) -> CacheResult<()> {
        self.provider.clear().await
    }
}
