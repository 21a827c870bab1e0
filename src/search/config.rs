//! Engine configuration.
//!
//! [`EngineConfig`] is the immutable, validated configuration an engine owns
//! for its lifetime. It can be built directly with the `with_*` methods, or
//! derived from [`EngineSettings`], the serialisable subset loaded from TOML
//! with environment overrides.
//!
//! # Example settings
//!
//! ```toml
//! table = "hadiths"
//! search_fields = ["arabic_text", "translation"]
//! language_field = "language_code"
//! fts_field = "search_vector"
//! tier = "trigram"
//! default_limit = 20
//! cache_ttl_secs = 120
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::cache::CacheProvider;
use super::embedder::{EmbedderInfo, EmbeddingProvider};
use super::types::Tier;
use crate::error::SearchError;

pub const DEFAULT_ID_FIELD: &str = "id";
pub const DEFAULT_VECTOR_FIELD: &str = "embedding";
pub const DEFAULT_LIMIT: u32 = 20;

/// Errors that can occur when loading [`EngineSettings`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Immutable engine configuration.
#[derive(Clone)]
pub struct EngineConfig {
    /// Table (optionally schema-qualified) holding the searchable records.
    pub table: String,
    /// Text columns matched against the query.
    pub search_fields: Vec<String>,
    /// Column holding each record's language code; enables per-language filtering.
    pub language_field: Option<String>,
    /// Stable ordering column for the plain tier.
    pub id_field: String,
    /// Precomputed `tsvector` column; without it full-text builds vectors on the fly.
    pub fts_field: Option<String>,
    /// `vector` column compared against query embeddings.
    pub vector_field: String,
    pub default_limit: u32,
    pub tier: Tier,
    pub embedder: Option<Arc<dyn EmbeddingProvider>>,
    pub cache: Option<Arc<dyn CacheProvider>>,
    /// TTL for cached pages; `None` defers to the cache provider's default.
    pub cache_ttl: Option<Duration>,
}

impl EngineConfig {
    pub fn new<I, S>(table: impl Into<String>, search_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            search_fields: search_fields.into_iter().map(Into::into).collect(),
            language_field: None,
            id_field: DEFAULT_ID_FIELD.to_string(),
            fts_field: None,
            vector_field: DEFAULT_VECTOR_FIELD.to_string(),
            default_limit: DEFAULT_LIMIT,
            tier: Tier::default(),
            embedder: None,
            cache: None,
            cache_ttl: None,
        }
    }

    pub fn with_language_field(mut self, field: impl Into<String>) -> Self {
        self.language_field = Some(field.into());
        self
    }

    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    pub fn with_fts_field(mut self, field: impl Into<String>) -> Self {
        self.fts_field = Some(field.into());
        self
    }

    pub fn with_vector_field(mut self, field: impl Into<String>) -> Self {
        self.vector_field = field.into();
        self
    }

    pub fn with_default_limit(mut self, limit: u32) -> Self {
        self.default_limit = limit;
        self
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheProvider>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Check invariants the engine relies on. Called once by [`crate::SearchEngine::new`].
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.table.trim().is_empty() {
            return Err(SearchError::Configuration("table name cannot be empty".into()));
        }
        if self.search_fields.is_empty() {
            return Err(SearchError::Configuration(
                "at least one search field is required".into(),
            ));
        }
        let named = self
            .search_fields
            .iter()
            .map(|f| ("search field", f.as_str()))
            .chain(self.language_field.as_deref().map(|f| ("language field", f)))
            .chain(self.fts_field.as_deref().map(|f| ("fts field", f)))
            .chain([
                ("id field", self.id_field.as_str()),
                ("vector field", self.vector_field.as_str()),
            ]);
        for (what, name) in named {
            if name.trim().is_empty() {
                return Err(SearchError::Configuration(format!("{what} name cannot be empty")));
            }
        }
        if self.default_limit == 0 {
            return Err(SearchError::Configuration(
                "default page size must be greater than zero".into(),
            ));
        }
        if self.tier == Tier::Semantic && self.embedder.is_none() {
            return Err(SearchError::Configuration(
                "an embedding provider is required for the semantic tier".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("table", &self.table)
            .field("search_fields", &self.search_fields)
            .field("language_field", &self.language_field)
            .field("id_field", &self.id_field)
            .field("fts_field", &self.fts_field)
            .field("vector_field", &self.vector_field)
            .field("default_limit", &self.default_limit)
            .field("tier", &self.tier)
            .field(
                "embedder",
                &self
                    .embedder
                    .as_deref()
                    .map(|e| EmbedderInfo::from_provider(e).to_string()),
            )
            .field("cache", &self.cache.is_some())
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

/// Serialisable engine settings (everything except the injected collaborators).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub table: String,
    pub search_fields: Vec<String>,
    #[serde(default)]
    pub language_field: Option<String>,
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default)]
    pub fts_field: Option<String>,
    #[serde(default = "default_vector_field")]
    pub vector_field: String,
    #[serde(default = "default_limit")]
    pub default_limit: u32,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
}

fn default_id_field() -> String {
    DEFAULT_ID_FIELD.to_string()
}

fn default_vector_field() -> String {
    DEFAULT_VECTOR_FIELD.to_string()
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

impl EngineSettings {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let mut settings = Self::from_toml_str(&raw)?;
        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    /// Override tier, page size, and cache TTL from `SMART_SEARCH_*` variables.
    /// Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = dotenvy::var("SMART_SEARCH_TIER")
            && let Ok(tier) = val.parse()
        {
            self.tier = tier;
        }

        if let Ok(val) = dotenvy::var("SMART_SEARCH_DEFAULT_LIMIT")
            && let Ok(limit) = val.parse::<u32>()
            && limit > 0
        {
            self.default_limit = limit;
        }

        if let Ok(val) = dotenvy::var("SMART_SEARCH_CACHE_TTL")
            && let Ok(secs) = val.parse()
        {
            self.cache_ttl_secs = Some(secs);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table.trim().is_empty() {
            return Err(ConfigError::Validation("table cannot be empty".into()));
        }
        if self.search_fields.is_empty() {
            return Err(ConfigError::Validation(
                "search_fields must list at least one column".into(),
            ));
        }
        if self.default_limit == 0 {
            return Err(ConfigError::Validation(
                "default_limit must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Build an [`EngineConfig`]; attach collaborators with the `with_*` methods.
    pub fn into_config(self) -> EngineConfig {
        EngineConfig {
            table: self.table,
            search_fields: self.search_fields,
            language_field: self.language_field,
            id_field: self.id_field,
            fts_field: self.fts_field,
            vector_field: self.vector_field,
            default_limit: self.default_limit,
            tier: self.tier,
            embedder: None,
            cache: None,
            cache_ttl: self.cache_ttl_secs.map(Duration::from_secs),
        }
    }
}
