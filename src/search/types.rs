//! Request, result, and tier types shared by every layer of the engine.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// A record returned by the data store, keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// Exact-match filters applied on top of the text match. Sorted by field
/// name so that equal filter sets always serialize identically.
pub type Filters = BTreeMap<String, Value>;

/// Column every search statement adds to carry the unpaginated match count.
pub const TOTAL_COUNT_COLUMN: &str = "total_count";

/// Language assumed when a request does not specify one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Search technique family an engine is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Case-insensitive substring scan, no index requirements.
    #[serde(alias = "lite")]
    Plain,
    /// Hybrid: full-text raced against substring scan, then typo and layout fallbacks.
    #[default]
    #[serde(rename = "trigram", alias = "standard", alias = "hybrid")]
    TrigramFuzzy,
    /// Trigram scoring averaged across pre-normalized fields.
    #[serde(alias = "advanced")]
    Normalized,
    /// Embedding distance via an external embedding provider.
    #[serde(alias = "vector")]
    Semantic,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::TrigramFuzzy => "trigram",
            Self::Normalized => "normalized",
            Self::Semantic => "semantic",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "lite" => Ok(Self::Plain),
            "trigram" | "standard" | "hybrid" => Ok(Self::TrigramFuzzy),
            "normalized" | "advanced" => Ok(Self::Normalized),
            "semantic" | "vector" => Ok(Self::Semantic),
            other => Err(format!("unknown search tier: {other}")),
        }
    }
}

/// Pagination block of a [`SearchResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = total.div_ceil(u64::from(limit.max(1)));
        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: u64::from(page) < total_pages,
            has_prev: page > 1,
        }
    }
}

/// Extra information attached to a result by the fallback chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    /// The query the user actually typed, when results came from a
    /// keyboard-layout corrected query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_from: Option<String>,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult<T = Row> {
    pub data: Vec<T>,
    pub pagination: Pagination,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResultMetadata>,
}

impl<T> SearchResult<T> {
    /// A well-formed result with no rows.
    pub fn empty(page: u32, limit: u32) -> Self {
        Self {
            data: Vec::new(),
            pagination: Pagination::new(page, limit, 0),
            metadata: None,
        }
    }

    pub fn total(&self) -> u64 {
        self.pagination.total
    }

    pub fn is_empty(&self) -> bool {
        self.pagination.total == 0
    }

    pub fn corrected_from(&self) -> Option<&str> {
        self.metadata.as_ref()?.corrected_from.as_deref()
    }
}

impl SearchResult<Row> {
    /// Build a page from store rows, lifting `total_count` out of each row.
    ///
    /// The first row's `total_count` (integer or numeric string) becomes the
    /// total. A missing or smaller count is raised to the number of rows so a
    /// non-empty page never reports `total == 0`.
    pub fn from_rows(mut rows: Vec<Row>, page: u32, limit: u32) -> Self {
        let reported = rows
            .first()
            .and_then(|row| row.get(TOTAL_COUNT_COLUMN))
            .and_then(parse_count)
            .unwrap_or(0);
        for row in &mut rows {
            row.remove(TOTAL_COUNT_COLUMN);
        }
        let total = reported.max(rows.len() as u64);
        Self {
            data: rows,
            pagination: Pagination::new(page, limit, total),
            metadata: None,
        }
    }

    /// Deserialize every row into a caller type.
    pub fn decode<U: DeserializeOwned>(self) -> Result<SearchResult<U>, serde_json::Error> {
        let data = self
            .data
            .into_iter()
            .map(|row| serde_json::from_value(Value::Object(row)))
            .collect::<Result<Vec<U>, _>>()?;
        Ok(SearchResult {
            data,
            pagination: self.pagination,
            metadata: self.metadata,
        })
    }
}

fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A single search call.
///
/// Built with [`SearchRequest::new`] and the chained `with_*` setters; immutable once
/// handed to the engine.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    query: String,
    language: String,
    page: u32,
    limit: Option<u32>,
    filters: Filters,
    cancellation: CancellationToken,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            language: DEFAULT_LANGUAGE.to_string(),
            page: 1,
            limit: None,
            filters: Filters::new(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// 1-based page number; `0` is treated as `1`.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    /// Page size; `0` is treated as `1`. Unset means the engine default.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit.max(1));
        self
    }

    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Resolve paging against the engine's default page size.
    pub fn options(&self, default_limit: u32) -> QueryOptions {
        QueryOptions {
            page: self.page.max(1),
            limit: self.limit.unwrap_or(default_limit).max(1),
            language: self.language.clone(),
            filters: self.filters.clone(),
        }
    }
}

/// Per-attempt parameters handed to a strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub page: u32,
    pub limit: u32,
    pub language: String,
    pub filters: Filters,
}

impl QueryOptions {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Filters that actually constrain the query: `null` and empty strings are skipped.
    pub fn active_filters(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.filters.iter().filter(|(_, value)| match value {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        })
    }
}
