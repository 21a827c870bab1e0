//! Search layer facade.
//!
//! - **[`normalize`]**: query validation, normalization, keyboard-layout conversion.
//! - **[`threshold`]**: word-similarity cutoff from query shape.
//! - **[`types`]**: requests, result pages, tiers.
//! - **[`config`]**: engine configuration and the TOML/env settings layer.
//! - **[`store`]**: the data-store collaborator traits.
//! - **[`sql`]**: parameterized statement assembly.
//! - **[`embedder`]**: embedding collaborator for the semantic tier.
//! - **[`cache`]**: cache collaborator, in-memory LRU backend, cache keys.
//! - **[`strategy`]**: plain, fuzzy, full-text and vector strategies.
//! - **[`engine`]**: the orchestrator tying it together.
//! - **[`setup`]**: index and extension DDL per tier.

pub mod cache;
pub mod config;
pub mod embedder;
pub mod engine;
pub mod normalize;
pub mod setup;
pub mod sql;
pub mod store;
pub mod strategy;
pub mod threshold;
pub mod types;
