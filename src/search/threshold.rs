//! Similarity cutoff for trigram word-similarity matching.
//!
//! Short single-word queries need near-exact matches to avoid noise; longer
//! queries tolerate more divergence (typos, omitted words).

use super::normalize::NormalizedQuery;

/// Threshold for single-word queries shorter than 5 characters.
pub const SHORT_WORD_THRESHOLD: f32 = 0.8;
/// Threshold for single-word queries of exactly 5 characters.
pub const FIVE_CHAR_WORD_THRESHOLD: f32 = 0.7;
/// Threshold for single-word queries of 6–9 characters.
pub const WORD_THRESHOLD: f32 = 0.5;
/// Threshold for any query under 30 characters not covered above.
pub const MEDIUM_QUERY_THRESHOLD: f32 = 0.4;
/// Threshold for queries of 30 characters or more.
pub const LONG_QUERY_THRESHOLD: f32 = 0.3;

/// Compute the word-similarity cutoff for a normalized query.
///
/// Rules are checked top to bottom; the first match wins.
pub fn calculate(query: &NormalizedQuery) -> f32 {
    threshold_for(query.char_len(), query.word_count())
}

fn threshold_for(length: usize, word_count: usize) -> f32 {
    let single_word = word_count == 1;
    if single_word && length < 5 {
        SHORT_WORD_THRESHOLD
    } else if single_word && length == 5 {
        FIVE_CHAR_WORD_THRESHOLD
    } else if single_word && length < 10 {
        WORD_THRESHOLD
    } else if length < 30 {
        MEDIUM_QUERY_THRESHOLD
    } else {
        LONG_QUERY_THRESHOLD
    }
}
