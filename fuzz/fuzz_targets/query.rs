//! Fuzz target for query preparation.
//!
//! Feeds arbitrary text through validation, normalization, the similarity
//! threshold and the keyboard-layout helpers. None of them may panic, and
//! normalization must be a fixed point.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use pg_smart_search::search::normalize::{convert_layout, is_layout_candidate, transliterate};
use pg_smart_search::search::threshold;
use pg_smart_search::{SearchRequest, normalize, validate};

#[derive(Arbitrary, Debug)]
struct QueryInput {
    query: String,
    language: String,
    page: u32,
    limit: Option<u32>,
}

fuzz_target!(|input: QueryInput| {
    let validation = validate(&input.query);
    let normalized = normalize(&input.query);

    assert_eq!(normalize(normalized.as_str()), normalized);
    assert!(!normalized.as_str().starts_with(' '));
    assert!(!normalized.as_str().ends_with(' '));
    if normalized.as_str().is_empty() {
        assert!(!validation.is_valid());
    }

    let t = threshold::calculate(&normalized);
    assert!(t > 0.0 && t <= 1.0);

    if is_layout_candidate(normalized.as_str()) {
        let converted = convert_layout(normalized.as_str());
        assert_eq!(converted.chars().count(), normalized.char_len());
    }
    let _ = transliterate(normalized.as_str());

    let mut request = SearchRequest::new(input.query).with_language(input.language).with_page(input.page);
    if let Some(limit) = input.limit {
        request = request.with_limit(limit);
    }
    let options = request.options(20);
    assert!(options.page >= 1);
    assert!(options.limit >= 1);
    let _ = serde_json::to_string(&options.filters);
});
