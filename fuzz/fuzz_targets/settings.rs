//! Fuzz target for engine settings files.
//!
//! Malformed TOML, wrong types and unknown tiers must surface as errors,
//! never as panics, and anything that loads must render setup DDL.

#![no_main]

use libfuzzer_sys::fuzz_target;

use pg_smart_search::{EngineSettings, setup_statements};

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(settings) = EngineSettings::from_toml_str(raw) else {
        return;
    };
    let config = settings.into_config();
    let _ = config.validate();
    for statement in setup_statements(&config, true) {
        assert!(statement.starts_with("CREATE ") || statement.starts_with("ALTER TABLE "));
    }
});
