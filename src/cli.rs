//! Command-line helpers: setup SQL generation and query inspection.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::search::config::EngineSettings;
use crate::search::normalize::{
    InvalidReason, convert_layout, is_layout_candidate, normalize, transliterate, validate,
};
use crate::search::setup::setup_statements_with_dimensions;
use crate::search::threshold;

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "pg-smart-search",
    version,
    about = "Setup SQL and query diagnostics for pg-smart-search engines"
)]
pub struct Cli {
    /// Log filter, e.g. `debug` or `pg_smart_search=trace` (defaults to RUST_LOG)
    #[arg(long, env = "SMART_SEARCH_LOG")]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the extensions, columns and indexes a configured tier needs
    Setup {
        /// Engine settings file (TOML)
        #[arg(long, short)]
        config: PathBuf,

        /// Skip the full-text indexes used by the hybrid race
        #[arg(long)]
        no_hybrid: bool,

        /// Vector column size for the semantic tier
        #[arg(long)]
        dimensions: Option<usize>,
    },
    /// Show how a query is validated, normalized and layout-corrected
    Inspect {
        query: String,

        #[arg(long, default_value = "en")]
        language: String,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

/// What the engine would do with a raw query before touching any collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryReport {
    pub query: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<InvalidReason>,
    pub normalized: String,
    pub threshold: f32,
    /// Layout-converted query when the keyboard-layout fallback would apply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout_corrected: Option<String>,
    pub transliterated: String,
}

pub fn inspect(query: &str, language: &str) -> QueryReport {
    let validation = validate(query);
    let normalized = normalize(query);
    let layout_corrected = (language.eq_ignore_ascii_case("ru")
        && is_layout_candidate(normalized.as_str()))
    .then(|| convert_layout(normalized.as_str()))
    .filter(|converted| converted != normalized.as_str());

    QueryReport {
        query: query.to_string(),
        valid: validation.is_valid(),
        reason: validation.reason,
        threshold: threshold::calculate(&normalized),
        transliterated: transliterate(normalized.as_str()),
        normalized: normalized.into_string(),
        layout_corrected,
    }
}

/// Load settings from `path` (with env overrides) and render setup DDL.
pub fn setup_sql(path: &Path, hybrid: bool, dimensions: Option<usize>) -> Result<Vec<String>> {
    let settings = EngineSettings::load(path)
        .with_context(|| format!("loading engine settings from {}", path.display()))?;
    debug!(table = %settings.table, tier = %settings.tier, hybrid, "rendering setup statements");
    let config = settings.into_config();
    Ok(setup_statements_with_dimensions(&config, hybrid, dimensions))
}

pub fn run() -> Result<()> {
    run_with(Cli::parse())
}

pub fn run_with(cli: Cli) -> Result<()> {
    init_tracing(cli.log.as_deref());

    match cli.command {
        Commands::Setup {
            config,
            no_hybrid,
            dimensions,
        } => {
            let statements = setup_sql(&config, !no_hybrid, dimensions)?;
            if statements.is_empty() {
                eprintln!("No setup required for this tier.");
            }
            for statement in statements {
                println!("{statement};");
            }
        }
        Commands::Inspect {
            query,
            language,
            json,
        } => {
            let report = inspect(&query, &language);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
    }
    Ok(())
}

fn print_report(report: &QueryReport) {
    println!("query:          {:?}", report.query);
    match report.reason {
        Some(reason) => println!("valid:          no ({reason})"),
        None => println!("valid:          yes"),
    }
    println!("normalized:     {:?}", report.normalized);
    println!("threshold:      {}", report.threshold);
    if let Some(corrected) = &report.layout_corrected {
        println!("layout fix:     {corrected:?}");
    }
    println!("transliterated: {:?}", report.transliterated);
}

fn init_tracing(filter: Option<&str>) {
    let filter = filter
        .and_then(|f| EnvFilter::try_new(f).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    // A subscriber may already be installed when embedded in another binary.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
