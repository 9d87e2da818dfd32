//! # keepsake CLI
//!
//! Walks a tree of letters, diaries and notes, dates and classifies every
//! document, merges `overrides.json`, and writes the JSON/text artifacts the
//! viewers read.
//!
//! ## Usage
//!
//! ```bash
//! keepsake --source ./source --out ./data
//! keepsake --source ./source --aux scans=/mnt/scans --aux photos=/mnt/photo-notes
//! KEEPSAKE_SOURCE=./source keepsake --dry-run
//! ```
//!
//! Every flag except `--config`, `--progress` and `--dry-run` falls back to a
//! `KEEPSAKE_*` environment variable, then to `config/keepsake.toml`, then to
//! a built-in default.
//!
//! On success a one-line summary is printed to stdout. Fatal conditions
//! (missing source root, malformed overrides file, invalid config) exit with
//! status 1 and a message on stderr.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use keepsake::config::{self, AuxMount, Settings, SourceArgs};
use keepsake::extract::{OfficeConverter, TextExtractor};
use keepsake::ingest;
use keepsake::progress::ProgressMode;

const DEFAULT_CONFIG: &str = "./config/keepsake.toml";

/// Ingest letters, diaries and notes into dated, classified JSON artifacts.
#[derive(Parser)]
#[command(name = "keepsake", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/keepsake.toml`, which may be absent.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Primary source root.
    #[arg(long, env = "KEEPSAKE_SOURCE")]
    source: Option<PathBuf>,

    /// Auxiliary source spliced in under the aux parent folder. Repeatable.
    #[arg(
        long,
        env = "KEEPSAKE_AUX",
        value_name = "NAME=PATH",
        value_delimiter = ',',
        value_parser = config::parse_aux_mount
    )]
    aux: Vec<AuxMount>,

    /// Top-level folder that auxiliary sources appear under.
    #[arg(long, env = "KEEPSAKE_AUX_PARENT")]
    aux_parent: Option<String>,

    /// Output directory for derived artifacts.
    #[arg(long, env = "KEEPSAKE_OUT")]
    out: Option<PathBuf>,

    /// Overrides file. Defaults to `<out>/overrides.json`.
    #[arg(long, env = "KEEPSAKE_OVERRIDES")]
    overrides: Option<PathBuf>,

    /// Progress on stderr. Defaults to human when stderr is a terminal.
    #[arg(long, value_enum)]
    progress: Option<ProgressMode>,

    /// Classify and summarize without writing anything.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let cfg = config::load_config_or_default(&config_path, cli.config.is_some())?;

    let settings = Settings::resolve(
        &cfg,
        SourceArgs {
            source: cli.source,
            aux: cli.aux,
            aux_parent: cli.aux_parent,
            out: cli.out,
            overrides: cli.overrides,
        },
    );

    let extractor = TextExtractor::new(Box::new(OfficeConverter::new(
        settings.doc_command.clone(),
    )));
    let reporter = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    let report = ingest::run_ingest(&settings, &extractor, reporter.as_ref(), cli.dry_run).await?;
    println!("{}", report.summary_line());
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var("KEEPSAKE_LOG")
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
