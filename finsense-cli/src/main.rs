//! FinSense CLI — batch pipeline commands.
//!
//! Commands:
//! - `ingest` — fetch raw OHLCV partitions from Yahoo Finance
//! - `metadata` — write the built-in company metadata table
//! - `consolidate` — merge raw partitions into the canonical daily table
//! - `features` — derive return/volatility/volume features
//! - `dataset` — assemble the supervised training table
//! - `train` — fit the boosted baseline and write artifacts
//! - `explain` — compute additive attributions over the validation rows
//! - `pipeline` — run every batch stage in order

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use finsense_core::config::{DataPaths, PipelineConfig};
use finsense_core::data::{consolidate, ingest_metadata, ingest_symbol, YahooProvider};
use finsense_core::dataset::assemble_dataset;
use finsense_core::features::derive_features;
use finsense_ml::{explain, train, GbmParams, TrainReport};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "finsense", about = "FinSense — market data pipeline and baseline model")]
struct Cli {
    /// Path to a TOML pipeline config (symbols, start_date, data_dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Symbols, overriding the config file (e.g., AAPL MSFT SPY).
    #[arg(long, global = true, num_args = 1..)]
    symbols: Vec<String>,

    /// Start date (YYYY-MM-DD), overriding the config file.
    #[arg(long, global = true)]
    start: Option<String>,

    /// Data root directory, overriding the config file.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch raw OHLCV partitions from Yahoo Finance.
    Ingest,
    /// Write the built-in company metadata table.
    Metadata,
    /// Merge raw partitions into the canonical daily table.
    Consolidate,
    /// Derive return, volatility, and volume features.
    Features,
    /// Assemble the supervised training table.
    Dataset,
    /// Fit the boosted baseline model and write artifacts.
    Train,
    /// Compute additive attributions over the validation rows.
    Explain,
    /// Run every batch stage in order: ingest through explain.
    Pipeline,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let paths = config.paths();
    paths.ensure_dirs().context("creating data directories")?;

    match cli.command {
        Commands::Ingest => run_ingest(&config, &paths),
        Commands::Metadata => run_metadata(&paths),
        Commands::Consolidate => run_consolidate(&paths),
        Commands::Features => run_features(&paths),
        Commands::Dataset => run_dataset(&paths),
        Commands::Train => run_train(&paths),
        Commands::Explain => run_explain(&paths),
        Commands::Pipeline => run_pipeline(&config, &paths),
    }
}

/// Build the effective config from `--config` plus flag overrides.
fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig {
            symbols: Vec::new(),
            start_date: chrono::Local::now().date_naive() - chrono::Duration::days(365 * 2),
            data_dir: PathBuf::from("data"),
        },
    };

    if !cli.symbols.is_empty() {
        config.symbols = cli.symbols.clone();
    }
    if let Some(start) = &cli.start {
        config.start_date = NaiveDate::parse_from_str(start, "%Y-%m-%d")
            .with_context(|| format!("invalid --start date '{start}'"))?;
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }

    if config.symbols.is_empty() && needs_symbols(cli) {
        bail!("no symbols: pass --symbols or a --config file listing them");
    }
    Ok(config)
}

fn needs_symbols(cli: &Cli) -> bool {
    matches!(cli.command, Commands::Ingest | Commands::Pipeline)
}

fn run_ingest(config: &PipelineConfig, paths: &DataPaths) -> Result<()> {
    let provider = YahooProvider::new()?;
    let end = chrono::Local::now().date_naive();
    let ingest_date = end;

    let mut failures = 0;
    for symbol in &config.symbols {
        match ingest_symbol(&provider, paths, symbol, config.start_date, end, ingest_date) {
            Ok(Some(summary)) => println!(
                "{}: {} rows saved ({} skipped)",
                summary.symbol, summary.rows_valid, summary.rows_skipped
            ),
            Ok(None) => {
                eprintln!("{symbol}: no valid rows");
                failures += 1;
            }
            Err(e) => {
                eprintln!("{symbol}: {e}");
                failures += 1;
            }
        }
    }
    if failures == config.symbols.len() {
        bail!("every symbol failed to ingest");
    }
    Ok(())
}

fn run_metadata(paths: &DataPaths) -> Result<()> {
    let written = ingest_metadata(paths)?;
    println!(
        "Metadata: {written} companies -> {}",
        paths.raw_metadata_file().display()
    );
    Ok(())
}

fn run_consolidate(paths: &DataPaths) -> Result<()> {
    let summary = consolidate::consolidate(paths)?;
    if !summary.written {
        bail!("nothing to consolidate: run `finsense ingest` first");
    }
    println!(
        "Consolidated {} partitions: {} rows -> {} ({} duplicates dropped)",
        summary.partitions_read,
        summary.rows_read,
        summary.rows_after_dedup,
        summary.duplicates_dropped
    );
    Ok(())
}

fn run_features(paths: &DataPaths) -> Result<()> {
    let summary = derive_features(paths)?;
    if !summary.written {
        bail!("consolidated table is empty");
    }
    println!(
        "Features: {} rows over {} symbols -> {}",
        summary.rows,
        summary.symbols,
        paths.features_parquet().display()
    );
    Ok(())
}

fn run_dataset(paths: &DataPaths) -> Result<()> {
    let summary = assemble_dataset(paths)?;
    if !summary.written {
        bail!("no dense training rows; ingest more history");
    }
    println!(
        "Dataset: {} feature rows -> {} labeled -> {} kept -> {}",
        summary.feature_rows,
        summary.candidate_label_rows,
        summary.kept_rows,
        paths.training_parquet().display()
    );
    Ok(())
}

fn run_train(paths: &DataPaths) -> Result<()> {
    let report = train(paths, GbmParams::default())?;
    print_report(&report);
    println!("Model saved to: {}", paths.model_file().display());
    Ok(())
}

fn run_explain(paths: &DataPaths) -> Result<()> {
    let summary = explain(paths)?;
    println!(
        "Attributions: {} validation rows -> {}",
        summary.rows,
        paths.attributions_parquet().display()
    );
    println!("Strongest mean driver: {}", summary.top_feature);
    Ok(())
}

fn run_pipeline(config: &PipelineConfig, paths: &DataPaths) -> Result<()> {
    run_ingest(config, paths)?;
    run_metadata(paths)?;
    run_consolidate(paths)?;
    run_features(paths)?;
    run_dataset(paths)?;
    run_train(paths)?;
    run_explain(paths)
}

fn print_report(report: &TrainReport) {
    println!();
    println!("=== Training Report ===");
    println!("Rows:             {} ({} train / {} validation)",
        report.n_rows, report.train_rows, report.validation_rows);
    println!("Boosting rounds:  {} (best {})", report.rounds_trained, report.best_rounds);
    println!();
    println!("--- Validation ---");
    println!("RMSE:             {:.6}", report.rmse);
    println!("MAE:              {:.6}", report.mae);
    println!("Direction:        {:.1}%", report.directional_accuracy * 100.0);
    println!();
}
