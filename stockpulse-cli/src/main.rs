//! StockPulse CLI: extract, run, load, movers and report commands.
//!
//! Commands:
//! - `extract`: split raw monthly YAML dumps into one CSV per ticker
//! - `run`: compute every (or the selected) analytics stage, export, persist
//! - `load`: persist existing CSV artifacts without recomputing
//! - `movers`: latest-day gainers and losers from the combined dataset
//! - `report`: print the dashboard queries against the store
//! - `stages`: list stages, their artifacts and dependencies

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env, Target};
use std::path::{Path, PathBuf};
use stockpulse_core::analytics::TOP_N;
use stockpulse_core::data::extract_yaml_dir;
use stockpulse_core::domain::Artifact;
use stockpulse_core::view::{daily_movers, scan_combined_csv, DailyMover};
use stockpulse_runner::{
    describe_stages, load_csv_dir, ConfigError, PartialConfig, PersistOutcome, PersistStatus,
    Pipeline, ReportQueries, RunReport, SortOrder, SqliteSink, StageName, StageStatus,
};

#[derive(Parser)]
#[command(
    name = "stockpulse",
    about = "StockPulse: batch stock analytics over daily price files"
)]
struct Cli {
    /// TOML config file. Flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory of per-ticker CSV files.
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    /// Directory for artifacts and the run manifest.
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Sector reference CSV.
    #[arg(long, global = true)]
    sectors: Option<PathBuf>,

    /// Database connection string (sqlite://path, sqlite::memory: or a path).
    #[arg(long, global = true)]
    db: Option<String>,

    /// Raw YAML directory for extraction.
    #[arg(long, global = true)]
    raw: Option<PathBuf>,

    /// Also write Parquet copies of every artifact.
    #[arg(long, global = true, default_value_t = false)]
    parquet: bool,

    /// Debug-level logging.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split raw YAML dumps into one CSV per ticker under the input directory.
    Extract,
    /// Run the analytics pipeline.
    Run {
        /// Stage to run (repeatable). Defaults to every stage.
        #[arg(long = "stage")]
        stages: Vec<String>,

        /// Skip writing to the database.
        #[arg(long, default_value_t = false)]
        no_persist: bool,

        /// Run extraction first.
        #[arg(long, default_value_t = false)]
        extract: bool,
    },
    /// Persist the CSV artifacts already in the output directory.
    Load,
    /// Latest-day gainers and losers from the combined dataset.
    Movers {
        /// Only consider records on or before this date (YYYY-MM-DD).
        #[arg(long)]
        as_of: Option<String>,

        /// Gainers and losers to show.
        #[arg(long, default_value_t = TOP_N)]
        top: usize,
    },
    /// Print sector, volatility and monthly mover summaries from the store.
    Report {
        /// Rows per ranking.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// List pipeline stages.
    Stages,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_filter))
        .target(Target::Stderr)
        .init();

    let settings = load_settings(&cli)?;

    match cli.command {
        Commands::Extract => run_extract(&settings),
        Commands::Run {
            stages,
            no_persist,
            extract,
        } => run_pipeline(settings, &stages, !no_persist, extract),
        Commands::Load => run_load(&settings),
        Commands::Movers { as_of, top } => run_movers(&settings, as_of.as_deref(), top),
        Commands::Report { top } => run_report(&settings, top),
        Commands::Stages => {
            print_stages();
            Ok(())
        }
    }
}

/// Config file (if any) with flags layered on top.
fn load_settings(cli: &Cli) -> Result<PartialConfig> {
    let file = match &cli.config {
        Some(path) => PartialConfig::from_file(path)?,
        None => PartialConfig::default(),
    };
    let flags = PartialConfig {
        input_path: cli.input.clone(),
        output_path: cli.output.clone(),
        sector_reference_path: cli.sectors.clone(),
        connection_string: cli.db.clone(),
        raw_path: cli.raw.clone(),
        write_parquet: cli.parquet.then_some(true),
    };
    Ok(file.merge(flags))
}

fn require<'a, T: ?Sized>(value: Option<&'a T>, field: &'static str) -> Result<&'a T> {
    value.ok_or_else(|| ConfigError::MissingField(field).into())
}

fn run_extract(settings: &PartialConfig) -> Result<()> {
    let raw = require(settings.raw_path.as_deref(), "raw_path")?;
    let input = require(settings.input_path.as_deref(), "input_path")?;
    extract(raw, input)
}

fn extract(raw: &Path, input: &Path) -> Result<()> {
    let summary = extract_yaml_dir(raw, input)
        .with_context(|| format!("extraction from {} failed", raw.display()))?;
    println!(
        "Extracted {} record(s) for {} ticker(s) from {} file(s) ({} failed, {} record(s) skipped)",
        summary.records,
        summary.tickers_written,
        summary.files_scanned,
        summary.files_failed,
        summary.records_skipped
    );
    Ok(())
}

fn run_pipeline(
    settings: PartialConfig,
    stage_names: &[String],
    persist: bool,
    with_extract: bool,
) -> Result<()> {
    let config = settings.resolve()?;
    let stages = stage_names
        .iter()
        .map(|s| s.parse::<StageName>())
        .collect::<Result<Vec<_>, _>>()?;

    if with_extract {
        extract(config.require_raw_path()?, &config.input_path)?;
    }

    let output = Pipeline::new(config.clone())
        .run(&stages, persist)
        .context("pipeline aborted")?;
    print_run_report(&output.report);
    println!("Artifacts written to: {}", config.output_path.display());

    let failed = output.report.failed_stages();
    if !failed.is_empty() {
        let names: Vec<&str> = failed.iter().map(StageName::as_str).collect();
        bail!("{} stage(s) failed: {}", failed.len(), names.join(", "));
    }
    Ok(())
}

fn run_load(settings: &PartialConfig) -> Result<()> {
    let output = require(settings.output_path.as_deref(), "output_path")?;
    let db = require(settings.connection_string.as_deref(), "connection_string")?;

    let mut sink = SqliteSink::connect(db)?;
    let outcomes = load_csv_dir(&mut sink, output)?;
    print_persistence(&outcomes);
    if outcomes
        .iter()
        .any(|o| matches!(o.status, PersistStatus::Failed { .. }))
    {
        bail!("one or more tables failed to persist");
    }
    Ok(())
}

fn run_movers(settings: &PartialConfig, as_of: Option<&str>, top: usize) -> Result<()> {
    let output = require(settings.output_path.as_deref(), "output_path")?;
    let as_of = as_of
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("--as-of must be YYYY-MM-DD")?;

    let path = output.join(Artifact::Combined.file_name());
    if !path.exists() {
        bail!(
            "{} not found; run the `combined` stage first",
            path.display()
        );
    }
    let movers = daily_movers(scan_combined_csv(&path)?, as_of, top)?;

    match &movers.as_of {
        Some(day) => println!("Daily movers as of {day}"),
        None => {
            println!("No records found");
            return Ok(());
        }
    }
    print_movers("Gainers", &movers.gainers);
    print_movers("Losers", &movers.losers);
    Ok(())
}

fn run_report(settings: &PartialConfig, top: usize) -> Result<()> {
    let db = require(settings.connection_string.as_deref(), "connection_string")?;
    let sink = SqliteSink::connect(db)?;
    let q = ReportQueries::new(sink.connection());

    let summary = q.market_summary()?;
    println!(
        "Market summary: {} green sector(s), {} red sector(s)",
        summary.green_sectors, summary.red_sectors
    );

    for (title, order) in [
        ("Top performing sectors", SortOrder::Descending),
        ("Top underperforming sectors", SortOrder::Ascending),
    ] {
        println!();
        println!("{title}");
        println!("{}", "-".repeat(40));
        for row in q.top_sectors(top, order)? {
            println!("{:<28} {:>10.2}%", row.sector, row.average_return);
        }
    }

    println!();
    println!("Most volatile stocks");
    println!("{}", "-".repeat(40));
    for row in q.most_volatile(top)? {
        println!("{:<28} {:>11.6}", row.ticker, row.volatility);
    }

    let pairs = q.correlation_pairs()?;
    let strongest = pairs
        .iter()
        .filter(|p| p.stock_1 < p.stock_2)
        .max_by(|a, b| a.correlation.total_cmp(&b.correlation));
    println!();
    println!("Correlation pairs stored: {}", pairs.len());
    if let Some(p) = strongest {
        println!(
            "Most correlated: {} / {} ({:.4})",
            p.stock_1, p.stock_2, p.correlation
        );
    }

    let movers = q.monthly_movers()?;
    if let Some(last_month) = movers.last().map(|m| m.month.clone()) {
        println!();
        println!("Monthly movers for {last_month}");
        println!("{}", "-".repeat(40));
        for m in movers.iter().filter(|m| m.month == last_month) {
            println!("{:<8} {:<18} {:>10.2}%", m.category, m.ticker, m.monthly_return);
        }
    }
    Ok(())
}

fn print_stages() {
    println!("{:<20} {:<30} Depends on", "Stage", "Artifact");
    println!("{}", "-".repeat(66));
    for (stage, artifact, deps) in describe_stages() {
        let deps: Vec<&str> = deps.iter().map(StageName::as_str).collect();
        println!(
            "{:<20} {:<30} {}",
            stage.as_str(),
            artifact.name(),
            if deps.is_empty() { "-".to_string() } else { deps.join(", ") }
        );
    }
}

fn print_run_report(report: &RunReport) {
    println!("Dataset: {} ticker(s), hash {}", report.tickers_loaded, report.dataset_hash);
    if !report.load_failures.is_empty() {
        println!("Load failures: {}", report.load_failures.len());
        for (file, reason) in &report.load_failures {
            println!("  {file}: {reason}");
        }
    }
    println!();
    println!("{:<20} {:<10} Detail", "Stage", "Status");
    println!("{}", "-".repeat(66));
    for stage in &report.stages {
        let (status, detail) = match &stage.status {
            StageStatus::Completed { rows } => ("ok", format!("{rows} row(s) -> {}", stage.artifact)),
            StageStatus::Failed { reason } => ("FAILED", reason.clone()),
            StageStatus::Skipped { reason } => ("skipped", reason.clone()),
        };
        println!("{:<20} {:<10} {}", stage.stage.as_str(), status, detail);
        for w in &stage.warnings {
            println!("{:<31} warning: {w}", "");
        }
    }
    if let Some(err) = &report.persistence_error {
        println!();
        println!("Persistence skipped: {err}");
    } else if !report.persistence.is_empty() {
        println!();
        print_persistence(&report.persistence);
    }
}

fn print_persistence(outcomes: &[PersistOutcome]) {
    println!("{:<32} Result", "Table");
    println!("{}", "-".repeat(66));
    for o in outcomes {
        let result = match &o.status {
            PersistStatus::Written { rows } => format!("{rows} row(s) written"),
            PersistStatus::Failed { reason } => format!("FAILED: {reason}"),
        };
        println!("{:<32} {}", o.table, result);
    }
}

fn print_movers(title: &str, movers: &[DailyMover]) {
    println!();
    println!("{title}");
    println!("{}", "-".repeat(58));
    println!(
        "{:<14} {:<12} {:>10} {:>10} {:>8}",
        "Ticker", "Date", "Open", "Close", "Change"
    );
    for m in movers {
        println!(
            "{:<14} {:<12} {:>10.2} {:>10.2} {:>7.2}%",
            m.ticker, m.date, m.open, m.close, m.change_pct
        );
    }
}
