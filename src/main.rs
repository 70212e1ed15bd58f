//! CLI entry point for the COVID tracker.
//!
//! Fetches covidtracking.com daily state snapshots over a date range (or
//! reads a saved snapshot file), builds per-state series, and exports series
//! CSVs or chart grids.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use covid_tracker::{
    chart::{ChartKind, ChartOptions, build_chart},
    config::ApiConfig,
    infra::covidtracking::CovidTrackingApi,
    metrics::ZeroDenominator,
    output::{append_series, print_chart_summary, print_pretty, write_chart},
    population::Populations,
    series::{SeriesSet, build_all, build_state_series_with_report},
    services::daily_source::{RangeOptions, fetch_range, load_file},
};
use serde_json::Value;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "covid_tracker")]
#[command(about = "Per-state COVID-19 series from the COVID Tracking Project", long_about = None)]
struct Cli {
    /// First day to fetch (YYYY-MM-DD)
    #[arg(long, global = true, default_value = "2020-03-04")]
    start: NaiveDate,

    /// Last day to fetch, inclusive (YYYY-MM-DD)
    #[arg(long, global = true, default_value = "2020-03-28")]
    end: NaiveDate,

    /// Read records from a saved JSON array instead of the API
    #[arg(short, long, global = true, value_name = "FILE")]
    input: Option<String>,

    /// Maximum number of days fetched at once (overrides COVID_API_CONCURRENCY)
    #[arg(short, long, global = true)]
    concurrency: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every state in the data and how many days it has
    States,
    /// Show one state's series
    Series {
        /// Two-letter state code, e.g. CA
        state: String,

        /// CSV file to append the series to
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Build the 2x3 comparison chart data and write it as JSON
    Chart {
        /// Comma-separated state codes (default: all states)
        #[arg(short, long, value_delimiter = ',')]
        states: Vec<String>,

        /// Cumulative totals or day-over-day deltas
        #[arg(short, long, value_enum, default_value_t = ChartKind::Totals)]
        kind: ChartKind,

        /// Divide counts by state population (built-in table unless --populations is given)
        #[arg(long, default_value_t = false)]
        per_capita: bool,

        /// JSON object mapping state codes to populations (needs --per-capita)
        #[arg(long, value_name = "FILE", requires = "per_capita")]
        populations: Option<String>,

        /// What a ratio shows when its denominator is zero
        #[arg(long, value_enum, default_value_t = ZeroDenominator::Nan)]
        policy: ZeroDenominator,

        /// Where to write the chart JSON
        #[arg(short, long, default_value = "chart.json")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/covid_tracker.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("covid_tracker.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let records = load_records(&cli).await?;
    info!(records = records.len(), "Records loaded");

    match cli.command {
        Commands::States => {
            let set = build_set(&records);
            for series in set.iter() {
                let last = series.dates().last().map(|d| d.to_string());
                info!(state = series.state(), days = series.len(), last = ?last, "State");
            }
            info!(states = set.len(), "State list complete");
        }
        Commands::Series { state, output } => {
            let state = state.to_uppercase();
            let (series, report) = build_state_series_with_report(&records, &state);
            if series.is_empty() {
                warn!(state = %state, "No usable records for state");
            }
            info!(
                state = %state,
                matched = report.matched,
                skipped = report.skipped.len(),
                duplicates = report.duplicates,
                "Series built"
            );
            print_pretty(&series);

            if let Some(path) = output {
                append_series(&path, &series)?;
                info!(path = %path, rows = series.len(), "Series appended");
            }
        }
        Commands::Chart {
            states,
            kind,
            per_capita,
            populations,
            policy,
            output,
        } => {
            let populations = if per_capita {
                let table = match populations {
                    Some(path) => Populations::load(&path)?,
                    None => Populations::builtin(),
                };
                if table.is_empty() {
                    warn!("Per-capita requested but the population table is empty");
                }
                Some(table)
            } else {
                None
            };

            let set = build_set(&records);
            let options = ChartOptions {
                kind,
                states: states.iter().map(|s| s.trim().to_uppercase()).collect(),
                populations,
                policy,
            };
            let grid = build_chart(&set, &options);

            print_chart_summary(&grid);
            write_chart(&output, &grid)?;
            info!(path = %output, states = grid.states().len(), "Chart written");
        }
    }

    Ok(())
}

/// Loads raw records from `--input` if given, otherwise from the API.
#[tracing::instrument(skip_all, fields(start = %cli.start, end = %cli.end))]
async fn load_records(cli: &Cli) -> Result<Vec<Value>> {
    if let Some(path) = &cli.input {
        return load_file(path);
    }

    let mut config = ApiConfig::from_env()?;
    if let Some(concurrency) = cli.concurrency {
        config = config.with_concurrency(concurrency)?;
    }

    let api = CovidTrackingApi::from_config(&config)?;
    fetch_range(&api, cli.start, cli.end, &RangeOptions::from(&config))
        .await
        .with_context(|| format!("failed to fetch {} to {}", cli.start, cli.end))
}

fn build_set(records: &[Value]) -> SeriesSet {
    let (set, report) = build_all(records);
    info!(
        states = set.len(),
        accepted = report.accepted,
        skipped = report.skipped.len(),
        duplicates = report.duplicates,
        "Series built"
    );
    set
}
