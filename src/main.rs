//! Experience study CLI
//!
//! Loads an exposure CSV, runs a termination or transaction study and writes
//! the summary as a table, CSV or JSON.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use experience_study::exposure::load_transactions;
use experience_study::{
    add_transactions, exp_stats, read_csv_path, trx_stats, write_csv, AttachConfig, ExposedTable,
    ExposureMeta, ExpStatsConfig, SummaryTable, TrxStatsConfig,
};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// xpstats - experience study summaries from exposure records
#[derive(Parser)]
#[command(name = "xpstats")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    format: OutputFormat,

    /// Write to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Termination study: observed rates, credibility, actual-to-expected
    Exp(ExpArgs),

    /// Transaction study: frequency, severity, utilization
    Trx(TrxArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum OutputFormat {
    /// Aligned plain-text table
    #[default]
    Table,
    /// JSON records
    Json,
    /// CSV with header
    Csv,
}

/// Arguments shared by both studies
#[derive(Args)]
struct ExposureArgs {
    /// Exposure records (CSV)
    #[arg(short, long)]
    data: PathBuf,

    /// Study start date (YYYY-MM-DD)
    #[arg(long)]
    start: NaiveDate,

    /// Study end date (YYYY-MM-DD)
    #[arg(long)]
    end: NaiveDate,

    /// Status values counted as terminations
    #[arg(long, num_args = 1.., required = true)]
    target_status: Vec<String>,

    /// Group key columns
    #[arg(short, long, num_args = 1..)]
    group_by: Vec<String>,

    /// JSON file with study configuration; flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keep partially exposed periods
    #[arg(long)]
    keep_partial: bool,
}

#[derive(Args)]
struct ExpArgs {
    #[command(flatten)]
    exposure: ExposureArgs,

    /// Expected-rate columns
    #[arg(short, long, num_args = 1..)]
    expected: Vec<String>,

    /// Weight column (e.g. face amount)
    #[arg(short, long)]
    weight: Option<String>,

    /// Add limited-fluctuation credibility and adjusted expected rates
    #[arg(long)]
    credibility: bool,

    /// Claims needed for full credibility
    #[arg(long)]
    standard: Option<f64>,

    /// Exposure column
    #[arg(long)]
    exposure_col: Option<String>,
}

#[derive(Args)]
struct TrxArgs {
    #[command(flatten)]
    exposure: ExposureArgs,

    /// Raw transactions (CSV: pol_num, trx_date, trx_type, trx_amt)
    #[arg(long)]
    trx_data: Option<PathBuf>,

    /// Period start column used to place transactions
    #[arg(long, default_value = "period_start")]
    period_start: String,

    /// Period end column used to place transactions
    #[arg(long, default_value = "period_end")]
    period_end: String,

    /// Transaction types to include (default: all)
    #[arg(short, long, num_args = 1..)]
    trx_types: Vec<String>,

    /// Denominator columns for percent-of ratios
    #[arg(short, long, num_args = 1..)]
    percent_of: Vec<String>,

    /// Combine all transaction types into one
    #[arg(long)]
    combine: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Exp(args) => run_exp(args, cli.format, cli.output.as_deref()),
        Commands::Trx(args) => run_trx(args, cli.format, cli.output.as_deref()),
    }
}

fn run_exp(args: ExpArgs, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let data = load_exposed(&args.exposure)?;

    let mut config: ExpStatsConfig = load_config(args.exposure.config.as_deref())?;
    if !args.expected.is_empty() {
        config.expected = args.expected;
    }
    if args.weight.is_some() {
        config.weight_col = args.weight;
    }
    if let Some(col) = args.exposure_col {
        config.exposure_col = col;
    }
    if let Some(standard) = args.standard {
        config.full_credibility_standard = standard;
    }
    config.credibility |= args.credibility;
    if args.exposure.keep_partial {
        config.full_exposures_only = false;
    }

    let keys = key_refs(&args.exposure.group_by);
    let summary = exp_stats(&data, &keys, &config).context("Termination study failed")?;
    log::info!("Termination study produced {} rows", summary.n_rows());
    write_summary(&summary, format, output)
}

fn run_trx(args: TrxArgs, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let mut data = load_exposed(&args.exposure)?;

    if let Some(path) = &args.trx_data {
        let trx = load_transactions(path)
            .with_context(|| format!("Failed to load transactions from {}", path.display()))?;
        log::info!("Attaching {} transactions", trx.len());
        let attach = AttachConfig {
            period_start_col: args.period_start,
            period_end_col: args.period_end,
            ..Default::default()
        };
        data = add_transactions(&data, &trx, &attach)?;
    }

    let mut config: TrxStatsConfig = load_config(args.exposure.config.as_deref())?;
    if !args.trx_types.is_empty() {
        config.trx_types = Some(args.trx_types);
    }
    if !args.percent_of.is_empty() {
        config.percent_of = args.percent_of;
    }
    config.combine_trx |= args.combine;
    if args.exposure.keep_partial {
        config.full_exposures_only = false;
    }

    let keys = key_refs(&args.exposure.group_by);
    let summary = trx_stats(&data, &keys, &config).context("Transaction study failed")?;
    log::info!("Transaction study produced {} rows", summary.n_rows());
    write_summary(&summary, format, output)
}

fn load_exposed(args: &ExposureArgs) -> Result<ExposedTable> {
    let table = read_csv_path(&args.data)
        .with_context(|| format!("Failed to read exposure data from {}", args.data.display()))?;
    log::info!(
        "Loaded {} rows x {} columns from {}",
        table.n_rows(),
        table.n_cols(),
        args.data.display()
    );

    let meta = ExposureMeta::builder()
        .start_date(args.start)
        .end_date(args.end)
        .target_status(args.target_status.iter().cloned())
        .build()?;
    Ok(ExposedTable::new(table, meta)?)
}

fn load_config<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let file = File::open(path)
        .with_context(|| format!("Failed to open config {}", path.display()))?;
    serde_json::from_reader(file)
        .with_context(|| format!("Failed to parse config {}", path.display()))
}

fn key_refs(keys: &[String]) -> Vec<&str> {
    keys.iter().map(String::as_str).collect()
}

fn write_summary<S: SummaryTable>(
    summary: &S,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<()> {
    let table = summary.to_table()?;
    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    match format {
        OutputFormat::Table => write!(writer, "{}", table)?,
        OutputFormat::Csv => write_csv(&table, &mut writer)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, &table)?;
            writeln!(writer)?;
        }
    }
    writer.flush()?;

    if let Some(path) = output {
        log::info!("Wrote {} rows to {}", table.n_rows(), path.display());
    }
    Ok(())
}
