//! homecare-invoicing - monthly HomeCareDischarge invoicing report.
//!
//! Reads the bot's outbound files for the prior, current and next month,
//! keeps the rows created in the invoiced month and writes the invoicing
//! workbook.

use anyhow::{bail, Context};
use chrono::Local;
use clap::Parser;
use homecare_invoicing_lib::{
    run_monthly_report, MissingSourcePolicy, ReportConfig, ReportPeriod, SourceMode,
};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "homecare-invoicing", version, about)]
struct Args {
    /// Month to invoice (1-12). Defaults to the previous calendar month.
    #[arg(long, requires = "year")]
    month: Option<u32>,

    /// Four-digit year of the invoiced month.
    #[arg(long, requires = "month")]
    year: Option<i32>,

    /// Prompt for month and year on stdin.
    #[arg(short, long, conflicts_with_all = ["month", "year"])]
    interactive: bool,

    /// TOML configuration file.
    #[arg(long, env = "HOMECARE_INVOICING_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the monthly outbound files.
    #[arg(long)]
    source_dir: Option<PathBuf>,

    /// Root directory for reports; a per-year folder is created inside it.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Read a consolidated transaction report instead of monthly files.
    #[arg(long)]
    transaction_report: Option<PathBuf>,

    /// Fail when the prior or next month's files are missing.
    #[arg(long)]
    strict_sources: bool,

    /// Skip the pivot sheets.
    #[arg(long)]
    no_pivots: bool,

    /// Print a JSON run summary on stdout.
    #[arg(long)]
    json: bool,

    #[arg(long, requires = "json")]
    pretty: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "homecare_invoicing_lib=info,homecare_invoicing=info"
    } else {
        "homecare_invoicing_lib=warn,homecare_invoicing=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<ReportConfig> {
    let mut config = match &args.config {
        Some(path) => ReportConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ReportConfig::default(),
    };

    if let Some(dir) = &args.source_dir {
        config.source_dir = dir.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(path) = &args.transaction_report {
        config.source_mode = SourceMode::TransactionReport;
        config.transaction_report = Some(path.clone());
    }
    if args.strict_sources {
        config.missing_sources = MissingSourcePolicy::Abort;
    }
    if args.no_pivots {
        config.pivots = false;
    }
    config.validate()?;
    Ok(config)
}

fn prompt_number<T: std::str::FromStr>(label: &str) -> anyhow::Result<T> {
    let mut stdout = io::stdout();
    write!(stdout, "{label}: ")?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let text = line.trim();
    match text.parse::<T>() {
        Ok(v) => Ok(v),
        Err(_) => bail!("'{text}' is not a number"),
    }
}

fn resolve_period(args: &Args) -> anyhow::Result<ReportPeriod> {
    if args.interactive {
        let month = prompt_number::<u32>("Enter month")?;
        let year = prompt_number::<i32>("Enter year")?;
        return Ok(ReportPeriod::new(month, year)?);
    }
    match (args.month, args.year) {
        (Some(month), Some(year)) => Ok(ReportPeriod::new(month, year)?),
        _ => Ok(ReportPeriod::previous_calendar_month(Local::now().date_naive())),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(&args)?;
    let period = resolve_period(&args)?;
    let outcome = run_monthly_report(&config, period)
        .with_context(|| format!("invoicing run for {period} failed"))?;

    if args.json {
        let summary = outcome.summary_json();
        let out = if args.pretty {
            serde_json::to_string_pretty(&summary)?
        } else {
            serde_json::to_string(&summary)?
        };
        println!("{out}");
    } else {
        println!(
            "{}: {} invoicing rows, {} final rows -> {}",
            period,
            outcome.run.invoicing.len(),
            outcome.run.final_rows.len(),
            outcome.output_path.display()
        );
    }
    Ok(())
}
