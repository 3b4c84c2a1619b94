//! Mapping-driven web form data entry.
//!
//! Reads rows from a CSV or spreadsheet, validates each one against a field
//! mapping, enters it into a web form through WebDriver, and appends every
//! row's outcome to a log that `--resume` picks up on the next run.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use dataentry::check::check_files;
use dataentry::core::filter::RowFilter;
use dataentry::core::selection::RowRange;
use dataentry::core::types::{OutcomeRecord, OutcomeStatus};
use dataentry::error::BrowserLaunchError;
use dataentry::exit_codes;
use dataentry::io::mapping::load_mapping;
use dataentry::io::outcome_log::{OutcomeLog, load_completed_rows};
use dataentry::io::table::read_table;
use dataentry::io::webdriver::{LaunchOptions, WebDriverSession};
use dataentry::logging;
use dataentry::run::{RunOptions, RunStop, run_rows};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "dataentry",
    version,
    about = "Fill a web form once per row of a CSV or spreadsheet"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate, fill, and submit the form for each selected row.
    Run(RunArgs),
    /// Validate the selected rows against the mapping without a browser.
    Check(SourceArgs),
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// CSV or spreadsheet (.xlsx, .xlsm, .xls, .xlsb, .ods) with a header row.
    #[arg(long)]
    input: PathBuf,
    /// Field mapping (YAML, or TOML when the extension is .toml).
    #[arg(long)]
    map: PathBuf,
    /// First data row to process (1-based, inclusive).
    #[arg(long, default_value_t = 1)]
    start: usize,
    /// Last data row to process (inclusive).
    #[arg(long)]
    end: Option<usize>,
    /// Only process rows matching this expression, e.g. "country == 'US' and age >= 18".
    #[arg(long)]
    filter: Option<String>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Outcome log (CSV, or JSON Lines when the extension is .jsonl).
    #[arg(long, default_value = "results.csv")]
    out: PathBuf,
    /// Run the browser headless (in addition to the mapping's `headless`).
    #[arg(long)]
    headless: bool,
    /// Fill forms but never submit or verify.
    #[arg(long)]
    dry_run: bool,
    /// Skip rows already logged as successful in `--out`.
    #[arg(long)]
    resume: bool,
    /// Seconds to wait for the success check after each submission.
    #[arg(long, default_value_t = 15)]
    timeout: u64,
    /// Attach to a running WebDriver endpoint instead of spawning a driver.
    #[arg(long, env = "DATAENTRY_WEBDRIVER_URL")]
    webdriver_url: Option<String>,
    /// Driver executable to spawn (defaults to chromedriver/geckodriver on PATH).
    #[arg(long)]
    driver_path: Option<PathBuf>,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Run(args) => cmd_run(&args),
        Command::Check(args) => cmd_check(&args),
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<BrowserLaunchError>().is_some() {
        exit_codes::BROWSER_LAUNCH
    } else {
        exit_codes::INVALID
    }
}

fn selection(args: &SourceArgs) -> Result<(RowRange, Option<RowFilter>)> {
    let range = RowRange::new(args.start, args.end)?;
    let filter = args.filter.as_deref().map(RowFilter::parse).transpose()?;
    Ok((range, filter))
}

fn cmd_check(args: &SourceArgs) -> Result<i32> {
    let (range, filter) = selection(args)?;
    let outcome = check_files(&args.map, &args.input, range, filter.as_ref())?;
    for rejected in &outcome.rejected {
        println!("row {}: {}", rejected.row, rejected.reason);
    }
    println!(
        "Checked: {}, Valid: {}, Rejected: {}",
        outcome.checked,
        outcome.checked - outcome.rejected.len(),
        outcome.rejected.len()
    );
    Ok(if outcome.is_clean() {
        exit_codes::OK
    } else {
        exit_codes::ROWS_REJECTED
    })
}

fn cmd_run(args: &RunArgs) -> Result<i32> {
    let mapping = load_mapping(&args.source.map)?;
    let (range, filter) = selection(&args.source)?;
    if !args.dry_run {
        mapping.require_submit_selector()?;
    }
    let rows = read_table(&args.source.input)?;
    let completed = if args.resume {
        load_completed_rows(&args.out)?
    } else {
        BTreeSet::new()
    };
    let mut log = OutcomeLog::open(&args.out)?;

    let timeout = Duration::from_secs(args.timeout);
    let launch = LaunchOptions {
        webdriver_url: args.webdriver_url.clone(),
        driver_program: args.driver_path.clone(),
        page_load_timeout: timeout,
        ..LaunchOptions::new(mapping.browser, args.headless || mapping.headless)
    };
    let session = WebDriverSession::launch(&launch)?;

    let options = RunOptions {
        range,
        filter,
        dry_run: args.dry_run,
        resume: args.resume,
        timeout,
        ..RunOptions::default()
    };
    let report = run_rows(
        &session,
        &mapping,
        rows,
        &completed,
        &mut log,
        &options,
        print_outcome,
    )?;
    drop(session);

    let summary = report.summary;
    info!(?summary, out = %args.out.display(), "run finished");
    println!(
        "Done. Success: {}, Failed: {}, Skipped: {}",
        summary.successes, summary.failures, summary.skipped
    );
    match report.stop {
        RunStop::Completed => Ok(exit_codes::OK),
        RunStop::SessionLost { row, message } => {
            eprintln!(
                "stopped at row {row}: {message} (rerun with --resume to continue; log: {})",
                args.out.display()
            );
            Ok(exit_codes::SESSION_LOST)
        }
    }
}

fn print_outcome(record: &OutcomeRecord) {
    match (record.status, record.message.is_empty()) {
        (OutcomeStatus::Success, true) => println!("row {}: success", record.row),
        (OutcomeStatus::Success, false) => println!("row {}: {}", record.row, record.message),
        (OutcomeStatus::Failed, _) => println!("row {}: failed: {}", record.row, record.message),
    }
}
