//! Command-line front end: runs the harness and prints the results.
//!
//! Run with:
//! ```bash
//! cargo run --example harness --features demo -- --help
//! ```

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use contendere::config::HarnessConfig;
use contendere::observers::json::JsonObserver;
use contendere::observers::table::{CompactSeparator, TableObserver, TableStyle};
use contendere::snapshot::{ResultsSnapshot, RunReport};
use contendere::{Orchestrator, ITERATIONS, WORKERS};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Output format for results.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// One row per strategy
    Table,
    /// Grid of "name: count" cells
    Compact,
    /// JSON
    Json,
}

/// Table style selection.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum StyleChoice {
    Ascii,
    #[default]
    Rounded,
    Sharp,
    Modern,
    Markdown,
    Blank,
}

impl From<StyleChoice> for TableStyle {
    fn from(choice: StyleChoice) -> Self {
        match choice {
            StyleChoice::Ascii => TableStyle::Ascii,
            StyleChoice::Rounded => TableStyle::Rounded,
            StyleChoice::Sharp => TableStyle::Sharp,
            StyleChoice::Modern => TableStyle::Modern,
            StyleChoice::Markdown => TableStyle::Markdown,
            StyleChoice::Blank => TableStyle::Blank,
        }
    }
}

/// Separator for the compact format.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum SeparatorChoice {
    #[default]
    Colon,
    Equals,
    Arrow,
    Pipe,
}

impl From<SeparatorChoice> for CompactSeparator {
    fn from(choice: SeparatorChoice) -> Self {
        match choice {
            SeparatorChoice::Colon => CompactSeparator::Colon,
            SeparatorChoice::Equals => CompactSeparator::Equals,
            SeparatorChoice::Arrow => CompactSeparator::Arrow,
            SeparatorChoice::Pipe => CompactSeparator::Pipe,
        }
    }
}

/// Concurrent update strategies under contention.
///
/// Spawns a crowd of workers that each increment seven differently
/// synchronized counters, then reports which ones ended exact.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of concurrent workers
    #[arg(long, default_value_t = WORKERS)]
    workers: usize,

    /// Increments per worker per strategy
    #[arg(short, long, default_value_t = ITERATIONS)]
    iterations: usize,

    /// Broadcast buffer capacity (defaults to workers × iterations)
    #[arg(long)]
    broadcast_capacity: Option<usize>,

    /// Number of consecutive runs
    #[arg(short, long, default_value = "1")]
    runs: u64,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Table style (for table/compact formats)
    #[arg(short, long, value_enum, default_value = "rounded")]
    style: StyleChoice,

    /// Number of columns (for compact format)
    #[arg(short, long, default_value = "4")]
    columns: usize,

    /// Separator style (for compact format)
    #[arg(long, value_enum, default_value = "colon")]
    separator: SeparatorChoice,

    /// Pretty print JSON output
    #[arg(long)]
    pretty: bool,

    /// Wrap JSON output with a capture timestamp
    #[arg(long)]
    timestamp: bool,

    /// Title printed above tables
    #[arg(long)]
    title: Option<String>,

    /// Redraw the live counters every N milliseconds while a run is in flight
    #[arg(short, long)]
    watch: Option<u64>,
}

impl Args {
    fn config(&self) -> HarnessConfig {
        let config = HarnessConfig::new()
            .with_workers(self.workers)
            .with_iterations(self.iterations);
        match self.broadcast_capacity {
            Some(capacity) => config.with_broadcast_capacity(capacity),
            None => config.sized_for_target(),
        }
    }

    fn table(&self) -> TableObserver {
        let mut observer = TableObserver::new().with_style(self.style.into());
        if let OutputFormat::Compact = self.format {
            observer = observer
                .compact(true)
                .columns(self.columns)
                .separator(self.separator.into());
        }
        if let Some(ref title) = self.title {
            observer = observer.with_title(title.clone());
        }
        observer
    }

    fn json(&self) -> JsonObserver {
        JsonObserver::new()
            .pretty(self.pretty)
            .include_timestamp(self.timestamp)
    }
}

fn render_snapshot(args: &Args, snapshot: &ResultsSnapshot) -> String {
    match args.format {
        OutputFormat::Table | OutputFormat::Compact => args.table().render(snapshot),
        OutputFormat::Json => args
            .json()
            .to_json(snapshot)
            .unwrap_or_else(|e| format!("Error: {e}")),
    }
}

fn render_report(args: &Args, report: &RunReport) -> String {
    match args.format {
        OutputFormat::Table | OutputFormat::Compact => args.table().render_report(report),
        OutputFormat::Json => args
            .json()
            .report_to_json(report)
            .unwrap_or_else(|e| format!("Error: {e}")),
    }
}

async fn watch_run(
    args: &Args,
    orchestrator: &Arc<Orchestrator>,
    interval: Duration,
) -> Result<Option<RunReport>, Box<dyn std::error::Error>> {
    let Some(mut handle) = orchestrator.start_run() else {
        return Ok(None);
    };
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            joined = &mut handle => return Ok(Some(joined??)),
            _ = ticker.tick() => {
                // Clear screen (ANSI escape code)
                print!("\x1B[2J\x1B[1;1H");
                println!("{}", render_snapshot(args, &orchestrator.snapshot()));
                std::io::stdout().flush()?;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let orchestrator = Arc::new(Orchestrator::new(args.config())?);

    for _ in 0..args.runs {
        let report = match args.watch {
            Some(ms) => watch_run(&args, &orchestrator, Duration::from_millis(ms.max(1))).await?,
            None => orchestrator.run().await?,
        };

        let Some(report) = report else {
            error!("a run was already in progress");
            continue;
        };
        if args.watch.is_some() {
            print!("\x1B[2J\x1B[1;1H");
        }
        println!("{}", render_report(&args, &report));

        if !report.snapshot.all_safe_exact() {
            error!(run = report.run, "a safe strategy missed the target");
        }
    }

    info!(runs = orchestrator.runs_completed(), "done");
    Ok(())
}
