use chrono::{DateTime, Duration, Offset, Utc};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use envmon_dashboard::backend::models::{DeletionQueue, ManualEntry};
use envmon_dashboard::common::AppState;
use envmon_dashboard::config::Config;
use envmon_dashboard::insertion::ImportReport;
use envmon_dashboard::insertion::rows::parse_timestamp;
use envmon_dashboard::series::export::{format_timestamp, write_csv};
use envmon_dashboard::series::{ParameterId, ParameterKind};
use envmon_dashboard::services::dashboard;

#[derive(Debug, Parser)]
#[command(name = "envmon-dashboard", about = "Query and load environmental monitoring data")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List every parameter the backend knows about
    Parameters,
    /// Print an aligned table as CSV
    Table {
        #[command(flatten)]
        range: RangeArgs,
        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print chart series as JSON
    Chart {
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Bulk-insert a CSV sheet (date, time, then one column per parameter)
    Import { file: PathBuf },
    /// Remove observations of one parameter
    Delete {
        #[arg(long)]
        param: String,
        #[arg(long = "time", value_parser = parse_time_arg, required = true)]
        times: Vec<i64>,
    },
    /// Insert a single value
    Input {
        #[arg(long)]
        param: String,
        #[arg(long, value_parser = parse_time_arg)]
        time: i64,
        #[arg(long)]
        value: f64,
    },
}

#[derive(Debug, clap::Args)]
struct RangeArgs {
    /// Parameter ids, in column order
    #[arg(long = "param", required = true)]
    params: Vec<i64>,
    /// Range start (epoch ms, RFC 3339 or "YYYY-MM-DD HH:MM"); defaults to a month before the end
    #[arg(long, value_parser = parse_time_arg)]
    start: Option<i64>,
    /// Range end; defaults to now
    #[arg(long, value_parser = parse_time_arg)]
    end: Option<i64>,
}

impl RangeArgs {
    fn resolve(&self) -> (i64, i64, Vec<ParameterId>) {
        let end = self.end.unwrap_or_else(|| Utc::now().timestamp_millis());
        let start = self
            .start
            .unwrap_or_else(|| end - Duration::days(30).num_milliseconds());
        let params = self.params.iter().copied().map(ParameterId).collect();
        (start, end, params)
    }
}

fn parse_time_arg(s: &str) -> Result<i64, String> {
    let s = s.trim();
    if let Ok(ms) = s.parse::<i64>() {
        return Ok(ms);
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.timestamp_millis());
    }
    let (date, time) = s.split_once(' ').unwrap_or((s, ""));
    parse_timestamp(date, time, Utc.fix()).ok_or_else(|| format!("unrecognized time '{s}'"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,envmon_dashboard=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    // Load configuration (fail-fast)
    let config = Config::from_env()?;
    tracing::info!(
        deployment = ?config.deployment,
        base_url = %config.base_url,
        timeout_secs = config.request_timeout_seconds,
        "Configuration loaded"
    );

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let state = AppState::connect(config, cancel).await?;

    match cli.command {
        Command::Parameters => print_parameters(&state),
        Command::Table { range, output } => {
            let (start, end, params) = range.resolve();
            let aligned = dashboard::fetch_series(&state, start, end, &params).await?;
            match output {
                Some(path) => write_csv(&aligned, File::create(path)?)?,
                None => write_csv(&aligned, io::stdout().lock())?,
            }
        }
        Command::Chart { range } => {
            let (start, end, params) = range.resolve();
            let aligned = dashboard::fetch_series(&state, start, end, &params).await?;
            let mut out = io::stdout().lock();
            serde_json::to_writer_pretty(&mut out, &aligned.chart_series())?;
            writeln!(out)?;
        }
        Command::Import { file } => {
            let reader = BufReader::new(File::open(&file)?);
            let report = dashboard::import_csv(&state, reader).await?;
            print_report(&report);
        }
        Command::Delete { param, times } => {
            let mut queue = DeletionQueue::new();
            for t in times {
                queue.queue(&param, t);
            }
            let removed = dashboard::delete_data(&state, queue).await?;
            println!("Removed {removed} value(s) of {param}");
        }
        Command::Input { param, time, value } => {
            let entry = ManualEntry {
                data_name: param,
                time,
                value,
            };
            dashboard::input_data(&state, &entry).await?;
            println!("Inserted {} = {} at {}", entry.data_name, entry.value, format_timestamp(time));
        }
    }

    Ok(())
}

fn print_parameters(state: &AppState) {
    for (kind, label) in [(ParameterKind::Sensor, "Sensor"), (ParameterKind::Manual, "Manual")] {
        println!("----- {label} Parameters -----");
        for d in state.catalog.of_kind(kind) {
            let unit = d.unit.as_deref().map(|u| format!(" ({u})")).unwrap_or_default();
            let description = d.description.as_deref().unwrap_or("");
            println!("{:>6}  {}{}  {}", d.id, d.name, unit, description);
        }
    }
}

fn print_report(report: &ImportReport) {
    println!(
        "Imported {} value(s) from {} row(s) in {} batch(es)",
        report.insertions, report.rows_read, report.batches_sent
    );
    for row in &report.rejected_rows {
        println!("  rejected row {}: {} [{}]", row.index, row.reason, row.raw);
    }
    for cell in &report.skipped_cells {
        println!("  skipped row {} {}: '{}' is not a number", cell.row, cell.parameter, cell.raw);
    }
}

/// Cancel in-flight requests on Ctrl+C or SIGTERM.
async fn cancel_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, cancelling...");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM, cancelling...");
        },
    }
    cancel.cancel();
}
