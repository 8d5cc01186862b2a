use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use ess_analytics::{export, DashboardSnapshot, SessionFilter};
use ess_core::{normalize_all, SessionRow};
use ess_store::{resolve_config, SessionStore, StoreError};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ess")]
#[command(about = "Ecommerce Session Scope CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FilterArgs {
    /// Start of the date range (inclusive), e.g. 2026-03-01
    #[arg(long)]
    from: Option<NaiveDate>,
    /// End of the date range (inclusive)
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Allowed device value; repeat for several. Defaults to every observed device
    #[arg(long = "device")]
    devices: Vec<String>,
    /// Allowed session type; repeat for several. Defaults to every observed type
    #[arg(long = "session-type")]
    session_types: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the metric summary for the filtered view
    Metrics {
        #[command(flatten)]
        filter: FilterArgs,
        /// Emit the full snapshot (metrics and chart series) as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export the filtered view as CSV
    Export {
        #[command(flatten)]
        filter: FilterArgs,
        /// Output path
        #[arg(long, default_value = "session_export.csv")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Metrics { filter, json } => {
            let rows = load_rows().await?;
            let view = build_filter(&rows, &filter).apply(&rows);
            let snapshot = DashboardSnapshot::build(&view);
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!("{} of {} sessions in view", view.len(), rows.len());
                for metric in &snapshot.metrics {
                    println!("{:<22} {}", metric.label, metric.formatted);
                }
            }
        }
        Commands::Export { filter, out } => {
            let rows = load_rows().await?;
            let view = build_filter(&rows, &filter).apply(&rows);
            export::write_csv_file(&view, &out)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("exported {} rows to {}", view.len(), out.display());
        }
    }

    Ok(())
}

async fn load_rows() -> Result<Vec<SessionRow>> {
    let config = resolve_config().map_err(with_remediation)?;
    let store = SessionStore::connect(&config)
        .await
        .map_err(with_remediation)?;
    let records = store.fetch_all().await.map_err(with_remediation)?;
    Ok(normalize_all(&records))
}

fn with_remediation(err: StoreError) -> anyhow::Error {
    let remediation = err.remediation_text();
    anyhow::anyhow!("{err}\n\n{remediation}")
}

/// Start from the permissive filter and tighten it with whatever flags were
/// given; an explicitly empty set cannot be expressed from the CLI, matching
/// the dashboard's select-all default.
fn build_filter(rows: &[SessionRow], args: &FilterArgs) -> SessionFilter {
    let mut filter = SessionFilter::permissive(rows);
    if let Some(from) = args.from {
        filter.start_date = from;
    }
    if let Some(to) = args.to {
        filter.end_date = to;
    }
    if !args.devices.is_empty() {
        filter.devices = args.devices.iter().cloned().collect();
    }
    if !args.session_types.is_empty() {
        filter.session_types = args.session_types.iter().cloned().collect();
    }
    filter
}
