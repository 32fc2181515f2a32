//! # fieldlog
//!
//! Command-line front end for the field log outbox.
//!
//! ## Usage
//!
//! ```bash
//! # Record a visit (queued locally, sent right away if online)
//! fieldlog submit --station STN-042 --date 2024-05-03 --equipment ok
//!
//! # Push everything that is still queued
//! fieldlog flush
//!
//! # What is waiting?
//! fieldlog status
//! fieldlog list --status error
//!
//! # Keep syncing in the background until Ctrl+C
//! fieldlog run
//! ```

mod app;
mod display;

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fieldlog_core::{EquipmentStatus, LogSheet, RecordStatus};

use app::App;

/// Offline-first log sheet queue for field technicians
#[derive(Parser)]
#[command(name = "fieldlog")]
#[command(about = "Queue station-visit log sheets and sync them when online")]
#[command(version)]
struct Cli {
    /// Config file (default: platform config dir/sync.toml)
    #[arg(long, global = true, env = "FIELDLOG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue a log sheet and try to send it
    Submit(SubmitArgs),
    /// Send every queued record now
    Flush,
    /// Show connectivity and outbox counts
    Status,
    /// List outbox records, newest first
    List {
        /// Only records with this status (pending, synced, error)
        #[arg(long)]
        status: Option<RecordStatus>,

        /// Maximum records to show
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Delete synced records older than N days
    Prune {
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Run the sync agent in the foreground
    Run,
    /// Print the effective configuration
    Config,
}

#[derive(clap::Args)]
struct SubmitArgs {
    /// Station code, e.g. STN-042
    #[arg(long)]
    station: String,

    /// Visit date (YYYY-MM-DD)
    #[arg(long)]
    date: NaiveDate,

    /// Arrival time (RFC 3339)
    #[arg(long)]
    arrival: Option<DateTime<Utc>>,

    /// Departure time (RFC 3339)
    #[arg(long)]
    departure: Option<DateTime<Utc>>,

    #[arg(long)]
    weather: Option<String>,

    #[arg(long)]
    maintenance: Option<String>,

    /// ok, issue_found or repaired
    #[arg(long)]
    equipment: Option<EquipmentStatus>,

    #[arg(long)]
    notes: Option<String>,
}

impl From<SubmitArgs> for LogSheet {
    fn from(args: SubmitArgs) -> Self {
        LogSheet {
            station_code: args.station,
            visit_date: args.date,
            arrival_time: args.arrival,
            departure_time: args.departure,
            weather_conditions: args.weather,
            maintenance_performed: args.maintenance,
            equipment_status: args.equipment,
            notes: args.notes,
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,fieldlog=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        display::print_error(&e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config = cli.command {
        let config = app::load_config(cli.config)?;
        return display::print_config(&config);
    }

    let app = App::open(cli.config).await?;

    match cli.command {
        Commands::Submit(args) => app.submit(args.into()).await,
        Commands::Flush => app.flush().await,
        Commands::Status => app.status().await,
        Commands::List { status, limit } => app.list(status, limit).await,
        Commands::Prune { days } => app.prune(days).await,
        Commands::Run => app.run_agent().await,
        Commands::Config => Ok(()),
    }
}
