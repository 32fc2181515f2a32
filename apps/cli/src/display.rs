//! Terminal output.

use fieldlog_core::{QueuedRecord, StatusCounts};
use fieldlog_sync::{Connectivity, FlushOutcome, FlushReport, SyncConfig};

pub fn print_error(error: &anyhow::Error) {
    eprintln!("error: {:#}", error);
}

pub fn print_report(report: &FlushReport) {
    match &report.outcome {
        FlushOutcome::Idle => println!("Nothing to send"),
        FlushOutcome::Delivered => println!("Sent {} record(s)", report.synced),
        FlushOutcome::Partial => println!(
            "Sent {} of {} record(s), {} rejected, {} still queued",
            report.synced,
            report.attempted,
            report.rejected,
            report.remaining()
        ),
        FlushOutcome::Failed { reason, retryable } => println!(
            "Sent {} of {} record(s); stopped: {}{}",
            report.synced,
            report.attempted,
            reason,
            if *retryable { " (will retry)" } else { "" }
        ),
    }
}

pub fn print_status(connectivity: Connectivity, counts: &StatusCounts, config: &SyncConfig) {
    println!("Device:        {} ({})", config.device.name, config.device_id());
    println!("Acceptor:      {}", config.acceptor.url);
    println!("Connectivity:  {}", connectivity);
    println!("Pending:       {}", counts.pending);
    println!("Error:         {}", counts.error);
    println!("Synced:        {}", counts.synced);
}

pub fn print_records(records: &[QueuedRecord]) {
    if records.is_empty() {
        println!("No records");
        return;
    }

    println!(
        "{:<36}  {:<8}  {:<12}  {:<10}  {:>3}  {}",
        "ID", "STATUS", "STATION", "VISIT", "TRY", "LAST ERROR"
    );
    for r in records {
        println!(
            "{:<36}  {:<8}  {:<12}  {:<10}  {:>3}  {}",
            r.id.as_str(),
            r.status.as_str(),
            r.payload.station_code,
            r.payload.visit_date.to_string(),
            r.attempts,
            r.last_error.as_deref().unwrap_or("")
        );
    }
}

/// Prints the config as TOML with the auth token masked.
pub fn print_config(config: &SyncConfig) -> anyhow::Result<()> {
    let mut shown = config.clone();
    if shown.acceptor.auth_token.is_some() {
        shown.acceptor.auth_token = Some("********".to_string());
    }
    print!("{}", toml::to_string_pretty(&shown)?);
    if let Some(path) = SyncConfig::default_config_path() {
        println!("# default config path: {}", path.display());
    }
    println!("# outbox database: {}", config.database_path().display());
    Ok(())
}
