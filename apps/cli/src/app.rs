//! Wiring between the command line and the sync crates.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use fieldlog_core::{LogSheet, RecordStatus};
use fieldlog_db::{Database, DbConfig};
use fieldlog_sync::{
    ConnectivityMonitor, HttpAcceptor, ReachabilityProbe, SubmitOutcome, Submitter, SyncAgent,
    SyncConfig, SyncEngine, TcpProbe,
};

use crate::display;

/// Loads the config, writing a fresh one (with a new device id) on first
/// run so the id stays stable across invocations.
pub fn load_config(path: Option<PathBuf>) -> anyhow::Result<SyncConfig> {
    if let Some(path) = path.clone().or_else(SyncConfig::default_config_path) {
        if !path.exists() {
            SyncConfig::new()
                .save(Some(path.clone()))
                .with_context(|| format!("writing initial config to {}", path.display()))?;
        }
    }

    SyncConfig::load(path).context("loading sync config")
}

/// Everything a command needs, opened once.
pub struct App {
    config: SyncConfig,
    db: Database,
    engine: Arc<SyncEngine>,
    monitor: Arc<ConnectivityMonitor>,
    probe: Arc<TcpProbe>,
}

impl App {
    pub async fn open(config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config = load_config(config_path)?;

        let db_path = config.database_path();
        let db = Database::new(DbConfig::new(&db_path))
            .await
            .with_context(|| format!("opening outbox at {}", db_path.display()))?;

        let acceptor = Arc::new(HttpAcceptor::new(&config)?);
        let engine = Arc::new(SyncEngine::new(
            db.clone(),
            acceptor,
            config.sync.batch_size,
        ));
        let probe = Arc::new(TcpProbe::new(config.probe_target()?, config.probe_timeout()));

        Ok(App {
            config,
            db,
            engine,
            monitor: Arc::new(ConnectivityMonitor::new()),
            probe,
        })
    }

    /// One probe, so one-shot commands know whether to try the network.
    async fn observe_connectivity(&self) {
        let online = self.probe.probe().await;
        self.monitor.report(online);
    }

    pub async fn submit(&self, sheet: LogSheet) -> anyhow::Result<()> {
        self.observe_connectivity().await;

        let submitter = Submitter::new(
            self.db.clone(),
            self.engine.clone(),
            self.monitor.clone(),
            self.config.sync.optimistic_send,
        );

        match submitter.submit(sheet).await? {
            SubmitOutcome::Delivered { id } => println!("Delivered {}", id),
            SubmitOutcome::Queued { id, reason } => match reason {
                Some(reason) => println!("Queued {} ({})", id, reason),
                None => println!("Queued {}", id),
            },
        }
        Ok(())
    }

    pub async fn flush(&self) -> anyhow::Result<()> {
        let report = self.engine.flush().await;
        display::print_report(&report);
        if let Some(reason) = report.error() {
            anyhow::bail!("flush failed: {}", reason);
        }
        Ok(())
    }

    pub async fn status(&self) -> anyhow::Result<()> {
        self.observe_connectivity().await;
        let counts = self.db.outbox().count_by_status().await?;
        display::print_status(self.monitor.state(), &counts, &self.config);
        Ok(())
    }

    pub async fn list(&self, status: Option<RecordStatus>, limit: u32) -> anyhow::Result<()> {
        let outbox = self.db.outbox();
        let mut records = match status {
            Some(status) => {
                let mut records = outbox.list_by_status(status).await?;
                records.reverse();
                records
            }
            None => outbox.list_recent(limit).await?,
        };
        records.truncate(limit as usize);
        display::print_records(&records);
        Ok(())
    }

    pub async fn prune(&self, days: u32) -> anyhow::Result<()> {
        let removed = self.db.outbox().prune_synced(days).await?;
        println!("Removed {} synced record(s) older than {} day(s)", removed, days);
        Ok(())
    }

    /// Runs the agent until Ctrl+C.
    pub async fn run_agent(self) -> anyhow::Result<()> {
        let (agent, handle) = SyncAgent::new(
            &self.config,
            self.engine.clone(),
            self.monitor.clone(),
            self.probe.clone(),
        );
        let task = tokio::spawn(agent.run());

        info!(
            device_id = %self.config.device_id(),
            acceptor = %self.config.acceptor.url,
            "Sync agent running, press Ctrl+C to stop"
        );

        tokio::signal::ctrl_c()
            .await
            .context("waiting for Ctrl+C")?;

        handle.shutdown().await;
        task.await.context("sync agent task")?;

        let status = handle.status().await;
        display::print_status(status.connectivity, &status.counts, &self.config);
        self.db.close().await;
        Ok(())
    }
}
