//! # Field Log Acceptor
//!
//! HTTP server that stores log sheet batches from field devices.
//!
//! ```text
//!   device ───► HTTP (8080) ───► logsheets service ───► SQLite
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fieldlog_acceptor::{router, AcceptorConfig, AppState, Database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,fieldlog_acceptor=debug,sqlx=warn")),
        )
        .with_target(true)
        .init();

    info!("Starting Field Log acceptor...");

    // Load configuration
    let config = AcceptorConfig::load()?;
    info!(
        addr = %config.bind_addr,
        database = %config.database_path.display(),
        auth = config.auth_token.is_some(),
        "Configuration loaded"
    );

    // Open database
    let db = Database::connect(&config.database_path).await?;
    db.run_migrations().await?;
    info!("Database migrations complete");

    let addr = config.bind_addr;
    let state = Arc::new(AppState { db, config });

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(%addr, "Acceptor listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(?e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
