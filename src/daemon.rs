//! Daemon host for the session engine
//!
//! Runs a [`SessionManager`] with its background sweep, periodically logs
//! session and process memory statistics, and shuts the sweep down cleanly
//! on SIGTERM/SIGINT.

use crate::config::Config;
use crate::session::SessionManager;
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Process memory above which each stats report logs a warning
pub const MEMORY_WARNING_THRESHOLD_MB: u64 = 200;

/// Runs the engine until SIGTERM or SIGINT.
pub async fn run_daemon(config: &Config, stats_interval: Duration) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting cligate session daemon"
    );

    let manager = Arc::new(SessionManager::new(config)?);
    info!(
        default_ttl_hours = config.default_ttl_hours,
        max_sessions = config.max_sessions,
        max_message_history = config.max_message_history,
        "SessionManager initialized"
    );

    run_until(manager, stats_interval, shutdown_signal()).await
}

/// Runs the engine until `shutdown` resolves, then stops the background
/// tasks in order.
pub async fn run_until(
    manager: Arc<SessionManager>,
    stats_interval: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    manager.start_cleanup_task().await?;

    let (stats_shutdown_tx, stats_shutdown_rx) = mpsc::channel::<()>(1);
    let stats_handle = tokio::spawn(report_stats(
        Arc::clone(&manager),
        stats_interval,
        stats_shutdown_rx,
    ));

    info!("Session daemon is running. Press Ctrl+C to stop.");
    shutdown.await;

    info!("Starting graceful shutdown sequence...");

    let _ = stats_shutdown_tx.send(()).await;
    if let Err(e) = stats_handle.await {
        error!("Stats reporter panicked: {}", e);
    }

    manager.shutdown().await;

    match manager.get_session_stats().await {
        Ok(stats) => info!(
            sessions_dropped = stats.storage.total_sessions,
            "Session daemon stopped, in-memory sessions discarded"
        ),
        Err(e) => warn!("Failed to read final session stats: {}", e),
    }

    Ok(())
}

async fn report_stats(
    manager: Arc<SessionManager>,
    period: Duration,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    use sysinfo::{System, get_current_pid};

    let mut system = System::new();
    let current_pid = match get_current_pid() {
        Ok(pid) => Some(pid),
        Err(e) => {
            warn!("Failed to get current PID, memory reporting disabled: {}", e);
            None
        }
    };

    let start = tokio::time::Instant::now() + period;
    let mut interval = tokio::time::interval_at(start, period);

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.recv() => {
                debug!("Stats reporter received shutdown signal");
                break;
            }
            _ = interval.tick() => {
                match manager.get_session_stats().await {
                    Ok(stats) => info!(
                        total = stats.storage.total_sessions,
                        active = stats.storage.active_sessions,
                        expired = stats.storage.expired_sessions,
                        messages = stats.storage.total_messages,
                        estimated_bytes = stats.storage.estimated_memory_bytes,
                        cleanups = stats.storage.cleanup_count,
                        healthy = stats.healthy,
                        "Session stats"
                    ),
                    Err(e) => warn!("Failed to collect session stats: {}", e),
                }

                if let Some(pid) = current_pid {
                    system.refresh_all();
                    if let Some(process) = system.process(pid) {
                        let memory_mb = process.memory() / (1024 * 1024);
                        if memory_mb > MEMORY_WARNING_THRESHOLD_MB {
                            warn!(memory_mb = memory_mb, threshold_mb = MEMORY_WARNING_THRESHOLD_MB, "Memory usage exceeds threshold");
                        } else {
                            debug!(memory_mb = memory_mb, "Current memory usage");
                        }
                    }
                }
            }
        }
    }
}

/// Resolves on the first SIGTERM or SIGINT
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    error!("Failed to install signal handlers: {}", e);
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown..."),
            _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown..."),
        }
    }
    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown..."),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    }
}
