//! Session cleanup module for TTL-based session expiration
//!
//! Expired sessions are dropped lazily when a read finds them, and actively
//! by a periodic sweep so that idle conversations do not pin memory until
//! somebody asks for them again.

use crate::session::storage::SessionStorage;
use crate::utils::{GatewayError, Result};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Runs expiry sweeps against a storage backend
pub struct Cleanup {
    storage: Arc<dyn SessionStorage>,
}

impl Cleanup {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    /// Runs one sweep and logs the result
    pub async fn run(&self) -> Result<CleanupResult> {
        let started = Instant::now();
        let sessions_removed = self.storage.cleanup().await?;
        let duration = started.elapsed();

        if sessions_removed > 0 {
            info!(
                backend = self.storage.name(),
                cleaned = sessions_removed,
                duration_ms = duration.as_millis() as u64,
                "Session cleanup complete"
            );
        } else {
            debug!(
                backend = self.storage.name(),
                duration_ms = duration.as_millis() as u64,
                "Session cleanup found nothing to remove"
            );
        }

        if !self.storage.is_healthy().await {
            warn!(
                backend = self.storage.name(),
                "Session storage is near capacity after cleanup"
            );
        }

        Ok(CleanupResult {
            sessions_removed,
            duration,
        })
    }

    /// Starts the periodic sweep on its own task.
    ///
    /// The first sweep runs one `period` after start. A failing or panicking
    /// sweep is logged and the next tick still runs.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `period` is zero.
    pub fn start_cleanup_task(self, period: Duration) -> Result<CleanupTask> {
        if period.is_zero() {
            return Err(GatewayError::invalid_input(
                "cleanup interval must be greater than zero",
            ));
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    // Also fires when the sender is dropped
                    _ = shutdown_rx.recv() => {
                        info!("Cleanup task received shutdown signal, stopping");
                        break;
                    }
                    _ = interval.tick() => {
                        match AssertUnwindSafe(self.run()).catch_unwind().await {
                            Ok(Ok(_)) => {}
                            Ok(Err(e)) => log_sweep_failure(&e),
                            Err(_) => error!("Session cleanup panicked, retrying on next tick"),
                        }
                    }
                }
            }
        });

        Ok(CleanupTask {
            handle,
            shutdown_tx,
        })
    }
}

fn log_sweep_failure(err: &GatewayError) {
    let level = err.severity();
    if level == tracing::Level::ERROR {
        error!(error = %err, "Session cleanup failed");
    } else if level == tracing::Level::WARN {
        warn!(error = %err, "Session cleanup failed");
    } else {
        info!(error = %err, "Session cleanup failed");
    }
}

/// Result of a cleanup sweep
#[derive(Debug, Clone, Copy)]
pub struct CleanupResult {
    pub sessions_removed: usize,
    pub duration: Duration,
}

/// Handle to a running cleanup task
#[derive(Debug)]
pub struct CleanupTask {
    handle: JoinHandle<()>,
    shutdown_tx: mpsc::Sender<()>,
}

impl CleanupTask {
    /// Signals the task and waits for it, including any sweep in flight
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;

        if let Err(e) = self.handle.await {
            error!("Cleanup task panicked: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::memory::InMemoryStorage;
    use crate::session::storage::{Lookup, StorageStats};
    use crate::session::types::{Session, SessionLimits};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn expired(id: &str) -> Session {
        let mut session = Session::new(id, SessionLimits::default());
        session.touch_at(Utc::now() - chrono::Duration::hours(2));
        session
    }

    /// Panics on the first sweep, errors on the second, then delegates
    struct FlakyStorage {
        inner: InMemoryStorage,
        sweeps: AtomicUsize,
    }

    #[async_trait]
    impl SessionStorage for FlakyStorage {
        async fn store(&self, session: &Session) -> Result<()> {
            self.inner.store(session).await
        }

        async fn lookup(&self, session_id: &str) -> Result<Lookup> {
            self.inner.lookup(session_id).await
        }

        async fn update(&self, session: &Session) -> Result<()> {
            self.inner.update(session).await
        }

        async fn delete(&self, session_id: &str) -> Result<()> {
            self.inner.delete(session_id).await
        }

        async fn list(&self) -> Result<Vec<Session>> {
            self.inner.list().await
        }

        async fn cleanup(&self) -> Result<usize> {
            match self.sweeps.fetch_add(1, Ordering::SeqCst) {
                0 => panic!("sweep exploded"),
                1 => Err(GatewayError::storage("flaky", "transient failure")),
                _ => self.inner.cleanup().await,
            }
        }

        async fn get_stats(&self) -> Result<StorageStats> {
            self.inner.get_stats().await
        }

        async fn clear(&self) -> Result<()> {
            self.inner.clear().await
        }

        async fn is_healthy(&self) -> bool {
            self.inner.is_healthy().await
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_run_cleanup() {
        let storage = Arc::new(InMemoryStorage::new(10));
        storage.store(&expired("old")).await.unwrap();
        storage
            .store(&Session::new("new", SessionLimits::default()))
            .await
            .unwrap();

        let cleanup = Cleanup::new(storage.clone());
        let result = cleanup.run().await.unwrap();

        assert_eq!(result.sessions_removed, 1);
        assert_eq!(storage.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_run_cleanup_no_expired() {
        let storage = Arc::new(InMemoryStorage::new(10));
        for i in 0..5 {
            storage
                .store(&Session::new(format!("s{}", i), SessionLimits::default()))
                .await
                .unwrap();
        }

        let result = Cleanup::new(storage.clone()).run().await.unwrap();

        assert_eq!(result.sessions_removed, 0);
        assert_eq!(storage.session_count().await, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_task_sweeps_periodically() {
        let storage = Arc::new(InMemoryStorage::new(10));
        storage.store(&expired("old")).await.unwrap();

        let task = Cleanup::new(storage.clone())
            .start_cleanup_task(Duration::from_secs(60))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(150)).await;
        task.stop().await;

        assert_eq!(storage.session_count().await, 0);
        assert_eq!(storage.get_stats().await.unwrap().cleanup_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_sweep_waits_one_period() {
        let storage = Arc::new(InMemoryStorage::new(10));
        storage.store(&expired("old")).await.unwrap();

        let task = Cleanup::new(storage.clone())
            .start_cleanup_task(Duration::from_secs(60))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(59)).await;
        task.stop().await;

        assert_eq!(storage.get_stats().await.unwrap().cleanup_count, 0);
        assert_eq!(storage.session_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_survives_failing_sweeps() {
        let storage = Arc::new(FlakyStorage {
            inner: InMemoryStorage::new(10),
            sweeps: AtomicUsize::new(0),
        });
        storage.store(&expired("old")).await.unwrap();

        let task = Cleanup::new(storage.clone())
            .start_cleanup_task(Duration::from_secs(10))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(35)).await;
        assert!(!task.is_finished());
        task.stop().await;

        assert_eq!(storage.sweeps.load(Ordering::SeqCst), 3);
        assert_eq!(storage.inner.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_zero_period_is_rejected() {
        let storage = Arc::new(InMemoryStorage::new(10));

        let err = Cleanup::new(storage)
            .start_cleanup_task(Duration::ZERO)
            .unwrap_err();

        assert!(matches!(err, GatewayError::InvalidInput { .. }));
    }

    /// Sweep that parks until released, then records that it finished
    struct SlowSweepStorage {
        inner: InMemoryStorage,
        started: Notify,
        finished: AtomicBool,
    }

    #[async_trait]
    impl SessionStorage for SlowSweepStorage {
        async fn store(&self, session: &Session) -> Result<()> {
            self.inner.store(session).await
        }

        async fn lookup(&self, session_id: &str) -> Result<Lookup> {
            self.inner.lookup(session_id).await
        }

        async fn update(&self, session: &Session) -> Result<()> {
            self.inner.update(session).await
        }

        async fn delete(&self, session_id: &str) -> Result<()> {
            self.inner.delete(session_id).await
        }

        async fn list(&self) -> Result<Vec<Session>> {
            self.inner.list().await
        }

        async fn cleanup(&self) -> Result<usize> {
            self.started.notify_one();
            tokio::time::sleep(Duration::from_secs(5)).await;
            let removed = self.inner.cleanup().await?;
            self.finished.store(true, Ordering::SeqCst);
            Ok(removed)
        }

        async fn get_stats(&self) -> Result<StorageStats> {
            self.inner.get_stats().await
        }

        async fn clear(&self) -> Result<()> {
            self.inner.clear().await
        }

        async fn is_healthy(&self) -> bool {
            self.inner.is_healthy().await
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_in_flight_sweep() {
        let storage = Arc::new(SlowSweepStorage {
            inner: InMemoryStorage::new(10),
            started: Notify::new(),
            finished: AtomicBool::new(false),
        });
        storage.store(&expired("old")).await.unwrap();

        let task = Cleanup::new(storage.clone())
            .start_cleanup_task(Duration::from_secs(1))
            .unwrap();
        storage.started.notified().await;
        assert!(!storage.finished.load(Ordering::SeqCst));

        task.stop().await;

        assert!(storage.finished.load(Ordering::SeqCst));
        assert_eq!(storage.inner.session_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_finishes_task() {
        let storage = Arc::new(InMemoryStorage::new(10));
        let task = Cleanup::new(storage)
            .start_cleanup_task(Duration::from_millis(10))
            .unwrap();

        tokio::time::timeout(Duration::from_secs(1), task.stop())
            .await
            .expect("stop should not hang");
    }
}
