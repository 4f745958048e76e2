use crate::config::Config;
use crate::session::cleanup::{Cleanup, CleanupResult, CleanupTask};
use crate::session::memory::InMemoryStorage;
use crate::session::storage::{Lookup, SessionStorage, StorageStats};
use crate::session::types::{Message, Session, SessionLimits};
use crate::utils::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Aggregate view over every stored session, expired ones included until
/// the next sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    #[serde(flatten)]
    pub storage: StorageStats,
    pub average_messages_per_session: f64,
    pub healthy: bool,
}

/// Turns independent chat calls into conversations.
///
/// Construct one per process and share it behind an `Arc`. Call
/// [`SessionManager::shutdown`] before dropping it to stop the sweep.
pub struct SessionManager {
    storage: Arc<dyn SessionStorage>,
    limits: SessionLimits,
    healthy_ratio: f64,
    cleanup_interval: Duration,
    /// Serializes read-modify-write sequences across storage calls
    write_lock: Mutex<()>,
    cleanup_task: Mutex<Option<CleanupTask>>,
}

impl SessionManager {
    /// Creates a manager over in-memory storage sized from `config`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if `config` fails validation.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        Self::with_storage(config, Arc::new(InMemoryStorage::from_config(config)))
    }

    pub fn with_storage(config: &Config, storage: Arc<dyn SessionStorage>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            storage,
            limits: config.limits(),
            healthy_ratio: config.healthy_capacity_ratio,
            cleanup_interval: config.cleanup_interval(),
            write_lock: Mutex::new(()),
            cleanup_task: Mutex::new(None),
        })
    }

    /// Overrides the sweep period taken from configuration
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn storage(&self) -> Arc<dyn SessionStorage> {
        Arc::clone(&self.storage)
    }

    /// Looks up a live session, or builds a fresh one. Caller holds
    /// `write_lock` and writes the result back.
    async fn resolve(&self, session_id: &str) -> Result<Session> {
        match self.storage.lookup(session_id).await? {
            Lookup::Live(mut session) => {
                session.touch();
                debug!(session_id = %session_id, "Reusing session");
                Ok(session)
            }
            Lookup::Expired => {
                info!(session_id = %session_id, "Session expired, recreated empty");
                Ok(Session::new(session_id, self.limits))
            }
            Lookup::Missing => {
                info!(session_id = %session_id, "Created session");
                Ok(Session::new(session_id, self.limits))
            }
        }
    }

    /// Gets a live session, renewing its TTL, or creates a new one.
    ///
    /// An expired session is never revived: its id gets a new, empty
    /// session with fresh timestamps.
    pub async fn get_or_create_session(&self, session_id: &str) -> Result<Session> {
        let _guard = self.write_lock.lock().await;

        let session = self.resolve(session_id).await?;
        self.storage.store(&session).await?;
        Ok(session)
    }

    /// Appends `batch` to the session and returns its full history.
    ///
    /// Without a session id the call is stateless: `batch` comes back as is
    /// and storage is not touched.
    pub async fn process_messages(
        &self,
        batch: Vec<Message>,
        session_id: Option<&str>,
    ) -> Result<(Vec<Message>, Option<String>)> {
        let Some(session_id) = session_id else {
            return Ok((batch, None));
        };

        let _guard = self.write_lock.lock().await;

        let mut session = self.resolve(session_id).await?;
        let added = batch.len();
        session.add_messages(batch);
        self.storage.store(&session).await?;

        debug!(
            session_id = %session_id,
            added = added,
            total = session.message_count(),
            "Appended messages to session"
        );

        Ok((session.get_all_messages(), Some(session_id.to_string())))
    }

    /// Appends the assistant's reply. A missing or expired session is not an
    /// error: the reply is dropped and the next request starts over.
    pub async fn add_assistant_response(&self, session_id: &str, message: Message) {
        let _guard = self.write_lock.lock().await;

        let mut session = match self.storage.get(session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                debug!(session_id = %session_id, "Session gone, dropping assistant response");
                return;
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to load session for assistant response");
                return;
            }
        };

        session.add_message(message);
        if let Err(e) = self.storage.update(&session).await {
            warn!(session_id = %session_id, error = %e, "Failed to store assistant response");
        }
    }

    /// Returns a live session without renewing it
    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        self.storage.get(session_id).await
    }

    /// Replaces a stored session.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` if the session is not stored.
    pub async fn update_session(&self, session: &Session) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.storage.update(session).await
    }

    /// Lists live sessions, most recently created first
    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        let mut sessions = self.storage.list().await?;
        sessions.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(sessions)
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.storage.delete(session_id).await
    }

    pub async fn get_session_stats(&self) -> Result<SessionStats> {
        let storage = self.storage.get_stats().await?;
        let healthy =
            (storage.total_sessions as f64) < storage.max_sessions as f64 * self.healthy_ratio;

        let average_messages_per_session = if storage.total_sessions == 0 {
            0.0
        } else {
            storage.total_messages as f64 / storage.total_sessions as f64
        };

        Ok(SessionStats {
            storage,
            average_messages_per_session,
            healthy,
        })
    }

    /// Runs one sweep immediately, outside the schedule
    pub async fn cleanup_expired(&self) -> Result<CleanupResult> {
        Cleanup::new(self.storage()).run().await
    }

    /// Starts the background sweep. Calling it again while running is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the cleanup interval is zero.
    pub async fn start_cleanup_task(&self) -> Result<()> {
        let mut slot = self.cleanup_task.lock().await;
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            debug!("Cleanup task already running");
            return Ok(());
        }

        let task = Cleanup::new(self.storage()).start_cleanup_task(self.cleanup_interval)?;
        *slot = Some(task);
        info!(
            interval_secs = self.cleanup_interval.as_secs(),
            "Session cleanup background task started"
        );
        Ok(())
    }

    pub async fn is_cleanup_running(&self) -> bool {
        self.cleanup_task
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stops the background sweep and waits for an in-flight sweep to
    /// finish. Safe to call more than once.
    pub async fn shutdown(&self) {
        let task = self.cleanup_task.lock().await.take();

        match task {
            Some(task) => {
                task.stop().await;
                info!("Session cleanup background task stopped");
            }
            None => debug!("Shutdown requested with no cleanup task running"),
        }
    }
}
