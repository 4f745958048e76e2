//! Session storage trait definitions.

use crate::session::types::Session;
use crate::utils::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default fraction of capacity below which storage reports healthy
pub const DEFAULT_HEALTHY_CAPACITY_RATIO: f64 = 0.9;

/// Storage backend for session state.
///
/// Implementations hold owned copies: nothing passed to `store`/`update`
/// or returned from `get`/`list` aliases the stored value.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Insert or overwrite a session, evicting one entry first if the
    /// backend is at capacity and `session` is new.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn store(&self, session: &Session) -> Result<()>;

    /// Look up a session by id. An expired entry is removed and reported
    /// as [`Lookup::Expired`].
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn lookup(&self, session_id: &str) -> Result<Lookup>;

    /// Get a live session by id. Expired entries are removed and reported
    /// as missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.lookup(session_id).await?.into_live())
    }

    /// Replace an existing session.
    ///
    /// # Errors
    ///
    /// Returns `SessionNotFound` if no session is stored under the id.
    async fn update(&self, session: &Session) -> Result<()>;

    /// Remove a session. Removing a missing id succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete(&self, session_id: &str) -> Result<()>;

    /// List all sessions that are not expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list(&self) -> Result<Vec<Session>>;

    /// Remove every expired session and return how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn cleanup(&self) -> Result<usize>;

    /// Compute statistics over the current contents, expired entries
    /// included.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get_stats(&self) -> Result<StorageStats>;

    /// Remove everything.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn clear(&self) -> Result<()>;

    /// True while the session count stays below the healthy share of
    /// capacity.
    async fn is_healthy(&self) -> bool;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Outcome of a single-id lookup
#[derive(Debug, Clone)]
pub enum Lookup {
    Live(Session),
    /// The entry had expired and was removed by this lookup
    Expired,
    Missing,
}

impl Lookup {
    pub fn into_live(self) -> Option<Session> {
        match self {
            Lookup::Live(session) => Some(session),
            Lookup::Expired | Lookup::Missing => None,
        }
    }
}

/// Point-in-time statistics for a storage backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageStats {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub expired_sessions: usize,
    pub total_messages: usize,
    pub estimated_memory_bytes: usize,
    /// Age of the oldest stored session, `None` when empty
    pub oldest_session_age_secs: Option<i64>,
    pub last_cleanup: Option<DateTime<Utc>>,
    pub cleanup_count: u64,
    pub max_sessions: usize,
}
