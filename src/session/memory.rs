//! In-memory storage backend.

use crate::config::Config;
use crate::session::eviction::{EvictionPolicy, ExpiredFirst};
use crate::session::storage::{
    DEFAULT_HEALTHY_CAPACITY_RATIO, Lookup, SessionStorage, StorageStats,
};
use crate::session::types::Session;
use crate::utils::{GatewayError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct StorageState {
    sessions: HashMap<String, Session>,
    last_cleanup: Option<DateTime<Utc>>,
    cleanup_count: u64,
}

/// Capacity-bounded session map guarded by a single lock.
///
/// Every mutation, the cleanup sweep included, takes the write lock;
/// `list` and `get_stats` take the read lock so they see one consistent
/// snapshot.
pub struct InMemoryStorage {
    state: RwLock<StorageState>,
    max_sessions: usize,
    healthy_ratio: f64,
    policy: Box<dyn EvictionPolicy>,
}

impl InMemoryStorage {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            state: RwLock::new(StorageState::default()),
            max_sessions,
            healthy_ratio: DEFAULT_HEALTHY_CAPACITY_RATIO,
            policy: Box::new(ExpiredFirst),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_sessions).with_healthy_ratio(config.healthy_capacity_ratio)
    }

    pub fn with_healthy_ratio(mut self, ratio: f64) -> Self {
        self.healthy_ratio = ratio;
        self
    }

    pub fn with_policy(mut self, policy: impl EvictionPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Number of stored sessions, expired ones included
    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    /// Frees one slot if inserting `incoming` would exceed capacity.
    fn evict_for(&self, state: &mut StorageState, incoming: &str, now: DateTime<Utc>) {
        if state.sessions.contains_key(incoming) || state.sessions.len() < self.max_sessions {
            return;
        }

        let Some(victim) = self.policy.select_victim(&state.sessions, now) else {
            return;
        };

        if let Some(evicted) = state.sessions.remove(&victim) {
            if evicted.is_expired_at(now) {
                info!(
                    session_id = %victim,
                    policy = self.policy.name(),
                    "Evicted expired session to free capacity"
                );
            } else {
                warn!(
                    session_id = %victim,
                    policy = self.policy.name(),
                    message_count = evicted.message_count(),
                    max_sessions = self.max_sessions,
                    "Storage full, evicted live session"
                );
            }
        }
    }
}

#[async_trait]
impl SessionStorage for InMemoryStorage {
    async fn store(&self, session: &Session) -> Result<()> {
        let now = Utc::now();
        let mut state = self.state.write().await;

        self.evict_for(&mut state, &session.session_id, now);
        state
            .sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn lookup(&self, session_id: &str) -> Result<Lookup> {
        {
            let state = self.state.read().await;
            match state.sessions.get(session_id) {
                None => return Ok(Lookup::Missing),
                Some(session) if !session.is_expired() => {
                    return Ok(Lookup::Live(session.clone()));
                }
                Some(_) => {}
            }
        }

        // Expired: upgrade to a write lock and re-check, the entry may have
        // been replaced in between
        let now = Utc::now();
        let mut state = self.state.write().await;
        let expired = state
            .sessions
            .get(session_id)
            .is_some_and(|s| s.is_expired_at(now));
        if expired {
            state.sessions.remove(session_id);
            debug!(session_id = %session_id, "Removed expired session on access");
            return Ok(Lookup::Expired);
        }

        Ok(match state.sessions.get(session_id) {
            Some(session) => Lookup::Live(session.clone()),
            None => Lookup::Missing,
        })
    }

    async fn update(&self, session: &Session) -> Result<()> {
        let mut state = self.state.write().await;

        match state.sessions.get_mut(&session.session_id) {
            Some(stored) => {
                *stored = session.clone();
                Ok(())
            }
            None => Err(GatewayError::session_not_found(&session.session_id)),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if state.sessions.remove(session_id).is_some() {
            debug!(session_id = %session_id, "Deleted session");
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Session>> {
        let now = Utc::now();
        let state = self.state.read().await;
        Ok(state
            .sessions
            .values()
            .filter(|s| !s.is_expired_at(now))
            .cloned()
            .collect())
    }

    async fn cleanup(&self) -> Result<usize> {
        let now = Utc::now();
        let mut state = self.state.write().await;

        let before = state.sessions.len();
        state.sessions.retain(|_, s| !s.is_expired_at(now));
        let removed = before - state.sessions.len();

        state.last_cleanup = Some(now);
        state.cleanup_count += 1;
        Ok(removed)
    }

    async fn get_stats(&self) -> Result<StorageStats> {
        let now = Utc::now();
        let state = self.state.read().await;

        let expired_sessions = state
            .sessions
            .values()
            .filter(|s| s.is_expired_at(now))
            .count();
        let total_messages = state.sessions.values().map(Session::message_count).sum();
        let estimated_memory_bytes = state.sessions.values().map(Session::estimated_size).sum();
        let oldest_session_age_secs = state
            .sessions
            .values()
            .map(Session::created_at)
            .min()
            .map(|created| (now - created).num_seconds());

        Ok(StorageStats {
            total_sessions: state.sessions.len(),
            active_sessions: state.sessions.len() - expired_sessions,
            expired_sessions,
            total_messages,
            estimated_memory_bytes,
            oldest_session_age_secs,
            last_cleanup: state.last_cleanup,
            cleanup_count: state.cleanup_count,
            max_sessions: self.max_sessions,
        })
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;
        let cleared = state.sessions.len();
        state.sessions.clear();
        debug!(cleared = cleared, "Cleared session storage");
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        let count = self.session_count().await;
        (count as f64) < self.max_sessions as f64 * self.healthy_ratio
    }

    fn name(&self) -> &str {
        "memory"
    }
}
