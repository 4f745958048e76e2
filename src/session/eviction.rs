//! Capacity eviction for session storage
//!
//! Eviction only runs when a store would push the map past its capacity.
//! It is independent of TTL sweeps: the sweep removes every expired session,
//! eviction removes exactly one session to make room for a new one.

use crate::session::types::Session;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Decides which session to drop when storage is full
pub trait EvictionPolicy: Send + Sync {
    /// Picks the id to remove from `sessions`, or `None` if nothing should go
    fn select_victim(&self, sessions: &HashMap<String, Session>, now: DateTime<Utc>)
    -> Option<String>;

    /// Policy name for logging
    fn name(&self) -> &'static str;
}

/// Evicts the longest-expired session, falling back to the oldest live one.
///
/// Access recency is ignored on the fallback path: the session created first
/// goes, even if it was used a second ago.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExpiredFirst;

impl EvictionPolicy for ExpiredFirst {
    fn select_victim(
        &self,
        sessions: &HashMap<String, Session>,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let expired = sessions
            .values()
            .filter(|s| s.is_expired_at(now))
            .min_by_key(|s| (s.expires_at(), s.session_id.as_str()));

        expired
            .or_else(|| {
                sessions
                    .values()
                    .min_by_key(|s| (s.created_at(), s.session_id.as_str()))
            })
            .map(|s| s.session_id.clone())
    }

    fn name(&self) -> &'static str {
        "expired_first"
    }
}
