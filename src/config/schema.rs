use crate::session::types::SessionLimits;
use crate::utils::{GatewayError, Result};
use serde::{Deserialize, Serialize};

/// Longest accepted TTL (one year)
pub const MAX_TTL_HOURS: u64 = 24 * 365;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Idle time after which a session expires
    pub default_ttl_hours: u64,

    /// Period of the background sweep
    pub cleanup_interval_minutes: u64,

    /// Storage capacity; storing beyond it evicts one session
    pub max_sessions: usize,

    /// Per-session history limit; older messages are dropped first
    pub max_message_history: usize,

    /// Storage reports unhealthy at or above this share of `max_sessions`
    pub healthy_capacity_ratio: f64,

    pub track_access_count: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_ttl_hours: 1,
            cleanup_interval_minutes: 5,
            max_sessions: 1000,
            max_message_history: 100,
            healthy_capacity_ratio: 0.9,
            track_access_count: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.default_ttl_hours == 0 || self.default_ttl_hours > MAX_TTL_HOURS {
            return Err(GatewayError::config(format!(
                "default_ttl_hours must be between 1 and {}, got {}",
                MAX_TTL_HOURS, self.default_ttl_hours
            )));
        }
        if self.cleanup_interval_minutes == 0 {
            return Err(GatewayError::config(
                "cleanup_interval_minutes must be at least 1",
            ));
        }
        if self.max_sessions == 0 {
            return Err(GatewayError::config("max_sessions must be at least 1"));
        }
        if self.max_message_history == 0 {
            return Err(GatewayError::config(
                "max_message_history must be at least 1",
            ));
        }
        if !(self.healthy_capacity_ratio > 0.0 && self.healthy_capacity_ratio <= 1.0) {
            return Err(GatewayError::config(format!(
                "healthy_capacity_ratio must be in (0, 1], got {}",
                self.healthy_capacity_ratio
            )));
        }
        Ok(())
    }

    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.default_ttl_hours as i64)
    }

    pub fn cleanup_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.cleanup_interval_minutes * 60)
    }

    pub fn limits(&self) -> SessionLimits {
        SessionLimits {
            ttl: self.ttl(),
            max_messages: self.max_message_history,
            track_access_count: self.track_access_count,
        }
    }
}
