use crate::config::schema::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[cfg(test)]
use std::sync::Mutex;

#[cfg(test)]
static CONFIG_TEST_ENV_LOCK: Mutex<()> = Mutex::new(());

pub const ENV_DEFAULT_TTL_HOURS: &str = "DEFAULT_TTL_HOURS";
pub const ENV_CLEANUP_INTERVAL_MINUTES: &str = "CLEANUP_INTERVAL_MINUTES";
pub const ENV_MAX_SESSIONS: &str = "MAX_SESSIONS";
pub const ENV_MAX_MESSAGE_HISTORY: &str = "MAX_MESSAGE_HISTORY";
pub const ENV_TRACK_ACCESS_COUNT: &str = "TRACK_ACCESS_COUNT";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file contains invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),
}

pub fn load_config(cli_config_path: Option<PathBuf>) -> Result<Config> {
    tracing::debug!("Loading configuration");

    let mut config = Config::default();

    // Layer 1: config file (~/.cligate/config.json unless overridden)
    let config_file = cli_config_path.or_else(get_default_config_path);

    if let Some(ref path) = config_file {
        if path.exists() {
            tracing::debug!(config_path = %path.display(), "Loading configuration from file");
            config = read_config_file(path)?;
        } else {
            tracing::debug!(config_path = %path.display(), "Config file not found, using defaults");
        }
    }

    // Layer 2: environment variables override
    tracing::debug!("Applying environment variable overrides");
    config = merge_env_variables(config);

    config
        .validate()
        .context("Configuration failed validation")?;

    tracing::debug!(
        default_ttl_hours = config.default_ttl_hours,
        cleanup_interval_minutes = config.cleanup_interval_minutes,
        max_sessions = config.max_sessions,
        max_message_history = config.max_message_history,
        "Configuration loaded successfully"
    );

    Ok(config)
}

fn get_default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".cligate").join("config.json"))
}

fn read_config_file(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .map_err(ConfigError::IoError)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = serde_json::from_str(&content)
        .map_err(ConfigError::InvalidJson)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

fn merge_env_variables(config: Config) -> Config {
    Config {
        default_ttl_hours: env_override(ENV_DEFAULT_TTL_HOURS, config.default_ttl_hours),
        cleanup_interval_minutes: env_override(
            ENV_CLEANUP_INTERVAL_MINUTES,
            config.cleanup_interval_minutes,
        ),
        max_sessions: env_override(ENV_MAX_SESSIONS, config.max_sessions),
        max_message_history: env_override(ENV_MAX_MESSAGE_HISTORY, config.max_message_history),
        healthy_capacity_ratio: config.healthy_capacity_ratio,
        track_access_count: env_override(ENV_TRACK_ACCESS_COUNT, config.track_access_count),
    }
}

/// Returns the parsed value of `key`, or `current` if unset, empty or
/// unparseable.
fn env_override<T: FromStr>(key: &str, current: T) -> T {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse() {
            Ok(value) => {
                tracing::debug!(key = key, "Applied environment override");
                value
            }
            Err(_) => {
                tracing::warn!(key = key, value = %raw, "Ignoring unparseable environment override");
                current
            }
        },
        _ => current,
    }
}

pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json).with_context(|| format!("Failed to write config file: {:?}", path))?;

    tracing::info!("Configuration saved to {:?}", path);
    Ok(())
}

pub fn get_config_path() -> Option<PathBuf> {
    get_default_config_path()
}
