//! Client configuration loaded from environment variables.
//!
//! Every setting has a default, so a client with no environment runs fully
//! offline against an in-memory remote.

use std::path::PathBuf;
use std::time::Duration;

use valet_shared::constants::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_MAX_MS, DEFAULT_PUSH_MAX_ATTEMPTS,
    DEFAULT_RETRY_INTERVAL_SECS, DEFAULT_RETURN_HOLD_MS, DEFAULT_SYNC_TIMEOUT_MS,
};
use valet_sync::{Backoff, SyncConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the remote shift store.
    /// Env: `VALET_SERVER_URL`
    /// Default: none (in-memory remote, nothing leaves the device).
    pub server_url: Option<String>,

    /// Upper bound for a single push or code lookup.
    /// Env: `VALET_SYNC_TIMEOUT_MS`
    pub sync_timeout: Duration,

    /// Env: `VALET_PUSH_MAX_ATTEMPTS`
    pub push_max_attempts: u32,

    /// Env: `VALET_BACKOFF_BASE_MS`
    pub backoff_base: Duration,

    /// Env: `VALET_BACKOFF_MAX_MS`
    pub backoff_max: Duration,

    /// How often parked snapshots are retried.
    /// Env: `VALET_RETRY_INTERVAL_SECS`
    pub retry_interval: Duration,

    /// Whether shift snapshots and the sync outbox are kept on disk.
    /// Env: `VALET_PERSIST` (true/false)
    /// Default: `false`
    pub persist: bool,

    /// Database file. When unset and persistence is on, the platform data
    /// directory is used.
    /// Env: `VALET_DB_PATH`
    pub db_path: Option<PathBuf>,

    /// Hold duration for the return confirmation gesture.
    /// Env: `VALET_RETURN_HOLD_MS`
    pub return_hold: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            sync_timeout: Duration::from_millis(DEFAULT_SYNC_TIMEOUT_MS),
            push_max_attempts: DEFAULT_PUSH_MAX_ATTEMPTS,
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
            backoff_max: Duration::from_millis(DEFAULT_BACKOFF_MAX_MS),
            retry_interval: Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS),
            persist: false,
            db_path: None,
            return_hold: Duration::from_millis(DEFAULT_RETURN_HOLD_MS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = var("VALET_SERVER_URL") {
            let url = url.trim();
            if !url.is_empty() {
                config.server_url = Some(url.to_string());
            }
        }

        if let Some(ms) = parse_u64(&var, "VALET_SYNC_TIMEOUT_MS") {
            config.sync_timeout = Duration::from_millis(ms);
        }

        if let Some(val) = var("VALET_PUSH_MAX_ATTEMPTS") {
            match val.trim().parse::<u32>() {
                Ok(n) if n > 0 => config.push_max_attempts = n,
                _ => tracing::warn!(value = %val, "Invalid VALET_PUSH_MAX_ATTEMPTS, using default"),
            }
        }

        if let Some(ms) = parse_u64(&var, "VALET_BACKOFF_BASE_MS") {
            config.backoff_base = Duration::from_millis(ms);
        }

        if let Some(ms) = parse_u64(&var, "VALET_BACKOFF_MAX_MS") {
            config.backoff_max = Duration::from_millis(ms);
        }

        if let Some(secs) = parse_u64(&var, "VALET_RETRY_INTERVAL_SECS") {
            config.retry_interval = Duration::from_secs(secs);
        }

        if let Some(val) = var("VALET_PERSIST") {
            config.persist = val != "false" && val != "0";
        }

        if let Some(path) = var("VALET_DB_PATH") {
            if !path.is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Some(ms) = parse_u64(&var, "VALET_RETURN_HOLD_MS") {
            config.return_hold = Duration::from_millis(ms);
        }

        config
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            timeout: self.sync_timeout,
            max_attempts: self.push_max_attempts,
            backoff: Backoff::new(self.backoff_base, self.backoff_max),
            retry_interval: self.retry_interval,
        }
    }
}

/// Positive integer setting, or `None` with a warning when malformed.
fn parse_u64(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let val = var(key)?;
    match val.trim().parse::<u64>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            tracing::warn!(key, value = %val, "Invalid setting, using default");
            None
        }
    }
}
