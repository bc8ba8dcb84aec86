//! Monitor and backend configuration.

use std::time::Duration;

use crate::backoff::ReconnectPolicy;

/// Default base URL of the research API.
pub const DEFAULT_API_BASE_URL: &str = "https://api.parallel.ai";

const DEFAULT_WATCHDOG_SECS: u64 = 30;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

// ─── MonitorConfig ────────────────────────────────────────────────────────────

/// Tuning knobs for one monitoring session.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Reconnect policy consulted on every channel failure.
    pub policy: ReconnectPolicy,
    /// One-shot timer armed at session start; if the session has not
    /// terminated when it fires, the monitor forces status polling. Catches
    /// a channel that stays nominally open but silently stops delivering.
    pub watchdog: Duration,
    /// Fixed interval between fallback status polls.
    pub poll_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            policy: ReconnectPolicy::default(),
            watchdog: Duration::from_secs(DEFAULT_WATCHDOG_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

impl MonitorConfig {
    /// Config suitable for quick unit tests (no real waiting).
    pub fn instant() -> Self {
        Self {
            policy: ReconnectPolicy::instant(),
            watchdog: Duration::from_millis(200),
            poll_interval: Duration::from_millis(20),
        }
    }
}

// ─── BackendConfig ────────────────────────────────────────────────────────────

/// Connection settings for [`crate::backend::HttpBackend`].
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Research API base URL, no trailing slash.
    pub base_url: String,
    /// API key sent as the `x-api-key` header on every request.
    pub api_key: String,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}
