// SPDX-License-Identifier: MIT
//! Reconnect backoff decisions.
//!
//! Delay formula: `min(2^attempt, 30)` seconds — deterministic, no jitter,
//! so timer-driven tests are reproducible.
//!
//! The controller is a set of pure functions over a [`ReconnectPolicy`] and
//! snapshot values from the session state. It never owns timers or
//! connections; the stream connector asks it what to do and acts on the
//! answer.

use std::time::Duration;

// ── Policy ───────────────────────────────────────────────────────────────────

/// Reconnect policy for one monitoring session.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Give up on the push channel after this many consecutive failures.
    pub max_attempts: u32,
    /// Delay before the first reconnect; doubles on each further attempt.
    pub base_delay: Duration,
    /// Upper bound on any single reconnect delay.
    pub cap: Duration,
    /// Window for the rapid-failure heuristic, measured from the last
    /// successfully decoded event.
    pub rapid_failure_window: Duration,
    /// Failure count at which the rapid-failure heuristic kicks in.
    pub rapid_failure_threshold: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_secs(2),
            cap: Duration::from_secs(30),
            rapid_failure_window: Duration::from_millis(5000),
            rapid_failure_threshold: 3,
        }
    }
}

impl ReconnectPolicy {
    /// Policy suitable for quick unit tests (no real waiting).
    pub fn instant() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(10),
            cap: Duration::from_millis(80),
            rapid_failure_window: Duration::from_millis(500),
            rapid_failure_threshold: 3,
        }
    }
}

// ── Decisions ────────────────────────────────────────────────────────────────

/// Delay before reconnect attempt number `attempt` (1-indexed).
///
/// `min(base * 2^(attempt-1), cap)` — with the default 2 s base this is
/// `min(2^attempt, 30)` seconds.
pub fn next_delay(policy: &ReconnectPolicy, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(31);
    policy
        .base_delay
        .saturating_mul(1u32 << exp)
        .min(policy.cap)
}

/// Rapid-failure heuristic: several reconnects in a short window with no
/// successful event in between usually means a persistent failure (bad
/// credentials, dead endpoint), not a transient blip — further retries only
/// waste time, so the session should jump straight to status polling.
///
/// It IS a guess: it cannot tell a slow network from an auth failure.
pub fn should_escalate_to_fallback(
    policy: &ReconnectPolicy,
    attempts: u32,
    since_last_event: Duration,
) -> bool {
    attempts >= policy.rapid_failure_threshold && since_last_event < policy.rapid_failure_window
}

/// True once the attempt budget is spent.
pub fn attempts_exhausted(policy: &ReconnectPolicy, attempts: u32) -> bool {
    attempts > policy.max_attempts
}
