// SPDX-License-Identifier: MIT
//! Error taxonomy for the monitor.
//!
//! Each error type maps to one propagation rule:
//! - [`ChannelError`] — connection-level; drives reconnect and escalation.
//! - [`ProbeError`] — a completion probe failed; never retried in place,
//!   the session falls through to status polling instead.
//! - [`PollError`] — a status poll failed; swallowed and retried on the
//!   next tick, never an escalation trigger.
//! - [`crate::event::DecodeError`] — one malformed message; logged, dropped.
//!
//! Auth failures and remote task failures arrive as in-band `error` events
//! and are classified by [`classify_error_message`]; both go straight to a
//! terminal outcome with no further retries.

/// Connection-level failure on the push channel.
#[derive(Debug, Clone, thiserror::Error)]
#[error("channel error: {0}")]
pub struct ChannelError(pub String);

/// A completion probe request failed or returned something unusable.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("completion request failed: {0}")]
    Request(String),
    #[error("unexpected completion response: {0}")]
    Response(String),
}

/// A status poll request failed.
#[derive(Debug, thiserror::Error)]
#[error("status poll failed: {0}")]
pub struct PollError(pub String);

/// How an in-band error message should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Authentication/authorization failure — terminal, surfaced, no retry.
    AuthFailure,
    /// The remote task itself is dead — terminal, surfaced, no retry.
    TaskFailure,
    /// Transient transport trouble — close the channel and reconnect.
    Recoverable,
}

const AUTH_PATTERNS: &[&str] = &["unauthorized", "forbidden"];

const TASK_FATAL_PATTERNS: &[&str] = &[
    "task failed",
    "cancelled",
    "quota exceeded",
    "not found",
    "invalid task",
];

/// Classify an error message body by substring match.
///
/// This mirrors the research API's error vocabulary and is a heuristic, not
/// a hard classification — a slow network and a revoked key can produce
/// identical text. Unknown messages default to recoverable so a new server
/// error string never bricks a session.
pub fn classify_error_message(message: &str) -> ErrorClass {
    let lower = message.to_lowercase();
    if AUTH_PATTERNS.iter().any(|p| lower.contains(p)) {
        return ErrorClass::AuthFailure;
    }
    if TASK_FATAL_PATTERNS.iter().any(|p| lower.contains(p)) {
        return ErrorClass::TaskFailure;
    }
    ErrorClass::Recoverable
}
