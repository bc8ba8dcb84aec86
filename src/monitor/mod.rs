// SPDX-License-Identifier: MIT
//! Task completion monitor — the orchestrating state machine.
//!
//! One session per research run:
//! 1. [`TaskMonitor::start`] spawns the session task and returns a
//!    [`MonitorHandle`]
//! 2. events flow channel → decoder → orchestrator → [`ProgressSink`]
//! 3. on channel failure the backoff controller decides retry vs. escalate
//! 4. a one-shot watchdog forces status polling if the stream goes silent
//! 5. the session resolves to exactly one [`SessionOutcome`], or to none at
//!    all when cancelled
//!
//! # State machine
//!
//! ```text
//! Idle ──► Streaming ◄──────────────┐
//!             │  ▲                  │ manual check: "not finished"
//!     channel │  │ reopened         │
//!       error ▼  │                  │
//!          Reconnecting ──► FallbackPolling
//!             │    escalation /        │
//!             │    exhaustion /        │ outcome resolved
//!             │    watchdog            ▼
//!             └──────────────────► Terminated   (absorbing)
//! ```
//!
//! The whole session runs inside a single spawned task; the stream
//! connector and the fallback monitor are select-driven phases of that
//! task, so [`MonitorState`] is only ever touched by one handler at a time
//! and events are processed strictly in arrival order.

pub mod fallback;
pub mod stream;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, info};

use crate::backend::ResearchBackend;
use crate::config::MonitorConfig;
use crate::projection::{EventClass, ProgressRecord, ProgressSink};

/// Identifier of one remote research run. Immutable once issued; owned by
/// the session for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

impl TaskHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Observable phase of a monitoring session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    Idle,
    Streaming,
    Reconnecting,
    FallbackPolling,
    Terminated,
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Streaming => write!(f, "streaming"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::FallbackPolling => write!(f, "fallback_polling"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// The run finished and its artifact was retrieved.
    Completed {
        content: String,
        basis: Option<serde_json::Value>,
    },
    /// The server reported an authentication/authorization failure.
    AuthFailed { message: String },
    /// The remote task ended in a non-success terminal state, or its
    /// artifact could not be retrieved.
    Failed { status: String, message: String },
}

/// Mutable per-session record. Owned by the session task; every other
/// component only ever sees snapshot values.
#[derive(Debug)]
struct MonitorState {
    is_complete: bool,
    reconnect_attempts: u32,
    last_event_at: Instant,
    phase: ConnectionPhase,
}

enum Command {
    ManualCheck,
    Cancel,
}

/// Where the state machine goes next.
enum Step {
    Stream,
    Reconnect(Duration),
    Fallback,
}

/// Result of driving one phase to its next transition.
enum Flow {
    Next(Step),
    Finished(SessionOutcome),
    Cancelled,
}

// ─── Public API ───────────────────────────────────────────────────────────────

/// Entry point: spawns monitoring sessions.
pub struct TaskMonitor;

impl TaskMonitor {
    /// Start monitoring `handle` and return the control handle for the
    /// session. The session runs until it resolves an outcome or is
    /// cancelled.
    pub fn start<B, S>(
        backend: Arc<B>,
        sink: Arc<S>,
        config: MonitorConfig,
        handle: TaskHandle,
    ) -> MonitorHandle
    where
        B: ResearchBackend,
        S: ProgressSink,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (phase_tx, phase_rx) = watch::channel(ConnectionPhase::Idle);

        let session = Session {
            state: MonitorState {
                is_complete: false,
                reconnect_attempts: 0,
                last_event_at: Instant::now(),
                phase: ConnectionPhase::Idle,
            },
            watchdog_deadline: Instant::now(),
            watchdog_armed: true,
            handle,
            backend,
            sink,
            config,
            cmd_rx,
            phase_tx,
        };

        MonitorHandle {
            cmd_tx,
            phase_rx,
            join: Some(tokio::spawn(session.run())),
        }
    }
}

/// Control handle for one running session.
///
/// Dropping the handle cancels the session.
pub struct MonitorHandle {
    cmd_tx: mpsc::Sender<Command>,
    phase_rx: watch::Receiver<ConnectionPhase>,
    join: Option<JoinHandle<Option<SessionOutcome>>>,
}

impl MonitorHandle {
    /// Current phase snapshot.
    pub fn phase(&self) -> ConnectionPhase {
        *self.phase_rx.borrow()
    }

    /// Watch receiver for phase transitions — useful for UIs and tests.
    pub fn phase_watch(&self) -> watch::Receiver<ConnectionPhase> {
        self.phase_rx.clone()
    }

    /// User-initiated completion check. If the task turns out to be
    /// finished this resolves the session; otherwise the session resets its
    /// attempt counter and re-attempts the push channel.
    pub async fn manual_check(&self) {
        let _ = self.cmd_tx.send(Command::ManualCheck).await;
    }

    /// Tear the session down without producing an outcome. Once this
    /// returns, the session task has stopped and no further projection will
    /// fire.
    pub async fn cancel(&mut self) {
        let _ = self.cmd_tx.send(Command::Cancel).await;
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }

    /// Wait for the session to resolve. `None` when it was cancelled.
    pub async fn wait(&mut self) -> Option<SessionOutcome> {
        match self.join.take() {
            Some(join) => join.await.unwrap_or(None),
            None => None,
        }
    }
}

// ─── Session ──────────────────────────────────────────────────────────────────

struct Session<B, S> {
    state: MonitorState,
    watchdog_deadline: Instant,
    watchdog_armed: bool,
    handle: TaskHandle,
    backend: Arc<B>,
    sink: Arc<S>,
    config: MonitorConfig,
    cmd_rx: mpsc::Receiver<Command>,
    phase_tx: watch::Sender<ConnectionPhase>,
}

impl<B: ResearchBackend, S: ProgressSink> Session<B, S> {
    async fn run(mut self) -> Option<SessionOutcome> {
        self.watchdog_deadline = Instant::now() + self.config.watchdog;
        info!(
            task = %self.handle.id,
            created_at = %self.handle.created_at,
            "monitor: session started"
        );

        let mut step = Step::Stream;
        loop {
            let flow = match step {
                Step::Stream => self.run_streaming().await,
                Step::Reconnect(delay) => self.run_reconnect(delay).await,
                Step::Fallback => self.run_fallback().await,
            };
            match flow {
                Flow::Next(next) => step = next,
                Flow::Finished(outcome) => {
                    self.terminate(&outcome);
                    return Some(outcome);
                }
                Flow::Cancelled => {
                    self.teardown();
                    return None;
                }
            }
        }
    }

    /// One-way transition into the absorbing terminal state. Projects the
    /// outcome record exactly once.
    fn terminate(&mut self, outcome: &SessionOutcome) {
        self.state.is_complete = true;
        self.set_phase(ConnectionPhase::Terminated);
        let record = match outcome {
            SessionOutcome::Completed { .. } => {
                ProgressRecord::message_only(EventClass::Outcome, "Research task completed")
            }
            SessionOutcome::AuthFailed { message } => ProgressRecord::message_only(
                EventClass::Outcome,
                format!("Authorization failed: {message}"),
            ),
            SessionOutcome::Failed { status, message } => {
                ProgressRecord::message_only(EventClass::Outcome, format!("Task {status}: {message}"))
            }
        };
        self.sink.project(&record);
        info!(task = %self.handle.id, "monitor: session terminated");
    }

    /// Cancellation teardown — same absorbing state, but no outcome record.
    fn teardown(&mut self) {
        self.state.is_complete = true;
        self.set_phase(ConnectionPhase::Terminated);
        info!(task = %self.handle.id, "monitor: session cancelled, no outcome");
    }

    fn set_phase(&mut self, phase: ConnectionPhase) {
        if self.state.phase != phase {
            debug!(
                task = %self.handle.id,
                from = %self.state.phase,
                to = %phase,
                "monitor: phase change"
            );
            self.state.phase = phase;
            let _ = self.phase_tx.send(phase);
        }
    }

    /// Bookkeeping for a successfully decoded event: only real traffic
    /// proves the channel healthy, so this is the sole place the attempt
    /// counter resets.
    fn note_event(&mut self) {
        self.state.reconnect_attempts = 0;
        self.state.last_event_at = Instant::now();
    }
}
