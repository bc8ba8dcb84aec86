//! Pull-based fallback — completion probe plus periodic status polling.
//!
//! Entered when the push channel is unusable: rapid-failure escalation,
//! attempt exhaustion, or the watchdog. Two strategies, in order:
//! 1. one blocking completion probe — a completed result resolves the
//!    session immediately; anything else (including a network failure)
//!    falls through without an immediate retry
//! 2. a fixed-interval status poll — poll failures are swallowed and
//!    retried on the next tick; a terminal success status triggers one
//!    completion probe to fetch the artifact, any other terminal status
//!    resolves the session as a failure
//!
//! A manual check anywhere in this phase runs strategy 1 once; "not
//! finished" resets the attempt counter and hands control back to the
//! stream connector.

use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

use super::{Command, ConnectionPhase, Flow, Session, SessionOutcome, Step};
use crate::backend::{ResearchBackend, TaskOutput};
use crate::event;
use crate::projection::{EventClass, ProgressRecord, ProgressSink};

enum ProbeWake {
    Cmd(Option<Command>),
    Probe(Option<SessionOutcome>),
}

enum PollWake {
    Cmd(Option<Command>),
    Tick,
}

impl<B: ResearchBackend, S: ProgressSink> Session<B, S> {
    pub(super) async fn run_fallback(&mut self) -> Flow {
        self.set_phase(ConnectionPhase::FallbackPolling);
        self.sink.project(&ProgressRecord::message_only(
            EventClass::Status,
            "Live updates unavailable, checking task status periodically",
        ));

        // Strategy 1: a single completion probe, racing cancellation.
        let wake = tokio::select! {
            biased;
            cmd = self.cmd_rx.recv() => ProbeWake::Cmd(cmd),
            outcome = Self::probe_once(self.backend.as_ref(), &self.handle.id) => {
                ProbeWake::Probe(outcome)
            }
        };
        match wake {
            ProbeWake::Cmd(Some(Command::Cancel)) | ProbeWake::Cmd(None) => {
                return Flow::Cancelled
            }
            // The entry probe lost the race; run the user's check in its
            // place so exactly one probe still completes.
            ProbeWake::Cmd(Some(Command::ManualCheck)) => {
                match self.probe_completion_once().await {
                    Some(outcome) => return Flow::Finished(outcome),
                    None => {
                        info!(
                            task = %self.handle.id,
                            "fallback: manual check says still running, retrying live stream"
                        );
                        self.state.reconnect_attempts = 0;
                        return Flow::Next(Step::Stream);
                    }
                }
            }
            ProbeWake::Probe(Some(outcome)) => return Flow::Finished(outcome),
            ProbeWake::Probe(None) => {}
        }

        // Strategy 2: periodic status polling.
        let mut ticker = interval_at(
            Instant::now() + self.config.poll_interval,
            self.config.poll_interval,
        );
        loop {
            let wake = tokio::select! {
                biased;
                cmd = self.cmd_rx.recv() => PollWake::Cmd(cmd),
                _ = ticker.tick() => PollWake::Tick,
            };

            match wake {
                PollWake::Cmd(Some(Command::Cancel)) | PollWake::Cmd(None) => {
                    return Flow::Cancelled
                }
                PollWake::Cmd(Some(Command::ManualCheck)) => {
                    match self.probe_completion_once().await {
                        Some(outcome) => return Flow::Finished(outcome),
                        None => {
                            info!(
                                task = %self.handle.id,
                                "fallback: manual check says still running, retrying live stream"
                            );
                            self.state.reconnect_attempts = 0;
                            return Flow::Next(Step::Stream);
                        }
                    }
                }
                PollWake::Tick => {
                    if let Some(flow) = self.on_poll_tick().await {
                        return flow;
                    }
                }
            }
        }
    }

    /// One status poll. `Some` means the phase ends.
    async fn on_poll_tick(&mut self) -> Option<Flow> {
        match self.backend.request_status(&self.handle.id).await {
            Err(e) => {
                // Poll failures never escalate — the next tick retries.
                warn!(task = %self.handle.id, "fallback: {e}, retrying next tick");
                None
            }
            Ok(st) if st.finished => {
                info!(task = %self.handle.id, status = %st.status, "fallback: terminal status");
                if event::status_is_success(&st.status) {
                    Some(Flow::Finished(self.resolve_success().await))
                } else {
                    Some(Flow::Finished(SessionOutcome::Failed {
                        status: st.status.clone(),
                        message: format!("Task status: {}", st.status),
                    }))
                }
            }
            Ok(st) => {
                debug!(task = %self.handle.id, status = %st.status, "fallback: still running");
                self.sink.project(&ProgressRecord::message_only(
                    EventClass::Status,
                    format!("Task status: {}", st.status),
                ));
                None
            }
        }
    }

    /// Strategy-1 probe through `&mut self`, for call sites that are not
    /// racing the command channel.
    pub(super) async fn probe_completion_once(&mut self) -> Option<SessionOutcome> {
        Self::probe_once(self.backend.as_ref(), &self.handle.id).await
    }

    /// Ask for the final result once. `None` means "no resolution" — not
    /// finished yet, or the probe itself failed.
    async fn probe_once(backend: &B, task_id: &str) -> Option<SessionOutcome> {
        match backend.request_completion(task_id).await {
            Ok(resp) if resp.completed => {
                let output = resp.output.unwrap_or(TaskOutput {
                    content: "No content found.".to_string(),
                    basis: None,
                });
                info!(task = %task_id, "fallback: completion probe resolved the session");
                Some(SessionOutcome::Completed {
                    content: output.content,
                    basis: output.basis,
                })
            }
            Ok(_) => {
                debug!(task = %task_id, "fallback: completion probe says not finished");
                None
            }
            Err(e) => {
                warn!(task = %task_id, "fallback: completion probe failed: {e}");
                None
            }
        }
    }

    /// Resolve a success-kind terminal status into the final artifact. The
    /// probe runs exactly once; if it cannot deliver the artifact the
    /// session still terminates, as a failure.
    pub(super) async fn resolve_success(&mut self) -> SessionOutcome {
        match self.backend.request_completion(&self.handle.id).await {
            Ok(resp) if resp.completed => {
                let output = resp.output.unwrap_or(TaskOutput {
                    content: "No content found.".to_string(),
                    basis: None,
                });
                SessionOutcome::Completed {
                    content: output.content,
                    basis: output.basis,
                }
            }
            Ok(_) => SessionOutcome::Failed {
                status: "completed".to_string(),
                message: "result not available after completion".to_string(),
            },
            Err(e) => SessionOutcome::Failed {
                status: "completed".to_string(),
                message: format!("failed to retrieve final result: {e}"),
            },
        }
    }
}
