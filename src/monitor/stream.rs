//! Stream connector — owns the push-channel lifecycle for one session.
//!
//! Exactly one channel instance is live at a time: a reconnect drops the
//! previous stream before opening a new one, and returning out of the
//! streaming phase closes the channel. The attempt counter resets only on a
//! successfully decoded event — an open channel that never delivers data is
//! not treated as healthy.

use futures_util::StreamExt;
use tokio::time::{sleep, sleep_until, Duration};
use tracing::{debug, info, warn};

use super::{Command, ConnectionPhase, Flow, Session, SessionOutcome, Step};
use crate::backend::ResearchBackend;
use crate::backoff;
use crate::error::{classify_error_message, ChannelError, ErrorClass};
use crate::event::{self, InboundEvent};
use crate::projection::{ProgressRecord, ProgressSink};

enum StreamWake {
    Cmd(Option<Command>),
    Watchdog,
    Msg(Option<Result<String, ChannelError>>),
}

enum ReconnectWake {
    Cmd(Option<Command>),
    Watchdog,
    Timer,
}

impl<B: ResearchBackend, S: ProgressSink> Session<B, S> {
    /// Streaming phase: hold one channel open and feed decoded events to the
    /// orchestrator until something forces a transition.
    pub(super) async fn run_streaming(&mut self) -> Flow {
        self.set_phase(ConnectionPhase::Streaming);

        let mut channel = match self.backend.open_event_channel(&self.handle.id).await {
            Ok(channel) => channel,
            Err(e) => {
                warn!(task = %self.handle.id, "stream: open failed: {e}");
                return self.on_channel_failure();
            }
        };
        debug!(task = %self.handle.id, "stream: channel open");

        loop {
            let wake = tokio::select! {
                biased;
                cmd = self.cmd_rx.recv() => StreamWake::Cmd(cmd),
                _ = sleep_until(self.watchdog_deadline), if self.watchdog_armed => StreamWake::Watchdog,
                msg = channel.next() => StreamWake::Msg(msg),
            };

            match wake {
                StreamWake::Cmd(Some(Command::Cancel)) | StreamWake::Cmd(None) => {
                    return Flow::Cancelled
                }
                StreamWake::Cmd(Some(Command::ManualCheck)) => {
                    if let Some(outcome) = self.probe_completion_once().await {
                        return Flow::Finished(outcome);
                    }
                    // Already streaming — nothing to re-attempt.
                    self.state.reconnect_attempts = 0;
                }
                StreamWake::Watchdog => return self.on_watchdog(),
                StreamWake::Msg(Some(Ok(text))) => {
                    if let Some(flow) = self.on_message(&text).await {
                        return flow;
                    }
                }
                StreamWake::Msg(Some(Err(e))) => {
                    warn!(task = %self.handle.id, "stream: channel error: {e}");
                    return self.on_channel_failure();
                }
                StreamWake::Msg(None) => {
                    warn!(task = %self.handle.id, "stream: channel closed by server");
                    return self.on_channel_failure();
                }
            }
        }
    }

    /// Reconnect phase: one cancellable delay, then reopen. Starting a new
    /// wait always replaces the previous one — there is never more than one
    /// pending reconnect timer.
    pub(super) async fn run_reconnect(&mut self, delay: Duration) -> Flow {
        self.set_phase(ConnectionPhase::Reconnecting);

        let wake = tokio::select! {
            biased;
            cmd = self.cmd_rx.recv() => ReconnectWake::Cmd(cmd),
            _ = sleep_until(self.watchdog_deadline), if self.watchdog_armed => ReconnectWake::Watchdog,
            _ = sleep(delay) => ReconnectWake::Timer,
        };

        match wake {
            ReconnectWake::Cmd(Some(Command::Cancel)) | ReconnectWake::Cmd(None) => Flow::Cancelled,
            ReconnectWake::Cmd(Some(Command::ManualCheck)) => {
                match self.probe_completion_once().await {
                    Some(outcome) => Flow::Finished(outcome),
                    None => {
                        self.state.reconnect_attempts = 0;
                        Flow::Next(Step::Stream)
                    }
                }
            }
            ReconnectWake::Watchdog => self.on_watchdog(),
            ReconnectWake::Timer => Flow::Next(Step::Stream),
        }
    }

    /// Decode and act on one channel message. `Some` means the phase ends.
    async fn on_message(&mut self, text: &str) -> Option<Flow> {
        let event = match event::decode(text) {
            Ok(event) => event,
            Err(e) => {
                warn!(task = %self.handle.id, "stream: dropping malformed message: {e}");
                return None;
            }
        };

        if let InboundEvent::Error { message } = &event {
            return Some(self.on_error_event(message));
        }

        self.note_event();
        match &event {
            InboundEvent::Status { status, is_complete } if *is_complete => {
                info!(task = %self.handle.id, status = %status, "stream: terminal status received");
                if event::status_is_success(status) {
                    Some(Flow::Finished(self.resolve_success().await))
                } else {
                    Some(Flow::Finished(SessionOutcome::Failed {
                        status: status.clone(),
                        message: format!("Task status: {status}"),
                    }))
                }
            }
            _ => {
                self.sink.project(&ProgressRecord::from_event(&event));
                None
            }
        }
    }

    /// In-band `error` event. Fatal classes resolve the session on the
    /// spot; anything else is treated like a channel failure.
    fn on_error_event(&mut self, message: &str) -> Flow {
        match classify_error_message(message) {
            ErrorClass::AuthFailure => {
                warn!(task = %self.handle.id, "stream: auth failure reported: {message}");
                Flow::Finished(SessionOutcome::AuthFailed {
                    message: message.to_string(),
                })
            }
            ErrorClass::TaskFailure => {
                warn!(task = %self.handle.id, "stream: remote task failed: {message}");
                Flow::Finished(SessionOutcome::Failed {
                    status: "failed".to_string(),
                    message: message.to_string(),
                })
            }
            ErrorClass::Recoverable => {
                warn!(task = %self.handle.id, "stream: recoverable error event: {message}");
                self.on_channel_failure()
            }
        }
    }

    /// Channel error/close: bump the counter and ask the backoff controller
    /// what to do.
    pub(super) fn on_channel_failure(&mut self) -> Flow {
        if self.state.is_complete {
            // A failure observed after completion must not restart anything.
            return Flow::Cancelled;
        }

        self.state.reconnect_attempts += 1;
        let attempts = self.state.reconnect_attempts;
        let since_last = self.state.last_event_at.elapsed();
        let policy = &self.config.policy;

        if backoff::should_escalate_to_fallback(policy, attempts, since_last) {
            warn!(
                task = %self.handle.id,
                attempts,
                since_last_ms = since_last.as_millis() as u64,
                "stream: rapid failures with no recent event, escalating to polling"
            );
            Flow::Next(Step::Fallback)
        } else if backoff::attempts_exhausted(policy, attempts) {
            warn!(
                task = %self.handle.id,
                attempts,
                "stream: reconnect attempts exhausted, escalating to polling"
            );
            Flow::Next(Step::Fallback)
        } else {
            let delay = backoff::next_delay(policy, attempts);
            info!(
                task = %self.handle.id,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "stream: reconnecting after delay"
            );
            Flow::Next(Step::Reconnect(delay))
        }
    }

    pub(super) fn on_watchdog(&mut self) -> Flow {
        self.watchdog_armed = false;
        warn!(
            task = %self.handle.id,
            "monitor: watchdog fired with no terminal event, forcing status polling"
        );
        Flow::Next(Step::Fallback)
    }
}
