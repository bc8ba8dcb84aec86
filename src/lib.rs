//! taskwatch — completion monitor for long-running deep-research tasks.
//!
//! A research run can take many minutes. The server pushes progress over an
//! SSE channel, but that channel is the least reliable part of the system,
//! so the monitor is built to survive it:
//!
//! 1. [`monitor::TaskMonitor::start`] spawns one session task per run
//! 2. events flow channel → [`event`] decoder → orchestrator → [`projection::ProgressSink`]
//! 3. on channel failure the [`backoff`] controller decides retry vs. escalate
//! 4. when the channel is unusable the session degrades to status polling
//!    and can still resolve the final report through the result endpoint
//! 5. every session ends in exactly one outcome — success with the report
//!    content, a surfaced failure, or nothing at all when cancelled
//!
//! Transport lives behind [`backend::ResearchBackend`]; the shipped
//! implementation is [`backend::HttpBackend`]. Everything else (form
//! rendering, report storage, login) is out of scope for this crate.

pub mod backend;
pub mod backoff;
pub mod config;
pub mod error;
pub mod event;
pub mod monitor;
pub mod projection;

pub use backend::{HttpBackend, ResearchBackend};
pub use config::{BackendConfig, MonitorConfig};
pub use monitor::{ConnectionPhase, MonitorHandle, SessionOutcome, TaskHandle, TaskMonitor};
pub use projection::{ProgressRecord, ProgressSink};
