//! Transport-facing collaborator interfaces.
//!
//! The monitor core is transport-agnostic: everything it needs from the
//! research API fits in the three methods of [`ResearchBackend`]. The
//! shipped implementation is the HTTP/SSE client in [`HttpBackend`]; tests
//! substitute scripted mocks.

pub mod http;

pub use http::HttpBackend;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::{ChannelError, PollError, ProbeError};

/// Ordered sequence of opaque text messages from the push channel.
///
/// Dropping the stream closes the underlying connection; closing is
/// idempotent.
pub type EventChannel = BoxStream<'static, Result<String, ChannelError>>;

/// Remote side of one research run.
#[async_trait]
pub trait ResearchBackend: Send + Sync + 'static {
    /// Subscribe to the push event channel for `task_id`.
    async fn open_event_channel(&self, task_id: &str) -> Result<EventChannel, ChannelError>;

    /// Ask for the final result. `completed == false` means the task is
    /// still running and no artifact exists yet.
    async fn request_completion(&self, task_id: &str) -> Result<CompletionResponse, ProbeError>;

    /// Lightweight "is it finished" query — cheap, safe to call frequently.
    async fn request_status(&self, task_id: &str) -> Result<StatusResponse, PollError>;
}

/// Answer to a completion probe.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub completed: bool,
    /// Present when `completed` is true and the artifact was retrievable.
    pub output: Option<TaskOutput>,
}

/// Final artifact of a research run.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutput {
    /// Report body (markdown).
    pub content: String,
    /// Source basis metadata, passed through verbatim.
    pub basis: Option<serde_json::Value>,
}

/// Answer to a status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    pub finished: bool,
    pub status: String,
}
