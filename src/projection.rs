//! Progress projection — the monitor's one-way feed to the UI layer.
//!
//! The orchestrator pushes a normalized [`ProgressRecord`] to a
//! [`ProgressSink`] on every meaningful state change. Projection is
//! fire-and-forget: the monitor never reads anything back, and a sink must
//! not block.

use tracing::info;

use crate::event::InboundEvent;

/// Broad category of a projected record — UI layers key styling off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventClass {
    Status,
    Progress,
    Log,
    Error,
    Unknown,
    /// Final record of a session — emitted exactly once.
    Outcome,
}

impl std::fmt::Display for EventClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status => write!(f, "status"),
            Self::Progress => write!(f, "progress"),
            Self::Log => write!(f, "log"),
            Self::Error => write!(f, "error"),
            Self::Unknown => write!(f, "unknown"),
            Self::Outcome => write!(f, "outcome"),
        }
    }
}

/// Normalized progress/outcome record handed to the UI layer.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProgressRecord {
    pub message: String,
    pub class: EventClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources_processed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources_total: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recent_sources: Vec<String>,
}

impl ProgressRecord {
    /// Record with a message and class only.
    pub fn message_only(class: EventClass, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            class,
            sources_processed: None,
            sources_total: None,
            recent_sources: Vec::new(),
        }
    }

    /// Project a decoded channel event into its UI record.
    pub fn from_event(event: &InboundEvent) -> Self {
        match event {
            InboundEvent::Status { status, .. } => {
                Self::message_only(EventClass::Status, format!("Task status: {status}"))
            }
            InboundEvent::Progress {
                sources_processed,
                sources_total,
                recent_sources,
                message,
            } => Self {
                message: message.clone(),
                class: EventClass::Progress,
                sources_processed: Some(*sources_processed),
                sources_total: Some(*sources_total),
                recent_sources: recent_sources.clone(),
            },
            InboundEvent::Log { message, .. } => {
                Self::message_only(EventClass::Log, message.clone())
            }
            InboundEvent::Error { message } => {
                Self::message_only(EventClass::Error, message.clone())
            }
            InboundEvent::Unknown { raw } => Self::message_only(EventClass::Unknown, raw.clone()),
        }
    }
}

/// Consumer of progress records. Implementations must not block.
pub trait ProgressSink: Send + Sync + 'static {
    fn project(&self, record: &ProgressRecord);
}

/// Sink that renders every record through `tracing` — used by the CLI.
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn project(&self, record: &ProgressRecord) {
        match (record.sources_processed, record.sources_total) {
            (Some(done), Some(total)) => {
                info!(class = %record.class, done, total, "{}", record.message)
            }
            _ => info!(class = %record.class, "{}", record.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_event_carries_counters() {
        let record = ProgressRecord::from_event(&InboundEvent::Progress {
            sources_processed: 7,
            sources_total: 20,
            recent_sources: vec!["example.com".into()],
            message: "Processed 7 of 20 sources".into(),
        });
        assert_eq!(record.class, EventClass::Progress);
        assert_eq!(record.sources_processed, Some(7));
        assert_eq!(record.sources_total, Some(20));
        assert_eq!(record.recent_sources, vec!["example.com"]);
    }

    #[test]
    fn status_event_is_message_only() {
        let record = ProgressRecord::from_event(&InboundEvent::Status {
            status: "running".into(),
            is_complete: false,
        });
        assert_eq!(record.class, EventClass::Status);
        assert_eq!(record.message, "Task status: running");
        assert!(record.sources_processed.is_none());
    }
}
