//! Inbound event decoding.
//!
//! The research API pushes one JSON object per channel message:
//!
//! ```text
//! { "type": "task.status" | "task.progress" | "task.log" | "error",
//!   status?, is_complete?, message?, sources_processed?, sources_total?,
//!   recent_sources?, log_level? }
//! ```
//!
//! Decoding happens exactly once, here, into the closed [`InboundEvent`]
//! union so the orchestrator gets exhaustive-match safety instead of a
//! string-tag switch. An unrecognized `type` maps to
//! [`InboundEvent::Unknown`] carrying the raw message text, so the monitor
//! can still show a generic "processing" state. A malformed payload is a
//! [`DecodeError`] — the caller logs and drops it; one bad message must not
//! kill the session.

use serde_json::Value;

/// One decoded channel message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Task lifecycle change. `is_complete` marks a terminal status.
    Status { status: String, is_complete: bool },
    /// Source-processing progress counters.
    Progress {
        sources_processed: u64,
        sources_total: u64,
        recent_sources: Vec<String>,
        message: String,
    },
    /// Free-form progress log line.
    Log { level: String, message: String },
    /// Error reported in-band by the server.
    Error { message: String },
    /// Unrecognized `type` tag — raw message text preserved.
    Unknown { raw: String },
}

/// A single message that could not be decoded. Non-fatal by contract.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    NotJson(#[from] serde_json::Error),
    #[error("payload root is not an object")]
    NotAnObject,
}

/// Decode one raw channel payload.
pub fn decode(payload: &str) -> Result<InboundEvent, DecodeError> {
    let frame: Value = serde_json::from_str(payload)?;
    if !frame.is_object() {
        return Err(DecodeError::NotAnObject);
    }

    let event = match frame["type"].as_str().unwrap_or("") {
        "task.status" => InboundEvent::Status {
            status: frame["status"].as_str().unwrap_or("unknown").to_string(),
            is_complete: frame["is_complete"].as_bool().unwrap_or(false),
        },
        "task.progress" => {
            let processed = frame["sources_processed"].as_u64().unwrap_or(0);
            let total = frame["sources_total"].as_u64().unwrap_or(0);
            let message = match frame["message"].as_str() {
                Some(m) => m.to_string(),
                None => format!("Processed {processed} of {total} sources"),
            };
            InboundEvent::Progress {
                sources_processed: processed,
                sources_total: total,
                recent_sources: frame["recent_sources"]
                    .as_array()
                    .map(|a| {
                        a.iter()
                            .filter_map(|v| v.as_str().map(String::from))
                            .collect()
                    })
                    .unwrap_or_default(),
                message,
            }
        }
        "task.log" => InboundEvent::Log {
            level: frame["log_level"].as_str().unwrap_or("info").to_string(),
            message: frame["message"].as_str().unwrap_or("").to_string(),
        },
        "error" => InboundEvent::Error {
            message: frame["message"].as_str().unwrap_or("unknown error").to_string(),
        },
        _ => InboundEvent::Unknown {
            raw: frame["message"]
                .as_str()
                .map(String::from)
                .unwrap_or_else(|| payload.to_string()),
        },
    };

    Ok(event)
}

/// Terminal status labels used by the research API.
pub fn status_is_terminal(status: &str) -> bool {
    matches!(status, "completed" | "failed" | "cancelled")
}

/// The one terminal status that carries a retrievable result.
pub fn status_is_success(status: &str) -> bool {
    status == "completed"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_status_event() {
        let ev = decode(r#"{"type":"task.status","status":"running","is_complete":false}"#)
            .expect("decode");
        assert_eq!(
            ev,
            InboundEvent::Status {
                status: "running".into(),
                is_complete: false
            }
        );
    }

    #[test]
    fn decodes_progress_with_default_message() {
        let ev = decode(
            r#"{"type":"task.progress","sources_processed":4,"sources_total":9,"recent_sources":["a.com","b.com"]}"#,
        )
        .expect("decode");
        match ev {
            InboundEvent::Progress {
                sources_processed,
                sources_total,
                recent_sources,
                message,
            } => {
                assert_eq!(sources_processed, 4);
                assert_eq!(sources_total, 9);
                assert_eq!(recent_sources, vec!["a.com", "b.com"]);
                assert_eq!(message, "Processed 4 of 9 sources");
            }
            other => panic!("expected progress event, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_preserves_raw_message() {
        let ev = decode(r#"{"type":"task.telemetry","message":"warming up"}"#).expect("decode");
        assert_eq!(
            ev,
            InboundEvent::Unknown {
                raw: "warming up".into()
            }
        );
    }

    #[test]
    fn malformed_payload_is_a_decode_error() {
        assert!(decode("not json at all").is_err());
        assert!(decode("[1,2,3]").is_err());
    }

    #[test]
    fn terminal_status_vocabulary() {
        assert!(status_is_terminal("completed"));
        assert!(status_is_terminal("failed"));
        assert!(status_is_terminal("cancelled"));
        assert!(!status_is_terminal("running"));
        assert!(status_is_success("completed"));
        assert!(!status_is_success("failed"));
    }
}
