//! HTTP/SSE implementation of [`ResearchBackend`].
//!
//! Endpoints, relative to the configured base URL:
//! - `GET /v1beta/tasks/runs/{id}/events` — SSE stream of task events
//!   (`Accept: text/event-stream` plus the `parallel-beta` opt-in header)
//! - `GET /v1beta/tasks/runs/{id}/result` — blocking result fetch; non-2xx
//!   while the task is still running
//! - `GET /v1beta/tasks/runs/{id}` — current run status
//!
//! SSE framing: payloads arrive on `data:` lines, one JSON object per line.
//! `event:` and comment lines are ignored — the payload carries its own
//! `type` tag.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::backend::{CompletionResponse, EventChannel, ResearchBackend, StatusResponse, TaskOutput};
use crate::config::BackendConfig;
use crate::error::{ChannelError, PollError, ProbeError};
use crate::event;

const SSE_BETA_HEADER: &str = "parallel-beta";
const SSE_BETA_VALUE: &str = "events-sse-2025-07-24";
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// HTTP client for the research API.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Self {
        // Connect timeout only — a total request timeout would cut the SSE
        // stream off mid-session.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn run_url(&self, task_id: &str, suffix: &str) -> String {
        format!("{}/v1beta/tasks/runs/{}{}", self.base_url, task_id, suffix)
    }
}

#[async_trait]
impl ResearchBackend for HttpBackend {
    async fn open_event_channel(&self, task_id: &str) -> Result<EventChannel, ChannelError> {
        let url = self.run_url(task_id, "/events");
        let resp = self
            .client
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .header(SSE_BETA_HEADER, SSE_BETA_VALUE)
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| ChannelError(format!("connect failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ChannelError(format!("event stream returned {status}")));
        }
        debug!(url = %url, "sse: stream opened");

        let decoder = SseDecoder {
            body: resp.bytes_stream().boxed(),
            buf: String::new(),
            pending: VecDeque::new(),
        };

        Ok(futures_util::stream::unfold(decoder, |mut dec| async move {
            loop {
                if let Some(data) = dec.pending.pop_front() {
                    return Some((Ok(data), dec));
                }
                match dec.body.next().await {
                    Some(Ok(chunk)) => {
                        dec.buf.push_str(&String::from_utf8_lossy(&chunk));
                        drain_data_lines(&mut dec.buf, &mut dec.pending);
                    }
                    Some(Err(e)) => {
                        return Some((Err(ChannelError(format!("stream read failed: {e}"))), dec))
                    }
                    None => return None,
                }
            }
        })
        .boxed())
    }

    async fn request_completion(&self, task_id: &str) -> Result<CompletionResponse, ProbeError> {
        let url = self.run_url(task_id, "/result");
        let resp = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        let status = resp.status();
        match status {
            StatusCode::NOT_FOUND => Err(ProbeError::Response("task not found".into())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ProbeError::Response(format!("unauthorized access: {status}")))
            }
            s if s.is_success() => {
                let body: Value = resp
                    .json()
                    .await
                    .map_err(|e| ProbeError::Response(e.to_string()))?;
                let content = body["output"]["content"]
                    .as_str()
                    .unwrap_or("No content found.")
                    .to_string();
                let basis = match &body["output"]["basis"] {
                    Value::Null => None,
                    v => Some(v.clone()),
                };
                Ok(CompletionResponse {
                    completed: true,
                    output: Some(TaskOutput { content, basis }),
                })
            }
            _ => {
                // The result endpoint answers non-2xx while the task is
                // still running.
                debug!(%status, "sse: result not ready");
                Ok(CompletionResponse {
                    completed: false,
                    output: None,
                })
            }
        }
    }

    async fn request_status(&self, task_id: &str) -> Result<StatusResponse, PollError> {
        let url = self.run_url(task_id, "");
        let resp = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| PollError(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(PollError(format!("status endpoint returned {status}")));
        }

        let body: Value = resp.json().await.map_err(|e| PollError(e.to_string()))?;
        let label = body["status"]
            .as_str()
            .or_else(|| body["run"]["status"].as_str())
            .unwrap_or("unknown");
        Ok(StatusResponse {
            finished: event::status_is_terminal(label),
            status: label.to_string(),
        })
    }
}

struct SseDecoder {
    body: BoxStream<'static, Result<bytes::Bytes, reqwest::Error>>,
    buf: String,
    pending: VecDeque<String>,
}

/// Pull complete `data:` lines out of `buf`, leaving any partial trailing
/// line in place for the next chunk.
fn drain_data_lines(buf: &mut String, out: &mut VecDeque<String>) {
    while let Some(pos) = buf.find('\n') {
        let line: String = buf.drain(..=pos).collect();
        let line = line.trim_end_matches(['\n', '\r']);
        if let Some(data) = line.strip_prefix("data:") {
            let data = data.strip_prefix(' ').unwrap_or(data);
            if !data.is_empty() {
                out.push_back(data.to_string());
            }
        }
    }
}
