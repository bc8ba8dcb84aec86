//! taskwatch CLI — attach to a running research task and watch it to
//! completion.
//!
//! Prints progress through `tracing`; on success the final report body goes
//! to stdout so it can be piped straight into a file.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use taskwatch::backend::HttpBackend;
use taskwatch::config::{BackendConfig, MonitorConfig, DEFAULT_API_BASE_URL};
use taskwatch::monitor::{SessionOutcome, TaskHandle, TaskMonitor};
use taskwatch::projection::TracingSink;

#[derive(Parser, Debug)]
#[command(name = "taskwatch", about = "Watch a deep-research task to completion")]
struct Args {
    /// Identifier of the task run to monitor.
    task_id: String,

    /// Research API base URL.
    #[arg(long, env = "TASKWATCH_API_BASE_URL", default_value = DEFAULT_API_BASE_URL)]
    api_base_url: String,

    /// Research API key.
    #[arg(long, env = "TASKWATCH_API_KEY", hide_env_values = true)]
    api_key: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskwatch=info")),
        )
        .compact()
        .init();

    let backend = Arc::new(HttpBackend::new(&BackendConfig::new(
        args.api_base_url,
        args.api_key,
    )));
    let sink = Arc::new(TracingSink);

    let mut handle = TaskMonitor::start(
        backend,
        sink,
        MonitorConfig::default(),
        TaskHandle::new(args.task_id.clone()),
    );

    let outcome = tokio::select! {
        outcome = handle.wait() => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!(task = %args.task_id, "interrupted, cancelling session");
            handle.cancel().await;
            return Ok(ExitCode::from(130));
        }
    };

    match outcome {
        Some(SessionOutcome::Completed { content, .. }) => {
            info!(task = %args.task_id, "report ready");
            println!("{content}");
            Ok(ExitCode::SUCCESS)
        }
        Some(SessionOutcome::AuthFailed { message }) => {
            eprintln!("authorization failed: {message}");
            Ok(ExitCode::FAILURE)
        }
        Some(SessionOutcome::Failed { status, message }) => {
            eprintln!("task {status}: {message}");
            Ok(ExitCode::FAILURE)
        }
        None => {
            eprintln!("session ended without an outcome");
            Ok(ExitCode::FAILURE)
        }
    }
}
