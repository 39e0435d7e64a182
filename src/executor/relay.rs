//! Output relay between a deployment subprocess and a session queue
//!
//! Two reader tasks (one per output stream) forward lines as raw `output`
//! events; stdout lines are additionally classified into `progress` events.
//! The driving future waits for exit, cancellation, or timeout, joins both
//! readers, and enqueues the single terminal `complete` event.
//!
//! Enqueueing blocks when the bounded queue is full: a slow or absent
//! consumer throttles the readers instead of growing memory without bound.

use crate::executor::runner::LaunchedProcess;
use crate::progress::{classify, OutboundMessage};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Lines matching this marker are terminal-size noise, never forwarded
const NOISE_MARKER: &str = "screen size is bogus";

/// Drain a launched process into the session queue until it finishes
///
/// Sends exactly one `complete` event, after both reader tasks have
/// finished and the exit outcome is known.
pub async fn relay_process_output(
    mut process: LaunchedProcess,
    events: mpsc::Sender<OutboundMessage>,
    cancel: CancellationToken,
    timeout: Duration,
) {
    let stdout = process.take_stdout();
    let stderr = process.take_stderr();

    let stdout_task = stdout.map(|pipe| {
        tokio::spawn(relay_stream(pipe, events.clone(), cancel.clone(), true))
    });
    let stderr_task = stderr.map(|pipe| {
        tokio::spawn(relay_stream(pipe, events.clone(), cancel.clone(), false))
    });

    enum ExitReason {
        Cancelled,
        TimedOut,
        Exited(std::io::Result<std::process::ExitStatus>),
    }

    let reason = tokio::select! {
        _ = cancel.cancelled() => ExitReason::Cancelled,
        _ = tokio::time::sleep(timeout) => ExitReason::TimedOut,
        status = process.wait() => ExitReason::Exited(status),
    };

    let (content, success) = match reason {
        ExitReason::Cancelled => {
            tracing::info!("Deployment cancelled, terminating subprocess");
            process.kill().await;
            ("Deployment aborted by user".to_string(), false)
        }
        ExitReason::TimedOut => {
            tracing::warn!(timeout_secs = timeout.as_secs(), "Deployment timed out");
            process.kill().await;
            ("Deployment timed out".to_string(), false)
        }
        ExitReason::Exited(status) => {
            let success = status.map(|s| s.success()).unwrap_or(false);
            let content = if success {
                "Deployment completed successfully".to_string()
            } else {
                "Check logs for more details".to_string()
            };
            (content, success)
        }
    };

    // The pipes hit EOF once the subprocess is gone; join both readers so
    // every output line precedes the terminal message.
    futures::future::join(
        async {
            if let Some(task) = stdout_task {
                let _ = task.await;
            }
        },
        async {
            if let Some(task) = stderr_task {
                let _ = task.await;
            }
        },
    )
    .await;

    let _ = events
        .send(OutboundMessage::Complete { content, success })
        .await;
}

/// Read one output stream line by line into the session queue
///
/// `classify_lines` is set for stdout only; stderr lines are forwarded raw.
async fn relay_stream<R>(
    pipe: R,
    events: mpsc::Sender<OutboundMessage>,
    cancel: CancellationToken,
    classify_lines: bool,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(pipe).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            next = lines.next_line() => match next {
                Ok(Some(line)) => line,
                _ => break,
            },
        };

        if line.contains(NOISE_MARKER) {
            continue;
        }

        if events
            .send(OutboundMessage::Output {
                content: line.clone(),
            })
            .await
            .is_err()
        {
            break;
        }

        if classify_lines {
            if let Some(event) = classify(&line) {
                if events.send(OutboundMessage::Progress(event)).await.is_err() {
                    break;
                }
            }
        }
    }
}
