//! Push-stream transport for deployment sessions
//!
//! One instance per client connection. The `connected` event is emitted
//! before anything else; afterwards the generator waits on the first of
//! {next queued message, completion signal, keepalive tick}. A client
//! disconnect drops the generator, which releases the queue lock and
//! leaves the subprocess running to completion in the background.

use crate::deploy::DeployState;
use crate::progress::OutboundMessage;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    Json,
};
use std::convert::Infallible;
use std::time::Duration;

/// GET /deploy/stream/:session_id
///
/// A stale or unknown id is a 404 — the normal outcome when a client
/// reconnects after the session finished, not a system error.
pub async fn stream_deployment(
    State(state): State<DeployState>,
    Path(session_id): Path<String>,
) -> Response {
    let Some(session) = state.registry.lookup(&session_id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Session not found"})),
        )
            .into_response();
    };

    let keepalive = Duration::from_secs(state.config.keepalive_secs);

    let stream = async_stream::stream! {
        yield Ok::<Event, Infallible>(frame(&OutboundMessage::Connected {
            session_id: session.id.clone(),
        }));

        // Single consumer: holding this lock for the connection lifetime
        // keeps producers backpressuring into the bounded queue while a
        // disconnected client is away.
        let mut events = session.events().lock().await;
        let mut completed = session.completed();

        enum Step {
            Message(Option<OutboundMessage>),
            Completed,
            Idle,
        }

        loop {
            let step = tokio::select! {
                // Queued messages win over the completion signal so the
                // terminal `complete` is never skipped.
                biased;
                message = events.recv() => Step::Message(message),
                _ = wait_completed(&mut completed) => Step::Completed,
                _ = tokio::time::sleep(keepalive) => Step::Idle,
            };

            match step {
                Step::Message(Some(message)) => {
                    let is_complete = matches!(message, OutboundMessage::Complete { .. });
                    yield Ok(frame(&message));
                    if is_complete {
                        break;
                    }
                }
                // Queue closed after the terminal message was taken
                Step::Message(None) | Step::Completed => break,
                Step::Idle => {
                    yield Ok(frame(&OutboundMessage::Keepalive));
                }
            }
        }
    };

    Sse::new(stream).into_response()
}

/// Resolve once the completion signal has fired (or its sender is gone)
async fn wait_completed(completed: &mut tokio::sync::watch::Receiver<bool>) {
    let _ = completed.wait_for(|done| *done).await;
}

fn frame(message: &OutboundMessage) -> Event {
    Event::default().data(serde_json::to_string(message).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeployConfig;
    use crate::deploy::{deploy_router, DeployState};
    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn make_state(scripts_dir: &std::path::Path, keepalive_secs: u64) -> DeployState {
        DeployState::new(DeployConfig {
            scripts_dir: scripts_dir.to_path_buf(),
            keepalive_secs,
            ..DeployConfig::default()
        })
    }

    async fn start_session(app: &Router, folder: &std::path::Path) -> String {
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/deploy/start")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({"folderPath": folder.to_str().unwrap()}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        json["sessionId"].as_str().unwrap().to_string()
    }

    /// Collect the whole SSE body (the stream ends after `complete`) and
    /// parse each `data:` frame as JSON.
    async fn collect_frames(app: &Router, session_id: &str) -> Vec<serde_json::Value> {
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/deploy/stream/{}", session_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        String::from_utf8(body.to_vec())
            .unwrap()
            .lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_stream_unknown_session_is_404() {
        let scripts = TempDir::new().unwrap();
        let app = deploy_router(make_state(scripts.path(), 30));

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/deploy/stream/deploy_0_0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_end_to_end_progress_stream() {
        let scripts = TempDir::new().unwrap();
        std::fs::write(
            scripts.path().join("deploy.sh"),
            concat!(
                "#!/bin/bash\n",
                "sleep 0.3\n",
                "echo 'All prerequisites checks passed! (2 checks)'\n",
                "echo 'Building microservice: a'\n",
                "echo 'Build completed successfully for a'\n",
                "echo 'Building microservice: b'\n",
                "echo 'Build completed successfully for b'\n",
                "exit 0\n",
            ),
        )
        .unwrap();
        let folder = TempDir::new().unwrap();
        let state = make_state(scripts.path(), 30);
        let app = deploy_router(state.clone());

        let session_id = start_session(&app, folder.path()).await;
        let frames = collect_frames(&app, &session_id).await;

        // The connected event comes strictly first
        assert_eq!(frames[0]["type"], "connected");
        assert_eq!(frames[0]["sessionId"], session_id);

        let progress: Vec<&serde_json::Value> =
            frames.iter().filter(|f| f["type"] == "progress").collect();
        assert_eq!(progress.len(), 5);
        assert_eq!(progress[0]["stage"], "prerequisites");
        assert_eq!(progress[0]["status"], "success");
        assert_eq!(progress[1]["stage"], "build");
        assert_eq!(progress[1]["service"], "a");
        assert_eq!(progress[1]["status"], "running");
        assert_eq!(progress[2]["service"], "a");
        assert_eq!(progress[2]["status"], "success");
        assert_eq!(progress[3]["service"], "b");
        assert_eq!(progress[3]["status"], "running");
        assert_eq!(progress[4]["service"], "b");
        assert_eq!(progress[4]["status"], "success");

        // Exactly one terminal complete, as the last frame
        let last = frames.last().unwrap();
        assert_eq!(last["type"], "complete");
        assert_eq!(last["success"], true);
        assert_eq!(
            frames.iter().filter(|f| f["type"] == "complete").count(),
            1
        );

        // Raw output events are always forwarded alongside progress
        assert!(frames
            .iter()
            .any(|f| f["type"] == "output" && f["content"] == "Building microservice: a"));

        // After complete is delivered the registry entry is gone
        for _ in 0..50 {
            if state.registry.lookup(&session_id).await.is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(state.registry.lookup(&session_id).await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_script_completes_with_failure() {
        let scripts = TempDir::new().unwrap();
        std::fs::write(
            scripts.path().join("deploy.sh"),
            "#!/bin/bash\nsleep 0.3\necho 'BUILD FAILURE'\nexit 1\n",
        )
        .unwrap();
        let folder = TempDir::new().unwrap();
        let app = deploy_router(make_state(scripts.path(), 30));

        let session_id = start_session(&app, folder.path()).await;
        let frames = collect_frames(&app, &session_id).await;

        let last = frames.last().unwrap();
        assert_eq!(last["type"], "complete");
        assert_eq!(last["success"], false);

        let error = frames
            .iter()
            .find(|f| f["type"] == "progress" && f["status"] == "error")
            .unwrap();
        assert_eq!(error["stage"], "build");
        assert_eq!(error["service"], "");
        assert_eq!(error["message"], "Building Microservices");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_keepalive_emitted_while_idle() {
        let scripts = TempDir::new().unwrap();
        std::fs::write(scripts.path().join("deploy.sh"), "#!/bin/bash\nsleep 3\n").unwrap();
        let folder = TempDir::new().unwrap();
        let app = deploy_router(make_state(scripts.path(), 1));

        let session_id = start_session(&app, folder.path()).await;
        let frames = collect_frames(&app, &session_id).await;

        // The stream stayed open across the idle window and still terminated
        assert!(frames.iter().any(|f| f["type"] == "keepalive"));
        assert_eq!(frames.last().unwrap()["type"], "complete");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancelled_session_completes_with_abort_message() {
        let scripts = TempDir::new().unwrap();
        std::fs::write(scripts.path().join("deploy.sh"), "#!/bin/bash\nsleep 30\n").unwrap();
        let folder = TempDir::new().unwrap();
        let app = deploy_router(make_state(scripts.path(), 30));

        let session_id = start_session(&app, folder.path()).await;

        // Attach the stream first, then cancel while it is live
        let reader = tokio::spawn({
            let app = app.clone();
            let session_id = session_id.clone();
            async move { collect_frames(&app, &session_id).await }
        });
        tokio::time::sleep(Duration::from_millis(200)).await;

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/deploy/cancel/{}", session_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let frames = reader.await.unwrap();
        let last = frames.last().unwrap();
        assert_eq!(last["type"], "complete");
        assert_eq!(last["success"], false);
        assert_eq!(last["content"], "Deployment aborted by user");
    }
}
