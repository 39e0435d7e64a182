//! HTTP handlers for deployment control
//!
//! - `POST /deploy`                    — one-shot run, blocks until exit
//! - `POST /deploy/start`              — create a streaming session
//! - `GET  /deploy/stream/:session_id` — attach to a session's push stream
//! - `POST /deploy/cancel/:session_id` — cancel a running session

use crate::config::DeployConfig;
use crate::deploy::{spawn_deployment, stream};
use crate::executor::{sanitize_path, validate_folder_path, ProcessRunner};
use crate::session::SessionRegistry;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared state for deployment handlers
#[derive(Clone)]
pub struct DeployState {
    pub registry: Arc<SessionRegistry>,
    pub runner: Arc<ProcessRunner>,
    pub config: DeployConfig,
}

impl DeployState {
    pub fn new(config: DeployConfig) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new(config.queue_capacity)),
            runner: Arc::new(ProcessRunner::new(config.clone())),
            config,
        }
    }
}

/// Create the deployment router with all endpoints
pub fn deploy_router(state: DeployState) -> Router {
    Router::new()
        .route("/deploy", post(deploy_once))
        .route("/deploy/start", post(start_deployment))
        .route("/deploy/stream/:session_id", get(stream::stream_deployment))
        .route("/deploy/cancel/:session_id", post(cancel_deployment))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct DeployRequest {
    #[serde(rename = "folderPath", default)]
    folder_path: String,
}

#[derive(Debug, Serialize)]
struct RunOutcome {
    message: String,
    success: bool,
}

/// Start a streaming deployment session
async fn start_deployment(
    State(state): State<DeployState>,
    Json(request): Json<DeployRequest>,
) -> impl IntoResponse {
    if let Err(e) = validate_folder_path(&request.folder_path) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": e.to_string()})),
        );
    }
    let folder = sanitize_path(&request.folder_path);

    let (session, producer) = state.registry.create(request.folder_path).await;
    let session_id = session.id.clone();
    spawn_deployment(state, session, producer, folder);

    (
        StatusCode::OK,
        Json(serde_json::json!({"sessionId": session_id})),
    )
}

/// Cancel a running deployment session
///
/// Idempotent on a live session; a stale id is a 404, the same normal
/// outcome a stream attach sees after expiry.
async fn cancel_deployment(
    State(state): State<DeployState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.lookup(&session_id).await {
        Some(session) => {
            session.cancel();
            tracing::info!(session_id = %session_id, "Cancellation requested");
            (
                StatusCode::OK,
                Json(serde_json::json!({"status": "cancelled", "sessionId": session_id})),
            )
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Session not found"})),
        ),
    }
}

/// Run a deployment to completion and return the collected output
async fn deploy_once(
    State(state): State<DeployState>,
    Json(request): Json<DeployRequest>,
) -> impl IntoResponse {
    if let Err(e) = validate_folder_path(&request.folder_path) {
        return Json(RunOutcome {
            message: e.to_string(),
            success: false,
        });
    }
    let folder = sanitize_path(&request.folder_path);

    let process = match state.runner.launch(&folder) {
        Ok(process) => process,
        Err(e) => {
            return Json(RunOutcome {
                message: e.to_string(),
                success: false,
            })
        }
    };

    match process.wait_with_output().await {
        Ok(output) => {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            if output.status.success() {
                Json(RunOutcome {
                    message: format!("Deployment completed!\n{}", combined),
                    success: true,
                })
            } else {
                Json(RunOutcome {
                    message: format!("Error: {}\nOutput: {}", output.status, combined),
                    success: false,
                })
            }
        }
        Err(e) => Json(RunOutcome {
            message: format!("Error waiting for deployment: {}", e),
            success: false,
        }),
    }
}
