//! Unified API router for DeployDeck
//!
//! Merges the deployment router with root-level probes, CORS, and a shared
//! application state.
//!
//! ## Endpoint Map
//!
//! | Route                        | Description                       |
//! |------------------------------|-----------------------------------|
//! | `/health`                    | Load balancer health probe        |
//! | `POST /deploy`               | One-shot blocking deployment      |
//! | `POST /deploy/start`         | Create a streaming session        |
//! | `GET  /deploy/stream/:id`    | Attach to a session's push stream |
//! | `POST /deploy/cancel/:id`    | Cancel a running session          |

use crate::deploy::{deploy_router, DeployState};
use axum::{
    http::{header, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

/// Build the complete DeployDeck HTTP application
pub fn build_app(state: DeployState, cors_origins: &[String]) -> Router {
    let cors = build_cors(cors_origins);

    Router::new()
        .route("/health", get(health_check))
        .merge(deploy_router(state))
        .layer(cors)
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(parsed)
    }
}
