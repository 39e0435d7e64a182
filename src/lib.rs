//! DeployDeck - Deployment console with live progress streaming
//!
//! DeployDeck launches a long-running build/deploy script against a
//! selected repository folder and streams its output to a browser as
//! structured progress events over a server-sent-events connection.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       HTTP API (axum)                        │
//! │   POST /deploy/start   GET /deploy/stream/:id   POST /deploy │
//! │                        POST /deploy/cancel/:id               │
//! └───────────┬──────────────────────┬──────────────────────────┘
//!             │                      │ attach (single consumer)
//!             ▼                      ▼
//! ┌───────────────────┐   ┌──────────────────────┐
//! │  SessionRegistry  │   │   Stream transport    │
//! │  id → Session     │   │   SSE + keepalives    │
//! └───────────┬───────┘   └──────────▲───────────┘
//!             │ create               │ bounded queue
//!             ▼                      │
//! ┌──────────────────────────────────┴───────────┐
//! │              Deployment driver                │
//! │  ProcessRunner → subprocess (bash / WSL)      │
//! │  OutputRelay   → output + progress events     │
//! │  Classifier    → marker lines → stage/status  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`api`]: unified HTTP router
//! - [`deploy`]: deployment orchestration, handlers, and stream transport
//! - [`executor`]: subprocess staging, launch, and output relay
//! - [`progress`]: line classification and wire-level message types
//! - [`session`]: session state and registry
//! - [`config`]: configuration management

pub mod api;
pub mod config;
pub mod deploy;
pub mod error;
pub mod executor;
pub mod progress;
pub mod session;

pub use config::DeployDeckConfig;
pub use error::{Error, Result};
