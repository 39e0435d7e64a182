//! Deployment orchestration and HTTP surface
//!
//! A start request creates a session and spawns the driving task below;
//! the stream handler attaches to the session queue; the cancel handler
//! triggers the session's token. The driving task owns the producer side
//! of the queue and is the only place the registry entry is removed.

pub mod handler;
pub mod stream;

pub use handler::{deploy_router, DeployState};

use crate::executor::relay_process_output;
use crate::progress::OutboundMessage;
use crate::session::{Session, SessionProducer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Launch the subprocess and drive it to completion in the background
///
/// Regardless of outcome the queue receives exactly one `complete`
/// message, the completion signal fires, the registry entry is removed,
/// and the producer is dropped (closing the queue) — in that order.
pub fn spawn_deployment(
    state: DeployState,
    session: Arc<Session>,
    producer: SessionProducer,
    folder: PathBuf,
) {
    tokio::spawn(async move {
        let cancel = session.cancel_token();
        let timeout = Duration::from_secs(state.config.command_timeout_secs);

        match state.runner.launch(&folder) {
            Ok(process) => {
                relay_process_output(process, producer.events.clone(), cancel, timeout).await;
            }
            Err(e) => {
                tracing::error!(session_id = %session.id, "Deployment launch failed: {}", e);
                let _ = producer
                    .events
                    .send(OutboundMessage::Complete {
                        content: e.to_string(),
                        success: false,
                    })
                    .await;
            }
        }

        producer.mark_completed();
        state.registry.remove(&session.id).await;
        tracing::info!(session_id = %session.id, "Deployment session finished");
    });
}
