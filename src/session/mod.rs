//! Deployment session state
//!
//! One [`Session`] tracks one in-flight deployment run: its target folder,
//! cancellation token, bounded outbound message queue, and completion
//! signal. Sessions are owned exclusively by the [`registry::SessionRegistry`]
//! from creation until removal.

pub mod registry;

pub use registry::SessionRegistry;

use crate::progress::OutboundMessage;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;

/// One tracked deployment run
pub struct Session {
    /// Opaque session identifier
    pub id: String,
    /// Target folder (immutable after creation)
    pub folder_path: String,
    /// Creation timestamp, unix millis
    pub created_at: i64,
    cancel: CancellationToken,
    /// Consumer side of the outbound queue. A stream attach locks this,
    /// making it the single consumer; producers backpressure into the
    /// bounded queue while nobody is draining.
    events: Mutex<mpsc::Receiver<OutboundMessage>>,
    completed: watch::Receiver<bool>,
}

/// Producer side of a session's queue, held by the driving task
///
/// Dropping it closes the queue; `mark_completed` fires the completion
/// signal exactly once.
pub struct SessionProducer {
    pub events: mpsc::Sender<OutboundMessage>,
    completed: watch::Sender<bool>,
}

impl Session {
    pub(crate) fn new(
        id: String,
        folder_path: String,
        queue_capacity: usize,
    ) -> (Self, SessionProducer) {
        let (events_tx, events_rx) = mpsc::channel(queue_capacity);
        let (completed_tx, completed_rx) = watch::channel(false);
        let session = Self {
            id,
            folder_path,
            created_at: chrono::Utc::now().timestamp_millis(),
            cancel: CancellationToken::new(),
            events: Mutex::new(events_rx),
            completed: completed_rx,
        };
        let producer = SessionProducer {
            events: events_tx,
            completed: completed_tx,
        };
        (session, producer)
    }

    /// Trigger cooperative cancellation (idempotent)
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Clone the cancellation token for relay tasks
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Consumer side of the outbound queue
    pub fn events(&self) -> &Mutex<mpsc::Receiver<OutboundMessage>> {
        &self.events
    }

    /// Fresh watch handle on the completion signal
    pub fn completed(&self) -> watch::Receiver<bool> {
        self.completed.clone()
    }
}

impl SessionProducer {
    /// Fire the completion signal. No events may be enqueued afterwards.
    pub fn mark_completed(&self) {
        let _ = self.completed.send(true);
    }
}
