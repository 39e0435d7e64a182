//! In-memory session registry
//!
//! The only shared mutable structure in the crate; all access goes through
//! its read/write lock.

use crate::session::{Session, SessionProducer};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-wide map of live deployment sessions
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    /// Monotonic suffix keeping time-derived ids collision-free under
    /// rapid creation
    counter: AtomicU64,
    queue_capacity: usize,
}

impl SessionRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            counter: AtomicU64::new(0),
            queue_capacity,
        }
    }

    /// Allocate a fresh id and insert a new session
    pub async fn create(&self, folder_path: impl Into<String>) -> (Arc<Session>, SessionProducer) {
        let id = self.next_id();
        let (session, producer) = Session::new(id.clone(), folder_path.into(), self.queue_capacity);
        let session = Arc::new(session);

        self.sessions
            .write()
            .await
            .insert(id.clone(), session.clone());

        tracing::info!(session_id = %id, folder = %session.folder_path, "Created deployment session");
        (session, producer)
    }

    /// Look up a session by id
    pub async fn lookup(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Remove a session. Removing an absent id is a no-op.
    pub async fn remove(&self, id: &str) {
        if self.sessions.write().await.remove(id).is_some() {
            tracing::info!(session_id = %id, "Removed deployment session");
        }
    }

    /// Number of currently registered sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    fn next_id(&self) -> String {
        let millis = chrono::Utc::now().timestamp_millis();
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("deploy_{}_{}", millis, seq)
    }
}
