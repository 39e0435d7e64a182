//! Structured progress and stream message types

use serde::{Deserialize, Serialize};

/// Deployment phase a progress event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Prerequisites,
    Settings,
    Build,
    Deploy,
    Patch,
}

/// Status of a stage or a service within a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Pending,
    Running,
    Success,
    Error,
}

/// Structured classification of one log line
///
/// An empty `service` denotes a stage-level event rather than one scoped to
/// a single microservice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub service: String,
    pub status: ProgressStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ProgressEvent {
    /// Stage-level event with no service scope
    pub fn stage_level(stage: Stage, status: ProgressStatus, message: impl Into<String>) -> Self {
        Self {
            stage,
            service: String::new(),
            status,
            message: message.into(),
            details: None,
        }
    }

    /// Event scoped to a single microservice
    pub fn for_service(
        stage: Stage,
        service: impl Into<String>,
        status: ProgressStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            service: service.into(),
            status,
            message: message.into(),
            details: None,
        }
    }

    /// Attach a details string, dropping empty extractions
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        let details = details.into();
        self.details = if details.is_empty() {
            None
        } else {
            Some(details)
        };
        self
    }
}

/// Wire-level union delivered over the push stream
///
/// Exactly one `complete` message is ever sent per session, and it is the
/// last message before the queue closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    Connected {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Output {
        content: String,
    },
    Progress(ProgressEvent),
    Complete {
        content: String,
        success: bool,
    },
    Keepalive,
}
