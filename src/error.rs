//! DeployDeck error types

use thiserror::Error;

/// DeployDeck error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Subprocess could not be started
    #[error("Launch error: {0}")]
    Launch(String),

    /// Session id is unknown or expired
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Folder path failed validation
    #[error("Invalid folder path: {0}")]
    InvalidPath(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for DeployDeck operations
pub type Result<T> = std::result::Result<T, Error>;
