//! Error types shared by the Armature runtime.

use thiserror::Error;

/// Errors raised by the node context and transports
#[derive(Debug, Error)]
pub enum ArmatureError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Communication error: {0}")]
    Communication(String),

    #[error("Topic '{topic}' is already registered with message type {existing}")]
    TopicTypeMismatch { topic: String, existing: String },

    #[error("Invalid name '{0}': names must be non-empty and contain only [A-Za-z0-9_/]")]
    InvalidName(String),

    #[error("Node '{0}' has been shut down")]
    NodeShutdown(String),

    #[error("Failed to install signal handler: {0}")]
    SignalHandler(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<bincode::Error> for ArmatureError {
    fn from(err: bincode::Error) -> Self {
        ArmatureError::Serialization(err.to_string())
    }
}

/// Result type for runtime operations
pub type ArmatureResult<T> = Result<T, ArmatureError>;
