//! Error types shared across the TSN adapters

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, TsnError>;

/// Shared error type for the TSN adapters workspace
#[derive(Error, Debug)]
pub enum TsnError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid stream id: {0}. Expected 'st' followed by 30 lowercase hex characters.")]
    InvalidStreamId(String),

    #[error("Configuration error: {0}. Check your environment variables.")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl TsnError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}
