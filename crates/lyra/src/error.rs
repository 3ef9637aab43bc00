//! Error types for Lyra

use thiserror::Error;

/// Main error type for Lyra operations
#[derive(Error, Debug)]
pub enum LyraError {
    /// Configuration errors (missing credentials, bad config file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upstream completion API errors (rejection, stream failure)
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Web search collaborator errors
    #[error("Search error: {0}")]
    Search(String),

    /// Conversation store errors
    #[error("Store error: {0}")]
    Store(String),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for Lyra operations
pub type Result<T> = std::result::Result<T, LyraError>;
