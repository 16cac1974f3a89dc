//! Error types for function-runtime.

use thiserror::Error;

use crate::loader::LoadError;

/// Main error type for runtime operations.
///
/// Per-request variants (`Json`, `InvalidEnvelope`, `BodyTooLarge`, `Body`)
/// never escape the invocation boundary: they are rendered into the
/// `error_message` of a failed response.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// I/O error during socket or filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Envelope was not valid JSON. Displays the parser message verbatim.
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// Envelope was valid JSON but not an envelope.
    #[error("{0}")]
    InvalidEnvelope(&'static str),

    /// Request body exceeded the configured limit.
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// Request body could not be read from the connection.
    #[error("failed to read request body: {0}")]
    Body(String),

    /// User handler could not be resolved.
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Result type alias using RuntimeError.
pub type Result<T> = std::result::Result<T, RuntimeError>;
