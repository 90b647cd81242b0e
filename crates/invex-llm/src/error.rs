//! Error types for the generation layer.

use thiserror::Error;

/// Errors that can occur while asking a model for text.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// The generation service could not be reached.
    #[error("generation service unavailable: {0}")]
    Unavailable(String),

    /// The request did not complete within the backend's timeout.
    #[error("generation timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The service answered with blank text.
    #[error("generation service returned an empty response")]
    EmptyResponse,

    /// The service answered with a non-success status code.
    #[error("generation service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The service answered but the envelope could not be decoded.
    #[error("invalid response envelope: {0}")]
    InvalidResponse(String),

    /// The HTTP client could not be constructed.
    #[error("failed to create client: {0}")]
    Client(String),
}

impl GenerationError {
    /// Whether the failure means the service itself is out of reach,
    /// as opposed to a bad answer from a reachable service.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            GenerationError::Unavailable(_) | GenerationError::Timeout { .. } | GenerationError::Client(_)
        )
    }
}
