//! Error types shared across Roundtable crates.

/// Errors raised by a language-model backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The request never produced an HTTP response.
    #[error("transport error talking to {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// The endpoint answered with a non-success status.
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The response carried no completion text.
    #[error("{endpoint} returned no completion text")]
    EmptyResponse { endpoint: String },

    /// The response body could not be decoded.
    #[error("invalid response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },

    /// A scripted or test backend ran out of replies.
    #[error("no scripted reply left for {agent}")]
    Exhausted { agent: String },
}

/// Top-level error type for Roundtable.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown participant: {0}")]
    UnknownParticipant(String),
}

/// Result alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;
