// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use chrono::{DateTime, Utc};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limit exhausted, resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Classification failed for {repo}: {message}")]
    Classification { repo: String, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Transient errors are eligible for retry with backoff; everything else
    /// aborts the operation immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s.is_server_error() || s == reqwest::StatusCode::TOO_MANY_REQUESTS
                    })
            }
            PipelineError::RateLimited { .. } => true,
            PipelineError::Fetch(_) => true,
            _ => false,
        }
    }
}
