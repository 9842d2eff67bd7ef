//! Error types for API Replay

use std::io;
use thiserror::Error;

/// Result type for API Replay operations
pub type Result<T> = std::result::Result<T, ApiReplayError>;

/// Errors that can occur while recording or serving
#[derive(Debug, Error)]
pub enum ApiReplayError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed URL, path or storage name
    #[error("Invalid request identity: {0}")]
    InvalidIdentity(String),

    /// Malformed custom header
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Network failure while talking to the upstream API
    #[error("Upstream request failed: {0}")]
    Upstream(String),

    /// Upstream answered with a non-2xx status
    #[error("Upstream returned HTTP {status}\nResponse body:\n{body}")]
    UpstreamStatus {
        /// Status code returned by the upstream
        status: u16,
        /// Response body, lossily decoded
        body: String,
    },

    /// Storage root cannot be traversed
    #[error("Cannot index {root}: {reason}")]
    Index {
        /// Root directory that failed
        root: String,
        /// Underlying cause
        reason: String,
    },

    /// Artifact file exists but cannot be parsed
    #[error("Corrupt artifact {path}: {reason}")]
    ArtifactCorrupt {
        /// Artifact file path
        path: String,
        /// Parse failure
        reason: String,
    },

    /// Matched artifact file has disappeared since indexing
    #[error("Artifact file missing: {0}")]
    ArtifactMissing(String),

    /// No route matches the request
    #[error("No recorded response for {}{}", .path, query_suffix(.query))]
    NotFound {
        /// Request path
        path: String,
        /// Raw request query
        query: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Upstream response too large
    #[error("Data too large: {size} bytes exceeds limit of {limit} bytes")]
    DataTooLarge {
        /// Actual size
        size: usize,
        /// Size limit
        limit: usize,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl ApiReplayError {
    /// Whether the error should be reported as a client-side (4xx) outcome
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

fn query_suffix(query: &str) -> String {
    if query.is_empty() {
        String::new()
    } else {
        format!("?{query}")
    }
}
