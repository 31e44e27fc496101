use axum::http::StatusCode;
use thiserror::Error;

/// Which end of an edge a dangling reference was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeEndpoint {
    Source,
    Target,
}

impl std::fmt::Display for EdgeEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeEndpoint::Source => f.write_str("source"),
            EdgeEndpoint::Target => f.write_str("target"),
        }
    }
}

/// Main error type for dagcheck
#[derive(Error, Debug)]
pub enum DagcheckError {
    /// Payload is not valid JSON or does not have the expected shape
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// The same node id was declared more than once
    #[error("Duplicate node id: '{0}'")]
    DuplicateNode(String),

    /// An edge names a node that was never declared
    #[error("Edge {index} references undeclared {endpoint} node '{id}'")]
    DanglingReference {
        index: usize,
        endpoint: EdgeEndpoint,
        id: String,
    },

    /// Graph is bigger than the configured limits
    #[error("Too many {what}: {count} (limit is {max})")]
    LimitExceeded {
        what: &'static str,
        count: usize,
        max: usize,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system / socket I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DagcheckError {
    /// HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            DagcheckError::MalformedInput(_)
            | DagcheckError::DuplicateNode(_)
            | DagcheckError::DanglingReference { .. }
            | DagcheckError::LimitExceeded { .. } => StatusCode::BAD_REQUEST,
            DagcheckError::Config(_) | DagcheckError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when the caller sent something we refuse to process.
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Convenient Result type using DagcheckError
pub type Result<T> = std::result::Result<T, DagcheckError>;
