//! Error types for nexograph.

use thiserror::Error;

/// Result type alias using nexograph's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for nexograph operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Job record not found
    #[error("Job not found: {0}")]
    JobNotFound(uuid::Uuid),

    /// Invalid input, rejected before a job record is created
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Job store / lifecycle error
    #[error("Job error: {0}")]
    Job(String),

    /// External tool exited non-zero
    #[error("{tool} exited with return code {code} -- please check your inputs, and contact the API developer if issues persist.")]
    ToolExit { tool: String, code: i32 },

    /// External tool exceeded its timeout and was killed
    #[error("{tool} timed out after {secs}s and was killed")]
    ToolTimeout { tool: String, secs: u64 },

    /// External tool could not be launched or produced unreadable output
    #[error("Tool error: {0}")]
    Tool(String),

    /// Invariant violation during graph assembly
    #[error("Graph build error: {0}")]
    GraphBuild(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
