//! Error types for the graph engine
//!
//! Mirrors the failure model in the design: corrupt records are logged and
//! skipped rather than surfaced, every other failure propagates to the caller.

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, GraphError>;

/// Error kinds surfaced by the store, search, and agent-memory layers
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Requested entity or relation does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Attempted to create something that already exists under strict mode
    #[error("conflict: {0}")]
    Conflict(String),

    /// Input failed validation (bad range, empty query, negative TTL, ...)
    #[error("validation error: {0}")]
    Validation(String),

    /// Setting a parent would create a cycle in the hierarchy
    #[error("cycle detected: {0}")]
    Cycle(String),

    /// Underlying I/O failure (file or database)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record was malformed; the caller already logged and skipped it
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// Operation was cancelled before completion
    #[error("cancelled")]
    Cancelled,

    /// Operation exceeded its allotted time
    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// A collaborator required for the operation is unavailable (worker pool, embeddings, ...)
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// Relational backend error
    #[cfg(feature = "backend-sqlite")]
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Path failed validation (traversal, absolute escape, ...)
    #[error("path refused: {0}")]
    PathRefused(String),
}

impl GraphError {
    /// True for errors that are expected to occur during normal operation
    /// (not found, validation) as opposed to infrastructure failures.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            GraphError::NotFound(_)
                | GraphError::Conflict(_)
                | GraphError::Validation(_)
                | GraphError::Cycle(_)
        )
    }
}
