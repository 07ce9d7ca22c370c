//! Error types for tagtree
//!
//! Provides a unified error type for all operations.
//!
//! ## Propagation
//! - `Decode` is produced by a single record's payload and is normally
//!   swallowed by [`LazyRecord::load`](crate::region::LazyRecord::load),
//!   which turns it into `Corrupt` state
//! - everything else travels to the caller unchanged; nothing is retried

use thiserror::Error;

/// Result type alias using TreeError
pub type Result<T> = std::result::Result<T, TreeError>;

/// Unified error type for tagtree operations
#[derive(Debug, Error)]
pub enum TreeError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    /// Archive header or document payload is structurally invalid
    #[error("Format error: {0}")]
    Format(String),

    /// A single record's payload failed to decode
    #[error("Decode error: {0}")]
    Decode(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Contract Violations
    // -------------------------------------------------------------------------
    /// Caller broke an API contract (occupied slot, detached tag, ...)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // -------------------------------------------------------------------------
    // Cancellation
    // -------------------------------------------------------------------------
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<bincode::Error> for TreeError {
    fn from(err: bincode::Error) -> Self {
        TreeError::Serialization(err.to_string())
    }
}
