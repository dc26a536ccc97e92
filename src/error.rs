//! Error types for tempstore
//!
//! Provides a unified error type for all operations, plus a coarse
//! [`ErrorKind`] so hosts can tell misuse apart from resource and I/O faults.

use thiserror::Error;

use crate::handle::HandleState;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for tempstore operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // Misuse
    // -------------------------------------------------------------------------
    #[error("cannot {operation} a handle in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: HandleState,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Resource Errors
    // -------------------------------------------------------------------------
    #[error("failed to map a {size} byte segment: {source}")]
    ResourceExhausted {
        size: usize,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored content corrupted: {0}")]
    Corrupted(String),

    #[error("Background task was abandoned before completing")]
    TaskAbandoned,

    // -------------------------------------------------------------------------
    // Cancellation
    // -------------------------------------------------------------------------
    #[error("Operation cancelled")]
    Cancelled,
}

/// Coarse classification of a [`StoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The operation is not legal in the handle's current state
    InvalidState,
    /// Missing, empty or malformed input
    InvalidArgument,
    /// The backing mapping could not be created
    ResourceExhaustion,
    /// A fault while copying to or from an established mapping
    IoFailure,
    /// The caller's cancellation token fired before any mapping was created
    Cancelled,
}

impl StoreError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::InvalidState { .. } => ErrorKind::InvalidState,
            StoreError::InvalidArgument(_) | StoreError::Encoding(_) | StoreError::Config(_) => {
                ErrorKind::InvalidArgument
            }
            StoreError::ResourceExhausted { .. } => ErrorKind::ResourceExhaustion,
            StoreError::Io(_) | StoreError::Corrupted(_) | StoreError::TaskAbandoned => {
                ErrorKind::IoFailure
            }
            StoreError::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn invalid_state(operation: &'static str, state: HandleState) -> Self {
        StoreError::InvalidState { operation, state }
    }
}
