//! Error types for the Linkwise domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Storage has its own
//! bounded-context error; [`Error`] is the closed taxonomy surfaced to the
//! transport boundary, which alone decides status codes.

use thiserror::Error;

use crate::contact::ContactId;

/// The top-level error type for all Linkwise operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Missing or malformed email / phone. Detected before reconciliation runs.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A concurrent reconciliation collided with this one.
    /// Retrying the whole reconciliation is safe.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A targeted update addressed a contact that does not exist.
    #[error("Contact {0} not found")]
    NotFound(ContactId),

    /// Storage unreachable, timed out, or failed unexpectedly. `transient`
    /// is set for timeouts and lost connections.
    #[error("Infrastructure failure: {message}")]
    Infrastructure { message: String, transient: bool },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification used by the transport boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller can fix the request (or retry a conflict).
    Client,
    /// Something broke on our side.
    Server,
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Validation(_) | Error::Conflict(_) => ErrorClass::Client,
            Error::NotFound(_) | Error::Infrastructure { .. } | Error::Config { .. } => {
                ErrorClass::Server
            }
        }
    }

    /// Whether re-running the same reconciliation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::Infrastructure { .. })
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Uniqueness violation or serialization failure from a concurrent writer.
    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Contact {0} not found")]
    NotFound(ContactId),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage timed out: {0}")]
    Timeout(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

impl StoreError {
    /// Timeouts and lost connections, as opposed to bad queries.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => Error::Conflict(msg),
            StoreError::NotFound(id) => Error::NotFound(id),
            other => Error::Infrastructure {
                transient: other.is_transient(),
                message: other.to_string(),
            },
        }
    }
}
