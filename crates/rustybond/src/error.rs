//! Error types for the rustybond library
//!
//! Only local faults are errors. Outcomes of a pairing procedure (peer
//! rejection, authentication failure, timeout) are reported as a
//! [`SecurityStatus`](crate::smp::SecurityStatus) through the pairing-complete
//! notification instead.

use thiserror::Error;

/// Errors raised by security manager operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SmpError {
    /// Malformed cryptographic or key input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The session is busy with another security procedure
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The operation is not allowed by the current configuration
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    /// The transport refused or failed to deliver a command
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Bond store error: {0}")]
    BondStore(String),

    #[error("Thread error: {0}")]
    Thread(String),
}

/// Result type for security manager operations
pub type SmpResult<T> = Result<T, SmpError>;
