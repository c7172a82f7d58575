//! Error types for the bridge and the controller.

use thiserror::Error;

/// Failure of a single request over the host bridge.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// The request never produced a response (channel closed, backend crashed).
    #[error("bridge transport failed: {0}")]
    Transport(String),
    /// The response arrived but could not be understood.
    #[error("invalid bridge response: {0}")]
    InvalidResponse(String),
    /// The backend answered with `success = false`.
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Errors surfaced by controller entry points.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error("name cannot be empty")]
    EmptyName,
    #[error("no person is selected")]
    NoActivePerson,
    #[error("no photo to act on")]
    NoTarget,
    #[error("person must be named first")]
    UnnamedPerson,
    #[error("{failed} of {total} photos failed")]
    BulkPartial { failed: usize, total: usize },
}

pub type Result<T, E = ControllerError> = std::result::Result<T, E>;
