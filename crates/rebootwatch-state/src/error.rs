//! Error types for the device registry.

use thiserror::Error;

/// Result type alias for registry operations.
pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("device not in registry: {0}")]
    UnknownDevice(String),
}
