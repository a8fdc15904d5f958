//! Error types for engine handle operations.

use thiserror::Error;

/// Errors surfaced by an engine or one of its network handles.
///
/// `Unsupported` is special: it marks an optional entry point the handle does
/// not expose, and callers treat it as "absent" rather than as a failure.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Operation not supported by this engine: {operation}")]
    Unsupported { operation: String },

    #[error("Invalid {field} payload: {message}")]
    InvalidWire { field: String, message: String },

    #[error("Input size mismatch: expected {expected} values, got {actual}")]
    InputSizeMismatch { expected: usize, actual: usize },

    #[error("Forward pass failed: {message}")]
    ForwardFailed { message: String },

    #[error("No output available: forward has not been called on this handle")]
    OutputNotReady,

    #[error("Accelerated backend initialization failed: {message}")]
    AcceleratorInit { message: String },

    #[error("Accelerated backend execution failed: {message}")]
    AcceleratorExecution { message: String },
}

impl EngineError {
    /// Create an unsupported-operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create an invalid payload error for the named field.
    pub fn invalid_wire(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidWire {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether this error only signals an absent optional entry point.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
