//! Error types for benchmark operations.

use crate::errors::{EngineError, TopologyError};
use thiserror::Error;

/// Harness failures.
///
/// An absent accelerator is not represented here: it is the `Unavailable`
/// terminal state of the capability probe.
#[derive(Error, Debug)]
pub enum BenchmarkError {
    #[error("Invalid topology: {0}")]
    InvalidTopology(#[from] TopologyError),

    #[error("Case '{case_id}' failed during {stage}: {source}")]
    EngineCallFailure {
        case_id: String,
        stage: &'static str,
        #[source]
        source: EngineError,
    },

    #[error("Failed to write report '{path}': {source}")]
    ReportWriteFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file '{path}': {source}")]
    ConfigParseError {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration validation error for field '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Unknown benchmark case '{id}'")]
    UnknownCase { id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchmarkError {
    /// Wrap an engine error with the case and stage it happened in.
    pub fn engine(case_id: &str, stage: &'static str, source: EngineError) -> Self {
        Self::EngineCallFailure {
            case_id: case_id.to_string(),
            stage,
            source,
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type BenchmarkResult<T> = Result<T, BenchmarkError>;
