//! Error types for the parity harness.
//!
//! Engine-side failures and topology failures are kept apart from the
//! benchmark-level taxonomy in `benchmarks::benchmark_errors`, which wraps both.

mod engine_error;
mod topology_error;

pub use engine_error::{EngineError, EngineResult};
pub use topology_error::TopologyError;

/// Result type alias for topology construction.
pub type TopologyResult<T> = std::result::Result<T, TopologyError>;
