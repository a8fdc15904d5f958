//! Timed forward passes.

use crate::engine::EngineHandle;
use crate::errors::EngineResult;
use crate::utils::flatten_numbers;
use serde_json::Value;
use std::time::Instant;

/// One measured forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedRun {
    /// Wall-clock time of forward plus output extraction.
    pub elapsed_ms: f64,
    /// Output flattened depth-first.
    pub flat_output: Vec<f64>,
}

/// Run forward then extract, timing both together on a monotonic clock.
///
/// The handle's weights are left untouched.
pub fn timed_forward(handle: &mut dyn EngineHandle, input: &Value) -> EngineResult<TimedRun> {
    let start = Instant::now();
    handle.forward(input)?;
    let raw = handle.extract_output()?;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    Ok(TimedRun {
        elapsed_ms,
        flat_output: flatten_numbers(&raw),
    })
}

/// Untimed forward pass whose output is discarded.
pub fn warm_up(handle: &mut dyn EngineHandle, input: &Value) -> EngineResult<()> {
    handle.forward(input)?;
    handle.extract_output().map(|_| ())
}
