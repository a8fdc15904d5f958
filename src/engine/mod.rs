//! Engine contract consumed by the harness.
//!
//! The harness never does forward-pass math itself. It talks to an engine
//! through [`NetworkEngine`] (creation) and [`EngineHandle`] (one network).
//! Payloads are plain JSON values so engines with very different native APIs
//! can be adapted behind the same surface.
//!
//! # Optional entry points
//!
//! Acceleration is an optional capability whose API surface differs between
//! engine builds. Every optional method has a default body returning
//! [`EngineError::Unsupported`]; the capability prober treats that variant as
//! "entry point absent" and moves on to the next strategy.
//!
//! ```ignore
//! use parity_bench::engine::{NativeEngine, NetworkEngine};
//!
//! let engine = NativeEngine::default();
//! let mut handle = engine.create(&wire.layers, &wire.activations, &wire.trainable)?;
//! handle.forward(&input.to_wire())?;
//! let output = handle.extract_output()?;
//! ```

pub mod gpu;
pub mod native_network;

use crate::errors::{EngineError, EngineResult};
use serde_json::Value;

pub use gpu::AcceleratorOptions;
pub use native_network::{DenseLayer, NativeEngine, NativeNetwork};

/// Feature / field name used by the generic toggle entry points.
pub const ACCELERATED_FEATURE: &str = "accelerated_backend";

/// Method name used by the named-call toggle entry point.
pub const SET_ACCELERATED_METHOD: &str = "SetAcceleratedBackend";

/// Factory for network handles.
pub trait NetworkEngine {
    /// Short engine name for logs and reports.
    fn name(&self) -> &str;

    /// Create a network from the three topology payloads.
    fn create(
        &self,
        layers: &Value,
        activations: &Value,
        trainable: &Value,
    ) -> EngineResult<Box<dyn EngineHandle>>;
}

/// One live network owned by exactly one benchmark case.
pub trait EngineHandle {
    /// Run one forward pass on a nested-array input.
    fn forward(&mut self, input: &Value) -> EngineResult<()>;

    /// Output of the most recent forward pass.
    fn extract_output(&mut self) -> EngineResult<Value>;

    /// Deterministically nudge every weight by up to `amplitude`.
    fn perturb_weights(&mut self, _amplitude: f64, _seed: u32) -> EngineResult<()> {
        Err(EngineError::unsupported("perturb_weights"))
    }

    /// Bring up the accelerated backend and report its status.
    fn initialize_accelerated_backend(&mut self) -> EngineResult<Value> {
        Err(EngineError::unsupported("initialize_accelerated_backend"))
    }

    /// Release accelerated-backend resources.
    fn cleanup_accelerated_backend(&mut self) -> EngineResult<()> {
        Err(EngineError::unsupported("cleanup_accelerated_backend"))
    }

    /// Dedicated "use accelerated backend" setter.
    fn set_accelerated(&mut self, _enabled: bool) -> EngineResult<()> {
        Err(EngineError::unsupported("set_accelerated"))
    }

    /// Generic "turn feature on" call.
    fn enable_feature(&mut self, _feature: &str) -> EngineResult<()> {
        Err(EngineError::unsupported("enable_feature"))
    }

    /// Configuration-object call.
    fn configure(&mut self, _config: &Value) -> EngineResult<()> {
        Err(EngineError::unsupported("configure"))
    }

    /// Options-bag call.
    fn set_options(&mut self, _options: &Value) -> EngineResult<()> {
        Err(EngineError::unsupported("set_options"))
    }

    /// Single-field setter.
    fn set_field(&mut self, _field: &str, _value: &Value) -> EngineResult<()> {
        Err(EngineError::unsupported("set_field"))
    }

    /// Generic named-call dispatch.
    fn call(&mut self, method: &str, _args: &Value) -> EngineResult<Value> {
        Err(EngineError::unsupported(format!("call:{method}")))
    }
}
