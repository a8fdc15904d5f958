//! Deterministic inference benchmark and cross-backend parity harness.
//!
//! Builds dense networks from compact case shapes, drives the same seeded
//! input through an engine's reference and accelerated paths, times both and
//! reports how far their outputs drift apart. Engines are consumed through
//! the [`engine::NetworkEngine`] / [`engine::EngineHandle`] traits; a dense
//! engine with a wgpu compute path ships in [`engine::native_network`].

pub mod activation;
pub mod benchmarks;
pub mod catalog;
pub mod deterministic;
pub mod engine;
pub mod errors;
pub mod topology;
pub mod utils;

pub use activation::Activation;
pub use benchmarks::{BenchConfig, BenchResult, BenchmarkError, BenchmarkRunner, ParitySweep};
pub use deterministic::{DEFAULT_SEED, DeterministicVector};
pub use engine::{EngineHandle, NativeEngine, NetworkEngine};
pub use errors::{EngineError, EngineResult, TopologyError};
pub use topology::{CaseShape, NetworkTopology, build_topology};
