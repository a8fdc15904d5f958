//! Prediction parity over many deterministic inputs.
//!
//! Two handles are built from the same topology and perturbation, one left on
//! the reference path and one probed onto the accelerated backend. Each input
//! is run through both and the class predictions are compared.

use super::benchmark_errors::{BenchmarkError, BenchmarkResult};
use super::benchmark_runner::input_payload;
use super::benchmark_types::{ParitySweepConfig, PerturbConfig};
use super::capability_probe::CapabilityProber;
use super::parity::{argmax, diff_stats, softmax};
use super::timed_execution::{TimedRun, timed_forward, warm_up};
use crate::activation::Activation;
use crate::deterministic::DeterministicVector;
use crate::engine::{EngineHandle, NetworkEngine};
use crate::topology::build_topology;
use log::{info, warn};
use serde::Serialize;

/// A class prediction from one execution path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub class: usize,
    pub confidence: f64,
    pub latency_ms: f64,
}

impl Prediction {
    fn from_run(run: &TimedRun, softmax_head: bool) -> Option<Self> {
        let probabilities = if softmax_head {
            run.flat_output.clone()
        } else {
            softmax(&run.flat_output)
        };
        let class = argmax(&probabilities)?;
        Some(Self {
            class,
            confidence: probabilities[class],
            latency_ms: run.elapsed_ms,
        })
    }
}

/// Comparison for one input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParityRow {
    pub seed: u32,
    pub reference: Prediction,
    pub accelerated: Option<Prediction>,
    pub matches: Option<bool>,
    pub mae: Option<f64>,
    pub max_abs_diff: Option<f64>,
    pub l2_norm: Option<f64>,
}

/// Summary of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParityReport {
    pub case_id: String,
    pub accelerated_available: bool,
    pub adapter_descriptor: String,
    pub mismatches: usize,
    pub total: usize,
    pub rows: Vec<ParityRow>,
}

pub struct ParitySweep<'e> {
    engine: &'e dyn NetworkEngine,
    config: ParitySweepConfig,
    perturb: Option<PerturbConfig>,
    round_input: bool,
    prober: CapabilityProber,
}

impl<'e> ParitySweep<'e> {
    pub fn new(engine: &'e dyn NetworkEngine, config: ParitySweepConfig) -> Self {
        Self {
            engine,
            config,
            perturb: None,
            round_input: true,
            prober: CapabilityProber::default(),
        }
    }

    pub fn with_perturbation(mut self, perturb: Option<PerturbConfig>) -> Self {
        self.perturb = perturb;
        self
    }

    pub fn with_rounding(mut self, round_input: bool) -> Self {
        self.round_input = round_input;
        self
    }

    fn create_handle(&self, stage: &'static str) -> BenchmarkResult<Box<dyn EngineHandle>> {
        let shape = &self.config.shape;
        let wire = build_topology(shape)?.to_wire();
        let mut handle = self
            .engine
            .create(&wire.layers, &wire.activations, &wire.trainable)
            .map_err(|e| BenchmarkError::engine(&shape.id, stage, e))?;
        if let Some(perturb) = &self.perturb {
            if let Err(e) = handle.perturb_weights(perturb.amplitude, perturb.seed) {
                if !e.is_unsupported() {
                    warn!("[{}] weight perturbation failed: {e}", shape.id);
                }
            }
        }
        Ok(handle)
    }

    /// Run the sweep.
    pub fn run(&self) -> BenchmarkResult<ParityReport> {
        let shape = &self.config.shape;
        let id = shape.id.as_str();
        let softmax_head =
            build_topology(shape)?.output_activation() == Some(Activation::Softmax);

        let input_for = |seed: u32| {
            let vector = DeterministicVector::generate_with_rounding(
                seed,
                shape.input_width(),
                self.round_input,
            );
            input_payload(shape, &vector)
        };

        let mut reference = self.create_handle("create reference")?;
        let mut accelerated = self.create_handle("create accelerated")?;

        let first_input = input_for(self.config.base_seed);
        warm_up(reference.as_mut(), &first_input)
            .map_err(|e| BenchmarkError::engine(id, "reference warm-up", e))?;
        let probe = self.prober.probe(accelerated.as_mut(), &first_input);

        let rows = self.compare_all(
            reference.as_mut(),
            accelerated.as_mut(),
            probe.enabled,
            softmax_head,
            &input_for,
        );

        for handle in [&mut reference, &mut accelerated] {
            if let Err(e) = handle.cleanup_accelerated_backend() {
                if !e.is_unsupported() {
                    warn!("[{id}] accelerated backend cleanup failed: {e}");
                }
            }
        }

        let rows = rows?;
        let mismatches = rows.iter().filter(|r| r.matches == Some(false)).count();
        info!(
            "Parity sweep '{id}': {} inputs, {mismatches} mismatches, accelerated={}",
            rows.len(),
            probe.enabled
        );

        Ok(ParityReport {
            case_id: shape.id.clone(),
            accelerated_available: probe.enabled,
            adapter_descriptor: probe.adapter_descriptor,
            mismatches,
            total: rows.len(),
            rows,
        })
    }

    fn compare_all(
        &self,
        reference: &mut dyn EngineHandle,
        accelerated: &mut dyn EngineHandle,
        accelerated_enabled: bool,
        softmax_head: bool,
        input_for: &dyn Fn(u32) -> serde_json::Value,
    ) -> BenchmarkResult<Vec<ParityRow>> {
        let id = self.config.shape.id.as_str();
        let missing_output = |stage: &'static str| {
            BenchmarkError::engine(
                id,
                stage,
                crate::errors::EngineError::ForwardFailed {
                    message: "empty output".to_string(),
                },
            )
        };

        (0..self.config.samples)
            .map(|i| {
                let seed = self.config.base_seed.wrapping_add(i as u32);
                let input = input_for(seed);

                let reference_run = timed_forward(reference, &input)
                    .map_err(|e| BenchmarkError::engine(id, "reference forward", e))?;
                let reference_prediction = Prediction::from_run(&reference_run, softmax_head)
                    .ok_or_else(|| missing_output("reference forward"))?;

                if !accelerated_enabled {
                    return Ok(ParityRow {
                        seed,
                        reference: reference_prediction,
                        accelerated: None,
                        matches: None,
                        mae: None,
                        max_abs_diff: None,
                        l2_norm: None,
                    });
                }

                let accelerated_run = timed_forward(accelerated, &input)
                    .map_err(|e| BenchmarkError::engine(id, "accelerated forward", e))?;
                let accelerated_prediction = Prediction::from_run(&accelerated_run, softmax_head)
                    .ok_or_else(|| missing_output("accelerated forward"))?;
                let diff = diff_stats(&reference_run.flat_output, &accelerated_run.flat_output);

                Ok(ParityRow {
                    seed,
                    matches: Some(reference_prediction.class == accelerated_prediction.class),
                    reference: reference_prediction,
                    accelerated: Some(accelerated_prediction),
                    mae: Some(diff.mae),
                    max_abs_diff: Some(diff.max_abs_diff),
                    l2_norm: Some(diff.l2_norm),
                })
            })
            .collect()
    }
}
