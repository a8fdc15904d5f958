//! Benchmark type definitions and configuration structures.

use super::benchmark_errors::{BenchmarkError, BenchmarkResult};
use crate::catalog::default_cases;
use crate::deterministic::DEFAULT_SEED;
use crate::topology::{CaseShape, build_topology};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Deterministic weight perturbation applied right after network creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerturbConfig {
    pub amplitude: f64,
    pub seed: u32,
}

impl Default for PerturbConfig {
    fn default() -> Self {
        Self {
            amplitude: 0.1,
            seed: 42,
        }
    }
}

/// Settings for the multi-input parity sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParitySweepConfig {
    /// Number of deterministic inputs to compare.
    pub samples: usize,
    /// Seed of the first input; input `i` uses `base_seed + i`.
    pub base_seed: u32,
    pub shape: CaseShape,
    /// Where to write the JSON report, if anywhere.
    pub output_path: Option<PathBuf>,
}

impl Default for ParitySweepConfig {
    fn default() -> Self {
        Self {
            samples: 8,
            base_seed: DEFAULT_SEED,
            shape: CaseShape::image("mnist", 28, 28, &[256, 10]),
            output_path: None,
        }
    }
}

/// Top-level harness configuration, loaded from JSON and overridden by CLI flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Seed of the fixed benchmark input.
    pub seed: u32,
    /// Round generated inputs to 6 decimals before sending them to the engine.
    pub round_input: bool,
    pub perturb: Option<PerturbConfig>,
    /// Replaces the built-in catalog when set.
    pub cases: Option<Vec<CaseShape>>,
    pub csv_path: Option<PathBuf>,
    pub json_path: Option<PathBuf>,
    pub show_vectors: bool,
    /// wgpu backend hint (`vulkan`, `metal`, `dx12`, `gl`).
    pub backend: Option<String>,
    pub sweep: ParitySweepConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            round_input: true,
            perturb: Some(PerturbConfig::default()),
            cases: None,
            csv_path: None,
            json_path: None,
            show_vectors: true,
            backend: None,
            sweep: ParitySweepConfig::default(),
        }
    }
}

impl BenchConfig {
    /// The ordered case list: the configured override or the catalog.
    pub fn resolved_cases(&self) -> Vec<CaseShape> {
        self.cases.clone().unwrap_or_else(default_cases)
    }

    /// Pick cases by id (case-insensitive), keeping the requested order.
    pub fn select_cases(&self, ids: &[String]) -> BenchmarkResult<Vec<CaseShape>> {
        let available = self.resolved_cases();
        if ids.is_empty() {
            return Ok(available);
        }
        ids.iter()
            .map(|id| {
                available
                    .iter()
                    .find(|case| case.id.eq_ignore_ascii_case(id))
                    .cloned()
                    .ok_or_else(|| BenchmarkError::UnknownCase { id: id.clone() })
            })
            .collect()
    }

    /// Validates the configuration
    pub fn validate(&self) -> BenchmarkResult<()> {
        if let Some(cases) = &self.cases {
            if cases.is_empty() {
                return Err(BenchmarkError::validation(
                    "cases",
                    "Case list must not be empty",
                ));
            }

            let mut seen = HashSet::new();
            for case in cases {
                if !seen.insert(case.id.to_ascii_lowercase()) {
                    return Err(BenchmarkError::validation(
                        "cases",
                        format!("Duplicate case id '{}'", case.id),
                    ));
                }
                build_topology(case)?;
            }
        }

        if let Some(perturb) = &self.perturb {
            if !perturb.amplitude.is_finite() || perturb.amplitude < 0.0 {
                return Err(BenchmarkError::validation(
                    "perturb.amplitude",
                    "Amplitude must be a finite, non-negative number",
                ));
            }
        }

        if self.sweep.samples == 0 {
            return Err(BenchmarkError::validation(
                "sweep.samples",
                "Sample count must be greater than 0",
            ));
        }
        build_topology(&self.sweep.shape)?;

        Ok(())
    }
}

/// One case's output record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchResult {
    pub id: String,
    pub shape_description: String,
    pub estimated_parameter_bytes: u64,
    pub estimated_megabytes: f64,
    pub reference_ms: f64,
    pub accelerated_ms: f64,
    /// `reference_ms / accelerated_ms`; infinite when the accelerated run took no measurable time.
    pub speedup_ratio: f64,
    pub mae: f64,
    pub max_abs_diff: f64,
    /// Number of compared elements.
    pub compared: usize,
    pub probe_elapsed_ms: f64,
    pub adapter_descriptor: String,
    pub accelerated_enabled: bool,
    pub raw_reference_output: Vec<f64>,
    pub raw_accelerated_output: Vec<f64>,
}

impl BenchResult {
    /// True when the "accelerated" slot actually ran on the reference path.
    pub fn fell_back(&self) -> bool {
        !self.accelerated_enabled
    }
}

/// Ratio of two timings, infinite for a zero denominator.
pub fn speedup(reference_ms: f64, accelerated_ms: f64) -> f64 {
    if accelerated_ms > 0.0 {
        reference_ms / accelerated_ms
    } else {
        f64::INFINITY
    }
}
