//! Core benchmark execution logic.

use super::benchmark_errors::{BenchmarkError, BenchmarkResult};
use super::benchmark_types::{BenchConfig, BenchResult, speedup};
use super::capability_probe::CapabilityProber;
use super::parity::{SIMPLEX_TOLERANCE, check_probability_simplex, diff_stats};
use super::report::{
    CsvReportWriter, print_case_summary, print_suite_summary, print_vectors, write_json_report,
};
use super::timed_execution::{timed_forward, warm_up};
use crate::activation::Activation;
use crate::deterministic::DeterministicVector;
use crate::engine::{EngineHandle, NetworkEngine};
use crate::topology::{CaseShape, InputLayout, build_topology};
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Configuration file read when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "configs/bench.json";

/// Configuration loader that handles JSON files with fallbacks
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a configuration file with fallback to defaults
    pub fn load_config<T>(path: impl AsRef<Path>, config_name: &str) -> BenchmarkResult<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| BenchmarkError::ConfigParseError {
                    path: path.display().to_string(),
                    source: e,
                })
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    "Config file '{}' not found, using default configuration for {}",
                    path.display(),
                    config_name
                );
                Ok(T::default())
            }
            Err(e) => Err(BenchmarkError::Io(e)),
        }
    }

    /// Load and validate the harness configuration.
    pub fn load_bench_config(path: impl AsRef<Path>) -> BenchmarkResult<BenchConfig> {
        let config: BenchConfig = Self::load_config(path, "bench")?;
        config.validate()?;
        Ok(config)
    }
}

/// Input payload for a case: one row for flat inputs, image rows otherwise.
pub fn input_payload(shape: &CaseShape, vector: &DeterministicVector) -> Value {
    match shape.input_layout {
        InputLayout::Flat => vector.to_wire(),
        InputLayout::Image { width, .. } => vector.to_wire_rows(width),
    }
}

/// A case that did not produce a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseFailure {
    pub id: String,
    pub message: String,
}

/// Everything a suite run produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuiteReport {
    pub results: Vec<BenchResult>,
    pub failures: Vec<CaseFailure>,
}

/// Main benchmark runner
pub struct BenchmarkRunner<'e> {
    engine: &'e dyn NetworkEngine,
    config: BenchConfig,
    prober: CapabilityProber,
}

impl<'e> BenchmarkRunner<'e> {
    pub fn new(engine: &'e dyn NetworkEngine, config: BenchConfig) -> Self {
        Self {
            engine,
            config,
            prober: CapabilityProber::default(),
        }
    }

    pub fn with_prober(mut self, prober: CapabilityProber) -> Self {
        self.prober = prober;
        self
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// List the configured cases
    pub fn list_cases(&self) {
        println!("Available cases:");
        for case in self.config.resolved_cases() {
            let size = case
                .estimated_megabytes()
                .map_or_else(|_| "?".to_string(), |mb| format!("{mb:.2}"));
            println!("  {:<5} {:<40} ~{size} MB", case.id, case.description());
        }
    }

    /// Run one case end to end.
    ///
    /// The topology is validated before any engine call. Accelerated-backend
    /// resources are released whether or not the measurement succeeded.
    pub fn run_case(&self, shape: &CaseShape) -> BenchmarkResult<BenchResult> {
        let topology = build_topology(shape)?;
        let wire = topology.to_wire();
        let vector = DeterministicVector::generate_with_rounding(
            self.config.seed,
            shape.input_width(),
            self.config.round_input,
        );
        let input = input_payload(shape, &vector);

        let mut handle = self
            .engine
            .create(&wire.layers, &wire.activations, &wire.trainable)
            .map_err(|e| BenchmarkError::engine(&shape.id, "create", e))?;

        if let Some(perturb) = &self.config.perturb {
            match handle.perturb_weights(perturb.amplitude, perturb.seed) {
                Ok(()) => debug!("[{}] weights perturbed by {}", shape.id, perturb.amplitude),
                Err(e) if e.is_unsupported() => debug!("[{}] engine has no perturbation", shape.id),
                Err(e) => warn!("[{}] weight perturbation failed: {e}", shape.id),
            }
        }

        let softmax_head = topology.output_activation() == Some(Activation::Softmax);
        let result = self.measure(shape, handle.as_mut(), &input, softmax_head);

        match handle.cleanup_accelerated_backend() {
            Ok(()) => {}
            Err(e) if e.is_unsupported() => {}
            Err(e) => warn!("[{}] accelerated backend cleanup failed: {e}", shape.id),
        }

        result
    }

    fn measure(
        &self,
        shape: &CaseShape,
        handle: &mut dyn EngineHandle,
        input: &Value,
        softmax_head: bool,
    ) -> BenchmarkResult<BenchResult> {
        let id = shape.id.as_str();

        warm_up(handle, input).map_err(|e| BenchmarkError::engine(id, "reference warm-up", e))?;
        let reference = timed_forward(handle, input)
            .map_err(|e| BenchmarkError::engine(id, "reference forward", e))?;

        let probe = self.prober.probe(handle, input);

        let accelerated = timed_forward(handle, input)
            .map_err(|e| BenchmarkError::engine(id, "accelerated forward", e))?;

        let estimated_parameter_bytes = shape.estimated_parameter_bytes()?;
        let estimated_megabytes = shape.estimated_megabytes()?;
        let diff = diff_stats(&reference.flat_output, &accelerated.flat_output);

        if softmax_head {
            check_probability_simplex(
                &format!("[{id}] reference"),
                &reference.flat_output,
                SIMPLEX_TOLERANCE,
            );
            check_probability_simplex(
                &format!("[{id}] accelerated"),
                &accelerated.flat_output,
                SIMPLEX_TOLERANCE,
            );
        }

        Ok(BenchResult {
            id: shape.id.clone(),
            shape_description: shape.description(),
            estimated_parameter_bytes,
            estimated_megabytes,
            reference_ms: reference.elapsed_ms,
            accelerated_ms: accelerated.elapsed_ms,
            speedup_ratio: speedup(reference.elapsed_ms, accelerated.elapsed_ms),
            mae: diff.mae,
            max_abs_diff: diff.max_abs_diff,
            compared: diff.n,
            probe_elapsed_ms: probe.elapsed_ms,
            adapter_descriptor: probe.adapter_descriptor,
            accelerated_enabled: probe.enabled,
            raw_reference_output: reference.flat_output,
            raw_accelerated_output: accelerated.flat_output,
        })
    }

    /// Run every configured case.
    pub fn run_all(&self) -> SuiteReport {
        self.run_cases(&self.config.resolved_cases())
    }

    /// Run `cases` in order, isolating failures and appending CSV rows as
    /// results arrive.
    pub fn run_cases(&self, cases: &[CaseShape]) -> SuiteReport {
        info!("Starting benchmark suite with {} cases", cases.len());

        let mut csv = self.config.csv_path.as_ref().and_then(|path| {
            CsvReportWriter::open(path)
                .map_err(|source| {
                    let e = BenchmarkError::ReportWriteFailure {
                        path: path.display().to_string(),
                        source,
                    };
                    error!("{e}");
                })
                .ok()
        });

        let mut report = SuiteReport::default();

        for case in cases {
            println!("\n=== {} ({}) ===", case.id, case.description());

            match self.run_case(case) {
                Ok(result) => {
                    print_case_summary(&result);
                    if self.config.show_vectors {
                        print_vectors(&result);
                    }
                    if let Some(writer) = csv.as_mut() {
                        if let Err(source) = writer.append(&result) {
                            let e = BenchmarkError::ReportWriteFailure {
                                path: writer.path().display().to_string(),
                                source,
                            };
                            error!("{e}");
                        }
                    }
                    report.results.push(result);
                }
                Err(e) => {
                    error!("[{}] {e}", case.id);
                    println!("Case {} skipped: {e}", case.id);
                    report.failures.push(CaseFailure {
                        id: case.id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if let Some(path) = &self.config.json_path {
            match write_json_report(path, &report.results) {
                Ok(()) => info!("Wrote JSON report to {}", path.display()),
                Err(source) => {
                    let e = BenchmarkError::ReportWriteFailure {
                        path: path.display().to_string(),
                        source,
                    };
                    error!("{e}");
                }
            }
        }

        print_suite_summary(&report.results);
        info!(
            "Benchmark suite finished: {} completed, {} failed",
            report.results.len(),
            report.failures.len()
        );

        report
    }
}
