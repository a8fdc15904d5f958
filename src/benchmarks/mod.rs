//! Benchmark and parity harness.
//!
//! A case runs: topology → engine handle → warm-up and timed reference pass →
//! capability probe → timed accelerated pass → diff statistics → report row.
//! Cases run strictly one after another; each owns its handle until cleanup.

pub mod benchmark_errors;
pub mod benchmark_runner;
pub mod benchmark_types;
pub mod capability_probe;
pub mod parity;
pub mod parity_sweep;
pub mod report;
pub mod timed_execution;

pub use benchmark_errors::{BenchmarkError, BenchmarkResult};
pub use benchmark_runner::{
    BenchmarkRunner, CaseFailure, ConfigLoader, DEFAULT_CONFIG_PATH, SuiteReport,
};
pub use benchmark_types::{BenchConfig, BenchResult, ParitySweepConfig, PerturbConfig};
pub use capability_probe::{
    CapabilityProbeResult, CapabilityProber, ProbeState, TOGGLE_STRATEGIES, classify_init_response,
};
pub use parity::{DiffStats, argmax, check_probability_simplex, diff_stats, softmax};
pub use parity_sweep::{ParityReport, ParityRow, ParitySweep, Prediction};
pub use report::{CSV_COLUMNS, CSV_HEADER, CsvReportWriter, csv_record, format_sci, write_json_report};
pub use timed_execution::{TimedRun, timed_forward};
