//! Command-line front end for the benchmark suite and parity sweep.

use clap::{Parser, Subcommand};
use log::error;
use parity_bench::benchmarks::report::write_json_report;
use parity_bench::benchmarks::{
    BenchConfig, BenchmarkResult, BenchmarkRunner, ConfigLoader, DEFAULT_CONFIG_PATH, ParitySweep,
};
use parity_bench::engine::gpu::enumerate_adapters;
use parity_bench::engine::{AcceleratorOptions, NativeEngine, NetworkEngine};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "parity_bench",
    version,
    about = "Reference vs accelerated inference benchmark with parity checks"
)]
struct Cli {
    /// JSON configuration file; defaults are used when it does not exist.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Suppress per-index output vectors.
    #[arg(long)]
    quiet: bool,

    /// Append result rows to this CSV file.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write all results as JSON to this file.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Seed of the fixed input vector.
    #[arg(long)]
    seed: Option<u32>,

    /// Run only these case ids (repeatable).
    #[arg(long = "case")]
    cases: Vec<String>,

    /// Force a wgpu backend (vulkan, metal, dx12, gl).
    #[arg(long)]
    backend: Option<String>,

    /// List the configured cases and exit.
    #[arg(long)]
    list: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the benchmark suite (default).
    Run,
    /// Compare class predictions over many deterministic inputs.
    Sweep {
        /// Number of inputs.
        #[arg(long)]
        samples: Option<usize>,
        /// Write the parity report to this JSON file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the adapters visible to wgpu.
    Adapters,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(e) => {
            error!("Benchmark execution failed: {e}");
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

fn apply_overrides(config: &mut BenchConfig, cli: &Cli) {
    if cli.quiet {
        config.show_vectors = false;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if cli.csv.is_some() {
        config.csv_path = cli.csv.clone();
    }
    if cli.json.is_some() {
        config.json_path = cli.json.clone();
    }
    if cli.backend.is_some() {
        config.backend = cli.backend.clone();
    }
}

/// Returns `Ok(false)` when every requested case failed.
fn run(cli: Cli) -> BenchmarkResult<bool> {
    let mut config = ConfigLoader::load_bench_config(&cli.config)?;
    apply_overrides(&mut config, &cli);

    let options = AcceleratorOptions {
        backend: config.backend.clone(),
        ..AcceleratorOptions::default()
    };
    let engine = NativeEngine::new(options.clone());

    match cli.command.as_ref().unwrap_or(&Command::Run) {
        Command::Adapters => {
            let adapters = enumerate_adapters(&options);
            if adapters.is_empty() {
                println!("No adapters found");
            }
            for adapter in adapters {
                println!("{adapter}");
            }
            Ok(true)
        }
        Command::Sweep { samples, output } => {
            let mut sweep_config = config.sweep.clone();
            if let Some(samples) = samples {
                sweep_config.samples = *samples;
            }
            if output.is_some() {
                sweep_config.output_path = output.clone();
            }
            let output_path = sweep_config.output_path.clone();

            let report = ParitySweep::new(&engine, sweep_config)
                .with_perturbation(config.perturb)
                .with_rounding(config.round_input)
                .run()?;

            println!(
                "Parity sweep '{}': accelerated={}  mismatches={}/{}",
                report.case_id, report.accelerated_available, report.mismatches, report.total
            );
            match output_path {
                Some(path) => write_json_report(&path, &report)?,
                None => println!(
                    "{}",
                    serde_json::to_string_pretty(&report).unwrap_or_default()
                ),
            }
            Ok(true)
        }
        Command::Run => {
            let runner_cases = config.select_cases(&cli.cases)?;
            let runner = BenchmarkRunner::new(&engine, config);
            if cli.list {
                runner.list_cases();
                return Ok(true);
            }

            println!(
                "Reference vs Accelerated Inference Benchmark ({} engine)",
                engine.name()
            );
            println!("{}", "=".repeat(57));

            let report = runner.run_cases(&runner_cases);
            Ok(runner_cases.is_empty() || !report.results.is_empty())
        }
    }
}
