//! CSV/JSON persistence and console output for benchmark results.

use super::benchmark_types::BenchResult;
use super::parity::softmax;
use log::debug;
use csv::QuoteStyle;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Fixed CSV column order.
pub const CSV_COLUMNS: [&str; 11] = [
    "id",
    "shape",
    "estMB",
    "cpu_ms",
    "gpu_ms",
    "speedup",
    "mae",
    "max",
    "gpu_init_ms",
    "adapter",
    "gpu_fallback",
];

/// The header line as written to a fresh file.
pub const CSV_HEADER: &str =
    "id,shape,estMB,cpu_ms,gpu_ms,speedup,mae,max,gpu_init_ms,adapter,gpu_fallback";

/// Number of leading values shown in console vector dumps.
const VECTOR_PREVIEW: usize = 10;

/// Scientific notation with two decimals and a signed, zero-padded exponent
/// (`1.23E-05`, `0.00E+00`).
pub fn format_sci(x: f64) -> String {
    if x.is_nan() {
        return "NAN".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    let raw = format!("{x:.2E}");
    match raw.split_once('E') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}E{sign}{:02}", exponent.abs())
        }
        None => raw,
    }
}

/// One CSV record with every number preformatted.
pub fn csv_record(result: &BenchResult) -> [String; 11] {
    [
        result.id.clone(),
        result.shape_description.clone(),
        format!("{:.2}", result.estimated_megabytes),
        format!("{:.3}", result.reference_ms),
        format!("{:.3}", result.accelerated_ms),
        format!("{:.2}", result.speedup_ratio),
        format_sci(result.mae),
        format_sci(result.max_abs_diff),
        format!("{:.3}", result.probe_elapsed_ms),
        result.adapter_descriptor.clone(),
        result.fell_back().to_string(),
    ]
}

/// Row writer: text fields are quoted with doubled internal quotes, numbers
/// are left bare.
fn row_writer<W: Write>(sink: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::NonNumeric)
        .from_writer(sink)
}

/// Append-only CSV writer owning its file for the lifetime of a run.
#[derive(Debug)]
pub struct CsvReportWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl CsvReportWriter {
    /// Open `path` for appending, writing the header only when the file is new
    /// or empty.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let header_needed = std::fs::metadata(&path).map_or(true, |m| m.len() == 0);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        if header_needed {
            let mut header = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(&file);
            header.write_record(CSV_COLUMNS)?;
            header.flush()?;
            debug!("Wrote CSV header to {}", path.display());
        }
        Ok(Self {
            path,
            writer: row_writer(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append and flush one row.
    pub fn append(&mut self, result: &BenchResult) -> io::Result<()> {
        self.writer.write_record(csv_record(result))?;
        self.writer.flush()
    }
}

/// Write the full result list as pretty JSON.
pub fn write_json_report<T: serde::Serialize + ?Sized>(
    path: impl AsRef<Path>,
    value: &T,
) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value).map_err(io::Error::other)?;
    writeln!(writer)?;
    writer.flush()
}

fn preview(values: &[f64]) -> String {
    let shown: Vec<String> = values
        .iter()
        .take(VECTOR_PREVIEW)
        .map(|v| format!("{v:.6}"))
        .collect();
    let ellipsis = if values.len() > VECTOR_PREVIEW { " ..." } else { "" };
    format!("[{}]{ellipsis}", shown.join(", "))
}

/// Per-case console summary.
pub fn print_case_summary(result: &BenchResult) {
    println!(
        "Accelerator init: {}  in {:.2} ms  enabled={}",
        if result.adapter_descriptor.is_empty() {
            "[none]"
        } else {
            result.adapter_descriptor.as_str()
        },
        result.probe_elapsed_ms,
        if result.accelerated_enabled { "yes" } else { "no" }
    );
    println!("Reference   ⏱ {:.3} ms", result.reference_ms);
    println!("Accelerated ⏱ {:.3} ms", result.accelerated_ms);
    println!("Speedup: {:.2}×", result.speedup_ratio);
    println!(
        "Δ(reference vs accelerated)  mae={}  max={}  (n={})",
        format_sci(result.mae),
        format_sci(result.max_abs_diff),
        result.compared
    );
}

/// Raw and softmaxed output previews plus a per-index diff table.
pub fn print_vectors(result: &BenchResult) {
    let reference = &result.raw_reference_output;
    let accelerated = &result.raw_accelerated_output;

    println!("Reference output (raw):   {}", preview(reference));
    println!("Accelerated output (raw): {}", preview(accelerated));
    println!("Reference softmax:        {}", preview(&softmax(reference)));
    println!("Accelerated softmax:      {}", preview(&softmax(accelerated)));
    println!("Idx |        Reference       |       Accelerated      | Δ");
    println!("----+------------------------+------------------------+------------------");
    for (i, (r, a)) in reference
        .iter()
        .zip(accelerated)
        .take(VECTOR_PREVIEW)
        .enumerate()
    {
        println!("{i:3} | {r:>22.14} | {a:>22.14} | {:>16.6e}", (r - a).abs());
    }
}

/// Closing table over all completed cases.
pub fn print_suite_summary(results: &[BenchResult]) {
    if results.is_empty() {
        return;
    }

    println!("\n{}", "=".repeat(80));
    println!("Suite Summary");
    println!("{}", "=".repeat(80));
    println!(
        "{:<5} {:>9} {:>12} {:>12} {:>9} {:>10} {:>10} {:>9}",
        "id", "estMB", "ref_ms", "accel_ms", "speedup", "mae", "max", "fallback"
    );
    for r in results {
        println!(
            "{:<5} {:>9.2} {:>12.3} {:>12.3} {:>9.2} {:>10} {:>10} {:>9}",
            r.id,
            r.estimated_megabytes,
            r.reference_ms,
            r.accelerated_ms,
            r.speedup_ratio,
            format_sci(r.mae),
            format_sci(r.max_abs_diff),
            if r.fell_back() { "yes" } else { "no" }
        );
    }
}
