#![forbid(unsafe_code)]

//! CLI binary: detect performance regressions against a stored baseline.
//!
//! ```text
//! regression-check results.json --baseline perf_baseline.json --output report.json
//! ```
//!
//! Exit code 1 when any regression is classified, 0 otherwise. A missing
//! or corrupt baseline exits 0: comparison is best-effort and must never
//! fail a build that has no usable baseline yet.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use parity_metrics::regression::{self, discover_baseline, RunResults};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "regression-check")]
#[command(about = "Detect performance regressions against a baseline")]
struct Args {
    /// Current test results JSON.
    results_file: PathBuf,

    /// Baseline results JSON for comparison. When omitted, a
    /// `perf_baseline.json` near the results file is probed.
    #[arg(long)]
    baseline: Option<PathBuf>,

    /// Output path for the regression report JSON.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&Args::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("[ERROR] {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    let current_text = match fs::read_to_string(&args.results_file) {
        Ok(text) => text,
        Err(err) => {
            eprintln!(
                "[ERROR] Results file not found: {} ({err})",
                args.results_file.display()
            );
            return Ok(ExitCode::FAILURE);
        }
    };
    let current: RunResults = match serde_json::from_str(&current_text) {
        Ok(current) => current,
        Err(err) => {
            eprintln!(
                "[ERROR] Invalid JSON in results file: {} ({err})",
                args.results_file.display()
            );
            return Ok(ExitCode::FAILURE);
        }
    };

    let baseline_path = args.baseline.clone().or_else(|| {
        let found = discover_baseline(&args.results_file)?;
        println!("[INFO] Using baseline: {}", found.display());
        Some(found)
    });

    let Some(baseline_path) = baseline_path.filter(|path| path.exists()) else {
        println!("[WARN] No baseline provided or baseline file not found");
        println!("[INFO] Skipping regression detection (first run?)");
        println!(
            "[INFO] To establish a baseline, copy the current results to {}",
            regression::BASELINE_FILENAME
        );
        return Ok(ExitCode::SUCCESS);
    };

    let baseline: RunResults = match fs::read_to_string(&baseline_path)
        .map_err(anyhow::Error::from)
        .and_then(|text| serde_json::from_str(&text).map_err(anyhow::Error::from))
    {
        Ok(baseline) => baseline,
        Err(err) => {
            println!(
                "[ERROR] Invalid baseline file: {} ({err})",
                baseline_path.display()
            );
            println!("[INFO] Baseline may be corrupted - skipping regression check");
            return Ok(ExitCode::SUCCESS);
        }
    };

    let analysis = regression::analyze(&current, &baseline);

    if let Some(error) = &analysis.error {
        println!("[WARN] Analysis incomplete: {error}");
        println!("[INFO] Skipping regression detection");
        return Ok(ExitCode::SUCCESS);
    }

    print!("{}", regression::render_report(&current, &analysis));

    if let Some(output) = &args.output {
        let mut text = serde_json::to_string_pretty(&analysis)?;
        text.push('\n');
        fs::write(output, text)
            .with_context(|| format!("writing regression report to {}", output.display()))?;
        println!("[INFO] Regression report saved to {}", output.display());
    }

    if analysis.has_regressions() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
