#![forbid(unsafe_code)]

//! CLI binary: aggregate per-platform parity reports into a unified
//! metrics snapshot.
//!
//! ```text
//! collect-metrics --root . --out metrics/unified.json
//! collect-metrics --platform macos=checkouts/rustkit-macos --verbose
//! ```
//!
//! The collector is advisory: unavailable platforms and unparsable report
//! files are warnings, and the summary always prints. Only a failure to
//! write the snapshot itself exits non-zero.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use parity_metrics::aggregate::{self, run_collection};
use parity_metrics::collect::{PlatformSpec, DEFAULT_PLATFORMS};
use parity_metrics::metrics::{PlatformMetrics, UnifiedSnapshot};
use parity_metrics::store::JsonFileStore;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "collect-metrics")]
#[command(about = "Aggregate visual-parity metrics from platform checkouts")]
struct Args {
    /// Repository root containing the platform checkouts.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Platform checkout directory prefix (`<prefix>-<platform>`).
    #[arg(long, default_value = "rustkit")]
    prefix: String,

    /// Output path for the unified snapshot, relative to --root unless
    /// absolute.
    #[arg(long, default_value = "metrics/unified.json")]
    out: PathBuf,

    /// Explicit platform checkout, `name=path` (repeatable; replaces the
    /// default platform set).
    #[arg(long = "platform")]
    platforms: Vec<String>,

    /// Print per-test outcomes in the summary.
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let platforms = platform_specs(&args)?;

    let out = if args.out.is_absolute() {
        args.out.clone()
    } else {
        args.root.join(&args.out)
    };
    let store = JsonFileStore::new(&out);

    let snapshot = run_collection(&store, &platforms, &aggregate::today())
        .with_context(|| format!("writing snapshot to {}", out.display()))?;

    println!("Saved to: {}", out.display());
    print_summary(&snapshot, &platforms, args.verbose);
    Ok(())
}

fn platform_specs(args: &Args) -> Result<Vec<PlatformSpec>> {
    if args.platforms.is_empty() {
        return Ok(DEFAULT_PLATFORMS
            .iter()
            .map(|name| {
                PlatformSpec::new(*name, args.root.join(format!("{}-{name}", args.prefix)))
            })
            .collect());
    }

    args.platforms
        .iter()
        .map(|spec| {
            let Some((name, path)) = spec.split_once('=') else {
                bail!("--platform expects name=path, got {spec:?}");
            };
            Ok(PlatformSpec::new(name, path))
        })
        .collect()
}

fn print_summary(snapshot: &UnifiedSnapshot, platforms: &[PlatformSpec], verbose: bool) {
    let rule = "=".repeat(60);
    println!("\n{rule}");
    println!("Visual Parity Summary (pixel match % vs reference)");
    println!("{rule}");

    for spec in platforms {
        match snapshot.platforms.get(&spec.name).and_then(Option::as_ref) {
            Some(record) => print_platform(&spec.name, record, verbose),
            None => println!("\n  {}: not available", spec.name.to_uppercase()),
        }
    }

    if let Some(overall) = &snapshot.overall {
        println!("\n  OVERALL: {}% visual parity", overall.parity);
    }
    println!("\nHistory: {} days tracked", snapshot.history.len());
    println!("\n{rule}");
}

fn print_platform(name: &str, record: &PlatformMetrics, verbose: bool) {
    println!("\n  {}:", name.to_uppercase());
    println!(
        "    Visual Parity:  {:>6.2}%  (source: {})",
        record.parity, record.parity_source
    );
    if let Some(builtins) = record.builtins_parity {
        println!("    - Builtins:     {builtins:>6.2}%");
    }
    if let Some(websuite) = record.websuite_parity {
        println!("    - Websuite:     {websuite:>6.2}%");
    }
    if let (Some(passed), Some(total)) = (record.tests_passed, record.tests_total) {
        println!("    Tests Passing:  {passed}/{total}");
    }
    println!("    Perf Grade:     {}", record.perf_grade);

    if verbose {
        for outcome in &record.test_results {
            let status = if outcome.passed { "PASS" } else { "FAIL" };
            println!(
                "      {:30} {:>6.2}% [{status}]",
                outcome.case_id, outcome.parity
            );
        }
    }
}
