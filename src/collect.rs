//! Per-platform reconciliation: source resolution, format precedence, and
//! metadata attachment.
//!
//! For each configured platform this module resolves the three candidate
//! source families independently, lets the highest-fidelity source present
//! win the headline parity metric, enriches the record with supplementary
//! baseline evidence, and attaches a best-effort git commit plus a derived
//! performance grade.

use crate::metrics::{grade_perf, PlatformMetrics};
use crate::report::{BaselineReport, ParityReport, PixelDiffReport, SwarmReport};
use crate::source;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Swarm reports, highest fidelity (medians across iterations).
pub const SWARM_SOURCES: &[&str] = &["parity-results/swarm_report.json"];

/// Pixel-diff test results (real pixel data, single iteration).
pub const PIXEL_DIFF_SOURCES: &[&str] = &[
    "parity-baseline/parity_test_results.json",
    "parity_test_results.json",
];

/// Baseline estimate reports, lowest fidelity.
pub const BASELINE_SOURCES: &[&str] = &[
    "parity-baseline/baseline_report.json",
    "baseline_report.json",
];

/// Platforms collected when no explicit roots are configured.
pub const DEFAULT_PLATFORMS: &[&str] = &["macos", "windows", "linux"];

const GIT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
const GIT_POLL_INTERVAL: Duration = Duration::from_millis(25);
const SHORT_HASH_LEN: usize = 7;

/// A platform name bound to its checkout directory.
#[derive(Debug, Clone)]
pub struct PlatformSpec {
    pub name: String,
    pub root: PathBuf,
}

impl PlatformSpec {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }
}

/// Collect one platform's canonical record, or `None` when the checkout is
/// missing or no source family yields any data. Absence is never reported
/// as a record full of zeros.
#[must_use]
pub fn collect_platform(name: &str, root: &Path) -> Option<PlatformMetrics> {
    if !root.exists() {
        info!(platform = name, root = %root.display(), "checkout not found");
        return None;
    }

    let swarm = source::resolve::<SwarmReport>(root, SWARM_SOURCES);
    let pixel = source::resolve::<PixelDiffReport>(root, PIXEL_DIFF_SOURCES);
    let baseline = source::resolve::<BaselineReport>(root, BASELINE_SOURCES);

    if swarm.is_none() && pixel.is_none() && baseline.is_none() {
        info!(platform = name, "no metric sources found");
        return None;
    }

    // Candidates in fidelity order; the first that normalizes to actual
    // data wins the headline metric.
    let mut candidates: Vec<(ParityReport, String)> = Vec::new();
    if let Some((report, rel)) = swarm {
        candidates.push((ParityReport::Swarm(report), rel));
    }
    if let Some((report, rel)) = pixel {
        candidates.push((ParityReport::PixelDiff(report), rel));
    }
    if let Some((report, rel)) = &baseline {
        candidates.push((ParityReport::Baseline(report.clone()), rel.clone()));
    }

    let mut record: Option<PlatformMetrics> = None;
    for (candidate, rel) in &candidates {
        if let Some(partial) = candidate.normalize() {
            info!(platform = name, source = %rel, "using {} results", candidate.source());
            record = Some(partial);
            break;
        }
    }
    let Some(mut record) = record else {
        info!(platform = name, "sources present but hold zero results");
        return None;
    };

    // Supplementary enrichment is independent of which source won.
    if let Some((report, _)) = &baseline {
        let supplement = report.supplement();
        record.tier_a_pass_rate = Some(supplement.tier_a_pass_rate);
        if !supplement.issue_clusters.is_empty() {
            record.issue_clusters = supplement.issue_clusters;
        }
        if !supplement.perf.is_empty() {
            record.perf = supplement.perf;
        }
    }

    record.perf_grade = grade_perf(&record.perf);
    record.git_commit = git_commit_short(root);

    Some(record)
}

/// Best-effort short commit hash for a checkout. Shells out to `git` with a
/// bounded wait; any failure (no git, no repo, timeout) yields `None`.
#[must_use]
pub fn git_commit_short(dir: &Path) -> Option<String> {
    let mut child = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .stdin(Stdio::null())
        .spawn()
        .ok()?;

    let deadline = Instant::now() + GIT_LOOKUP_TIMEOUT;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    debug!(dir = %dir.display(), "git lookup timed out");
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
                std::thread::sleep(GIT_POLL_INTERVAL);
            }
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
        }
    };

    if !status.success() {
        return None;
    }

    let mut out = String::new();
    child.stdout.take()?.read_to_string(&mut out).ok()?;
    let hash = out.trim();
    if hash.len() < SHORT_HASH_LEN {
        return None;
    }
    Some(hash[..SHORT_HASH_LEN].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{ParitySource, PerfGrade};
    use std::fs;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    const SWARM: &str = r#"{
        "timestamp": "2026-08-27T10:00:00Z",
        "results": [
            {"case_id": "new_tab", "diff_pct_median": 10.0, "passed": true, "stable": true}
        ]
    }"#;

    const PIXEL: &str = r#"{
        "timestamp": "2026-08-26T10:00:00Z",
        "results": [
            {"case_id": "wikipedia", "pixel": {"diffPercent": 30.0}}
        ]
    }"#;

    const BASELINE: &str = r#"{
        "timestamp": "2026-08-25T10:00:00Z",
        "metrics": {"tier_a_pass_rate": 0.4, "tier_b_weighted_mean": 35.0},
        "issue_clusters": {"paint": 2},
        "builtin_results": [{"perf": {"engine_init_ms": 4.0, "render_time_ms": 12.0}}]
    }"#;

    #[test]
    fn missing_checkout_yields_no_record() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_platform("macos", &dir.path().join("absent")).is_none());
    }

    #[test]
    fn empty_checkout_yields_no_record() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_platform("macos", dir.path()).is_none());
    }

    #[test]
    fn swarm_wins_over_pixel_diff() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "parity-results/swarm_report.json", SWARM);
        write(dir.path(), "parity_test_results.json", PIXEL);

        let record = collect_platform("macos", dir.path()).unwrap();
        assert_eq!(record.parity_source, ParitySource::SwarmMedian);
        assert_eq!(record.parity, 90.0);
        assert_eq!(record.last_updated, "2026-08-27T10:00:00Z");
    }

    #[test]
    fn baseline_enriches_a_pixel_diff_winner() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "parity_test_results.json", PIXEL);
        write(dir.path(), "baseline_report.json", BASELINE);

        let record = collect_platform("macos", dir.path()).unwrap();
        assert_eq!(record.parity_source, ParitySource::PixelDiff);
        assert_eq!(record.parity, 70.0);
        // Supplementary fields come from the baseline even though it lost.
        assert_eq!(record.tier_a_pass_rate, Some(0.4));
        assert_eq!(record.issue_clusters.get("paint"), Some(&2));
        assert_eq!(record.perf.get("engine_init_ms"), Some(&4.0));
        assert_eq!(record.perf_grade, PerfGrade::A);
    }

    #[test]
    fn baseline_only_platform_estimates_parity() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "parity-baseline/baseline_report.json", BASELINE);

        let record = collect_platform("windows", dir.path()).unwrap();
        assert_eq!(record.parity_source, ParitySource::BaselineEstimate);
        assert_eq!(record.parity, 65.0);
        assert_eq!(record.tests_total, None);
        assert_eq!(record.pass_rate, None);
        assert!(record.test_results.is_empty());
    }

    #[test]
    fn swarm_with_zero_results_falls_through_to_pixel() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "parity-results/swarm_report.json",
            r#"{"results": []}"#,
        );
        write(dir.path(), "parity_test_results.json", PIXEL);

        let record = collect_platform("linux", dir.path()).unwrap();
        assert_eq!(record.parity_source, ParitySource::PixelDiff);
    }

    #[test]
    fn malformed_swarm_falls_through_to_pixel() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "parity-results/swarm_report.json", "{broken");
        write(dir.path(), "parity_test_results.json", PIXEL);

        let record = collect_platform("linux", dir.path()).unwrap();
        assert_eq!(record.parity_source, ParitySource::PixelDiff);
    }

    #[test]
    fn all_sources_empty_of_results_yields_no_record() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "parity-results/swarm_report.json",
            r#"{"results": []}"#,
        );
        assert!(collect_platform("linux", dir.path()).is_none());
    }

    #[test]
    fn git_lookup_outside_a_repo_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(git_commit_short(dir.path()), None);
    }
}
