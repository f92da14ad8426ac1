//! Performance regression classification between a current run and a
//! stored baseline.
//!
//! The detector is a stateless pure pass over two already-structured
//! documents. Comparison is best-effort by contract: a missing renderer or
//! metric is skipped, and a structurally unusable document short-circuits
//! with an error marker rather than failing the run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Metric types compared for every renderer, in report order.
pub const METRIC_TYPES: &[&str] = &[
    "parse_time",
    "layout_time",
    "paint_time",
    "total_time",
    "memory",
];

/// Threshold applied to metrics without a specific entry, in percentage
/// points.
pub const DEFAULT_THRESHOLD_PCT: f64 = 5.0;

/// Baseline file probed in the results file's parent directories when no
/// explicit baseline is given.
pub const BASELINE_FILENAME: &str = "perf_baseline.json";

const BASELINE_DISCOVERY_DEPTH: usize = 3;

/// One captured run: commit, timestamp, and per-renderer metric statistics.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunResults {
    #[serde(default)]
    pub git_commit: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub renderers: Option<BTreeMap<String, RendererStats>>,
}

pub type RendererStats = BTreeMap<String, MetricStats>;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MetricStats {
    pub mean: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Regression,
    Improvement,
    Neutral,
}

/// One classified metric delta.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionRecord {
    pub renderer: String,
    pub metric: String,
    pub baseline_value: f64,
    pub current_value: f64,
    pub percent_change: f64,
}

/// The full comparison outcome, serializable as the optional report file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Analysis {
    pub regressions: Vec<RegressionRecord>,
    pub improvements: Vec<RegressionRecord>,
    pub baseline_commit: String,
    pub baseline_timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Analysis {
    #[must_use]
    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty()
    }
}

/// Asymmetric per-metric thresholds in percentage points.
#[must_use]
pub fn threshold_for(metric: &str) -> f64 {
    match metric {
        "total_time_ms" => 5.0,
        "parse_time_ms" | "layout_time_ms" | "paint_time_ms" => 10.0,
        "memory_mb" => 15.0,
        _ => DEFAULT_THRESHOLD_PCT,
    }
}

/// Classify one metric delta. A zero baseline is a division guard, not a
/// true "no change": it always yields `(Neutral, 0.0)`. Comparison against
/// the threshold is strict, so a change of exactly the threshold is
/// neutral.
#[must_use]
pub fn classify(metric: &str, baseline: f64, current: f64) -> (Classification, f64) {
    if baseline == 0.0 {
        return (Classification::Neutral, 0.0);
    }

    let percent_change = (current - baseline) / baseline * 100.0;
    let threshold = threshold_for(metric);

    let classification = if percent_change > threshold {
        Classification::Regression
    } else if percent_change < -threshold {
        Classification::Improvement
    } else {
        Classification::Neutral
    };
    (classification, percent_change)
}

fn metric_label(metric_type: &str) -> String {
    if metric_type == "memory" {
        "memory_mb".to_string()
    } else {
        format!("{metric_type}_ms")
    }
}

fn unknown() -> String {
    "unknown".to_string()
}

/// Compare every renderer present in `current` against `baseline`.
///
/// A renderer absent from the baseline is skipped with a warning; a metric
/// missing on either side is skipped silently. A document without a
/// `renderers` key short-circuits with an error marker — comparison is
/// advisory and must not fail the run.
#[must_use]
pub fn analyze(current: &RunResults, baseline: &RunResults) -> Analysis {
    let mut analysis = Analysis {
        baseline_commit: baseline.git_commit.clone().unwrap_or_else(unknown),
        baseline_timestamp: baseline.timestamp.clone().unwrap_or_else(unknown),
        ..Analysis::default()
    };

    let Some(baseline_renderers) = &baseline.renderers else {
        warn!("baseline missing 'renderers' key, cannot compare");
        analysis.error = Some("Invalid baseline format".to_string());
        return analysis;
    };
    let Some(current_renderers) = &current.renderers else {
        warn!("current results missing 'renderers' key, cannot compare");
        analysis.error = Some("Invalid current results format".to_string());
        return analysis;
    };

    for (renderer, current_stats) in current_renderers {
        let Some(baseline_stats) = baseline_renderers.get(renderer) else {
            warn!(renderer = %renderer, "renderer not found in baseline, skipping");
            continue;
        };

        for metric_type in METRIC_TYPES {
            let (Some(current_metric), Some(baseline_metric)) = (
                current_stats.get(*metric_type),
                baseline_stats.get(*metric_type),
            ) else {
                continue;
            };

            let metric = metric_label(metric_type);
            let (classification, percent_change) =
                classify(&metric, baseline_metric.mean, current_metric.mean);

            let record = RegressionRecord {
                renderer: renderer.clone(),
                metric,
                baseline_value: baseline_metric.mean,
                current_value: current_metric.mean,
                percent_change,
            };

            match classification {
                Classification::Regression => analysis.regressions.push(record),
                Classification::Improvement => analysis.improvements.push(record),
                Classification::Neutral => {}
            }
        }
    }

    analysis
}

/// Probe the results file's parent directories for a baseline file.
#[must_use]
pub fn discover_baseline(results_path: &Path) -> Option<PathBuf> {
    results_path
        .ancestors()
        .skip(1)
        .take(BASELINE_DISCOVERY_DEPTH)
        .map(|dir| dir.join(BASELINE_FILENAME))
        .find(|candidate| candidate.exists())
}

fn short_date(timestamp: &str) -> &str {
    timestamp.get(..10).unwrap_or(timestamp)
}

fn write_records(out: &mut String, records: &[RegressionRecord]) {
    for record in records {
        let _ = writeln!(
            out,
            "  {:10} | {:20} | {:+6.2}% (baseline: {:7.2}, current: {:7.2})",
            record.renderer,
            record.metric,
            record.percent_change,
            record.baseline_value,
            record.current_value
        );
    }
}

/// Human-readable report, printed even when nothing regressed.
#[must_use]
pub fn render_report(current: &RunResults, analysis: &Analysis) -> String {
    let mut out = String::new();
    let rule = "=".repeat(80);
    let dashes = "-".repeat(80);

    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(out, "PERFORMANCE REGRESSION ANALYSIS");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "Baseline: {} @ {}",
        analysis.baseline_commit,
        short_date(&analysis.baseline_timestamp)
    );
    let _ = writeln!(
        out,
        "Current:  {} @ {}\n",
        current.git_commit.as_deref().unwrap_or("unknown"),
        short_date(current.timestamp.as_deref().unwrap_or("unknown"))
    );

    if analysis.regressions.is_empty() {
        let _ = writeln!(out, "[OK] No regressions detected!\n");
    } else {
        let _ = writeln!(
            out,
            "[WARN] {} REGRESSION(S) DETECTED:",
            analysis.regressions.len()
        );
        let _ = writeln!(out, "{dashes}");
        write_records(&mut out, &analysis.regressions);
        out.push('\n');
    }

    if !analysis.improvements.is_empty() {
        let _ = writeln!(
            out,
            "[INFO] {} IMPROVEMENT(S):",
            analysis.improvements.len()
        );
        let _ = writeln!(out, "{dashes}");
        write_records(&mut out, &analysis.improvements);
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn run(json: &str) -> RunResults {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn zero_baseline_is_always_neutral() {
        assert_eq!(
            classify("total_time_ms", 0.0, 500.0),
            (Classification::Neutral, 0.0)
        );
        assert_eq!(
            classify("total_time_ms", 0.0, 0.0),
            (Classification::Neutral, 0.0)
        );
    }

    #[test]
    fn threshold_boundary_is_strict() {
        // Exactly +5% on total_time_ms is neutral, not a regression.
        let (classification, pct) = classify("total_time_ms", 100.0, 105.0);
        assert_eq!(classification, Classification::Neutral);
        assert_eq!(pct, 5.0);

        let (classification, _) = classify("total_time_ms", 100.0, 105.1);
        assert_eq!(classification, Classification::Regression);

        let (classification, _) = classify("total_time_ms", 100.0, 95.0);
        assert_eq!(classification, Classification::Neutral);

        let (classification, _) = classify("total_time_ms", 100.0, 94.9);
        assert_eq!(classification, Classification::Improvement);
    }

    #[test]
    fn per_metric_thresholds_apply() {
        // +12% memory is within the 15% band; +12% parse time is not within 10%.
        assert_eq!(classify("memory_mb", 100.0, 112.0).0, Classification::Neutral);
        assert_eq!(
            classify("parse_time_ms", 100.0, 112.0).0,
            Classification::Regression
        );
        // Unknown metrics fall back to 5%.
        assert_eq!(
            classify("style_time_ms", 100.0, 106.0).0,
            Classification::Regression
        );
    }

    #[test]
    fn ten_percent_total_time_slowdown_is_a_regression() {
        let current = run(r#"{"renderers": {"chromium": {"total_time": {"mean": 110}}}}"#);
        let baseline = run(r#"{"renderers": {"chromium": {"total_time": {"mean": 100}}}}"#);

        let analysis = analyze(&current, &baseline);
        assert_eq!(analysis.regressions.len(), 1);
        assert!(analysis.improvements.is_empty());

        let record = &analysis.regressions[0];
        assert_eq!(record.renderer, "chromium");
        assert_eq!(record.metric, "total_time_ms");
        assert_eq!(record.percent_change, 10.0);
    }

    #[test]
    fn memory_maps_to_memory_mb() {
        let current = run(r#"{"renderers": {"r": {"memory": {"mean": 120}}}}"#);
        let baseline = run(r#"{"renderers": {"r": {"memory": {"mean": 100}}}}"#);

        let analysis = analyze(&current, &baseline);
        assert_eq!(analysis.regressions[0].metric, "memory_mb");
    }

    #[test]
    fn missing_renderers_key_is_an_error_marker_not_a_failure() {
        let current = run(r#"{"renderers": {"chromium": {"total_time": {"mean": 110}}}}"#);
        let baseline = run(r#"{"git_commit": "abc1234", "timestamp": "2026-08-01T00:00:00Z"}"#);

        let analysis = analyze(&current, &baseline);
        assert!(analysis.regressions.is_empty());
        assert!(analysis.improvements.is_empty());
        assert_eq!(analysis.error.as_deref(), Some("Invalid baseline format"));
        assert_eq!(analysis.baseline_commit, "abc1234");

        let analysis = analyze(&baseline, &current);
        assert_eq!(
            analysis.error.as_deref(),
            Some("Invalid current results format")
        );
    }

    #[test]
    fn renderer_absent_from_baseline_is_skipped() {
        let current = run(
            r#"{"renderers": {
                "chromium": {"total_time": {"mean": 110}},
                "webkit": {"total_time": {"mean": 300}}
            }}"#,
        );
        let baseline = run(r#"{"renderers": {"chromium": {"total_time": {"mean": 100}}}}"#);

        let analysis = analyze(&current, &baseline);
        assert_eq!(analysis.regressions.len(), 1);
        assert_eq!(analysis.regressions[0].renderer, "chromium");
    }

    #[test]
    fn metric_missing_on_either_side_is_skipped_silently() {
        let current = run(
            r#"{"renderers": {"r": {
                "total_time": {"mean": 200},
                "parse_time": {"mean": 50}
            }}}"#,
        );
        let baseline = run(r#"{"renderers": {"r": {"parse_time": {"mean": 10}}}}"#);

        let analysis = analyze(&current, &baseline);
        // Only parse_time is on both sides.
        assert_eq!(analysis.regressions.len(), 1);
        assert_eq!(analysis.regressions[0].metric, "parse_time_ms");
        assert!(analysis.error.is_none());
    }

    #[test]
    fn large_improvement_is_classified() {
        let current = run(r#"{"renderers": {"r": {"total_time": {"mean": 50}}}}"#);
        let baseline = run(r#"{"renderers": {"r": {"total_time": {"mean": 100}}}}"#);

        let analysis = analyze(&current, &baseline);
        assert!(analysis.regressions.is_empty());
        assert_eq!(analysis.improvements.len(), 1);
        assert_eq!(analysis.improvements[0].percent_change, -50.0);
    }

    #[test]
    fn report_mentions_both_commits() {
        let current = run(
            r#"{"git_commit": "def5678", "timestamp": "2026-08-28T10:00:00Z",
                "renderers": {"r": {"total_time": {"mean": 110}}}}"#,
        );
        let baseline = run(
            r#"{"git_commit": "abc1234", "timestamp": "2026-08-01T10:00:00Z",
                "renderers": {"r": {"total_time": {"mean": 100}}}}"#,
        );

        let analysis = analyze(&current, &baseline);
        let report = render_report(&current, &analysis);
        assert!(report.contains("Baseline: abc1234 @ 2026-08-01"));
        assert!(report.contains("Current:  def5678 @ 2026-08-28"));
        assert!(report.contains("1 REGRESSION(S) DETECTED"));
        assert!(report.contains("total_time_ms"));
    }

    #[test]
    fn clean_report_says_ok() {
        let current = run(r#"{"renderers": {"r": {"total_time": {"mean": 100}}}}"#);
        let baseline = run(r#"{"renderers": {"r": {"total_time": {"mean": 100}}}}"#);
        let analysis = analyze(&current, &baseline);
        let report = render_report(&current, &analysis);
        assert!(report.contains("[OK] No regressions detected!"));
    }

    #[test]
    fn discover_baseline_walks_up_three_levels() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        let results = nested.join("results.json");
        std::fs::write(&results, "{}").unwrap();

        assert!(discover_baseline(&results).is_none());

        // Two levels up from the results file: <dir>/a/perf_baseline.json.
        let baseline_path = dir.path().join("a").join(BASELINE_FILENAME);
        std::fs::write(&baseline_path, "{}").unwrap();
        assert_eq!(discover_baseline(&results), Some(baseline_path));

        // A closer baseline wins.
        let near = nested.join(BASELINE_FILENAME);
        std::fs::write(&near, "{}").unwrap();
        assert_eq!(discover_baseline(&results), Some(near));
    }

    proptest! {
        #[test]
        fn neutral_iff_within_threshold(baseline in 1.0f64..1000.0, current in 0.0f64..2000.0) {
            let (classification, pct) = classify("total_time_ms", baseline, current);
            let threshold = threshold_for("total_time_ms");
            match classification {
                Classification::Regression => prop_assert!(pct > threshold),
                Classification::Improvement => prop_assert!(pct < -threshold),
                Classification::Neutral => prop_assert!(pct >= -threshold && pct <= threshold),
            }
        }
    }
}
