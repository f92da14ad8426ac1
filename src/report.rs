//! The three known per-platform report schemas and their normalization
//! into canonical metric fields.
//!
//! Each schema is a tolerant serde struct (`#[serde(default)]` throughout,
//! since these files are produced by separate harnesses at different
//! versions) paired with a `normalize` step:
//! - [`SwarmReport`] — median diff percentages across repeated iterations.
//! - [`PixelDiffReport`] — raw pixel diffs with per-test thresholds.
//! - [`BaselineReport`] — a pre-aggregated weighted-mean estimate plus
//!   supplementary evidence (issue clusters, performance samples).

use crate::metrics::{
    round1, round2, CaseCategory, CaseOutcome, ParitySource, PerfGrade, PlatformMetrics,
};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Case ids counted as `builtins`; everything else is `websuite`.
pub const BUILTIN_CASE_IDS: &[&str] = &["new_tab", "about", "settings", "chrome_rustkit", "shelf"];

/// Pixel diff percentage a test may not exceed when it carries no explicit
/// threshold of its own.
pub const DEFAULT_PIXEL_THRESHOLD: f64 = 15.0;

/// Perf keys copied out of baseline result samples.
const PERF_SAMPLE_KEYS: &[&str] = &["engine_init_ms", "html_load_ms", "render_time_ms"];

fn default_case_id() -> String {
    "unknown".to_string()
}

fn default_diff_pct() -> f64 {
    100.0
}

// ───────────────────────────────────────────────────────────────────────────
// Schemas
// ───────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SwarmReport {
    #[serde(default)]
    pub results: Vec<SwarmCase>,
    #[serde(default)]
    pub summary: Option<SwarmSummary>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwarmCase {
    #[serde(default = "default_case_id")]
    pub case_id: String,
    /// Median diff percentage across iterations; a case that never produced
    /// a measurement reads as a full mismatch.
    #[serde(default = "default_diff_pct")]
    pub diff_pct_median: f64,
    #[serde(default)]
    pub passed: bool,
    #[serde(default)]
    pub stable: bool,
}

/// Optional pre-computed counts; preferred over re-counting when present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SwarmSummary {
    #[serde(default)]
    pub passed: Option<u64>,
    #[serde(default)]
    pub failed: Option<u64>,
    #[serde(default)]
    pub stable: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PixelDiffReport {
    #[serde(default)]
    pub results: Vec<PixelDiffCase>,
    #[serde(default)]
    pub passed: Option<u64>,
    #[serde(default)]
    pub failed: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PixelDiffCase {
    #[serde(default = "default_case_id")]
    pub case_id: String,
    #[serde(rename = "type", default)]
    pub category: Option<String>,
    #[serde(default)]
    pub pixel: PixelBlock,
    #[serde(default)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PixelBlock {
    #[serde(rename = "diffPercent", default)]
    pub diff_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BaselineReport {
    #[serde(default)]
    pub metrics: BaselineMetrics,
    #[serde(default)]
    pub issue_clusters: BTreeMap<String, u64>,
    #[serde(default)]
    pub builtin_results: Vec<BaselineResult>,
    #[serde(default)]
    pub websuite_results: Vec<BaselineResult>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BaselineMetrics {
    /// Fraction in `[0, 1]` of must-pass (tier A) cases passing.
    #[serde(default)]
    pub tier_a_pass_rate: f64,
    /// Weighted-mean diff score over advisory (tier B) cases.
    #[serde(default)]
    pub tier_b_weighted_mean: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BaselineResult {
    #[serde(default)]
    pub perf: BTreeMap<String, Option<f64>>,
}

// ───────────────────────────────────────────────────────────────────────────
// Normalized output
// ───────────────────────────────────────────────────────────────────────────

/// Headline fields produced by a winning swarm or pixel-diff extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualSummary {
    pub parity: f64,
    pub builtins_parity: Option<f64>,
    pub websuite_parity: Option<f64>,
    pub tests_passed: u64,
    pub tests_failed: u64,
    pub tests_total: u64,
    pub tests_stable: u64,
    pub pass_rate: f64,
    pub test_results: Vec<CaseOutcome>,
}

/// Supplementary fields contributed by a baseline report whether or not it
/// won the headline metric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaselineSupplement {
    pub tier_a_pass_rate: f64,
    pub issue_clusters: BTreeMap<String, u64>,
    pub perf: BTreeMap<String, f64>,
}

fn summarize_cases(outcomes: Vec<CaseOutcome>) -> Option<VisualSummary> {
    if outcomes.is_empty() {
        return None;
    }

    let total = outcomes.len() as u64;
    let mut parity_sum = 0.0;
    let mut builtins = (0.0, 0u64);
    let mut websuite = (0.0, 0u64);

    for outcome in &outcomes {
        parity_sum += outcome.parity;
        match outcome.category {
            CaseCategory::Builtins => {
                builtins.0 += outcome.parity;
                builtins.1 += 1;
            }
            CaseCategory::Websuite => {
                websuite.0 += outcome.parity;
                websuite.1 += 1;
            }
        }
    }

    let mean = |sum: f64, count: u64| (count > 0).then(|| round2(sum / count as f64));
    let passed = outcomes.iter().filter(|o| o.passed).count() as u64;
    let stable = outcomes.iter().filter(|o| o.stable).count() as u64;

    Some(VisualSummary {
        parity: round2(parity_sum / total as f64),
        builtins_parity: mean(builtins.0, builtins.1),
        websuite_parity: mean(websuite.0, websuite.1),
        tests_passed: passed,
        tests_failed: total - passed,
        tests_total: total,
        tests_stable: stable,
        pass_rate: pass_rate(passed, total),
        test_results: outcomes,
    })
}

/// `passed / total * 100` to one decimal; `0` when there are no tests.
#[must_use]
pub fn pass_rate(passed: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round1(passed as f64 / total as f64 * 100.0)
    }
}

impl SwarmReport {
    /// Normalize into a [`VisualSummary`], or `None` when the report holds
    /// zero results (absence, not a measured zero).
    #[must_use]
    pub fn normalize(&self) -> Option<VisualSummary> {
        let outcomes = self
            .results
            .iter()
            .map(|case| {
                let category = if BUILTIN_CASE_IDS.contains(&case.case_id.as_str()) {
                    CaseCategory::Builtins
                } else {
                    CaseCategory::Websuite
                };
                CaseOutcome {
                    case_id: case.case_id.clone(),
                    category,
                    parity: round2(100.0 - case.diff_pct_median),
                    diff_pct: round2(case.diff_pct_median),
                    threshold: None,
                    passed: case.passed,
                    stable: case.stable,
                }
            })
            .collect();

        let mut summary = summarize_cases(outcomes)?;

        // The harness's own summary block wins over re-counting.
        if let Some(block) = &self.summary {
            if let Some(passed) = block.passed {
                summary.tests_passed = passed;
            }
            if let Some(failed) = block.failed {
                summary.tests_failed = failed;
            }
            if let Some(stable) = block.stable {
                summary.tests_stable = stable;
            }
            summary.pass_rate = pass_rate(summary.tests_passed, summary.tests_total);
        }

        Some(summary)
    }
}

impl PixelDiffReport {
    /// Normalize into a [`VisualSummary`], or `None` when the report holds
    /// zero results.
    ///
    /// Pass/fail is recomputed locally from `diff_pct <= threshold`; the
    /// input's own verdicts are not trusted.
    #[must_use]
    pub fn normalize(&self) -> Option<VisualSummary> {
        let outcomes = self
            .results
            .iter()
            .map(|case| {
                let diff_pct = case.pixel.diff_percent.unwrap_or(100.0);
                let threshold = case.threshold.unwrap_or(DEFAULT_PIXEL_THRESHOLD);
                let category = match case.category.as_deref() {
                    Some("builtins") => CaseCategory::Builtins,
                    _ => CaseCategory::Websuite,
                };
                CaseOutcome {
                    case_id: case.case_id.clone(),
                    category,
                    parity: round2(100.0 - diff_pct),
                    diff_pct: round2(diff_pct),
                    threshold: Some(threshold),
                    passed: diff_pct <= threshold,
                    stable: false,
                }
            })
            .collect();

        let mut summary = summarize_cases(outcomes)?;

        if let Some(passed) = self.passed {
            summary.tests_passed = passed;
        }
        if let Some(failed) = self.failed {
            summary.tests_failed = failed;
        }
        summary.pass_rate = pass_rate(summary.tests_passed, summary.tests_total);

        Some(summary)
    }
}

impl BaselineReport {
    /// Parity estimated from the tier-B weighted-mean diff score, clamped
    /// to `[0, 100]`. A report without the score reads as full mismatch.
    #[must_use]
    pub fn estimated_parity(&self) -> f64 {
        let tier_b = self.metrics.tier_b_weighted_mean.unwrap_or(100.0);
        (100.0 - tier_b).max(0.0)
    }

    /// Supplementary evidence: issue clusters, tier-A pass rate, and the
    /// first non-empty performance sample scanned across builtin results
    /// then web-suite results. First match wins; samples are never merged.
    #[must_use]
    pub fn supplement(&self) -> BaselineSupplement {
        let mut perf = BTreeMap::new();
        for result in self.builtin_results.iter().chain(&self.websuite_results) {
            if result.perf.is_empty() {
                continue;
            }
            for key in PERF_SAMPLE_KEYS {
                if let Some(Some(value)) = result.perf.get(*key) {
                    perf.insert((*key).to_string(), *value);
                }
            }
            break;
        }

        BaselineSupplement {
            tier_a_pass_rate: self.metrics.tier_a_pass_rate,
            issue_clusters: self.issue_clusters.clone(),
            perf,
        }
    }
}

/// A parsed per-platform report. Variant order is the precedence order:
/// the highest-fidelity source present wins the headline parity metric.
#[derive(Debug, Clone)]
pub enum ParityReport {
    Swarm(SwarmReport),
    PixelDiff(PixelDiffReport),
    Baseline(BaselineReport),
}

impl ParityReport {
    #[must_use]
    pub const fn source(&self) -> ParitySource {
        match self {
            Self::Swarm(_) => ParitySource::SwarmMedian,
            Self::PixelDiff(_) => ParitySource::PixelDiff,
            Self::Baseline(_) => ParitySource::BaselineEstimate,
        }
    }

    /// Normalize into a partially populated canonical record: headline
    /// parity, provenance, counts, and per-case outcomes. Supplementary
    /// enrichment, grading, and the git commit are attached later by the
    /// reconciler.
    ///
    /// `None` means this source holds no data and the next candidate in
    /// precedence order should be tried.
    #[must_use]
    pub fn normalize(&self) -> Option<PlatformMetrics> {
        match self {
            Self::Swarm(report) => report
                .normalize()
                .map(|s| visual_record(s, ParitySource::SwarmMedian, report.timestamp.clone())),
            Self::PixelDiff(report) => report
                .normalize()
                .map(|s| visual_record(s, ParitySource::PixelDiff, report.timestamp.clone())),
            // An estimate is always usable, even when it estimates zero.
            Self::Baseline(report) => Some(estimate_record(report)),
        }
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn visual_record(
    summary: VisualSummary,
    parity_source: ParitySource,
    timestamp: Option<String>,
) -> PlatformMetrics {
    PlatformMetrics {
        parity: summary.parity,
        parity_source,
        builtins_parity: summary.builtins_parity,
        websuite_parity: summary.websuite_parity,
        tests_passed: Some(summary.tests_passed),
        tests_failed: Some(summary.tests_failed),
        tests_total: Some(summary.tests_total),
        tests_stable: Some(summary.tests_stable),
        pass_rate: Some(summary.pass_rate),
        tier_a_pass_rate: None,
        issue_clusters: BTreeMap::new(),
        perf: BTreeMap::new(),
        perf_grade: PerfGrade::Unknown,
        last_updated: timestamp.unwrap_or_else(now_rfc3339),
        git_commit: None,
        test_results: summary.test_results,
    }
}

fn estimate_record(report: &BaselineReport) -> PlatformMetrics {
    PlatformMetrics {
        parity: report.estimated_parity(),
        parity_source: ParitySource::BaselineEstimate,
        builtins_parity: None,
        websuite_parity: None,
        tests_passed: None,
        tests_failed: None,
        tests_total: None,
        tests_stable: None,
        pass_rate: None,
        tier_a_pass_rate: None,
        issue_clusters: BTreeMap::new(),
        perf: BTreeMap::new(),
        perf_grade: PerfGrade::Unknown,
        last_updated: report.timestamp.clone().unwrap_or_else(now_rfc3339),
        git_commit: None,
        test_results: Vec::new(),
    }
}
