//! Canonical metric records and the unified snapshot document.
//!
//! Everything the collector persists is described here:
//! - [`PlatformMetrics`] — one platform's normalized record for one run.
//! - [`HistoryEntry`] — one calendar day in the bounded parity time series.
//! - [`UnifiedSnapshot`] — the whole-document snapshot file.
//!
//! Absence is always distinguishable from a measured zero: optional fields
//! are `None`/empty and skipped on serialization, never written as `0`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Provenance of the headline parity figure, by descending fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParitySource {
    SwarmMedian,
    PixelDiff,
    BaselineEstimate,
}

impl fmt::Display for ParitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SwarmMedian => f.write_str("swarm_median"),
            Self::PixelDiff => f.write_str("pixel_diff"),
            Self::BaselineEstimate => f.write_str("baseline_estimate"),
        }
    }
}

/// Letter grade derived from the performance sub-map. Never an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerfGrade {
    A,
    B,
    C,
    D,
    F,
    #[serde(rename = "?")]
    Unknown,
}

impl fmt::Display for PerfGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::B => f.write_str("B"),
            Self::C => f.write_str("C"),
            Self::D => f.write_str("D"),
            Self::F => f.write_str("F"),
            Self::Unknown => f.write_str("?"),
        }
    }
}

/// Test-case category used for sub-averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseCategory {
    Builtins,
    Websuite,
}

/// One normalized per-test outcome retained inside a platform record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub case_id: String,
    #[serde(rename = "type")]
    pub category: CaseCategory,
    pub parity: f64,
    pub diff_pct: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    pub passed: bool,
    #[serde(default)]
    pub stable: bool,
}

/// One platform's canonical metric record for one collector run.
///
/// Test counts are absent (not zero) when the winning source was a
/// baseline estimate, which carries no per-test results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformMetrics {
    pub parity: f64,
    pub parity_source: ParitySource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builtins_parity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub websuite_parity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests_passed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests_failed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests_total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests_stable: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_rate: Option<f64>,
    /// Supplementary, from baseline-estimate sources only. In `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_a_pass_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub issue_clusters: BTreeMap<String, u64>,
    /// Named latency metrics in milliseconds.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub perf: BTreeMap<String, f64>,
    pub perf_grade: PerfGrade,
    pub last_updated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_results: Vec<CaseOutcome>,
}

/// One calendar day in the parity time series. Platform parities live as
/// top-level keys next to `date`, matching the persisted layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub perf: BTreeMap<String, f64>,
    #[serde(flatten)]
    pub platforms: BTreeMap<String, f64>,
}

/// Cross-platform worst-case summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverallMetrics {
    pub parity: f64,
    pub perf_grade: PerfGrade,
}

/// The whole snapshot document, read-modify-written as a unit per run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedSnapshot {
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub platforms: BTreeMap<String, Option<PlatformMetrics>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall: Option<OverallMetrics>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

const GRADE_A_MIN: i32 = 90;
const GRADE_B_MIN: i32 = 80;
const GRADE_C_MIN: i32 = 70;
const GRADE_D_MIN: i32 = 60;

/// Grade a performance map: start at 100 and subtract fixed penalties for
/// slow engine init and render times. Missing metrics contribute no
/// penalty; a wholly absent map grades as [`PerfGrade::Unknown`].
#[must_use]
pub fn grade_perf(perf: &BTreeMap<String, f64>) -> PerfGrade {
    if perf.is_empty() {
        return PerfGrade::Unknown;
    }

    let mut score = 100;

    if let Some(&engine_init) = perf.get("engine_init_ms") {
        score -= if engine_init > 20.0 {
            30
        } else if engine_init > 10.0 {
            15
        } else if engine_init > 5.0 {
            5
        } else {
            0
        };
    }

    if let Some(&render_time) = perf.get("render_time_ms") {
        score -= if render_time > 50.0 {
            30
        } else if render_time > 30.0 {
            15
        } else if render_time > 15.0 {
            5
        } else {
            0
        };
    }

    if score >= GRADE_A_MIN {
        PerfGrade::A
    } else if score >= GRADE_B_MIN {
        PerfGrade::B
    } else if score >= GRADE_C_MIN {
        PerfGrade::C
    } else if score >= GRADE_D_MIN {
        PerfGrade::D
    } else {
        PerfGrade::F
    }
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perf(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), *v))
            .collect()
    }

    #[test]
    fn empty_perf_map_grades_unknown() {
        assert_eq!(grade_perf(&BTreeMap::new()), PerfGrade::Unknown);
    }

    #[test]
    fn fast_metrics_grade_a() {
        let grade = grade_perf(&perf(&[("engine_init_ms", 4.0), ("render_time_ms", 12.0)]));
        assert_eq!(grade, PerfGrade::A);
    }

    #[test]
    fn penalty_boundaries_are_strict() {
        // Exactly at a breakpoint means no penalty at that tier.
        assert_eq!(
            grade_perf(&perf(&[("engine_init_ms", 5.0), ("render_time_ms", 15.0)])),
            PerfGrade::A
        );
        assert_eq!(
            grade_perf(&perf(&[("engine_init_ms", 5.1), ("render_time_ms", 15.1)])),
            PerfGrade::A // 100 - 5 - 5 = 90
        );
        assert_eq!(
            grade_perf(&perf(&[("engine_init_ms", 10.1), ("render_time_ms", 15.1)])),
            PerfGrade::B // 100 - 15 - 5 = 80
        );
    }

    #[test]
    fn worst_case_grades_f() {
        let grade = grade_perf(&perf(&[("engine_init_ms", 25.0), ("render_time_ms", 60.0)]));
        assert_eq!(grade, PerfGrade::F); // 100 - 30 - 30 = 40
    }

    #[test]
    fn missing_metric_contributes_no_penalty() {
        // Only render time present, and it is slow: 100 - 30 = 70.
        let grade = grade_perf(&perf(&[("render_time_ms", 60.0)]));
        assert_eq!(grade, PerfGrade::C);
    }

    #[test]
    fn grade_serializes_question_mark() {
        assert_eq!(
            serde_json::to_string(&PerfGrade::Unknown).unwrap(),
            "\"?\""
        );
        assert_eq!(serde_json::to_string(&PerfGrade::A).unwrap(), "\"A\"");
    }

    #[test]
    fn parity_source_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ParitySource::SwarmMedian).unwrap(),
            "\"swarm_median\""
        );
    }

    #[test]
    fn history_entry_flattens_platform_parities() {
        let entry = HistoryEntry {
            date: "2026-08-28".to_string(),
            perf: BTreeMap::new(),
            platforms: [("macos".to_string(), 73.6)].into_iter().collect(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["date"], "2026-08-28");
        assert_eq!(json["macos"], 73.6);
        assert!(json.get("perf").is_none());

        let back: HistoryEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }
}
