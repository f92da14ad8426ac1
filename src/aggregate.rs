//! Folding per-platform records into the overall summary and the bounded
//! daily history, plus the whole-pipeline entry point.

use crate::collect::{collect_platform, PlatformSpec};
use crate::error::Result;
use crate::metrics::{
    grade_perf, round1, HistoryEntry, OverallMetrics, PerfGrade, PlatformMetrics, UnifiedSnapshot,
};
use crate::store::SnapshotStore;
use chrono::{Local, SecondsFormat, Utc};
use std::collections::BTreeMap;

/// Entries retained in the daily history after truncation.
pub const MAX_HISTORY_DAYS: usize = 90;

/// Worst-platform-wins summary: overall parity is the minimum across
/// platforms that produced a record, deliberately pessimistic.
///
/// The overall grade re-grades the perf map of the platform whose metric
/// values have the largest sum. That conflates completeness with magnitude
/// and can favor a slow platform with more populated fields; the behavior
/// is kept as-is.
#[must_use]
pub fn overall_summary(
    platforms: &BTreeMap<String, Option<PlatformMetrics>>,
) -> Option<OverallMetrics> {
    let records: Vec<&PlatformMetrics> = platforms.values().flatten().collect();
    let parity = records.iter().map(|m| m.parity).reduce(f64::min)?;

    let fullest_perf = records
        .iter()
        .map(|m| &m.perf)
        .filter(|perf| !perf.is_empty())
        .max_by(|a, b| {
            let sum = |m: &BTreeMap<String, f64>| m.values().sum::<f64>();
            sum(a).total_cmp(&sum(b))
        });

    Some(OverallMetrics {
        parity: round1(parity),
        perf_grade: fullest_perf.map_or(PerfGrade::Unknown, grade_perf),
    })
}

/// Upsert `date`'s history entry in place: one entry per calendar day,
/// parity values overwritten, perf fields merged and never deleted. The
/// series is kept sorted by date and truncated to the newest
/// [`MAX_HISTORY_DAYS`] entries.
pub fn upsert_history(
    history: &mut Vec<HistoryEntry>,
    date: &str,
    platforms: &BTreeMap<String, Option<PlatformMetrics>>,
) {
    let idx = history
        .iter()
        .position(|entry| entry.date == date)
        .unwrap_or_else(|| {
            history.push(HistoryEntry {
                date: date.to_string(),
                ..HistoryEntry::default()
            });
            history.len() - 1
        });
    let entry = &mut history[idx];

    for (name, record) in platforms {
        let Some(record) = record else { continue };
        entry.platforms.insert(name.clone(), record.parity);
        for (key, value) in &record.perf {
            entry.perf.insert(key.clone(), *value);
        }
    }

    history.sort_by(|a, b| a.date.cmp(&b.date));
    if history.len() > MAX_HISTORY_DAYS {
        let excess = history.len() - MAX_HISTORY_DAYS;
        history.drain(..excess);
    }
}

/// Today's calendar day in the machine's local zone, `YYYY-MM-DD`.
#[must_use]
pub fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Run the whole collection pipeline: load the persisted snapshot, collect
/// every configured platform, recompute the overall summary, upsert the
/// history for `date`, and save. Only store failures propagate.
pub fn run_collection(
    store: &dyn SnapshotStore,
    platforms: &[PlatformSpec],
    date: &str,
) -> Result<UnifiedSnapshot> {
    let mut snapshot = store.load()?.unwrap_or_default();

    let mut collected = BTreeMap::new();
    for spec in platforms {
        collected.insert(spec.name.clone(), collect_platform(&spec.name, &spec.root));
    }

    snapshot.generated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    snapshot.platforms = collected;
    snapshot.overall = overall_summary(&snapshot.platforms);
    upsert_history(&mut snapshot.history, date, &snapshot.platforms);

    store.save(&snapshot)?;
    Ok(snapshot)
}
