//! Cross-platform visual-parity metrics collection and performance
//! regression checking.
//!
//! Two independent pipelines share this library:
//! - The metrics pipeline resolves per-platform report files by priority,
//!   normalizes the heterogeneous schemas into canonical records, folds
//!   them into an overall summary, and maintains a bounded daily history
//!   inside a whole-document snapshot file.
//! - The regression pipeline compares a current results document against a
//!   stored baseline with per-metric percentage thresholds and emits
//!   classified deltas.
//!
//! Both are driven by thin CLI binaries under `src/bin/`.

pub mod aggregate;
pub mod collect;
pub mod error;
pub mod metrics;
pub mod regression;
pub mod report;
pub mod source;
pub mod store;
