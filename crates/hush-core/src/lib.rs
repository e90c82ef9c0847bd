//! Scan orchestration and run-level verdicts.
//!
//! [`Scan`] ties discovery, execution, matching and scoring together for one
//! start URL and hands back a [`ScanReport`] whose collections are all in
//! canonical order.

pub mod canonical;
pub mod config;
pub mod coverage;
pub mod limits;
pub mod manifest;
pub mod scan;
pub mod telemetry;
pub mod truth;

pub use canonical::{canonical_cmp, sort_canonical, CanonicalKey, SortKey};
pub use config::{ConfigError, ScanConfig, TelemetryConfig, TruthConfig};
pub use coverage::{CoverageSummary, CoverageTracker, SilenceSummary};
pub use limits::{InputLimits, LimitViolation, ScanLimits};
pub use manifest::load_manifest;
pub use scan::{Scan, ScanError, ScanReport};
pub use telemetry::init_tracing;
pub use truth::{classify_truth, RunStats};
