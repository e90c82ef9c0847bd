//! Scan-level limits.
//!
//! The scan clock is checked before each interaction starts. Once it runs
//! out no further interaction starts, but one already in flight finishes its
//! window.

use std::fmt;

use hush_ir::types::Budget;
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};

/// Wall-clock budget for one scan, on the tokio clock.
///
/// The interaction count is enforced by the scan itself against the executed
/// window counter.
#[derive(Debug, Clone)]
pub struct ScanLimits {
    max_duration: Duration,
    start_time: Instant,
}

impl ScanLimits {
    pub fn new(budget: &Budget) -> Self {
        Self {
            max_duration: budget.scan_duration(),
            start_time: Instant::now(),
        }
    }

    /// True once no further interaction may start.
    pub fn exceeded(&self) -> bool {
        self.start_time.elapsed() >= self.max_duration
    }

    pub fn remaining(&self) -> Duration {
        self.max_duration.saturating_sub(self.start_time.elapsed())
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }
}

/// Limits on inputs accepted before a scan starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InputLimits {
    pub max_manifest_bytes: u64,
    pub max_expectations: usize,
}

impl Default for InputLimits {
    fn default() -> Self {
        Self {
            max_manifest_bytes: 16 * 1024 * 1024,
            max_expectations: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LimitViolation {
    ManifestTooLarge { size: u64, max: u64 },
    TooManyExpectations { count: usize, max: usize },
}

impl fmt::Display for LimitViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ManifestTooLarge { size, max } => {
                write!(f, "manifest too large ({size} bytes, max {max})")
            }
            Self::TooManyExpectations { count, max } => {
                write!(f, "too many expectations ({count}, max {max})")
            }
        }
    }
}

impl std::error::Error for LimitViolation {}

pub fn check_manifest_size(limits: &InputLimits, size: u64) -> Result<(), LimitViolation> {
    if size > limits.max_manifest_bytes {
        return Err(LimitViolation::ManifestTooLarge {
            size,
            max: limits.max_manifest_bytes,
        });
    }
    Ok(())
}

pub fn check_expectation_count(limits: &InputLimits, count: usize) -> Result<(), LimitViolation> {
    if count > limits.max_expectations {
        return Err(LimitViolation::TooManyExpectations {
            count,
            max: limits.max_expectations,
        });
    }
    Ok(())
}
