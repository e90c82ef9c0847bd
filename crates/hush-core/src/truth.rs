//! Run-level verdict.

use hush_ir::finding::{ConfidenceLevel, RunTruth, TruthState};
use serde::{Deserialize, Serialize};

use crate::config::TruthConfig;

/// What the truth classifier looks at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub findings: usize,
    /// Reason code of a browser/session-level failure, if one happened.
    pub infra_failure: Option<String>,
    pub budget_exceeded: bool,
    /// PROVEN expectations handed to the scan.
    pub total_expectations: usize,
    /// PROVEN expectations that reached a VERIFIED or OBSERVED_BREAK verdict.
    pub attempted_expectations: usize,
}

impl RunStats {
    /// Attempted over total PROVEN expectations; 1.0 when there are none.
    pub fn coverage_ratio(&self) -> f64 {
        if self.total_expectations == 0 {
            1.0
        } else {
            self.attempted_expectations as f64 / self.total_expectations as f64
        }
    }
}

fn truth(truth_state: TruthState, confidence: ConfidenceLevel, reason: &str) -> RunTruth {
    RunTruth {
        truth_state,
        confidence,
        reason: reason.to_string(),
    }
}

/// Classify one run. The checks run in strict precedence order; in
/// particular a run with coverage below threshold or an exceeded budget is
/// never SUCCESS.
pub fn classify_truth(stats: &RunStats, config: &TruthConfig) -> RunTruth {
    let ratio = stats.coverage_ratio();

    if stats.findings > 0 {
        return truth(TruthState::Findings, ConfidenceLevel::High, "findings_present");
    }
    if stats.infra_failure.is_some() {
        return truth(TruthState::Incomplete, ConfidenceLevel::Low, "infrastructure_failure");
    }
    if stats.budget_exceeded {
        return truth(TruthState::Incomplete, ConfidenceLevel::Medium, "budget_exceeded");
    }
    if ratio < config.coverage_threshold {
        return truth(TruthState::Incomplete, ConfidenceLevel::Medium, "coverage_below_threshold");
    }
    if stats.total_expectations == 0 {
        return truth(TruthState::Success, ConfidenceLevel::Medium, "no_expectations");
    }
    if ratio >= config.coverage_threshold {
        return truth(TruthState::Success, ConfidenceLevel::High, "coverage_met");
    }
    truth(TruthState::Incomplete, ConfidenceLevel::Low, "coverage_undetermined")
}
