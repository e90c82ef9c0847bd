use std::fmt;

use hush_explore::origin::normalize_path;
use hush_ir::finding::FindingType;
use hush_ir::trace::{Phase, TerminalState, Trace};
use hush_ir::types::{Expectation, ExpectationKind, ExpectationTarget, Strength};
use serde::{Deserialize, Serialize};

/// Why an expectation was observed to break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakReason {
    NavigationTargetMismatch,
    NavigationNotObserved,
    NetworkRequestUrlMismatch,
    NetworkRequestMissing,
    ValidationRequestFired,
    ValidationNavigated,
    ValidationFeedbackMissing,
    StateKeyNotChanged,
}

impl BreakReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakReason::NavigationTargetMismatch => "navigation_target_mismatch",
            BreakReason::NavigationNotObserved => "navigation_not_observed",
            BreakReason::NetworkRequestUrlMismatch => "network_request_url_mismatch",
            BreakReason::NetworkRequestMissing => "network_request_missing",
            BreakReason::ValidationRequestFired => "validation_request_fired",
            BreakReason::ValidationNavigated => "validation_navigated",
            BreakReason::ValidationFeedbackMissing => "validation_feedback_missing",
            BreakReason::StateKeyNotChanged => "state_key_not_changed",
        }
    }

    pub fn finding_type(&self) -> FindingType {
        match self {
            BreakReason::NavigationTargetMismatch => FindingType::NavigationTargetMismatch,
            BreakReason::NavigationNotObserved => FindingType::SilentNavigationFailure,
            BreakReason::NetworkRequestUrlMismatch => FindingType::NetworkTargetMismatch,
            BreakReason::NetworkRequestMissing => FindingType::SilentSubmissionFailure,
            BreakReason::ValidationRequestFired
            | BreakReason::ValidationNavigated
            | BreakReason::ValidationFeedbackMissing => FindingType::ValidationNotEnforced,
            BreakReason::StateKeyNotChanged => FindingType::StateNotUpdated,
        }
    }
}

impl fmt::Display for BreakReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Verified,
    ObservedBreak(BreakReason),
}

/// Why an expectation could not be attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageGapReason {
    SelectorNotFound,
    AmbiguousSelector,
    RouteUnreachable,
    BudgetExhausted,
    /// The browser session died before the expectation's turn came.
    SessionLost,
    /// The action hung past its deadline, so its effect was never observable.
    ActionTimedOut,
}

impl CoverageGapReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageGapReason::SelectorNotFound => "selector_not_found",
            CoverageGapReason::AmbiguousSelector => "ambiguous_selector",
            CoverageGapReason::RouteUnreachable => "route_unreachable",
            CoverageGapReason::BudgetExhausted => "budget_exhausted",
            CoverageGapReason::SessionLost => "session_lost",
            CoverageGapReason::ActionTimedOut => "action_timed_out",
        }
    }
}

/// Classify a trace against an expectation using the exact per-kind rules.
pub fn classify(expectation: &Expectation, trace: &Trace) -> MatchOutcome {
    let url_changed = trace.url_changed() || trace.sensors.navigation.url_changed;
    let network = &trace.sensors.network;
    match (&expectation.kind, &expectation.target) {
        (ExpectationKind::Navigation, ExpectationTarget::Path(target)) => {
            if normalize_path(&trace.after.url) == normalize_path(target) {
                MatchOutcome::Verified
            } else if url_changed {
                MatchOutcome::ObservedBreak(BreakReason::NavigationTargetMismatch)
            } else {
                MatchOutcome::ObservedBreak(BreakReason::NavigationNotObserved)
            }
        }
        (ExpectationKind::NetworkAction, ExpectationTarget::Url(expected)) => {
            // Substring match: "/api/submit" also matches "/api/submit-draft".
            if network.observed_urls.iter().any(|u| u.contains(expected.as_str())) {
                MatchOutcome::Verified
            } else if network.total_requests > 0 {
                MatchOutcome::ObservedBreak(BreakReason::NetworkRequestUrlMismatch)
            } else {
                MatchOutcome::ObservedBreak(BreakReason::NetworkRequestMissing)
            }
        }
        (ExpectationKind::ValidationBlock, _) => {
            if network.total_requests > 0 {
                MatchOutcome::ObservedBreak(BreakReason::ValidationRequestFired)
            } else if url_changed {
                MatchOutcome::ObservedBreak(BreakReason::ValidationNavigated)
            } else if !trace.sensors.ui_signal.validation_appeared {
                MatchOutcome::ObservedBreak(BreakReason::ValidationFeedbackMissing)
            } else {
                MatchOutcome::Verified
            }
        }
        (ExpectationKind::StateAction, ExpectationTarget::StateKey(key)) => {
            if trace.sensors.state.changed_keys.iter().any(|k| k == key) {
                MatchOutcome::Verified
            } else {
                MatchOutcome::ObservedBreak(BreakReason::StateKeyNotChanged)
            }
        }
        // Parsing never pairs a kind with a foreign target.
        (ExpectationKind::Navigation, _) => {
            MatchOutcome::ObservedBreak(BreakReason::NavigationNotObserved)
        }
        (ExpectationKind::NetworkAction, _) => {
            MatchOutcome::ObservedBreak(BreakReason::NetworkRequestMissing)
        }
        (ExpectationKind::StateAction, _) => {
            MatchOutcome::ObservedBreak(BreakReason::StateKeyNotChanged)
        }
    }
}

/// Classification of a trace, or the gap that stops it from being classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessment {
    Matched(MatchOutcome),
    Gap(CoverageGapReason),
}

/// Whether the action itself never completed, by error or by timeout.
pub fn action_unconfirmed(trace: &Trace) -> bool {
    match trace.terminal {
        TerminalState::Error => trace.policy.error_phase == Some(Phase::Click),
        TerminalState::Timeout => trace.policy.timeout_phase == Some(Phase::Click),
        _ => false,
    }
}

/// Like `classify`, but a blocked external target or an action that never
/// completed is a coverage gap rather than evidence of a break.
pub fn assess(expectation: &Expectation, trace: &Trace) -> Assessment {
    if trace.terminal == TerminalState::ExternalBlocked {
        return Assessment::Gap(CoverageGapReason::RouteUnreachable);
    }
    match trace.terminal {
        TerminalState::Error if action_unconfirmed(trace) => {
            Assessment::Gap(CoverageGapReason::SelectorNotFound)
        }
        TerminalState::Timeout if action_unconfirmed(trace) => {
            Assessment::Gap(CoverageGapReason::ActionTimedOut)
        }
        _ => Assessment::Matched(classify(expectation, trace)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Verified,
    ObservedBreak,
    CoverageGap,
}

/// Per-expectation result reported with the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectationOutcome {
    pub expectation_id: String,
    pub strength: Strength,
    pub status: OutcomeStatus,
    /// Break reason or coverage-gap reason code.
    pub reason: Option<String>,
    pub trace_id: Option<String>,
}

impl ExpectationOutcome {
    pub fn from_match(expectation: &Expectation, trace_id: &str, outcome: MatchOutcome) -> Self {
        let (status, reason) = match outcome {
            MatchOutcome::Verified => (OutcomeStatus::Verified, None),
            MatchOutcome::ObservedBreak(reason) => {
                (OutcomeStatus::ObservedBreak, Some(reason.as_str().to_string()))
            }
        };
        Self {
            expectation_id: expectation.id.clone(),
            strength: expectation.strength,
            status,
            reason,
            trace_id: Some(trace_id.to_string()),
        }
    }

    pub fn gap(expectation: &Expectation, reason: CoverageGapReason, trace_id: Option<&str>) -> Self {
        Self {
            expectation_id: expectation.id.clone(),
            strength: expectation.strength,
            status: OutcomeStatus::CoverageGap,
            reason: Some(reason.as_str().to_string()),
            trace_id: trace_id.map(str::to_string),
        }
    }

    /// Attempted means the expectation reached a VERIFIED or OBSERVED_BREAK verdict.
    pub fn is_attempted(&self) -> bool {
        self.status != OutcomeStatus::CoverageGap
    }
}
