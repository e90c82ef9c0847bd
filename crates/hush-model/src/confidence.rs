//! Confidence scoring for findings.
//!
//! Scoring is a pure function of the finding type, the expectation strength,
//! the sensor summaries and a few before/after comparisons. Every point value
//! lives in a versioned [`ConfidencePolicy`] so a change to the table is a
//! reviewable diff rather than an edited literal.

use hush_ir::finding::{ConfidenceLevel, ConfidenceReport, FindingType, RuleContribution, SilenceLedger};
use hush_ir::trace::{SensorSummaries, Trace};
use hush_ir::types::Strength;
use serde::Serialize;
use tracing::debug;

use crate::evidence::missing_evidence;

pub const MAX_REASONS: usize = 6;

/// Before/after facts that are not owned by any single sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparisons {
    pub url_changed: bool,
    pub dom_changed: bool,
    pub settle_changed: bool,
    pub timed_out: bool,
}

impl Comparisons {
    pub fn from_trace(trace: &Trace) -> Self {
        Self {
            url_changed: trace.url_changed() || trace.sensors.navigation.url_changed,
            dom_changed: trace.dom_changed(),
            settle_changed: trace.dom.settle.dom_changed_during_settle,
            timed_out: trace.policy.timeout,
        }
    }
}

/// Everything the engine looks at.
#[derive(Debug, Clone)]
pub struct ConfidenceInput<'a> {
    pub finding_type: FindingType,
    pub strength: Strength,
    pub sensors: &'a SensorSummaries,
    pub comparisons: Comparisons,
    /// Points removed for silences attached to the trace, already capped.
    pub silence_discount: u32,
    /// Evidence fields the Evidence Law requires but the trace lacks.
    pub missing_evidence: Vec<&'static str>,
}

impl<'a> ConfidenceInput<'a> {
    pub fn from_trace(finding_type: FindingType, strength: Strength, trace: &'a Trace) -> Self {
        let mut ledger = SilenceLedger::new();
        ledger.extend(trace.silences.iter().cloned());
        Self {
            finding_type,
            strength,
            sensors: &trace.sensors,
            comparisons: Comparisons::from_trace(trace),
            silence_discount: ledger.discount_for(&trace.id),
            missing_evidence: missing_evidence(finding_type, trace),
        }
    }
}

/// A fact about a trace that moves confidence up or down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    ServerError,
    ExplicitFailure,
    JsError,
    NoCompensatingFeedback,
    DomUnchanged,
    LoadingUnresolved,
    FreezeLike,
    UiFeedback,
    LoadingSeen,
    ErrorFeedback,
    SettleChange,
    AriaAnnouncement,
    ExecutionTimeout,
}

impl Signal {
    pub fn holds(&self, input: &ConfidenceInput<'_>) -> bool {
        let s = input.sensors;
        let c = &input.comparisons;
        match self {
            Signal::ServerError => s.network.has_server_error(),
            Signal::ExplicitFailure => {
                s.network.has_transport_failure() || s.console.unhandled_rejections > 0
            }
            Signal::JsError => s.console.page_errors > 0,
            // Claiming an absence needs the UI sensor to have actually looked.
            Signal::NoCompensatingFeedback => {
                s.ui_signal.available
                    && !s.ui_signal.changed
                    && !s.loading.seen_loading
                    && !s.aria.changed
                    && !c.url_changed
            }
            Signal::DomUnchanged => !c.dom_changed,
            Signal::LoadingUnresolved => s.loading.unresolved,
            Signal::FreezeLike => s.timing.freeze_like,
            Signal::UiFeedback => s.ui_signal.changed,
            Signal::LoadingSeen => s.loading.seen_loading && !s.loading.unresolved,
            Signal::ErrorFeedback => s.ui_signal.error_appeared,
            Signal::SettleChange => c.settle_changed,
            Signal::AriaAnnouncement => !s.aria.announcements.is_empty(),
            Signal::ExecutionTimeout => c.timed_out,
        }
    }
}

/// One row of the policy table. `points` is signed: subtractive rules are negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub id: &'static str,
    pub signal: Signal,
    pub points: i32,
    pub reason: &'static str,
}

const fn rule(id: &'static str, signal: Signal, points: i32, reason: &'static str) -> Rule {
    Rule {
        id,
        signal,
        points,
        reason,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidencePolicy {
    pub version: &'static str,
    pub base_scores: Vec<(FindingType, i32)>,
    /// Applied in order.
    pub additive: Vec<Rule>,
    /// Applied in order, after the additive rules.
    pub subtractive: Vec<Rule>,
    pub observed_penalty: i32,
}

impl ConfidencePolicy {
    pub fn v1() -> Self {
        Self {
            version: "confidence-v1",
            base_scores: vec![
                (FindingType::SilentNavigationFailure, 70),
                (FindingType::NavigationTargetMismatch, 60),
                (FindingType::SilentSubmissionFailure, 70),
                (FindingType::NetworkTargetMismatch, 55),
                (FindingType::ValidationNotEnforced, 60),
                (FindingType::StateNotUpdated, 65),
            ],
            additive: vec![
                rule("server_error", Signal::ServerError, 15, "server answered with a 5xx status"),
                rule("explicit_failure", Signal::ExplicitFailure, 10, "request failed or a promise rejection went unhandled"),
                rule("js_error", Signal::JsError, 10, "page raised a JavaScript error"),
                rule("no_compensating_feedback", Signal::NoCompensatingFeedback, 10, "no visible feedback followed the action"),
                rule("dom_unchanged", Signal::DomUnchanged, 5, "DOM did not change"),
                rule("loading_unresolved", Signal::LoadingUnresolved, 5, "loading indicator never resolved"),
                rule("freeze_like", Signal::FreezeLike, 5, "page looked frozen"),
            ],
            subtractive: vec![
                rule("ui_feedback", Signal::UiFeedback, -20, "visible UI change after the action"),
                rule("loading_seen", Signal::LoadingSeen, -10, "loading indicator appeared and resolved"),
                rule("error_feedback", Signal::ErrorFeedback, -15, "error message shown to the user"),
                rule("settle_change", Signal::SettleChange, -10, "DOM kept changing while settling"),
                rule("aria_announcement", Signal::AriaAnnouncement, -10, "live region announced a change"),
                rule("execution_timeout", Signal::ExecutionTimeout, -10, "observation window timed out"),
            ],
            observed_penalty: 20,
        }
    }

    pub fn base(&self, finding_type: FindingType) -> i32 {
        self.base_scores
            .iter()
            .find(|(t, _)| *t == finding_type)
            .map_or(50, |(_, points)| *points)
    }
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self::v1()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfidenceEngine {
    policy: ConfidencePolicy,
}

impl ConfidenceEngine {
    pub fn new(policy: ConfidencePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ConfidencePolicy {
        &self.policy
    }

    pub fn score(&self, input: &ConfidenceInput<'_>) -> ConfidenceReport {
        let base = self.policy.base(input.finding_type);
        let mut reasons = Vec::new();

        let mut apply = |rules: &[Rule]| -> Vec<RuleContribution> {
            rules
                .iter()
                .filter(|r| r.signal.holds(input))
                .map(|r| {
                    reasons.push(r.reason.to_string());
                    RuleContribution {
                        rule: r.id.to_string(),
                        points: r.points,
                    }
                })
                .collect()
        };
        let additive = apply(&self.policy.additive);
        let mut subtractive = apply(&self.policy.subtractive);

        if input.strength == Strength::Observed {
            subtractive.push(RuleContribution {
                rule: "observed_strength".to_string(),
                points: -self.policy.observed_penalty,
            });
            reasons.push("expectation was inferred from behaviour, not proven".to_string());
        }
        if input.silence_discount > 0 {
            subtractive.push(RuleContribution {
                rule: "silence_discount".to_string(),
                points: -(input.silence_discount as i32),
            });
            reasons.push("some evidence could not be collected".to_string());
        }

        let total: i32 = base
            + additive.iter().map(|c| c.points).sum::<i32>()
            + subtractive.iter().map(|c| c.points).sum::<i32>();
        let mut score = total.clamp(0, 100) as u8;
        let mut level = ConfidenceLevel::from_score(score);

        let evidence_complete = input.missing_evidence.is_empty();
        if !evidence_complete {
            level = level.downgraded();
            score = score.min(level.ceiling());
            reasons.insert(
                0,
                format!("evidence incomplete: {}", input.missing_evidence.join(", ")),
            );
        }
        reasons.truncate(MAX_REASONS);

        debug!(
            finding_type = %input.finding_type,
            base,
            score,
            level = %level,
            evidence_complete,
            "confidence scored"
        );
        ConfidenceReport {
            score,
            level,
            base,
            additive,
            subtractive,
            reasons,
            evidence_complete,
            policy_version: self.policy.version.to_string(),
        }
    }
}
