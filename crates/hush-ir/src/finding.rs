use std::fmt;

use serde::{Deserialize, Serialize};

use crate::trace::SensorKind;
use crate::types::{SourceRef, Strength};

// ── Silence ──────────────────────────────────────────────────────────

/// Where an evidentiary gap happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SilenceScope {
    Sensor(SensorKind),
    Interaction,
    Page,
    Expectation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SilenceImpact {
    Low,
    Medium,
    High,
}

impl SilenceImpact {
    /// Confidence points one entry of this impact removes.
    pub fn discount(&self) -> u32 {
        match self {
            SilenceImpact::Low => 2,
            SilenceImpact::Medium => 5,
            SilenceImpact::High => 10,
        }
    }
}

/// A recorded evidentiary gap. Never silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SilenceEntry {
    pub scope: SilenceScope,
    /// Short reason code, e.g. `window_not_started`, `timeout_truncated_capture`.
    pub reason: String,
    pub impact: SilenceImpact,
    /// Trace id, page URL or expectation id the gap belongs to.
    #[serde(default)]
    pub subject: Option<String>,
}

impl SilenceEntry {
    pub fn new(scope: SilenceScope, reason: impl Into<String>, impact: SilenceImpact) -> Self {
        Self {
            scope,
            reason: reason.into(),
            impact,
            subject: None,
        }
    }

    pub fn for_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

/// Per-run aggregation of every silence entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SilenceLedger {
    entries: Vec<SilenceEntry>,
}

impl SilenceLedger {
    /// Cap on the confidence discount a single subject can accrue.
    pub const MAX_DISCOUNT: u32 = 15;

    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, entry: SilenceEntry) {
        self.entries.push(entry);
    }

    pub fn extend<I: IntoIterator<Item = SilenceEntry>>(&mut self, entries: I) {
        self.entries.extend(entries);
    }

    pub fn entries(&self) -> &[SilenceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_scope(&self, scope: SilenceScope) -> usize {
        self.entries.iter().filter(|e| e.scope == scope).count()
    }

    /// Confidence discount for entries attached to `subject`, capped.
    pub fn discount_for(&self, subject: &str) -> u32 {
        let total: u32 = self
            .entries
            .iter()
            .filter(|e| e.subject.as_deref() == Some(subject))
            .map(|e| e.impact.discount())
            .sum();
        total.min(Self::MAX_DISCOUNT)
    }

    pub fn into_entries(self) -> Vec<SilenceEntry> {
        self.entries
    }
}

// ── Confidence ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub const HIGH_FLOOR: u8 = 80;
    pub const MEDIUM_FLOOR: u8 = 60;

    pub fn from_score(score: u8) -> Self {
        if score >= Self::HIGH_FLOOR {
            ConfidenceLevel::High
        } else if score >= Self::MEDIUM_FLOOR {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    /// One step down; LOW stays LOW.
    pub fn downgraded(self) -> Self {
        match self {
            ConfidenceLevel::High => ConfidenceLevel::Medium,
            ConfidenceLevel::Medium | ConfidenceLevel::Low => ConfidenceLevel::Low,
        }
    }

    /// Highest score that still maps to this level.
    pub fn ceiling(self) -> u8 {
        match self {
            ConfidenceLevel::High => 100,
            ConfidenceLevel::Medium => Self::HIGH_FLOOR - 1,
            ConfidenceLevel::Low => Self::MEDIUM_FLOOR - 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "HIGH",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::Low => "LOW",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One applied scoring rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleContribution {
    pub rule: String,
    pub points: i32,
}

/// Output of the confidence engine, with the full audit breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceReport {
    pub score: u8,
    pub level: ConfidenceLevel,
    pub base: i32,
    pub additive: Vec<RuleContribution>,
    pub subtractive: Vec<RuleContribution>,
    /// At most six human-readable reasons.
    pub reasons: Vec<String>,
    pub evidence_complete: bool,
    pub policy_version: String,
}

// ── Findings ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingType {
    SilentNavigationFailure,
    NavigationTargetMismatch,
    SilentSubmissionFailure,
    NetworkTargetMismatch,
    ValidationNotEnforced,
    StateNotUpdated,
}

impl FindingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingType::SilentNavigationFailure => "silent_navigation_failure",
            FindingType::NavigationTargetMismatch => "navigation_target_mismatch",
            FindingType::SilentSubmissionFailure => "silent_submission_failure",
            FindingType::NetworkTargetMismatch => "network_target_mismatch",
            FindingType::ValidationNotEnforced => "validation_not_enforced",
            FindingType::StateNotUpdated => "state_not_updated",
        }
    }
}

impl fmt::Display for FindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// References into the trace that back a finding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceRefs {
    pub trace_id: String,
    pub before_url: String,
    pub after_url: String,
    pub before_screenshot: Option<String>,
    pub after_screenshot: Option<String>,
}

/// A classified violation, created only from an OBSERVED_BREAK.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub id: String,
    #[serde(rename = "type")]
    pub finding_type: FindingType,
    pub expectation_id: String,
    pub strength: Strength,
    pub source: Option<SourceRef>,
    pub page_url: String,
    pub selector: String,
    /// The matcher's break reason code, e.g. `network_request_missing`.
    pub break_reason: String,
    pub confidence: ConfidenceReport,
    pub evidence: EvidenceRefs,
    pub reasons: Vec<String>,
}

// ── Run truth ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TruthState {
    Success,
    Findings,
    Incomplete,
}

/// The final verdict of one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTruth {
    pub truth_state: TruthState,
    pub confidence: ConfidenceLevel,
    /// Short reason code.
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_boundaries() {
        assert_eq!(ConfidenceLevel::from_score(100), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(80), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(79), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(60), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(59), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_score(0), ConfidenceLevel::Low);
    }

    #[test]
    fn test_ceiling_maps_back_to_level() {
        for level in [
            ConfidenceLevel::High,
            ConfidenceLevel::Medium,
            ConfidenceLevel::Low,
        ] {
            assert_eq!(ConfidenceLevel::from_score(level.ceiling()), level);
        }
    }

    #[test]
    fn test_ledger_discount_is_capped_per_subject() {
        let mut ledger = SilenceLedger::new();
        for _ in 0..4 {
            ledger.record(
                SilenceEntry::new(
                    SilenceScope::Sensor(SensorKind::Network),
                    "sensor_failed",
                    SilenceImpact::High,
                )
                .for_subject("trace-0001"),
            );
        }
        ledger.record(
            SilenceEntry::new(SilenceScope::Interaction, "timeout", SilenceImpact::Low)
                .for_subject("trace-0002"),
        );
        assert_eq!(ledger.discount_for("trace-0001"), SilenceLedger::MAX_DISCOUNT);
        assert_eq!(ledger.discount_for("trace-0002"), 2);
        assert_eq!(ledger.discount_for("trace-9999"), 0);
        assert_eq!(ledger.count_scope(SilenceScope::Interaction), 1);
    }
}
