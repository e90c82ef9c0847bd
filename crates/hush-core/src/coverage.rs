//! Coverage and silence summaries.
//!
//! Tracks what the scan found, what it selected, what it attempted and what
//! it could not observe, for reporting and release-gating layers.

use std::collections::BTreeMap;

use hush_explore::{CoverageStats, Warning};
use hush_ir::finding::{SilenceEntry, SilenceImpact, SilenceScope};
use hush_ir::types::Strength;
use hush_model::{ExpectationOutcome, OutcomeStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageSummary {
    pub candidates_discovered: usize,
    pub candidates_selected: usize,
    pub cap: usize,
    pub capped: bool,
    pub pages_visited: usize,
    pub pages_discovered: usize,
    pub urls_capped: bool,
    pub pages_capped: bool,
    pub interactions_executed: usize,
    pub proven_total: usize,
    pub proven_attempted: usize,
    pub coverage_ratio: f64,
    pub observed_derived: usize,
    /// Coverage-gap reason code → count.
    pub gaps: BTreeMap<String, usize>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SilenceSummary {
    pub total: usize,
    pub by_scope: BTreeMap<String, usize>,
    pub high_impact: usize,
}

impl SilenceSummary {
    pub fn from_entries(entries: &[SilenceEntry]) -> Self {
        let mut by_scope = BTreeMap::new();
        for entry in entries {
            let scope = match entry.scope {
                SilenceScope::Sensor(kind) => format!("sensor:{kind}"),
                SilenceScope::Interaction => "interaction".to_string(),
                SilenceScope::Page => "page".to_string(),
                SilenceScope::Expectation => "expectation".to_string(),
            };
            *by_scope.entry(scope).or_insert(0) += 1;
        }
        Self {
            total: entries.len(),
            by_scope,
            high_impact: entries
                .iter()
                .filter(|e| e.impact == SilenceImpact::High)
                .count(),
        }
    }
}

/// Scan-level coverage aggregator.
#[derive(Debug, Clone, Default)]
pub struct CoverageTracker {
    stats: CoverageStats,
    interactions_executed: usize,
    proven_total: usize,
    proven_attempted: usize,
    observed_derived: usize,
    gaps: BTreeMap<String, usize>,
    warnings: Vec<Warning>,
}

impl CoverageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_discovery(&mut self, stats: &CoverageStats, warnings: &[Warning]) {
        self.stats = stats.clone();
        for warning in warnings {
            self.warn(*warning);
        }
    }

    pub fn record_selection(&mut self, selected: usize, cap: usize, capped: bool) {
        self.stats.candidates_selected = selected;
        self.stats.cap = cap;
        self.stats.capped = capped;
        if capped {
            self.warn(Warning::InteractionsCapped);
        }
    }

    pub fn record_interaction(&mut self) {
        self.interactions_executed += 1;
    }

    pub fn interactions_executed(&self) -> usize {
        self.interactions_executed
    }

    pub fn record_outcome(&mut self, outcome: &ExpectationOutcome) {
        match outcome.strength {
            Strength::Proven => {
                self.proven_total += 1;
                if outcome.is_attempted() {
                    self.proven_attempted += 1;
                }
            }
            Strength::Observed => self.observed_derived += 1,
        }
        if outcome.status == OutcomeStatus::CoverageGap {
            if let Some(reason) = &outcome.reason {
                *self.gaps.entry(reason.clone()).or_insert(0) += 1;
            }
        }
    }

    /// Warnings are kept once each, in first-seen order.
    pub fn warn(&mut self, warning: Warning) {
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn proven_total(&self) -> usize {
        self.proven_total
    }

    pub fn proven_attempted(&self) -> usize {
        self.proven_attempted
    }

    pub fn coverage_ratio(&self) -> f64 {
        if self.proven_total == 0 {
            1.0
        } else {
            self.proven_attempted as f64 / self.proven_total as f64
        }
    }

    pub fn summary(&self, elapsed_ms: u64) -> CoverageSummary {
        CoverageSummary {
            candidates_discovered: self.stats.candidates_discovered,
            candidates_selected: self.stats.candidates_selected,
            cap: self.stats.cap,
            capped: self.stats.capped,
            pages_visited: self.stats.pages_visited,
            pages_discovered: self.stats.pages_discovered,
            urls_capped: self.stats.urls_capped,
            pages_capped: self.stats.pages_capped,
            interactions_executed: self.interactions_executed,
            proven_total: self.proven_total,
            proven_attempted: self.proven_attempted,
            coverage_ratio: self.coverage_ratio(),
            observed_derived: self.observed_derived,
            gaps: self.gaps.clone(),
            elapsed_ms,
        }
    }
}
