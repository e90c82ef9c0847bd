//! Verdicts for individual traces: matching against expectations, deriving
//! OBSERVED expectations, and scoring the confidence of each finding.

pub mod confidence;
pub mod derive;
pub mod evidence;
pub mod finding;
pub mod matcher;

pub use confidence::{Comparisons, ConfidenceEngine, ConfidenceInput, ConfidencePolicy, Rule, Signal};
pub use derive::derive_observed;
pub use evidence::{evidence_complete, missing_evidence};
pub use finding::build_finding;
pub use matcher::{
    action_unconfirmed, assess, classify, Assessment, BreakReason, CoverageGapReason, ExpectationOutcome, MatchOutcome,
    OutcomeStatus,
};
