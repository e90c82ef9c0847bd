//! Shared data model for the observation and verdict engine.
//!
//! Everything here is plain data: expectations proven by source analysis,
//! interactions discovered on pages, the traces produced by executing them,
//! and the findings and verdicts derived from those traces. Every record is
//! serde-serializable with camelCase keys so any report writer can persist it.

pub mod finding;
pub mod parse;
pub mod trace;
pub mod types;

pub use finding::{
    ConfidenceLevel, ConfidenceReport, EvidenceRefs, Finding, FindingType, RuleContribution,
    RunTruth, SilenceEntry, SilenceImpact, SilenceLedger, SilenceScope, TruthState,
};
pub use parse::{parse_budget, parse_expectations, ParseError};
pub use trace::{
    AriaSummary, ConsoleSummary, DomRecord, FocusSummary, LoadingSummary, NavigationSummary,
    NetworkSummary, PageCapture, Phase, PolicyRecord, SensorKind, SensorSummaries, SettleRecord,
    StateMechanism, StateSummary, TerminalState, TimingSummary, Trace, UiSignalSummary,
};
pub use types::{
    Budget, BudgetError, Expectation, ExpectationKind, ExpectationTarget, Interaction,
    InteractionKind, SourceRef, Strength,
};
