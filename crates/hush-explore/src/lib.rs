//! Traversal and execution: page discovery, interaction selection under the
//! scan budget, the per-interaction observation window, and bounded retries
//! of transient driver failures.

pub mod adapt;
pub mod traversal;

pub use adapt::retry::{RetryEvent, RetryPolicy, TransientSignature};
pub use traversal::frontier::{discover, CoverageStats, DiscoveredPage, Discovery, Frontier, Warning};
pub use traversal::origin;
pub use traversal::runner::{InteractionRunner, Outcome, RunOutput, RunnerError, RunnerState};
pub use traversal::select::{priority_tier, select_interactions, Selection};
