use hush_ir::finding::{ConfidenceReport, EvidenceRefs, Finding};
use hush_ir::trace::Trace;
use hush_ir::types::Expectation;

use crate::confidence::MAX_REASONS;
use crate::matcher::BreakReason;

/// Assemble a finding for an observed break.
///
/// The finding's reasons lead with the break reason and continue with the
/// confidence reasons, capped at six.
pub fn build_finding(
    expectation: &Expectation,
    trace: &Trace,
    reason: BreakReason,
    confidence: ConfidenceReport,
) -> Finding {
    let mut reasons = Vec::with_capacity(MAX_REASONS);
    reasons.push(reason.as_str().to_string());
    reasons.extend(confidence.reasons.iter().take(MAX_REASONS - 1).cloned());

    Finding {
        id: format!("finding-{}-{}", expectation.id, trace.id),
        finding_type: reason.finding_type(),
        expectation_id: expectation.id.clone(),
        strength: expectation.strength,
        source: expectation.source.clone(),
        page_url: trace.before.url.clone(),
        selector: trace.interaction.selector.clone(),
        break_reason: reason.as_str().to_string(),
        confidence,
        evidence: EvidenceRefs {
            trace_id: trace.id.clone(),
            before_url: trace.before.url.clone(),
            after_url: trace.after.url.clone(),
            before_screenshot: trace.before.screenshot.clone(),
            after_screenshot: trace.after.screenshot.clone(),
        },
        reasons,
    }
}
