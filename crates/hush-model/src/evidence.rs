//! Required evidence per finding type.
//!
//! A finding can only be reported at its computed level when the trace carries
//! complete before/after captures and the sensor summary its type is argued
//! from. Anything less downgrades it.

use hush_ir::finding::FindingType;
use hush_ir::trace::{SensorKind, Trace};

/// The sensor a finding type's argument rests on.
pub fn required_sensor(finding_type: FindingType) -> SensorKind {
    match finding_type {
        FindingType::SilentNavigationFailure | FindingType::NavigationTargetMismatch => {
            SensorKind::Navigation
        }
        FindingType::SilentSubmissionFailure | FindingType::NetworkTargetMismatch => {
            SensorKind::Network
        }
        FindingType::ValidationNotEnforced => SensorKind::UiSignal,
        FindingType::StateNotUpdated => SensorKind::State,
    }
}

/// Names of the evidence fields that are structurally missing.
pub fn missing_evidence(finding_type: FindingType, trace: &Trace) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if trace.before.url.is_empty() {
        missing.push("before_url");
    }
    if trace.before.screenshot.as_deref().map_or(true, str::is_empty) {
        missing.push("before_screenshot");
    }
    if trace.after.url.is_empty() {
        missing.push("after_url");
    }
    if trace.after.screenshot.as_deref().map_or(true, str::is_empty) {
        missing.push("after_screenshot");
    }

    let sensor = required_sensor(finding_type);
    if !trace.sensors.is_available(sensor) {
        missing.push(sensor.as_str());
    } else if sensor == SensorKind::State && trace.sensors.state.mechanism.is_none() {
        // No detected mechanism means "no keys changed" proves nothing.
        missing.push("state_mechanism");
    }
    missing
}

pub fn evidence_complete(finding_type: FindingType, trace: &Trace) -> bool {
    missing_evidence(finding_type, trace).is_empty()
}
