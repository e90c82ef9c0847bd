use async_trait::async_trait;
use hush_browser::{Page, UiIndicators};
use hush_ir::trace::{SensorKind, UiSignalSummary};

use crate::sensor::{Sensor, SensorError};

#[derive(Debug, Default)]
pub struct UiSignalSensor;

impl UiSignalSensor {
    pub fn new() -> Self {
        Self
    }
}

/// Whether `after` holds an entry `before` did not.
fn appeared(before: &[String], after: &[String]) -> bool {
    after.iter().any(|entry| !before.contains(entry))
}

#[async_trait]
impl Sensor for UiSignalSensor {
    type Snapshot = UiIndicators;
    type Summary = UiSignalSummary;

    fn kind(&self) -> SensorKind {
        SensorKind::UiSignal
    }

    async fn capture_before(&mut self, page: &mut dyn Page) -> Result<UiIndicators, SensorError> {
        Ok(page.ui_indicators().await?)
    }

    async fn capture_after(&mut self, page: &mut dyn Page) -> Result<UiIndicators, SensorError> {
        Ok(page.ui_indicators().await?)
    }

    fn diff(&self, before: &UiIndicators, after: &UiIndicators) -> UiSignalSummary {
        let error_appeared = appeared(&before.errors, &after.errors);
        let validation_appeared =
            appeared(&before.validation_messages, &after.validation_messages);
        let loading_appeared = appeared(&before.loading, &after.loading);
        let dialog_appeared = appeared(&before.dialogs, &after.dialogs);
        let live_region_changed = before.live_regions != after.live_regions;

        let notes: Vec<&str> = [
            (error_appeared, "error indicator appeared"),
            (validation_appeared, "validation message appeared"),
            (loading_appeared, "loading indicator appeared"),
            (dialog_appeared, "dialog opened"),
            (live_region_changed, "live region changed"),
        ]
        .into_iter()
        .filter_map(|(hit, note)| hit.then_some(note))
        .collect();

        let changed = before != after;
        let explanation = if !notes.is_empty() {
            notes.join("; ")
        } else if changed {
            "indicators removed".to_string()
        } else {
            "no visible change".to_string()
        };

        UiSignalSummary {
            available: true,
            changed,
            explanation,
            error_appeared,
            validation_appeared,
            loading_appeared,
            dialog_appeared,
            live_region_changed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_appearing_is_explained() {
        let before = UiIndicators::default();
        let after = UiIndicators {
            validation_messages: vec!["Email is required".into()],
            ..Default::default()
        };
        let s = UiSignalSensor.diff(&before, &after);
        assert!(s.changed);
        assert!(s.validation_appeared);
        assert!(!s.error_appeared);
        assert_eq!(s.explanation, "validation message appeared");
    }

    #[test]
    fn test_identical_snapshots_report_no_change() {
        let ui = UiIndicators {
            errors: vec!["old".into()],
            ..Default::default()
        };
        let s = UiSignalSensor.diff(&ui, &ui);
        assert!(!s.changed);
        assert_eq!(s.explanation, "no visible change");
    }
}
