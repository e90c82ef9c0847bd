use std::collections::BTreeSet;

use async_trait::async_trait;
use hush_browser::{AppState, Page};
use hush_ir::trace::{SensorKind, StateSummary};

use crate::sensor::{Sensor, SensorError};

/// Reads application state through whichever supported mechanism the page
/// exposes (setter, dispatch or store-set) and reports the keys that changed.
#[derive(Debug, Default)]
pub struct StateSensor;

impl StateSensor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Sensor for StateSensor {
    type Snapshot = Option<AppState>;
    type Summary = StateSummary;

    fn kind(&self) -> SensorKind {
        SensorKind::State
    }

    async fn capture_before(&mut self, page: &mut dyn Page) -> Result<Option<AppState>, SensorError> {
        Ok(page.app_state().await?)
    }

    async fn capture_after(&mut self, page: &mut dyn Page) -> Result<Option<AppState>, SensorError> {
        Ok(page.app_state().await?)
    }

    fn diff(&self, before: &Option<AppState>, after: &Option<AppState>) -> StateSummary {
        let mechanism = after.as_ref().or(before.as_ref()).map(|s| s.mechanism);
        let mut changed = BTreeSet::new();
        if let (Some(before), Some(after)) = (before, after) {
            for (key, value) in &after.values {
                if before.values.get(key) != Some(value) {
                    changed.insert(key.clone());
                }
            }
            for key in before.values.keys() {
                if !after.values.contains_key(key) {
                    changed.insert(key.clone());
                }
            }
        }
        StateSummary {
            available: true,
            mechanism,
            changed_keys: changed.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hush_ir::trace::StateMechanism;

    #[test]
    fn test_changed_keys_sorted_and_include_removals() {
        let mut before = AppState::new(StateMechanism::Dispatch);
        before.values.insert("user".into(), "anon".into());
        before.values.insert("draft".into(), "x".into());
        let mut after = AppState::new(StateMechanism::Dispatch);
        after.values.insert("user".into(), "ada".into());
        after.values.insert("cart".into(), "1".into());

        let s = StateSensor.diff(&Some(before), &Some(after));
        assert_eq!(s.mechanism, Some(StateMechanism::Dispatch));
        assert_eq!(s.changed_keys, vec!["cart", "draft", "user"]);
    }

    #[test]
    fn test_no_mechanism_reports_nothing() {
        let s = StateSensor.diff(&None, &None);
        assert!(s.available);
        assert!(s.mechanism.is_none());
        assert!(s.changed_keys.is_empty());
    }
}
