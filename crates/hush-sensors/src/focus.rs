use async_trait::async_trait;
use hush_browser::{FocusInfo, Page};
use hush_ir::trace::{FocusSummary, SensorKind};

use crate::sensor::{Sensor, SensorError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusSnapshot {
    pub focus: FocusInfo,
    pub dialogs: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FocusSensor;

impl FocusSensor {
    pub fn new() -> Self {
        Self
    }

    async fn snapshot(page: &mut dyn Page) -> Result<FocusSnapshot, SensorError> {
        let focus = page.focused_element().await?;
        let dialogs = page.ui_indicators().await?.dialogs;
        Ok(FocusSnapshot { focus, dialogs })
    }
}

#[async_trait]
impl Sensor for FocusSensor {
    type Snapshot = FocusSnapshot;
    type Summary = FocusSummary;

    fn kind(&self) -> SensorKind {
        SensorKind::Focus
    }

    async fn capture_before(&mut self, page: &mut dyn Page) -> Result<FocusSnapshot, SensorError> {
        Self::snapshot(page).await
    }

    async fn capture_after(&mut self, page: &mut dyn Page) -> Result<FocusSnapshot, SensorError> {
        Self::snapshot(page).await
    }

    fn diff(&self, before: &FocusSnapshot, after: &FocusSnapshot) -> FocusSummary {
        let dialog_opened = after.dialogs.iter().any(|d| !before.dialogs.contains(d));
        FocusSummary {
            available: true,
            before: before.focus.element.clone(),
            after: after.focus.element.clone(),
            focus_changed: before.focus.element != after.focus.element,
            modal_without_focus: dialog_opened && !after.focus.inside_dialog,
        }
    }
}
