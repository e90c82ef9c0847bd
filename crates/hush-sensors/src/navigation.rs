use async_trait::async_trait;
use hush_browser::{Page, PageEventKind};
use hush_ir::trace::{NavigationSummary, SensorKind};

use crate::sensor::{EventTap, Sensor, SensorError};

#[derive(Debug, Default)]
pub struct NavigationSensor {
    tap: EventTap,
}

impl NavigationSensor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Sensor for NavigationSensor {
    type Snapshot = String;
    type Summary = NavigationSummary;

    fn kind(&self) -> SensorKind {
        SensorKind::Navigation
    }

    async fn capture_before(&mut self, page: &mut dyn Page) -> Result<String, SensorError> {
        Ok(page.url())
    }

    fn start_window(&mut self, page: &mut dyn Page) -> Result<(), SensorError> {
        self.tap.open(page);
        Ok(())
    }

    fn stop_window(&mut self, _page: &dyn Page) -> Result<(), SensorError> {
        self.tap.close()
    }

    async fn capture_after(&mut self, page: &mut dyn Page) -> Result<String, SensorError> {
        Ok(page.url())
    }

    fn diff(&self, before: &String, after: &String) -> NavigationSummary {
        let navigations = self
            .tap
            .events()
            .iter()
            .filter(|e| matches!(e.kind, PageEventKind::FrameNavigated { .. }))
            .count() as u32;
        NavigationSummary {
            available: true,
            url_changed: before != after,
            from_url: before.clone(),
            to_url: after.clone(),
            navigations,
        }
    }
}
