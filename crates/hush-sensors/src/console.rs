use async_trait::async_trait;
use hush_browser::{Page, PageEventKind};
use hush_ir::trace::{ConsoleSummary, SensorKind};

use crate::sensor::{EventTap, Sensor, SensorError};

/// Console errors and uncaught exceptions both count as page errors.
#[derive(Debug, Default)]
pub struct ConsoleSensor {
    tap: EventTap,
}

impl ConsoleSensor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Sensor for ConsoleSensor {
    type Snapshot = ();
    type Summary = ConsoleSummary;

    fn kind(&self) -> SensorKind {
        SensorKind::Console
    }

    async fn capture_before(&mut self, _page: &mut dyn Page) -> Result<(), SensorError> {
        Ok(())
    }

    fn start_window(&mut self, page: &mut dyn Page) -> Result<(), SensorError> {
        self.tap.open(page);
        Ok(())
    }

    fn stop_window(&mut self, _page: &dyn Page) -> Result<(), SensorError> {
        self.tap.close()
    }

    async fn capture_after(&mut self, _page: &mut dyn Page) -> Result<(), SensorError> {
        Ok(())
    }

    fn diff(&self, _before: &(), _after: &()) -> ConsoleSummary {
        let mut summary = ConsoleSummary {
            available: true,
            ..Default::default()
        };
        for event in self.tap.events() {
            match event.kind {
                PageEventKind::ConsoleError { .. } | PageEventKind::PageError { .. } => {
                    summary.page_errors += 1
                }
                PageEventKind::UnhandledRejection { .. } => summary.unhandled_rejections += 1,
                PageEventKind::ConsoleWarning { .. } => summary.warnings += 1,
                _ => {}
            }
        }
        summary
    }
}
