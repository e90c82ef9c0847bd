use async_trait::async_trait;
use hush_browser::Page;
use hush_ir::trace::{SensorKind, TimingSummary};

use crate::sensor::{EventTap, Sensor, SensorError};

/// Gap to first feedback at or above this is slow.
pub const SLOW_FEEDBACK_MS: u64 = 1_000;
/// Gap to first feedback at or above this is freeze-like.
pub const FREEZE_MS: u64 = 3_000;

/// Measures the gap between the start of the window and the first event a
/// user would perceive as the page responding.
#[derive(Debug, Default)]
pub struct TimingSensor {
    tap: EventTap,
    started_ms: u64,
    stopped_ms: u64,
}

impl TimingSensor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Sensor for TimingSensor {
    type Snapshot = ();
    type Summary = TimingSummary;

    fn kind(&self) -> SensorKind {
        SensorKind::Timing
    }

    async fn capture_before(&mut self, _page: &mut dyn Page) -> Result<(), SensorError> {
        Ok(())
    }

    fn start_window(&mut self, page: &mut dyn Page) -> Result<(), SensorError> {
        self.started_ms = page.now_ms();
        self.stopped_ms = self.started_ms;
        self.tap.open(page);
        Ok(())
    }

    fn stop_window(&mut self, page: &dyn Page) -> Result<(), SensorError> {
        self.stopped_ms = page.now_ms();
        self.tap.close()
    }

    async fn capture_after(&mut self, _page: &mut dyn Page) -> Result<(), SensorError> {
        Ok(())
    }

    fn diff(&self, _before: &(), _after: &()) -> TimingSummary {
        let window_ms = self.stopped_ms.saturating_sub(self.started_ms);
        let first_feedback_ms = self
            .tap
            .events()
            .iter()
            .find(|e| e.kind.is_feedback())
            .map(|e| e.at_ms.saturating_sub(self.started_ms));
        let (slow_feedback, freeze_like) = match first_feedback_ms {
            Some(gap) => (gap >= SLOW_FEEDBACK_MS, gap >= FREEZE_MS),
            None => (window_ms >= SLOW_FEEDBACK_MS, window_ms >= FREEZE_MS),
        };
        TimingSummary {
            available: true,
            window_ms,
            first_feedback_ms,
            slow_feedback,
            freeze_like,
        }
    }
}
