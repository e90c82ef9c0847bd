use async_trait::async_trait;
use hush_browser::{Page, PageEventKind};
use hush_ir::trace::{NetworkSummary, SensorKind};

use crate::sensor::{EventTap, Sensor, SensorError};

/// Counts requests and failures seen on the event stream during the window.
#[derive(Debug, Default)]
pub struct NetworkSensor {
    tap: EventTap,
}

impl NetworkSensor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Sensor for NetworkSensor {
    type Snapshot = ();
    type Summary = NetworkSummary;

    fn kind(&self) -> SensorKind {
        SensorKind::Network
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

    fn diff(&self, _before: &(), _after: &()) -> NetworkSummary {
        let mut summary = NetworkSummary {
            available: true,
            ..Default::default()
        };
        for event in self.tap.events() {
            match &event.kind {
                PageEventKind::Request { url, .. } => {
                    summary.total_requests += 1;
                    if summary.first_request_url.is_none() {
                        summary.first_request_url = Some(url.clone());
                    }
                    if !summary.observed_urls.contains(url) {
                        summary.observed_urls.push(url.clone());
                    }
                }
                PageEventKind::Response { status, .. } if *status >= 400 => {
                    summary.failed_requests += 1;
                    *summary.failures_by_status.entry(*status).or_insert(0) += 1;
                }
                PageEventKind::RequestFailed { .. } => {
                    summary.failed_requests += 1;
                    *summary.failures_by_status.entry(0).or_insert(0) += 1;
                }
                _ => {}
            }
        }
        summary
    }
}
