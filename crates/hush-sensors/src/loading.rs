use async_trait::async_trait;
use hush_browser::Page;
use hush_ir::trace::{LoadingSummary, SensorKind};
use tokio::time::{sleep, Duration, Instant};

use crate::sensor::{Sensor, SensorError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingSnapshot {
    pub loading: bool,
    pub polls: u32,
    pub resolved_after_ms: Option<u64>,
    pub unresolved: bool,
}

/// Polls busy/spinner/disabled-submit indicators after the action until
/// they clear or `timeout` passes.
#[derive(Debug, Clone)]
pub struct LoadingSensor {
    poll_interval: Duration,
    timeout: Duration,
}

impl LoadingSensor {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }
}

#[async_trait]
impl Sensor for LoadingSensor {
    type Snapshot = LoadingSnapshot;
    type Summary = LoadingSummary;

    fn kind(&self) -> SensorKind {
        SensorKind::Loading
    }

    async fn capture_before(&mut self, page: &mut dyn Page) -> Result<LoadingSnapshot, SensorError> {
        let state = page.loading_state().await?;
        Ok(LoadingSnapshot {
            loading: state.is_loading(),
            polls: 1,
            ..Default::default()
        })
    }

    async fn capture_after(&mut self, page: &mut dyn Page) -> Result<LoadingSnapshot, SensorError> {
        let started = Instant::now();
        let mut snapshot = LoadingSnapshot::default();
        loop {
            let state = page.loading_state().await?;
            snapshot.polls += 1;
            if !state.is_loading() {
                if snapshot.loading {
                    snapshot.resolved_after_ms = Some(started.elapsed().as_millis() as u64);
                }
                return Ok(snapshot);
            }
            snapshot.loading = true;
            if started.elapsed() >= self.timeout {
                snapshot.unresolved = true;
                return Ok(snapshot);
            }
            sleep(self.poll_interval).await;
        }
    }

    fn diff(&self, before: &LoadingSnapshot, after: &LoadingSnapshot) -> LoadingSummary {
        LoadingSummary {
            available: true,
            seen_loading: before.loading || after.loading,
            unresolved: after.unresolved,
            polls: after.polls,
            resolved_after_ms: after.resolved_after_ms,
        }
    }
}
