use async_trait::async_trait;
use hush_browser::Page;
use hush_ir::trace::{AriaSummary, SensorKind};

use crate::sensor::{Sensor, SensorError};

/// Diff of live-region text.
#[derive(Debug, Default)]
pub struct AriaSensor;

impl AriaSensor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Sensor for AriaSensor {
    type Snapshot = Vec<String>;
    type Summary = AriaSummary;

    fn kind(&self) -> SensorKind {
        SensorKind::Aria
    }

    async fn capture_before(&mut self, page: &mut dyn Page) -> Result<Vec<String>, SensorError> {
        Ok(page.live_regions().await?)
    }

    async fn capture_after(&mut self, page: &mut dyn Page) -> Result<Vec<String>, SensorError> {
        Ok(page.live_regions().await?)
    }

    fn diff(&self, before: &Vec<String>, after: &Vec<String>) -> AriaSummary {
        let announcements: Vec<String> = after
            .iter()
            .filter(|text| !before.contains(text))
            .cloned()
            .collect();
        AriaSummary {
            available: true,
            changed: before != after,
            announcements,
        }
    }
}
