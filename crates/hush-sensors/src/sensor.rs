use async_trait::async_trait;
use crossbeam::channel::Receiver;
use hush_browser::{Page, PageError, PageEvent};
use hush_ir::trace::SensorKind;

#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("page probe failed: {0}")]
    Page(#[from] PageError),

    #[error("window was never started")]
    WindowNotStarted,

    #[error("no snapshot captured before the action")]
    MissingBefore,
}

impl SensorError {
    /// Short reason code recorded in the silence ledger.
    pub fn reason_code(&self) -> &'static str {
        match self {
            SensorError::Page(PageError::Unsupported(_)) => "unsupported_page",
            SensorError::Page(_) => "probe_failed",
            SensorError::WindowNotStarted => "window_not_started",
            SensorError::MissingBefore => "missing_before_snapshot",
        }
    }
}

/// One evidence collector.
///
/// `start_window`/`stop_window` default to no-ops; only streaming sensors
/// override them. `empty_summary` is what gets reported when the sensor
/// cannot run, and must have `available == false`.
#[async_trait]
pub trait Sensor: Send {
    type Snapshot: Send + Sync;
    type Summary: Default + Send;

    fn kind(&self) -> SensorKind;

    async fn capture_before(&mut self, page: &mut dyn Page) -> Result<Self::Snapshot, SensorError>;

    fn start_window(&mut self, _page: &mut dyn Page) -> Result<(), SensorError> {
        Ok(())
    }

    fn stop_window(&mut self, _page: &dyn Page) -> Result<(), SensorError> {
        Ok(())
    }

    async fn capture_after(&mut self, page: &mut dyn Page) -> Result<Self::Snapshot, SensorError>;

    fn diff(&self, before: &Self::Snapshot, after: &Self::Snapshot) -> Self::Summary;

    fn empty_summary(&self) -> Self::Summary {
        Self::Summary::default()
    }
}

/// A subscription to the page event stream, held open for one window.
#[derive(Debug, Default)]
pub struct EventTap {
    rx: Option<Receiver<PageEvent>>,
    events: Vec<PageEvent>,
}

impl EventTap {
    pub fn open(&mut self, page: &mut dyn Page) {
        self.events.clear();
        self.rx = Some(page.subscribe());
    }

    /// Drain everything delivered since `open` and drop the subscription.
    pub fn close(&mut self) -> Result<(), SensorError> {
        let rx = self.rx.take().ok_or(SensorError::WindowNotStarted)?;
        self.events.extend(rx.try_iter());
        Ok(())
    }

    pub fn events(&self) -> &[PageEvent] {
        &self.events
    }
}
