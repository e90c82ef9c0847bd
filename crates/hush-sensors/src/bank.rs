use hush_browser::Page;
use hush_ir::finding::{SilenceEntry, SilenceImpact, SilenceScope};
use hush_ir::trace::{SensorKind, SensorSummaries};
use hush_ir::types::Budget;
use tracing::{debug, warn};

use crate::aria::AriaSensor;
use crate::console::ConsoleSensor;
use crate::focus::FocusSensor;
use crate::loading::LoadingSensor;
use crate::navigation::NavigationSensor;
use crate::network::NetworkSensor;
use crate::sensor::{Sensor, SensorError};
use crate::state::StateSensor;
use crate::timing::TimingSensor;
use crate::ui_signal::UiSignalSensor;

/// How much losing a sensor hurts the evidence for a trace.
pub fn silence_impact(kind: SensorKind) -> SilenceImpact {
    match kind {
        SensorKind::Network | SensorKind::Navigation | SensorKind::UiSignal => SilenceImpact::High,
        SensorKind::Console | SensorKind::State | SensorKind::Loading => SilenceImpact::Medium,
        SensorKind::Focus | SensorKind::Aria | SensorKind::Timing => SilenceImpact::Low,
    }
}

/// One sensor plus its per-window bookkeeping.
struct Slot<S: Sensor> {
    sensor: S,
    before: Option<S::Snapshot>,
    armed: bool,
    /// Set once a failure has been recorded for the current window.
    silenced: bool,
}

impl<S: Sensor> Slot<S> {
    fn new(sensor: S) -> Self {
        Self {
            sensor,
            before: None,
            armed: false,
            silenced: false,
        }
    }

    fn fail(&mut self, stage: &str, err: &SensorError, silences: &mut Vec<SilenceEntry>) {
        let kind = self.sensor.kind();
        warn!(sensor = %kind, stage, error = %err, "sensor degraded to empty summary");
        silences.push(SilenceEntry::new(
            SilenceScope::Sensor(kind),
            format!("{stage}:{}", err.reason_code()),
            silence_impact(kind),
        ));
        self.silenced = true;
    }

    async fn capture_before(&mut self, page: &mut dyn Page, silences: &mut Vec<SilenceEntry>) {
        self.before = None;
        self.armed = false;
        self.silenced = false;
        match self.sensor.capture_before(page).await {
            Ok(snapshot) => self.before = Some(snapshot),
            Err(err) => self.fail("capture_before", &err, silences),
        }
    }

    fn arm(&mut self, page: &mut dyn Page, silences: &mut Vec<SilenceEntry>) {
        if self.silenced {
            return;
        }
        match self.sensor.start_window(page) {
            Ok(()) => self.armed = true,
            Err(err) => self.fail("start_window", &err, silences),
        }
    }

    fn disarm(&mut self, page: &dyn Page, silences: &mut Vec<SilenceEntry>) {
        if !self.armed {
            return;
        }
        self.armed = false;
        if let Err(err) = self.sensor.stop_window(page) {
            self.fail("stop_window", &err, silences);
        }
    }

    async fn finish(&mut self, page: &mut dyn Page, silences: &mut Vec<SilenceEntry>) -> S::Summary {
        if self.silenced {
            return self.sensor.empty_summary();
        }
        let Some(before) = self.before.take() else {
            self.fail("capture_after", &SensorError::MissingBefore, silences);
            return self.sensor.empty_summary();
        };
        match self.sensor.capture_after(page).await {
            Ok(after) => self.sensor.diff(&before, &after),
            Err(err) => {
                self.fail("capture_after", &err, silences);
                self.sensor.empty_summary()
            }
        }
    }
}

/// The fixed set of sensors armed around every interaction.
///
/// Call order per window: `capture_before`, `arm`, (action), `disarm`,
/// `capture_after_and_diff`, then `take_silences`.
pub struct SensorBank {
    network: Slot<NetworkSensor>,
    console: Slot<ConsoleSensor>,
    ui_signal: Slot<UiSignalSensor>,
    state: Slot<StateSensor>,
    navigation: Slot<NavigationSensor>,
    loading: Slot<LoadingSensor>,
    focus: Slot<FocusSensor>,
    aria: Slot<AriaSensor>,
    timing: Slot<TimingSensor>,
    silences: Vec<SilenceEntry>,
}

impl SensorBank {
    pub fn new(budget: &Budget) -> Self {
        Self {
            network: Slot::new(NetworkSensor::new()),
            console: Slot::new(ConsoleSensor::new()),
            ui_signal: Slot::new(UiSignalSensor::new()),
            state: Slot::new(StateSensor::new()),
            navigation: Slot::new(NavigationSensor::new()),
            loading: Slot::new(LoadingSensor::new(
                budget.loading_poll_interval(),
                budget.loading_timeout(),
            )),
            focus: Slot::new(FocusSensor::new()),
            aria: Slot::new(AriaSensor::new()),
            timing: Slot::new(TimingSensor::new()),
            silences: Vec::new(),
        }
    }

    pub async fn capture_before(&mut self, page: &mut dyn Page) {
        let s = &mut self.silences;
        self.network.capture_before(page, s).await;
        self.console.capture_before(page, s).await;
        self.ui_signal.capture_before(page, s).await;
        self.state.capture_before(page, s).await;
        self.navigation.capture_before(page, s).await;
        self.loading.capture_before(page, s).await;
        self.focus.capture_before(page, s).await;
        self.aria.capture_before(page, s).await;
        self.timing.capture_before(page, s).await;
    }

    /// Start every sensor's window. Must run before the action is performed.
    pub fn arm(&mut self, page: &mut dyn Page) {
        let s = &mut self.silences;
        self.network.arm(page, s);
        self.console.arm(page, s);
        self.ui_signal.arm(page, s);
        self.state.arm(page, s);
        self.navigation.arm(page, s);
        self.loading.arm(page, s);
        self.focus.arm(page, s);
        self.aria.arm(page, s);
        self.timing.arm(page, s);
        debug!("sensor windows armed");
    }

    /// Stop whatever windows are open. Safe to call after a timeout or error.
    pub fn disarm(&mut self, page: &dyn Page) {
        let s = &mut self.silences;
        self.network.disarm(page, s);
        self.console.disarm(page, s);
        self.ui_signal.disarm(page, s);
        self.state.disarm(page, s);
        self.navigation.disarm(page, s);
        self.loading.disarm(page, s);
        self.focus.disarm(page, s);
        self.aria.disarm(page, s);
        self.timing.disarm(page, s);
    }

    pub async fn capture_after_and_diff(&mut self, page: &mut dyn Page) -> SensorSummaries {
        let s = &mut self.silences;
        SensorSummaries {
            network: self.network.finish(page, s).await,
            console: self.console.finish(page, s).await,
            ui_signal: self.ui_signal.finish(page, s).await,
            state: self.state.finish(page, s).await,
            navigation: self.navigation.finish(page, s).await,
            loading: self.loading.finish(page, s).await,
            focus: self.focus.finish(page, s).await,
            aria: self.aria.finish(page, s).await,
            timing: self.timing.finish(page, s).await,
        }
    }

    /// Every sensor's empty summary, for windows that never ran.
    pub fn empty_summaries(&self) -> SensorSummaries {
        SensorSummaries {
            network: self.network.sensor.empty_summary(),
            console: self.console.sensor.empty_summary(),
            ui_signal: self.ui_signal.sensor.empty_summary(),
            state: self.state.sensor.empty_summary(),
            navigation: self.navigation.sensor.empty_summary(),
            loading: self.loading.sensor.empty_summary(),
            focus: self.focus.sensor.empty_summary(),
            aria: self.aria.sensor.empty_summary(),
            timing: self.timing.sensor.empty_summary(),
        }
    }

    /// Silence entries recorded since the last call.
    pub fn take_silences(&mut self) -> Vec<SilenceEntry> {
        std::mem::take(&mut self.silences)
    }
}
