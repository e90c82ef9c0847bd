use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::finding::SilenceEntry;
use crate::types::Interaction;

/// The sensors in the bank. Order here is the order summaries are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Network,
    Console,
    UiSignal,
    State,
    Navigation,
    Loading,
    Focus,
    Aria,
    Timing,
}

impl SensorKind {
    pub const ALL: [SensorKind; 9] = [
        SensorKind::Network,
        SensorKind::Console,
        SensorKind::UiSignal,
        SensorKind::State,
        SensorKind::Navigation,
        SensorKind::Loading,
        SensorKind::Focus,
        SensorKind::Aria,
        SensorKind::Timing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Network => "network",
            SensorKind::Console => "console",
            SensorKind::UiSignal => "ui_signal",
            SensorKind::State => "state",
            SensorKind::Navigation => "navigation",
            SensorKind::Loading => "loading",
            SensorKind::Focus => "focus",
            SensorKind::Aria => "aria",
            SensorKind::Timing => "timing",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Sensor summaries ─────────────────────────────────────────────────
//
// Every summary has `available`. The `Default` value of each summary is the
// sensor's empty summary: what gets reported when the sensor could not run.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSummary {
    pub available: bool,
    pub total_requests: u32,
    pub failed_requests: u32,
    /// Failures bucketed by HTTP status; status 0 is a transport-level failure.
    pub failures_by_status: BTreeMap<u16, u32>,
    pub first_request_url: Option<String>,
    pub observed_urls: Vec<String>,
}

impl NetworkSummary {
    pub fn has_server_error(&self) -> bool {
        self.failures_by_status.keys().any(|&status| status >= 500)
    }

    pub fn has_transport_failure(&self) -> bool {
        self.failures_by_status.contains_key(&0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleSummary {
    pub available: bool,
    pub page_errors: u32,
    pub unhandled_rejections: u32,
    pub warnings: u32,
}

impl ConsoleSummary {
    pub fn has_js_error(&self) -> bool {
        self.page_errors > 0 || self.unhandled_rejections > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiSignalSummary {
    pub available: bool,
    pub changed: bool,
    pub explanation: String,
    pub error_appeared: bool,
    pub validation_appeared: bool,
    pub loading_appeared: bool,
    pub dialog_appeared: bool,
    pub live_region_changed: bool,
}

/// Supported application-state mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateMechanism {
    /// React-style `setState`/hook setter.
    Setter,
    /// Redux-style `dispatch`.
    Dispatch,
    /// Zustand/Pinia-style `store.set`.
    StoreSet,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSummary {
    pub available: bool,
    pub mechanism: Option<StateMechanism>,
    /// Sorted, de-duplicated.
    pub changed_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationSummary {
    pub available: bool,
    pub url_changed: bool,
    pub from_url: String,
    pub to_url: String,
    /// Frame navigations seen during the window.
    pub navigations: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingSummary {
    pub available: bool,
    pub seen_loading: bool,
    pub unresolved: bool,
    pub polls: u32,
    pub resolved_after_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSummary {
    pub available: bool,
    pub before: Option<String>,
    pub after: Option<String>,
    pub focus_changed: bool,
    pub modal_without_focus: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AriaSummary {
    pub available: bool,
    pub changed: bool,
    pub announcements: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingSummary {
    pub available: bool,
    pub window_ms: u64,
    pub first_feedback_ms: Option<u64>,
    pub slow_feedback: bool,
    pub freeze_like: bool,
}

/// Per-sensor summaries for one trace. Always fully populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorSummaries {
    pub network: NetworkSummary,
    pub console: ConsoleSummary,
    pub ui_signal: UiSignalSummary,
    pub state: StateSummary,
    pub navigation: NavigationSummary,
    pub loading: LoadingSummary,
    pub focus: FocusSummary,
    pub aria: AriaSummary,
    pub timing: TimingSummary,
}

impl SensorSummaries {
    pub fn is_available(&self, kind: SensorKind) -> bool {
        match kind {
            SensorKind::Network => self.network.available,
            SensorKind::Console => self.console.available,
            SensorKind::UiSignal => self.ui_signal.available,
            SensorKind::State => self.state.available,
            SensorKind::Navigation => self.navigation.available,
            SensorKind::Loading => self.loading.available,
            SensorKind::Focus => self.focus.available,
            SensorKind::Aria => self.aria.available,
            SensorKind::Timing => self.timing.available,
        }
    }
}

// ── Trace ────────────────────────────────────────────────────────────

/// Snapshot of the page taken before or after an interaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCapture {
    pub url: String,
    pub screenshot: Option<String>,
    pub dom_hash: Option<String>,
    pub title: Option<String>,
}

impl PageCapture {
    /// URL and screenshot are the minimum for a capture to count as evidence.
    pub fn is_complete(&self) -> bool {
        !self.url.is_empty() && self.screenshot.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// Observation-window phase in which a timeout or error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Click,
    Navigation,
    Settle,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Click => "click",
            Phase::Navigation => "navigation",
            Phase::Settle => "settle",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy decisions taken during the window. Expected and non-fatal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRecord {
    pub timeout: bool,
    pub timeout_phase: Option<Phase>,
    pub execution_error: bool,
    pub error_phase: Option<Phase>,
    /// Short reason code. Never a stack trace.
    pub reason: Option<String>,
    pub external_navigation_blocked: bool,
    pub blocked_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleRecord {
    /// DOM hashes, one per settle sample taken.
    pub samples: Vec<String>,
    pub dom_changed_during_settle: bool,
    pub timed_out: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomRecord {
    pub settle: SettleRecord,
}

/// Terminal state the interaction runner reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalState {
    Assembled,
    ExternalBlocked,
    Timeout,
    Error,
}

/// Full record of one interaction execution.
///
/// Uniform in shape across every terminal state: all top-level fields are
/// populated, sensors degrade to their empty summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    pub id: String,
    pub interaction: Interaction,
    pub before: PageCapture,
    pub after: PageCapture,
    pub sensors: SensorSummaries,
    pub policy: PolicyRecord,
    pub dom: DomRecord,
    pub terminal: TerminalState,
    pub retries_used: u32,
    /// True for the bounded confirmation repeat of an OBSERVED expectation.
    #[serde(default)]
    pub repeat: bool,
    #[serde(default)]
    pub silences: Vec<SilenceEntry>,
}

impl Trace {
    pub fn url_changed(&self) -> bool {
        self.before.url != self.after.url
    }

    pub fn dom_changed(&self) -> bool {
        let hash_changed = match (&self.before.dom_hash, &self.after.dom_hash) {
            (Some(before), Some(after)) => before != after,
            _ => false,
        };
        hash_changed || self.dom.settle.dom_changed_during_settle
    }

    pub fn is_blocked(&self) -> bool {
        self.terminal == TerminalState::ExternalBlocked
    }
}
