use std::collections::BTreeMap;

use async_trait::async_trait;
use crossbeam::channel::Receiver;
use hush_ir::trace::StateMechanism;
use hush_ir::types::Interaction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("element error: {0}")]
    Element(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("unsupported on this page: {0}")]
    Unsupported(String),

    #[error("browser session lost: {0}")]
    SessionLost(String),
}

impl PageError {
    /// A lost session cannot be recovered inside one scan.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, PageError::SessionLost(_))
    }

    pub fn message(&self) -> &str {
        match self {
            PageError::Navigation(m)
            | PageError::Element(m)
            | PageError::Evaluation(m)
            | PageError::Unsupported(m)
            | PageError::SessionLost(m) => m,
        }
    }
}

/// One event on the page's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEvent {
    /// Milliseconds since the page session started.
    pub at_ms: u64,
    pub kind: PageEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PageEventKind {
    Request { url: String, method: String },
    Response { url: String, status: u16 },
    RequestFailed { url: String, error: String },
    ConsoleError { text: String },
    ConsoleWarning { text: String },
    PageError { message: String },
    UnhandledRejection { message: String },
    FrameNavigated { url: String },
    DomMutated,
}

impl PageEventKind {
    /// Events a user would perceive as the page responding.
    pub fn is_feedback(&self) -> bool {
        matches!(
            self,
            PageEventKind::Response { .. }
                | PageEventKind::RequestFailed { .. }
                | PageEventKind::FrameNavigated { .. }
                | PageEventKind::DomMutated
        )
    }
}

/// Structural snapshot of visible feedback indicators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiIndicators {
    pub errors: Vec<String>,
    pub validation_messages: Vec<String>,
    pub loading: Vec<String>,
    pub dialogs: Vec<String>,
    pub live_regions: Vec<String>,
}

/// Application state exposed by a supported state mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub mechanism: StateMechanism,
    pub values: BTreeMap<String, String>,
}

impl AppState {
    pub fn new(mechanism: StateMechanism) -> Self {
        Self {
            mechanism,
            values: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusInfo {
    /// Identity (selector) of the focused element, if any.
    pub element: Option<String>,
    /// Whether focus sits inside an open dialog.
    pub inside_dialog: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingState {
    pub busy_elements: u32,
    pub spinners: u32,
    pub disabled_submits: u32,
}

impl LoadingState {
    pub fn is_loading(&self) -> bool {
        self.busy_elements > 0 || self.spinners > 0 || self.disabled_submits > 0
    }
}

/// One browser page, driven by exactly one writer at a time.
///
/// The runner holds `&mut dyn Page` for the whole observation window, so
/// exclusive ownership during a window is enforced by the borrow checker.
#[async_trait]
pub trait Page: Send {
    async fn goto(&mut self, url: &str) -> Result<(), PageError>;

    async fn go_back(&mut self) -> Result<(), PageError>;

    /// Current URL. Always readable.
    fn url(&self) -> String;

    async fn title(&mut self) -> Result<String, PageError>;

    /// Capture a screenshot and return the path it was written to.
    async fn screenshot(&mut self, label: &str) -> Result<String, PageError>;

    /// Serialized DOM content, used for content hashing.
    async fn dom_content(&mut self) -> Result<String, PageError>;

    /// Click, fill or submit the element.
    async fn perform(&mut self, interaction: &Interaction) -> Result<(), PageError>;

    /// Resolve once any navigation started by the last action has committed.
    async fn wait_for_navigation(&mut self) -> Result<(), PageError>;

    async fn discover_interactions(&mut self) -> Result<Vec<Interaction>, PageError>;

    /// Absolute or relative hrefs of anchors on the page, in document order.
    async fn discover_links(&mut self) -> Result<Vec<String>, PageError>;

    async fn count_matches(&mut self, selector: &str) -> Result<usize, PageError>;

    async fn ui_indicators(&mut self) -> Result<UiIndicators, PageError>;

    /// `None` when no supported state mechanism is present.
    async fn app_state(&mut self) -> Result<Option<AppState>, PageError>;

    async fn focused_element(&mut self) -> Result<FocusInfo, PageError>;

    async fn live_regions(&mut self) -> Result<Vec<String>, PageError>;

    async fn loading_state(&mut self) -> Result<LoadingState, PageError>;

    /// Subscribe an independent listener to the page event stream.
    fn subscribe(&mut self) -> Receiver<PageEvent>;

    /// Milliseconds since the page session started; same clock as `PageEvent::at_ms`.
    fn now_ms(&self) -> u64;
}
