//! Browser page seam.
//!
//! The scan drives exactly one `Page` at a time. Real drivers implement the
//! trait over a browser session; `ScriptedPage` plays back a site model and is
//! what the test suites run against.

pub mod page;
pub mod scripted;

pub use page::{
    AppState, FocusInfo, LoadingState, Page, PageError, PageEvent, PageEventKind, UiIndicators,
};
pub use scripted::{Effect, PageModel, Probe, ScriptedPage, ScriptedSite};
