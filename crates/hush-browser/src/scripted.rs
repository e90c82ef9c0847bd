//! Deterministic in-memory page driver.
//!
//! `ScriptedPage` plays back a site model: a set of pages keyed by URL and,
//! per element selector, a script of effects that performing the element
//! produces. All delays run on the tokio clock, so tests with a paused clock
//! observe timeouts, settle sampling and loading polls deterministically.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use crossbeam::channel::{unbounded, Receiver, Sender};
use hush_ir::trace::StateMechanism;
use hush_ir::types::Interaction;
use tokio::time::{Duration, Instant};
use tracing::debug;

use crate::page::{
    AppState, FocusInfo, LoadingState, Page, PageError, PageEvent, PageEventKind, UiIndicators,
};

/// Static model of one page of the site.
#[derive(Debug, Clone, Default)]
pub struct PageModel {
    pub title: String,
    pub dom: String,
    pub interactions: Vec<Interaction>,
    pub links: Vec<String>,
    pub ui: UiIndicators,
    pub state: Option<AppState>,
    pub focused: Option<String>,
}

impl PageModel {
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            dom: format!("<html><title>{title}</title><body></body></html>"),
            title,
            ..Default::default()
        }
    }

    pub fn with_interaction(mut self, interaction: Interaction) -> Self {
        self.interactions.push(interaction);
        self
    }

    pub fn with_link(mut self, href: impl Into<String>) -> Self {
        self.links.push(href.into());
        self
    }

    pub fn with_state(mut self, mechanism: StateMechanism) -> Self {
        self.state = Some(AppState::new(mechanism));
        self
    }
}

/// One scripted consequence of performing an element.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Navigate to a URL or path, resolved against the current URL.
    Navigate(String),
    Request { url: String, status: u16 },
    RequestFailed { url: String },
    ConsoleError(String),
    ConsoleWarning(String),
    PageError(String),
    UnhandledRejection(String),
    SetState { key: String, value: String },
    ShowValidation(String),
    ShowError(String),
    MutateDom(String),
    /// DOM change that lands `after_ms` after the action returns.
    DelayedMutation { after_ms: u64, fragment: String },
    Announce(String),
    Focus(String),
    OpenDialog { selector: String, take_focus: bool },
    /// Show a spinner for `for_ms`.
    Busy { for_ms: u64 },
    /// Wait on the clock before continuing with the remaining effects.
    Sleep(u64),
    /// The action never completes.
    Hang,
    /// The navigation started by the action never commits.
    HangNavigation,
    /// Fail with `message` for the first `times` attempts, then run the rest.
    FailTransient { times: u32, message: String },
    Fail(String),
    /// The browser session dies.
    Crash,
}

/// Page probes that can be forced to fail, for sensor-isolation tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Probe {
    Title,
    Screenshot,
    Dom,
    Ui,
    State,
    Focus,
    LiveRegions,
    Loading,
}

/// Pages plus per-selector scripts.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSite {
    pages: BTreeMap<String, PageModel>,
    scripts: HashMap<String, Vec<Effect>>,
}

impl ScriptedSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: impl Into<String>, model: PageModel) -> Self {
        self.pages.insert(url.into(), model);
        self
    }

    pub fn script(mut self, selector: impl Into<String>, effects: Vec<Effect>) -> Self {
        self.scripts.insert(selector.into(), effects);
        self
    }

    fn lookup(&self, url: &str) -> Option<&PageModel> {
        self.pages.get(url).or_else(|| {
            let alt = match url.strip_suffix('/') {
                Some(stripped) => stripped.to_string(),
                None => format!("{url}/"),
            };
            self.pages.get(&alt)
        })
    }
}

/// A `Page` backed by a `ScriptedSite`.
pub struct ScriptedPage {
    site: ScriptedSite,
    current_url: String,
    current: PageModel,
    history: Vec<String>,
    subscribers: Vec<Sender<PageEvent>>,
    pending_mutations: Vec<(Instant, String)>,
    busy_until: Option<Instant>,
    attempts: HashMap<String, u32>,
    hang_navigation: bool,
    crashed: bool,
    screenshots: u32,
    failing: BTreeSet<Probe>,
    performed: Vec<String>,
    started: Instant,
}

impl ScriptedPage {
    pub fn new(site: ScriptedSite) -> Self {
        Self {
            site,
            current_url: "about:blank".to_string(),
            current: PageModel::default(),
            history: Vec::new(),
            subscribers: Vec::new(),
            pending_mutations: Vec::new(),
            busy_until: None,
            attempts: HashMap::new(),
            hang_navigation: false,
            crashed: false,
            screenshots: 0,
            failing: BTreeSet::new(),
            performed: Vec::new(),
            started: Instant::now(),
        }
    }

    /// Make a probe fail from now on.
    pub fn fail_probe(&mut self, probe: Probe) {
        self.failing.insert(probe);
    }

    /// Selectors performed so far, in order (including failed attempts).
    pub fn performed(&self) -> &[String] {
        &self.performed
    }

    fn emit(&mut self, kind: PageEventKind) {
        let event = PageEvent {
            at_ms: self.now_ms(),
            kind,
        };
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn check_alive(&self) -> Result<(), PageError> {
        if self.crashed {
            Err(PageError::SessionLost("target closed".to_string()))
        } else {
            Ok(())
        }
    }

    fn check_probe(&self, probe: Probe) -> Result<(), PageError> {
        self.check_alive()?;
        if self.failing.contains(&probe) {
            Err(PageError::Evaluation(format!("{probe:?} probe failed")))
        } else {
            Ok(())
        }
    }

    fn resolve(&self, target: &str) -> String {
        url::Url::parse(&self.current_url)
            .and_then(|base| base.join(target))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| target.to_string())
    }

    fn land(&mut self, url: String, model: PageModel) {
        self.current_url = url.clone();
        self.current = model;
        self.pending_mutations.clear();
        self.busy_until = None;
        self.emit(PageEventKind::FrameNavigated { url });
    }

    fn append_dom(&mut self, fragment: &str) {
        self.current.dom.push_str(fragment);
        self.emit(PageEventKind::DomMutated);
    }

    fn apply_due_mutations(&mut self) {
        let now = Instant::now();
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_mutations)
            .into_iter()
            .partition(|(at, _)| *at <= now);
        self.pending_mutations = pending;
        for (_, fragment) in due {
            self.append_dom(&fragment);
        }
    }

    async fn apply(&mut self, selector: &str, effect: Effect) -> Result<(), PageError> {
        match effect {
            Effect::Navigate(target) => {
                let url = self.resolve(&target);
                let model = self.site.lookup(&url).cloned().unwrap_or_default();
                self.history.push(self.current_url.clone());
                self.land(url, model);
            }
            Effect::Request { url, status } => {
                let url = self.resolve(&url);
                self.emit(PageEventKind::Request {
                    url: url.clone(),
                    method: "POST".to_string(),
                });
                self.emit(PageEventKind::Response { url, status });
            }
            Effect::RequestFailed { url } => {
                let url = self.resolve(&url);
                self.emit(PageEventKind::Request {
                    url: url.clone(),
                    method: "POST".to_string(),
                });
                self.emit(PageEventKind::RequestFailed {
                    url,
                    error: "net::ERR_CONNECTION_REFUSED".to_string(),
                });
            }
            Effect::ConsoleError(text) => self.emit(PageEventKind::ConsoleError { text }),
            Effect::ConsoleWarning(text) => self.emit(PageEventKind::ConsoleWarning { text }),
            Effect::PageError(message) => self.emit(PageEventKind::PageError { message }),
            Effect::UnhandledRejection(message) => {
                self.emit(PageEventKind::UnhandledRejection { message })
            }
            Effect::SetState { key, value } => {
                if let Some(state) = self.current.state.as_mut() {
                    state.values.insert(key, value);
                }
            }
            Effect::ShowValidation(text) => {
                self.append_dom(&format!("<p class=\"invalid\">{text}</p>"));
                self.current.ui.validation_messages.push(text);
            }
            Effect::ShowError(text) => {
                self.append_dom(&format!("<div role=\"alert\">{text}</div>"));
                self.current.ui.errors.push(text);
            }
            Effect::MutateDom(fragment) => self.append_dom(&fragment),
            Effect::DelayedMutation { after_ms, fragment } => {
                let at = Instant::now() + Duration::from_millis(after_ms);
                self.pending_mutations.push((at, fragment));
            }
            Effect::Announce(text) => {
                self.append_dom(&format!("<div aria-live=\"polite\">{text}</div>"));
                self.current.ui.live_regions.push(text);
            }
            Effect::Focus(target) => self.current.focused = Some(target),
            Effect::OpenDialog {
                selector: dialog,
                take_focus,
            } => {
                self.append_dom(&format!("<dialog id=\"{dialog}\" open></dialog>"));
                if take_focus {
                    self.current.focused = Some(format!("{dialog} button"));
                }
                self.current.ui.dialogs.push(dialog);
            }
            Effect::Busy { for_ms } => {
                self.busy_until = Some(Instant::now() + Duration::from_millis(for_ms));
            }
            Effect::Sleep(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
            Effect::Hang => std::future::pending::<()>().await,
            Effect::HangNavigation => self.hang_navigation = true,
            Effect::FailTransient { times, message } => {
                let seen = self.attempts.entry(selector.to_string()).or_insert(0);
                if *seen < times {
                    *seen += 1;
                    return Err(PageError::Element(message));
                }
            }
            Effect::Fail(message) => return Err(PageError::Element(message)),
            Effect::Crash => {
                self.crashed = true;
                return Err(PageError::SessionLost("target crashed".to_string()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Page for ScriptedPage {
    async fn goto(&mut self, url: &str) -> Result<(), PageError> {
        self.check_alive()?;
        let resolved = self.resolve(url);
        let model = self
            .site
            .lookup(&resolved)
            .cloned()
            .ok_or_else(|| PageError::Navigation(format!("no page at {resolved}")))?;
        if self.current_url != "about:blank" {
            self.history.push(self.current_url.clone());
        }
        self.hang_navigation = false;
        self.land(resolved, model);
        Ok(())
    }

    async fn go_back(&mut self) -> Result<(), PageError> {
        self.check_alive()?;
        let previous = self
            .history
            .pop()
            .ok_or_else(|| PageError::Navigation("no history entry".to_string()))?;
        let model = self.site.lookup(&previous).cloned().unwrap_or_default();
        self.hang_navigation = false;
        self.land(previous, model);
        Ok(())
    }

    fn url(&self) -> String {
        self.current_url.clone()
    }

    async fn title(&mut self) -> Result<String, PageError> {
        self.check_probe(Probe::Title)?;
        Ok(self.current.title.clone())
    }

    async fn screenshot(&mut self, label: &str) -> Result<String, PageError> {
        self.check_probe(Probe::Screenshot)?;
        self.screenshots += 1;
        Ok(format!("screenshots/{:04}-{label}.png", self.screenshots))
    }

    async fn dom_content(&mut self) -> Result<String, PageError> {
        self.check_probe(Probe::Dom)?;
        self.apply_due_mutations();
        Ok(self.current.dom.clone())
    }

    async fn perform(&mut self, interaction: &Interaction) -> Result<(), PageError> {
        self.check_alive()?;
        self.performed.push(interaction.selector.clone());
        if !self
            .current
            .interactions
            .iter()
            .any(|i| i.selector == interaction.selector)
        {
            return Err(PageError::Element(format!(
                "no element matches {}",
                interaction.selector
            )));
        }
        debug!(selector = %interaction.selector, "scripted perform");

        let effects = match self.site.scripts.get(&interaction.selector) {
            Some(effects) => effects.clone(),
            None => interaction
                .href
                .iter()
                .map(|href| Effect::Navigate(href.clone()))
                .collect(),
        };
        for effect in effects {
            self.apply(&interaction.selector, effect).await?;
        }
        Ok(())
    }

    async fn wait_for_navigation(&mut self) -> Result<(), PageError> {
        self.check_alive()?;
        if self.hang_navigation {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn discover_interactions(&mut self) -> Result<Vec<Interaction>, PageError> {
        self.check_alive()?;
        let url = self.current_url.clone();
        Ok(self
            .current
            .interactions
            .iter()
            .enumerate()
            .map(|(index, i)| {
                let mut found = i.clone();
                found.page_url = url.clone();
                found.dom_index = index as u32;
                found
            })
            .collect())
    }

    async fn discover_links(&mut self) -> Result<Vec<String>, PageError> {
        self.check_alive()?;
        Ok(self.current.links.clone())
    }

    async fn count_matches(&mut self, selector: &str) -> Result<usize, PageError> {
        self.check_alive()?;
        Ok(self
            .current
            .interactions
            .iter()
            .filter(|i| i.selector == selector)
            .count())
    }

    async fn ui_indicators(&mut self) -> Result<UiIndicators, PageError> {
        self.check_probe(Probe::Ui)?;
        let mut ui = self.current.ui.clone();
        if self.busy_until.is_some_and(|until| Instant::now() < until) {
            ui.loading.push(".spinner".to_string());
        }
        Ok(ui)
    }

    async fn app_state(&mut self) -> Result<Option<AppState>, PageError> {
        self.check_probe(Probe::State)?;
        Ok(self.current.state.clone())
    }

    async fn focused_element(&mut self) -> Result<FocusInfo, PageError> {
        self.check_probe(Probe::Focus)?;
        let element = self.current.focused.clone();
        let inside_dialog = element.as_deref().is_some_and(|focused| {
            self.current
                .ui
                .dialogs
                .iter()
                .any(|dialog| focused.starts_with(dialog.as_str()))
        });
        Ok(FocusInfo {
            element,
            inside_dialog,
        })
    }

    async fn live_regions(&mut self) -> Result<Vec<String>, PageError> {
        self.check_probe(Probe::LiveRegions)?;
        Ok(self.current.ui.live_regions.clone())
    }

    async fn loading_state(&mut self) -> Result<LoadingState, PageError> {
        self.check_probe(Probe::Loading)?;
        let busy = self.busy_until.is_some_and(|until| Instant::now() < until);
        Ok(LoadingState {
            busy_elements: 0,
            spinners: u32::from(busy),
            disabled_submits: 0,
        })
    }

    fn subscribe(&mut self) -> Receiver<PageEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}
