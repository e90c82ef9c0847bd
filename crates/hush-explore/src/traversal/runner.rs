use std::fmt;

use hush_browser::{Page, PageError};
use hush_ir::finding::{SilenceEntry, SilenceImpact, SilenceScope};
use hush_ir::trace::{DomRecord, PageCapture, Phase, PolicyRecord, SettleRecord, TerminalState, Trace};
use hush_ir::types::{Budget, Interaction};
use hush_sensors::{content_hash, SensorBank};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep_until, timeout, Duration, Instant};
use tracing::{debug, info, warn};

use super::origin::{is_external, same_origin};
use crate::adapt::retry::{RetryEvent, RetryPolicy};

/// Result of the execution step of one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Timeout(Phase),
    Error { phase: Phase, reason: String },
}

/// States of the per-interaction machine, in the order they can be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunnerState {
    Init,
    BeforeCapture,
    ExternalBlocked,
    SensorsArmed,
    Executing,
    Timeout,
    Error,
    AfterCapture,
    Assembled,
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunnerState::Init => "INIT",
            RunnerState::BeforeCapture => "BEFORE_CAPTURE",
            RunnerState::ExternalBlocked => "EXTERNAL_BLOCKED",
            RunnerState::SensorsArmed => "SENSORS_ARMED",
            RunnerState::Executing => "EXECUTING",
            RunnerState::Timeout => "TIMEOUT",
            RunnerState::Error => "ERROR",
            RunnerState::AfterCapture => "AFTER_CAPTURE",
            RunnerState::Assembled => "ASSEMBLED",
        };
        f.write_str(name)
    }
}

/// Only a lost browser session escapes the runner.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("browser session lost: {0}")]
    SessionLost(PageError),
}

/// Everything one window produced.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub trace: Trace,
    /// States entered, in order.
    pub states: Vec<RunnerState>,
    pub retry_events: Vec<RetryEvent>,
}

/// Short reason code for a driver failure. Never the raw message.
fn reason_code(err: &PageError) -> &'static str {
    match err {
        PageError::Navigation(_) => "navigation_failed",
        PageError::Element(_) => "element_error",
        PageError::Evaluation(_) => "evaluation_failed",
        PageError::Unsupported(_) => "unsupported_action",
        PageError::SessionLost(_) => "session_lost",
    }
}

fn timeout_reason(phase: Phase) -> &'static str {
    match phase {
        Phase::Click => "interaction_timeout",
        Phase::Navigation => "navigation_timeout",
        Phase::Settle => "settle_timeout",
    }
}

/// Runs one interaction inside a bounded observation window.
///
/// Holding `&mut dyn Page` for the whole of `run` is what gives the runner
/// exclusive ownership of the page during a window.
pub struct InteractionRunner {
    budget: Budget,
    retry: RetryPolicy,
    bank: SensorBank,
}

impl InteractionRunner {
    pub fn new(budget: &Budget, retry: RetryPolicy) -> Self {
        Self {
            budget: budget.clone(),
            retry,
            bank: SensorBank::new(budget),
        }
    }

    pub async fn run(
        &mut self,
        page: &mut dyn Page,
        interaction: &Interaction,
        trace_id: &str,
    ) -> Result<RunOutput, RunnerError> {
        let mut states = vec![RunnerState::Init];
        let mut silences = Vec::new();
        let mut retry_events = Vec::new();
        let mut policy = PolicyRecord::default();

        states.push(RunnerState::BeforeCapture);
        let before = capture(page, "before", trace_id, &mut silences).await?;

        if let Some(target) = external_target(&before.url, interaction) {
            states.push(RunnerState::ExternalBlocked);
            warn!(selector = %interaction.selector, blocked = %target, "external navigation blocked");
            policy.external_navigation_blocked = true;
            policy.blocked_url = Some(target);
            policy.reason = Some("external_navigation_blocked".to_string());
            let after = capture(page, "after", trace_id, &mut silences).await?;
            return Ok(RunOutput {
                trace: Trace {
                    id: trace_id.to_string(),
                    interaction: interaction.clone(),
                    before,
                    after,
                    sensors: self.bank.empty_summaries(),
                    policy,
                    dom: DomRecord::default(),
                    terminal: TerminalState::ExternalBlocked,
                    retries_used: 0,
                    repeat: false,
                    silences: tag(silences, trace_id),
                },
                states,
                retry_events,
            });
        }

        self.bank.capture_before(page).await;
        self.bank.arm(page);
        states.push(RunnerState::SensorsArmed);

        states.push(RunnerState::Executing);
        let mut settle = SettleRecord::default();
        let (outcome, retries_used) = self
            .execute(page, interaction, &mut settle, &mut retry_events)
            .await
            .map_err(RunnerError::SessionLost)?;
        settle.dom_changed_during_settle =
            matches!((settle.samples.first(), settle.samples.last()), (Some(a), Some(b)) if a != b);

        let mut terminal = TerminalState::Assembled;
        match &outcome {
            Outcome::Success => {}
            Outcome::Timeout(phase) => {
                states.push(RunnerState::Timeout);
                warn!(selector = %interaction.selector, phase = %phase, "observation window timed out");
                policy.timeout = true;
                policy.timeout_phase = Some(*phase);
                policy.reason = Some(timeout_reason(*phase).to_string());
                if *phase == Phase::Settle {
                    settle.timed_out = true;
                }
                silences.push(SilenceEntry::new(
                    SilenceScope::Interaction,
                    "timeout_truncated_capture",
                    SilenceImpact::Medium,
                ));
                terminal = TerminalState::Timeout;
            }
            Outcome::Error { phase, reason } => {
                states.push(RunnerState::Error);
                warn!(selector = %interaction.selector, phase = %phase, reason = %reason, "interaction failed");
                policy.execution_error = true;
                policy.error_phase = Some(*phase);
                policy.reason = Some(reason.clone());
                terminal = TerminalState::Error;
            }
        }

        // Off-origin landings are reversed before the window closes.
        let landed = page.url();
        if !same_origin(&before.url, &landed) && landed != before.url {
            warn!(from = %before.url, to = %landed, "reversing off-origin navigation");
            if let Err(err) = page.go_back().await {
                if err.is_session_fatal() {
                    return Err(RunnerError::SessionLost(err));
                }
                silences.push(SilenceEntry::new(
                    SilenceScope::Interaction,
                    "reverse_navigation_failed",
                    SilenceImpact::High,
                ));
            }
            policy.external_navigation_blocked = true;
            policy.blocked_url = Some(landed);
            if terminal == TerminalState::Assembled {
                terminal = TerminalState::ExternalBlocked;
            }
        }

        self.bank.disarm(&*page);
        states.push(RunnerState::AfterCapture);
        let sensors = self.bank.capture_after_and_diff(page).await;
        silences.extend(self.bank.take_silences());
        let after = capture(page, "after", trace_id, &mut silences).await?;

        states.push(RunnerState::Assembled);
        info!(
            trace = trace_id,
            selector = %interaction.selector,
            terminal = ?terminal,
            retries = retries_used,
            "interaction observed"
        );
        Ok(RunOutput {
            trace: Trace {
                id: trace_id.to_string(),
                interaction: interaction.clone(),
                before,
                after,
                sensors,
                policy,
                dom: DomRecord { settle },
                terminal,
                retries_used,
                repeat: false,
                silences: tag(silences, trace_id),
            },
            states,
            retry_events,
        })
    }

    /// Action, navigation wait and settle sampling, each under its own deadline.
    async fn execute(
        &self,
        page: &mut dyn Page,
        interaction: &Interaction,
        settle: &mut SettleRecord,
        retry_events: &mut Vec<RetryEvent>,
    ) -> Result<(Outcome, u32), PageError> {
        let mut retries = 0;
        loop {
            match timeout(self.budget.interaction_timeout(), page.perform(interaction)).await {
                Err(_) => return Ok((Outcome::Timeout(Phase::Click), retries)),
                Ok(Ok(())) => break,
                Ok(Err(err)) if err.is_session_fatal() => return Err(err),
                Ok(Err(err)) => {
                    match self
                        .retry
                        .on_failure("perform", &interaction.selector, retries, &err)
                    {
                        Some(event) => {
                            retry_events.push(event);
                            retries += 1;
                        }
                        None => {
                            let outcome = Outcome::Error {
                                phase: Phase::Click,
                                reason: reason_code(&err).to_string(),
                            };
                            return Ok((outcome, retries));
                        }
                    }
                }
            }
        }

        match timeout(self.budget.navigation_timeout(), page.wait_for_navigation()).await {
            Err(_) => return Ok((Outcome::Timeout(Phase::Navigation), retries)),
            Ok(Err(err)) if err.is_session_fatal() => return Err(err),
            Ok(Err(err)) => {
                let outcome = Outcome::Error {
                    phase: Phase::Navigation,
                    reason: reason_code(&err).to_string(),
                };
                return Ok((outcome, retries));
            }
            Ok(Ok(())) => {}
        }

        let settled = timeout(self.budget.settle_timeout(), self.sample_settle(page, settle)).await;
        match settled {
            Err(_) => Ok((Outcome::Timeout(Phase::Settle), retries)),
            Ok(Err(err)) if err.is_session_fatal() => Err(err),
            Ok(Err(err)) => {
                debug!(error = %err, "settle sampling stopped early");
                Ok((Outcome::Success, retries))
            }
            Ok(Ok(())) => Ok((Outcome::Success, retries)),
        }
    }

    /// Take the DOM hash samples at the configured offsets after the action.
    async fn sample_settle(&self, page: &mut dyn Page, settle: &mut SettleRecord) -> Result<(), PageError> {
        let origin = Instant::now();
        for offset in self.budget.settle_sample_offsets_ms {
            sleep_until(origin + Duration::from_millis(offset)).await;
            let dom = page.dom_content().await?;
            settle.samples.push(content_hash(&dom));
        }
        Ok(())
    }
}

/// The off-origin URL an interaction would navigate to, if any.
fn external_target(page_url: &str, interaction: &Interaction) -> Option<String> {
    [
        interaction.href.as_deref(),
        interaction.data_href.as_deref(),
        interaction.form_action.as_deref(),
    ]
    .into_iter()
    .flatten()
    .find(|target| is_external(page_url, target))
    .map(str::to_string)
}

fn tag(silences: Vec<SilenceEntry>, trace_id: &str) -> Vec<SilenceEntry> {
    silences
        .into_iter()
        .map(|s| if s.subject.is_some() { s } else { s.for_subject(trace_id) })
        .collect()
}

/// URL, screenshot, DOM hash and title. Individual probe failures become
/// silence entries; only a lost session is an error.
async fn capture(
    page: &mut dyn Page,
    label: &str,
    trace_id: &str,
    silences: &mut Vec<SilenceEntry>,
) -> Result<PageCapture, RunnerError> {
    let url = page.url();
    let screenshot = soft(
        page.screenshot(&format!("{trace_id}-{label}")).await,
        &format!("{label}_screenshot_failed"),
        SilenceImpact::High,
        silences,
    )?;
    let dom_hash = soft(
        page.dom_content().await.map(|dom| content_hash(&dom)),
        &format!("{label}_dom_unavailable"),
        SilenceImpact::Medium,
        silences,
    )?;
    let title = soft(
        page.title().await,
        &format!("{label}_title_unavailable"),
        SilenceImpact::Low,
        silences,
    )?;
    Ok(PageCapture {
        url,
        screenshot,
        dom_hash,
        title,
    })
}

fn soft<T>(
    result: Result<T, PageError>,
    reason: &str,
    impact: SilenceImpact,
    silences: &mut Vec<SilenceEntry>,
) -> Result<Option<T>, RunnerError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_session_fatal() => Err(RunnerError::SessionLost(err)),
        Err(err) => {
            debug!(reason, error = %err, "capture probe failed");
            silences.push(SilenceEntry::new(SilenceScope::Interaction, reason, impact));
            Ok(None)
        }
    }
}
