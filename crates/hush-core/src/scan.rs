//! Scan orchestration.
//!
//! One scan drives a single browser page through five phases:
//!
//! 1. discovery: breadth-first over same-origin pages;
//! 2. selection: cap the discovered candidates by priority tier;
//! 3. PROVEN expectations, in canonical order, each bound to its claimed
//!    interaction and executed;
//! 4. the remaining selected interactions, each deriving an OBSERVED
//!    expectation that earns one confirming repeat;
//! 5. verdict and canonical ordering of every emitted collection.
//!
//! All per-scan state lives in a [`ScanContext`] owned by the run, so scans
//! sharing a process never see each other's caches.

use std::collections::{HashMap, HashSet};

use hush_browser::{Page, PageError};
use hush_explore::origin::{normalize_path, normalize_url, resolve};
use hush_explore::{
    discover, select_interactions, Discovery, InteractionRunner, RetryEvent, RunnerError, Selection,
    Warning,
};
use hush_ir::finding::{Finding, RunTruth, SilenceEntry, SilenceImpact, SilenceLedger, SilenceScope};
use hush_ir::parse::ParseError;
use hush_ir::trace::Trace;
use hush_ir::types::{Expectation, ExpectationKind, ExpectationTarget, Interaction, InteractionKind};
use hush_model::{
    assess, build_finding, derive_observed, Assessment, BreakReason, ConfidenceEngine,
    ConfidenceInput, CoverageGapReason, ExpectationOutcome, MatchOutcome,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::canonical::sort_canonical;
use crate::config::{ConfigError, ScanConfig};
use crate::coverage::{CoverageSummary, CoverageTracker, SilenceSummary};
use crate::limits::{LimitViolation, ScanLimits};
use crate::truth::{classify_truth, RunStats};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to read manifest {path}: {source}")]
    Manifest {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("input limit exceeded: {0}")]
    Limit(#[from] LimitViolation),
}

/// Everything one scan hands to report writers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub traces: Vec<Trace>,
    pub findings: Vec<Finding>,
    /// PROVEN inputs and derived OBSERVED expectations, canonically ordered.
    pub expectations: Vec<Expectation>,
    /// One per expectation, in the same order.
    pub outcomes: Vec<ExpectationOutcome>,
    pub truth: RunTruth,
    pub coverage: CoverageSummary,
    pub silences: Vec<SilenceEntry>,
    pub silence_summary: SilenceSummary,
    pub retry_events: Vec<RetryEvent>,
    pub warnings: Vec<Warning>,
}

/// Why a step stopped short.
enum Stop {
    Gap(CoverageGapReason),
    Infra(PageError),
}

/// Per-scan mutable state.
struct ScanContext {
    limits: ScanLimits,
    /// Normalised page URL → interactions found there.
    pages: HashMap<String, Vec<Interaction>>,
    /// Keys of `pages` in visit order.
    page_order: Vec<String>,
    unreachable: HashSet<String>,
    ledger: SilenceLedger,
    retry_events: Vec<RetryEvent>,
    traces: Vec<Trace>,
    findings: Vec<Finding>,
    outcomes: Vec<ExpectationOutcome>,
    derived: Vec<Expectation>,
    coverage: CoverageTracker,
    infra_failure: Option<String>,
    /// Gap reason given to everything left once the scan halts.
    halted: Option<CoverageGapReason>,
    budget_exceeded: bool,
    /// Cap on observation windows of any kind, repeats included.
    max_interactions: usize,
    interactions_capped: bool,
    next_trace: u32,
}

fn page_key(url: &str) -> String {
    normalize_url(url).unwrap_or_else(|| url.to_string())
}

fn interaction_key(interaction: &Interaction) -> (String, String) {
    (page_key(&interaction.page_url), interaction.selector.clone())
}

impl ScanContext {
    fn new(limits: ScanLimits, max_interactions: usize) -> Self {
        Self {
            limits,
            pages: HashMap::new(),
            page_order: Vec::new(),
            unreachable: HashSet::new(),
            ledger: SilenceLedger::new(),
            retry_events: Vec::new(),
            traces: Vec::new(),
            findings: Vec::new(),
            outcomes: Vec::new(),
            derived: Vec::new(),
            coverage: CoverageTracker::new(),
            infra_failure: None,
            halted: None,
            budget_exceeded: false,
            max_interactions,
            interactions_capped: false,
            next_trace: 0,
        }
    }

    fn absorb_discovery(&mut self, discovery: &Discovery, cap: usize) -> Selection {
        for page in &discovery.pages {
            self.cache_page(&page.url, page.interactions.clone());
        }
        for (url, reason) in &discovery.unreachable {
            self.mark_unreachable(url, reason);
        }
        self.coverage.record_discovery(&discovery.stats, &discovery.warnings);

        let selection = select_interactions(&discovery.candidates(), cap);
        if selection.capped {
            warn!(
                discovered = selection.candidates_discovered,
                cap,
                dropped = selection.dropped(),
                "interaction cap reached"
            );
        }
        self.coverage
            .record_selection(selection.selected.len(), cap, selection.capped);
        selection
    }

    fn cache_page(&mut self, url: &str, interactions: Vec<Interaction>) {
        let key = page_key(url);
        if self.pages.insert(key.clone(), interactions).is_none() {
            self.page_order.push(key);
        }
    }

    fn mark_unreachable(&mut self, url: &str, reason: &str) {
        let key = page_key(url);
        if self.unreachable.insert(key.clone()) {
            self.ledger.record(
                SilenceEntry::new(SilenceScope::Page, reason, SilenceImpact::Medium).for_subject(key),
            );
        }
    }

    fn halt_on_infra(&mut self, err: &PageError) {
        warn!(error = %err, "browser session lost, halting scan");
        self.infra_failure = Some("session_lost".to_string());
        self.halted = Some(CoverageGapReason::SessionLost);
        self.ledger.record(SilenceEntry::new(
            SilenceScope::Page,
            "session_lost",
            SilenceImpact::High,
        ));
    }

    /// Checked before every interaction start.
    fn out_of_budget(&mut self) -> bool {
        if !self.limits.exceeded() {
            return false;
        }
        if !self.budget_exceeded {
            warn!(elapsed_ms = self.limits.elapsed_ms(), "scan budget exceeded, no further interactions start");
            self.budget_exceeded = true;
            self.coverage.warn(Warning::ScanBudgetExceeded);
        }
        true
    }

    /// Checked next to the clock before every window.
    fn out_of_interactions(&mut self) -> bool {
        if self.coverage.interactions_executed() < self.max_interactions {
            return false;
        }
        if !self.interactions_capped {
            warn!(cap = self.max_interactions, "interaction cap reached, no further interactions start");
            self.interactions_capped = true;
            self.coverage.warn(Warning::InteractionsCapped);
        }
        true
    }

    /// True when another observation window may start.
    fn window_allowed(&mut self) -> bool {
        !self.out_of_budget() && !self.out_of_interactions()
    }

    fn next_trace_id(&mut self) -> String {
        self.next_trace += 1;
        format!("trace-{:04}", self.next_trace)
    }

    fn silence(&mut self, scope: SilenceScope, reason: &str, impact: SilenceImpact, subject: &str) {
        self.ledger
            .record(SilenceEntry::new(scope, reason, impact).for_subject(subject));
    }

    fn record_outcome(&mut self, outcome: ExpectationOutcome) {
        self.coverage.record_outcome(&outcome);
        self.outcomes.push(outcome);
    }

    fn gap(&mut self, expectation: &Expectation, reason: CoverageGapReason, trace_id: Option<&str>) {
        debug!(expectation = %expectation.id, reason = reason.as_str(), "coverage gap");
        self.silence(SilenceScope::Expectation, reason.as_str(), SilenceImpact::Medium, &expectation.id);
        self.record_outcome(ExpectationOutcome::gap(expectation, reason, trace_id));
    }
}

/// The interaction kind to synthesize when a bound selector is not among the
/// discovered candidates.
fn kind_for(expectation: &Expectation) -> InteractionKind {
    match expectation.kind {
        ExpectationKind::Navigation => InteractionKind::Link,
        ExpectationKind::ValidationBlock => InteractionKind::Form,
        ExpectationKind::NetworkAction | ExpectationKind::StateAction => InteractionKind::Button,
    }
}

/// Whether an interaction's own attributes point at the expectation's target.
fn declares_target(expectation: &Expectation, interaction: &Interaction) -> bool {
    match &expectation.target {
        ExpectationTarget::Path(path) => interaction
            .declared_target()
            .and_then(|href| resolve(&interaction.page_url, href))
            .is_some_and(|url| normalize_path(url.as_str()) == normalize_path(path)),
        ExpectationTarget::Url(expected) => interaction
            .form_action
            .as_deref()
            .and_then(|action| resolve(&interaction.page_url, action))
            .is_some_and(|url| url.as_str().contains(expected.as_str())),
        ExpectationTarget::StateKey(_) | ExpectationTarget::Block => false,
    }
}

pub struct Scan {
    config: ScanConfig,
    engine: ConfidenceEngine,
}

impl Scan {
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        Ok(Self {
            config,
            engine: ConfidenceEngine::default(),
        })
    }

    pub fn with_engine(mut self, engine: ConfidenceEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub async fn run(
        &self,
        page: &mut dyn Page,
        start_url: &str,
        mut expectations: Vec<Expectation>,
    ) -> ScanReport {
        let budget = &self.config.budget;
        let mut ctx = ScanContext::new(ScanLimits::new(budget), budget.max_total_interactions);
        let mut runner = InteractionRunner::new(budget, self.config.retry);
        sort_canonical(&mut expectations);
        info!(start_url, expectations = expectations.len(), "scan started");

        let selection = match discover(page, start_url, budget).await {
            Ok(discovery) => Some(ctx.absorb_discovery(&discovery, budget.max_total_interactions)),
            Err(err) if err.is_session_fatal() => {
                ctx.halt_on_infra(&err);
                None
            }
            Err(err) => {
                warn!(start_url, error = %err, "start page unreachable");
                ctx.infra_failure = Some("start_page_unreachable".to_string());
                ctx.halted = Some(CoverageGapReason::RouteUnreachable);
                ctx.mark_unreachable(start_url, "page_load_failed");
                None
            }
        };

        let consumed = self.run_proven(&mut ctx, &mut runner, page, start_url, &expectations).await;
        if let Some(selection) = selection {
            self.run_observed(&mut ctx, &mut runner, page, &selection, &consumed)
                .await;
        }

        self.finish(ctx, expectations)
    }

    /// Bind and execute every PROVEN expectation. Returns the interactions
    /// they consumed.
    async fn run_proven(
        &self,
        ctx: &mut ScanContext,
        runner: &mut InteractionRunner,
        page: &mut dyn Page,
        start_url: &str,
        expectations: &[Expectation],
    ) -> HashSet<(String, String)> {
        let mut consumed = HashSet::new();
        for expectation in expectations.iter().filter(|e| e.is_proven()) {
            if let Some(reason) = ctx.halted {
                ctx.gap(expectation, reason, None);
                continue;
            }
            if !ctx.window_allowed() {
                ctx.gap(expectation, CoverageGapReason::BudgetExhausted, None);
                continue;
            }

            let interaction = match self.bind(ctx, page, start_url, expectation).await {
                Ok(interaction) => interaction,
                Err(Stop::Gap(reason)) => {
                    ctx.gap(expectation, reason, None);
                    continue;
                }
                Err(Stop::Infra(err)) => {
                    ctx.halt_on_infra(&err);
                    ctx.gap(expectation, CoverageGapReason::SessionLost, None);
                    continue;
                }
            };
            consumed.insert(interaction_key(&interaction));

            let trace = match self.execute(ctx, runner, page, &interaction).await {
                Ok(trace) => trace,
                Err(Stop::Gap(reason)) => {
                    ctx.gap(expectation, reason, None);
                    continue;
                }
                Err(Stop::Infra(err)) => {
                    ctx.halt_on_infra(&err);
                    ctx.gap(expectation, CoverageGapReason::SessionLost, None);
                    continue;
                }
            };

            match assess(expectation, &trace) {
                Assessment::Gap(reason) => ctx.gap(expectation, reason, Some(&trace.id)),
                Assessment::Matched(outcome) => {
                    if let MatchOutcome::ObservedBreak(reason) = outcome {
                        let finding = self.finding(ctx, expectation, &trace, reason);
                        ctx.findings.push(finding);
                    }
                    ctx.record_outcome(ExpectationOutcome::from_match(expectation, &trace.id, outcome));
                }
            }
            ctx.traces.push(trace);
        }
        consumed
    }

    /// Execute the selected interactions no PROVEN expectation claimed.
    async fn run_observed(
        &self,
        ctx: &mut ScanContext,
        runner: &mut InteractionRunner,
        page: &mut dyn Page,
        selection: &Selection,
        consumed: &HashSet<(String, String)>,
    ) {
        for interaction in selection.in_execution_order() {
            if ctx.halted.is_some() {
                break;
            }
            if consumed.contains(&interaction_key(&interaction)) {
                continue;
            }
            if !ctx.window_allowed() {
                ctx.silence(
                    SilenceScope::Interaction,
                    "budget_exhausted",
                    SilenceImpact::Low,
                    &interaction.selector,
                );
                continue;
            }

            let trace = match self.execute(ctx, runner, page, &interaction).await {
                Ok(trace) => trace,
                Err(Stop::Gap(_)) => continue,
                Err(Stop::Infra(err)) => {
                    ctx.halt_on_infra(&err);
                    break;
                }
            };
            self.observe(ctx, runner, page, trace).await;
        }
    }

    /// Derive an OBSERVED expectation from `trace`, confirm it with one
    /// repeat, and report a break only when the repeat agrees.
    async fn observe(
        &self,
        ctx: &mut ScanContext,
        runner: &mut InteractionRunner,
        page: &mut dyn Page,
        trace: Trace,
    ) {
        let Some(expectation) = derive_observed(&trace) else {
            ctx.traces.push(trace);
            return;
        };
        debug!(expectation = %expectation.id, kind = %expectation.kind, "observed expectation derived");

        let outcome = match assess(&expectation, &trace) {
            Assessment::Matched(outcome) => outcome,
            Assessment::Gap(reason) => {
                ctx.gap(&expectation, reason, Some(&trace.id));
                ctx.derived.push(expectation);
                ctx.traces.push(trace);
                return;
            }
        };

        // A repeat after a page change would corrupt traversal.
        let repeat = if trace.url_changed() {
            ctx.silence(SilenceScope::Expectation, "repeat_skipped_page_changed", SilenceImpact::Low, &trace.id);
            None
        } else if !ctx.window_allowed() {
            ctx.silence(SilenceScope::Expectation, "repeat_skipped_budget", SilenceImpact::Low, &trace.id);
            None
        } else {
            match self.execute(ctx, runner, page, &trace.interaction).await {
                Ok(mut repeat) => {
                    repeat.repeat = true;
                    Some(repeat)
                }
                Err(Stop::Gap(_)) => {
                    ctx.silence(SilenceScope::Expectation, "repeat_unreachable", SilenceImpact::Low, &trace.id);
                    None
                }
                Err(Stop::Infra(err)) => {
                    ctx.halt_on_infra(&err);
                    None
                }
            }
        };

        if let MatchOutcome::ObservedBreak(reason) = outcome {
            let confirmed = match &repeat {
                Some(repeat) => {
                    assess(&expectation, repeat)
                        == Assessment::Matched(MatchOutcome::ObservedBreak(reason))
                }
                None => true,
            };
            if confirmed {
                let finding = self.finding(ctx, &expectation, &trace, reason);
                ctx.findings.push(finding);
            } else {
                debug!(expectation = %expectation.id, "repeat disagreed, break not reported");
                ctx.silence(SilenceScope::Expectation, "observed_inconsistent", SilenceImpact::Medium, &expectation.id);
            }
        }
        ctx.record_outcome(ExpectationOutcome::from_match(&expectation, &trace.id, outcome));
        ctx.derived.push(expectation);
        ctx.traces.push(trace);
        if let Some(repeat) = repeat {
            ctx.traces.push(repeat);
        }
    }

    /// Locate the interaction a PROVEN expectation claims.
    ///
    /// With a claimed page and a selector hint the live page is asked how many
    /// elements match. Otherwise the discovery cache is searched page by page,
    /// by selector or by the target the element declares.
    async fn bind(
        &self,
        ctx: &mut ScanContext,
        page: &mut dyn Page,
        start_url: &str,
        expectation: &Expectation,
    ) -> Result<Interaction, Stop> {
        let claimed = match expectation.page.as_deref() {
            Some(claimed) => Some(
                resolve(start_url, claimed)
                    .map(|url| page_key(url.as_str()))
                    .ok_or(Stop::Gap(CoverageGapReason::RouteUnreachable))?,
            ),
            None => None,
        };
        if let Some(url) = &claimed {
            self.visit(ctx, page, url).await?;
        }

        match (&claimed, expectation.selector_hint.as_deref()) {
            (Some(url), Some(selector)) => {
                let matches = page.count_matches(selector).await.map_err(|err| {
                    if err.is_session_fatal() {
                        Stop::Infra(err)
                    } else {
                        Stop::Gap(CoverageGapReason::SelectorNotFound)
                    }
                })?;
                match matches {
                    0 => Err(Stop::Gap(CoverageGapReason::SelectorNotFound)),
                    1 => Ok(ctx
                        .pages
                        .get(url)
                        .and_then(|found| found.iter().find(|i| i.selector == selector))
                        .cloned()
                        .unwrap_or_else(|| {
                            Interaction::new(kind_for(expectation), selector, page.url())
                        })),
                    _ => Err(Stop::Gap(CoverageGapReason::AmbiguousSelector)),
                }
            }
            (_, Some(selector)) => pick(ctx, claimed.as_deref(), |i| i.selector == selector),
            (_, None) => pick(ctx, claimed.as_deref(), |i| declares_target(expectation, i)),
        }
    }

    /// Load a claimed page and make sure its interactions are cached.
    async fn visit(&self, ctx: &mut ScanContext, page: &mut dyn Page, url: &str) -> Result<(), Stop> {
        if ctx.unreachable.contains(url) {
            return Err(Stop::Gap(CoverageGapReason::RouteUnreachable));
        }
        match page.goto(url).await {
            Ok(()) => {}
            Err(err) if err.is_session_fatal() => return Err(Stop::Infra(err)),
            Err(err) => {
                debug!(url, error = %err, "claimed page failed to load");
                ctx.mark_unreachable(url, "page_load_failed");
                return Err(Stop::Gap(CoverageGapReason::RouteUnreachable));
            }
        }
        if !ctx.pages.contains_key(url) {
            match page.discover_interactions().await {
                Ok(found) => ctx.cache_page(url, found),
                Err(err) if err.is_session_fatal() => return Err(Stop::Infra(err)),
                Err(_) => ctx.cache_page(url, Vec::new()),
            }
        }
        Ok(())
    }

    /// Run one observation window from a fresh load of the interaction's page.
    async fn execute(
        &self,
        ctx: &mut ScanContext,
        runner: &mut InteractionRunner,
        page: &mut dyn Page,
        interaction: &Interaction,
    ) -> Result<Trace, Stop> {
        match page.goto(&interaction.page_url).await {
            Ok(()) => {}
            Err(err) if err.is_session_fatal() => return Err(Stop::Infra(err)),
            Err(_) => {
                ctx.mark_unreachable(&interaction.page_url, "page_load_failed");
                return Err(Stop::Gap(CoverageGapReason::RouteUnreachable));
            }
        }

        let trace_id = ctx.next_trace_id();
        ctx.coverage.record_interaction();
        debug!(
            trace = %trace_id,
            selector = %interaction.selector,
            remaining_ms = ctx.limits.remaining().as_millis() as u64,
            "interaction started"
        );
        match runner.run(page, interaction, &trace_id).await {
            Ok(out) => {
                ctx.retry_events.extend(out.retry_events);
                ctx.ledger.extend(out.trace.silences.iter().cloned());
                Ok(out.trace)
            }
            Err(RunnerError::SessionLost(err)) => Err(Stop::Infra(err)),
        }
    }

    fn finding(
        &self,
        ctx: &ScanContext,
        expectation: &Expectation,
        trace: &Trace,
        reason: BreakReason,
    ) -> Finding {
        let mut input = ConfidenceInput::from_trace(reason.finding_type(), expectation.strength, trace);
        input.silence_discount = ctx.ledger.discount_for(&trace.id);
        let report = self.engine.score(&input);
        warn!(
            expectation = %expectation.id,
            reason = reason.as_str(),
            score = report.score,
            level = %report.level,
            "silent failure observed"
        );
        build_finding(expectation, trace, reason, report)
    }

    fn finish(&self, mut ctx: ScanContext, proven: Vec<Expectation>) -> ScanReport {
        let stats = RunStats {
            findings: ctx.findings.len(),
            infra_failure: ctx.infra_failure.clone(),
            budget_exceeded: ctx.budget_exceeded,
            total_expectations: ctx.coverage.proven_total(),
            attempted_expectations: ctx.coverage.proven_attempted(),
        };
        let truth = classify_truth(&stats, &self.config.truth);

        let mut expectations = proven;
        expectations.append(&mut ctx.derived);
        sort_canonical(&mut expectations);
        let position: HashMap<&str, usize> = expectations
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.as_str(), i))
            .collect();
        let mut outcomes = ctx.outcomes;
        outcomes.sort_by_key(|o| position.get(o.expectation_id.as_str()).copied().unwrap_or(usize::MAX));

        let mut traces = ctx.traces;
        sort_canonical(&mut traces);
        let mut findings = ctx.findings;
        sort_canonical(&mut findings);

        let silences = ctx.ledger.into_entries();
        let coverage = ctx.coverage.summary(ctx.limits.elapsed_ms());
        info!(
            truth = ?truth.truth_state,
            reason = %truth.reason,
            findings = findings.len(),
            traces = traces.len(),
            coverage_ratio = coverage.coverage_ratio,
            "scan complete"
        );

        ScanReport {
            silence_summary: SilenceSummary::from_entries(&silences),
            warnings: ctx.coverage.warnings().to_vec(),
            traces,
            findings,
            expectations,
            outcomes,
            truth,
            coverage,
            silences,
            retry_events: ctx.retry_events,
        }
    }
}

/// First page (in visit order) with a matching interaction wins; two matches
/// on that page are ambiguous.
fn pick(
    ctx: &ScanContext,
    claimed: Option<&str>,
    matches: impl Fn(&Interaction) -> bool,
) -> Result<Interaction, Stop> {
    let urls: Vec<&str> = match claimed {
        Some(url) => vec![url],
        None => ctx.page_order.iter().map(String::as_str).collect(),
    };
    for url in urls {
        let hits: Vec<&Interaction> = ctx
            .pages
            .get(url)
            .into_iter()
            .flatten()
            .filter(|i| matches(i))
            .collect();
        match hits.as_slice() {
            [] => continue,
            [only] => return Ok((*only).clone()),
            _ => return Err(Stop::Gap(CoverageGapReason::AmbiguousSelector)),
        }
    }
    Err(Stop::Gap(CoverageGapReason::SelectorNotFound))
}
