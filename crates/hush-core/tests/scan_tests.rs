use hush_browser::{Effect, Page, PageModel, ScriptedPage, ScriptedSite};
use hush_core::{Scan, ScanConfig, ScanReport};
use hush_explore::{select_interactions, Warning};
use hush_ir::finding::{ConfidenceLevel, FindingType, TruthState};
use hush_ir::trace::TerminalState;
use hush_ir::types::{
    Budget, Expectation, ExpectationKind, ExpectationTarget, Interaction, InteractionKind, SourceRef,
    Strength,
};
use hush_model::OutcomeStatus;

const HOME: &str = "http://app.test/";

fn button(selector: &str) -> Interaction {
    Interaction::new(InteractionKind::Button, selector, HOME)
}

fn submit_expectation(id: &str, selector: &str) -> Expectation {
    Expectation::proven(
        id,
        ExpectationKind::NetworkAction,
        ExpectationTarget::Url("/api/submit".into()),
        SourceRef::new("src/Form.jsx", 30, 2),
    )
    .with_selector(selector)
    .on_page("/")
}

fn home_site(model: PageModel) -> ScriptedSite {
    ScriptedSite::new().page(HOME, model)
}

async fn scan(site: ScriptedSite, expectations: Vec<Expectation>) -> ScanReport {
    scan_with(ScanConfig::default(), site, expectations).await
}

async fn scan_with(config: ScanConfig, site: ScriptedSite, expectations: Vec<Expectation>) -> ScanReport {
    let mut page = ScriptedPage::new(site);
    Scan::new(config)
        .unwrap()
        .run(&mut page, HOME, expectations)
        .await
}

#[tokio::test(start_paused = true)]
async fn test_observed_request_verifies_network_expectation() {
    let site = home_site(PageModel::new("Home").with_interaction(button("button#save"))).script(
        "button#save",
        vec![Effect::Request {
            url: "/api/submit".into(),
            status: 200,
        }],
    );

    let report = scan(site, vec![submit_expectation("net-1", "button#save")]).await;

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].status, OutcomeStatus::Verified);
    assert!(report.findings.is_empty());
    assert_eq!(report.truth.truth_state, TruthState::Success);
    assert_eq!(report.truth.confidence, ConfidenceLevel::High);
    assert_eq!(report.coverage.proven_attempted, 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_request_is_a_silent_submission_failure() {
    let site = home_site(PageModel::new("Home").with_interaction(button("button#save")))
        .script("button#save", vec![]);

    let report = scan(site, vec![submit_expectation("net-1", "button#save")]).await;

    assert_eq!(report.outcomes[0].status, OutcomeStatus::ObservedBreak);
    assert_eq!(report.outcomes[0].reason.as_deref(), Some("network_request_missing"));
    assert_eq!(report.findings.len(), 1);
    let finding = &report.findings[0];
    assert_eq!(finding.finding_type, FindingType::SilentSubmissionFailure);
    assert_eq!(finding.strength, Strength::Proven);
    assert!(finding.confidence.evidence_complete);
    assert_eq!(
        ConfidenceLevel::from_score(finding.confidence.score),
        finding.confidence.level
    );
    assert_eq!(report.truth.truth_state, TruthState::Findings);
}

#[tokio::test(start_paused = true)]
async fn test_interaction_cap_prefers_forms_then_links() {
    let mut model = PageModel::new("Busy page");
    for i in 0..50 {
        let interaction = match i % 5 {
            0 => Interaction::new(InteractionKind::Form, format!("form#f{i}"), HOME),
            1 | 2 => Interaction::new(InteractionKind::Link, format!("a#l{i}"), HOME)
                .with_href(format!("/p{i}")),
            _ => button(&format!("button#b{i}")),
        };
        model = model.with_interaction(interaction);
    }
    let config = ScanConfig::default().with_budget(Budget {
        max_total_interactions: 30,
        ..Default::default()
    });

    let report = scan_with(config, home_site(model.clone()), vec![]).await;

    assert!(report.coverage.capped);
    assert_eq!(report.coverage.candidates_discovered, 50);
    assert_eq!(report.coverage.candidates_selected, 30);
    assert!(report.warnings.contains(&Warning::InteractionsCapped));
    assert!(report
        .traces
        .iter()
        .all(|t| t.interaction.kind != InteractionKind::Button));
    assert_eq!(report.truth.truth_state, TruthState::Success);

    let mut page = ScriptedPage::new(home_site(model));
    page.goto(HOME).await.unwrap();
    let candidates = page.discover_interactions().await.unwrap();
    let selection = select_interactions(&candidates, 30);
    let kinds: Vec<_> = selection.selected.iter().map(|i| i.kind).collect();
    assert!(kinds[..10].iter().all(|k| *k == InteractionKind::Form));
    assert!(kinds[10..].iter().all(|k| *k == InteractionKind::Link));
    let link_indexes: Vec<_> = selection.selected[10..].iter().map(|i| i.dom_index).collect();
    assert!(link_indexes.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_retried_once() {
    let site = home_site(PageModel::new("Home").with_interaction(button("button#flaky"))).script(
        "button#flaky",
        vec![
            Effect::FailTransient {
                times: 1,
                message: "Element is not attached to the DOM".into(),
            },
            Effect::Request {
                url: "/api/submit".into(),
                status: 200,
            },
        ],
    );

    let report = scan(site, vec![submit_expectation("net-1", "button#flaky")]).await;

    assert_eq!(report.outcomes[0].status, OutcomeStatus::Verified);
    assert_eq!(report.retry_events.len(), 1);
    assert_eq!(report.traces[0].retries_used, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cross_origin_link_is_blocked_without_a_finding() {
    let site = home_site(
        PageModel::new("Home").with_interaction(
            Interaction::new(InteractionKind::Link, "a#partner", HOME)
                .with_href("https://partner.test/promo"),
        ),
    );

    let report = scan(site, vec![]).await;

    assert!(report.findings.is_empty());
    let trace = report
        .traces
        .iter()
        .find(|t| t.interaction.selector == "a#partner")
        .unwrap();
    assert_eq!(trace.terminal, TerminalState::ExternalBlocked);
    assert!(trace.policy.external_navigation_blocked);
    assert_eq!(trace.before.url, trace.after.url);
}

#[tokio::test(start_paused = true)]
async fn test_dead_link_is_an_observed_finding_after_confirmation() {
    let site = home_site(
        PageModel::new("Home")
            .with_interaction(Interaction::new(InteractionKind::Link, "a#orders", HOME).with_href("/orders")),
    )
    .script("a#orders", vec![]);

    let report = scan(site, vec![]).await;

    assert_eq!(report.traces.len(), 2);
    assert_eq!(report.traces.iter().filter(|t| t.repeat).count(), 1);
    assert_eq!(report.expectations.len(), 1);
    assert_eq!(report.expectations[0].strength, Strength::Observed);
    assert_eq!(report.findings.len(), 1);
    let finding = &report.findings[0];
    assert_eq!(finding.finding_type, FindingType::SilentNavigationFailure);
    assert_eq!(finding.strength, Strength::Observed);
    assert!(finding
        .confidence
        .subtractive
        .iter()
        .any(|c| c.rule == "observed_strength"));
    assert_eq!(report.truth.truth_state, TruthState::Findings);
}

#[tokio::test(start_paused = true)]
async fn test_unbindable_expectations_are_coverage_gaps() {
    let site = home_site(
        PageModel::new("Home")
            .with_interaction(button("button#twin"))
            .with_interaction(button("button#twin")),
    );
    let expectations = vec![
        submit_expectation("net-missing", "button#nowhere"),
        submit_expectation("net-twin", "button#twin"),
        submit_expectation("net-gone", "button#save").on_page("/gone"),
    ];

    let report = scan(site, expectations).await;

    let reason = |id: &str| {
        report
            .outcomes
            .iter()
            .find(|o| o.expectation_id == id)
            .and_then(|o| o.reason.clone())
    };
    assert_eq!(reason("net-missing").as_deref(), Some("selector_not_found"));
    assert_eq!(reason("net-twin").as_deref(), Some("ambiguous_selector"));
    assert_eq!(reason("net-gone").as_deref(), Some("route_unreachable"));
    assert!(report.outcomes.iter().all(|o| o.status == OutcomeStatus::CoverageGap));
    assert_eq!(report.truth.truth_state, TruthState::Incomplete);
    assert_eq!(report.truth.confidence, ConfidenceLevel::Medium);
    assert_eq!(report.truth.reason, "coverage_below_threshold");
}

#[tokio::test(start_paused = true)]
async fn test_budget_exhaustion_is_never_success() {
    let site = home_site(
        PageModel::new("Home")
            .with_interaction(button("button#a"))
            .with_interaction(button("button#b")),
    )
    .script("button#a", vec![Effect::Request { url: "/api/submit".into(), status: 200 }])
    .script("button#b", vec![Effect::Request { url: "/api/submit".into(), status: 200 }]);
    let config = ScanConfig::default().with_budget(Budget {
        max_scan_duration_ms: 500,
        ..Default::default()
    });

    let report = scan_with(
        config,
        site,
        vec![
            submit_expectation("net-a", "button#a"),
            submit_expectation("net-b", "button#b"),
        ],
    )
    .await;

    assert_eq!(report.outcomes[0].status, OutcomeStatus::Verified);
    assert_eq!(report.outcomes[1].reason.as_deref(), Some("budget_exhausted"));
    assert!(report.findings.is_empty());
    assert!(report.warnings.contains(&Warning::ScanBudgetExceeded));
    assert_eq!(report.truth.truth_state, TruthState::Incomplete);
    assert_eq!(report.truth.reason, "budget_exceeded");
}

#[tokio::test(start_paused = true)]
async fn test_lost_session_forces_low_incomplete() {
    let site = home_site(
        PageModel::new("Home")
            .with_interaction(button("button#boom"))
            .with_interaction(button("button#save")),
    )
    .script("button#boom", vec![Effect::Crash]);

    let report = scan(
        site,
        vec![
            submit_expectation("net-boom", "button#boom"),
            submit_expectation("net-save", "button#save"),
        ],
    )
    .await;

    assert!(report
        .outcomes
        .iter()
        .all(|o| o.reason.as_deref() == Some("session_lost")));
    assert_eq!(report.truth.truth_state, TruthState::Incomplete);
    assert_eq!(report.truth.confidence, ConfidenceLevel::Low);
    assert_eq!(report.truth.reason, "infrastructure_failure");
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_start_page_is_incomplete() {
    let report = scan(ScriptedSite::new(), vec![submit_expectation("net-1", "button#save")]).await;
    assert_eq!(report.truth.truth_state, TruthState::Incomplete);
    assert_eq!(report.truth.confidence, ConfidenceLevel::Low);
    assert_eq!(report.outcomes[0].reason.as_deref(), Some("route_unreachable"));
}

#[tokio::test(start_paused = true)]
async fn test_repeated_scans_emit_identical_artifacts() {
    let site = || {
        home_site(
            PageModel::new("Home")
                .with_interaction(button("button#save"))
                .with_interaction(Interaction::new(InteractionKind::Link, "a#orders", HOME).with_href("/orders"))
                .with_link("/docs"),
        )
        .page(
            "http://app.test/docs",
            PageModel::new("Docs").with_interaction(button("button#copy")),
        )
        .script("button#save", vec![])
        .script("a#orders", vec![])
    };
    let expectations = || vec![submit_expectation("net-1", "button#save")];

    let first = scan(site(), expectations()).await;
    let second = scan(site(), expectations()).await;

    let artifacts = |r: &ScanReport| {
        serde_json::to_string(&(&r.traces, &r.findings, &r.expectations, &r.outcomes, &r.truth)).unwrap()
    };
    assert_eq!(artifacts(&first), artifacts(&second));
}

#[tokio::test(start_paused = true)]
async fn test_interaction_cap_also_bounds_proven_windows() {
    let mut model = PageModel::new("Home")
        .with_interaction(Interaction::new(InteractionKind::Form, "form#f", HOME));
    let mut selectors = Vec::new();
    for i in 0..3 {
        let selector = format!("button#b{i}");
        model = model.with_interaction(button(&selector));
        selectors.push(selector);
    }
    let mut site = home_site(model);
    for selector in &selectors {
        site = site.script(
            selector.clone(),
            vec![Effect::Request {
                url: "/api/submit".into(),
                status: 200,
            }],
        );
    }
    let expectations = selectors
        .iter()
        .enumerate()
        .map(|(i, selector)| submit_expectation(&format!("net-b{i}"), selector))
        .collect();
    let config = ScanConfig::default().with_budget(Budget {
        max_total_interactions: 1,
        ..Default::default()
    });

    let mut page = ScriptedPage::new(site);
    let report = Scan::new(config)
        .unwrap()
        .run(&mut page, HOME, expectations)
        .await;

    assert_eq!(page.performed().len(), 1);
    assert_eq!(report.coverage.interactions_executed, 1);
    assert_eq!(report.traces.len(), 1);
    assert_eq!(report.outcomes[0].status, OutcomeStatus::Verified);
    assert!(report.outcomes[1..]
        .iter()
        .all(|o| o.reason.as_deref() == Some("budget_exhausted")));
    assert!(report.warnings.contains(&Warning::InteractionsCapped));
    assert_eq!(report.truth.truth_state, TruthState::Incomplete);
    assert_eq!(report.truth.reason, "coverage_below_threshold");
}

#[tokio::test(start_paused = true)]
async fn test_hung_click_is_a_gap_not_a_finding() {
    let site = home_site(PageModel::new("Home").with_interaction(button("button#save")))
        .script("button#save", vec![Effect::Hang]);

    let report = scan(site, vec![submit_expectation("net-1", "button#save")]).await;

    assert!(report.findings.is_empty());
    assert_eq!(report.traces.len(), 1);
    assert_eq!(report.traces[0].terminal, TerminalState::Timeout);
    assert_eq!(report.outcomes[0].status, OutcomeStatus::CoverageGap);
    assert_eq!(report.outcomes[0].reason.as_deref(), Some("action_timed_out"));
    assert_eq!(report.truth.truth_state, TruthState::Incomplete);
}
