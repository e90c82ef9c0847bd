use hush_browser::{Effect, Page, PageModel, ScriptedPage, ScriptedSite};
use hush_explore::{discover, InteractionRunner, RetryPolicy, RunnerError, RunnerState, TransientSignature};
use hush_ir::trace::{Phase, TerminalState};
use hush_ir::types::{Budget, Interaction, InteractionKind};

const HOME: &str = "http://app.test/";

fn button(selector: &str) -> Interaction {
    Interaction::new(InteractionKind::Button, selector, HOME)
}

fn site_with(selector: &str, effects: Vec<Effect>) -> ScriptedSite {
    ScriptedSite::new()
        .page(
            HOME,
            PageModel::new("Home")
                .with_interaction(button(selector))
                .with_interaction(
                    Interaction::new(InteractionKind::Link, "a#out", HOME)
                        .with_href("https://partner.test/promo"),
                ),
        )
        .page("http://app.test/next", PageModel::new("Next"))
        .script(selector, effects)
}

async fn run(site: ScriptedSite, interaction: Interaction) -> (ScriptedPage, Result<hush_explore::RunOutput, RunnerError>) {
    let mut page = ScriptedPage::new(site);
    page.goto(HOME).await.unwrap();
    let mut runner = InteractionRunner::new(&Budget::default(), RetryPolicy::default());
    let out = runner.run(&mut page, &interaction, "trace-0001").await;
    (page, out)
}

#[tokio::test(start_paused = true)]
async fn test_successful_window_walks_every_state() {
    let (_, out) = run(
        site_with(
            "button#save",
            vec![Effect::Request {
                url: "/api/submit".into(),
                status: 200,
            }],
        ),
        button("button#save"),
    )
    .await;
    let out = out.unwrap();

    assert_eq!(
        out.states,
        vec![
            RunnerState::Init,
            RunnerState::BeforeCapture,
            RunnerState::SensorsArmed,
            RunnerState::Executing,
            RunnerState::AfterCapture,
            RunnerState::Assembled,
        ]
    );
    let trace = out.trace;
    assert_eq!(trace.terminal, TerminalState::Assembled);
    assert!(trace.before.is_complete());
    assert!(trace.after.is_complete());
    assert_eq!(trace.dom.settle.samples.len(), 3);
    assert!(!trace.dom.settle.dom_changed_during_settle);
    assert_eq!(
        trace.sensors.network.observed_urls,
        vec!["http://app.test/api/submit"]
    );
    assert!(trace.silences.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cross_origin_link_is_blocked_without_navigating() {
    let link = Interaction::new(InteractionKind::Link, "a#out", HOME)
        .with_href("https://partner.test/promo");
    let (page, out) = run(site_with("button#x", vec![]), link).await;
    let out = out.unwrap();

    assert!(out.states.contains(&RunnerState::ExternalBlocked));
    assert!(!out.states.contains(&RunnerState::Executing));
    let trace = out.trace;
    assert_eq!(trace.terminal, TerminalState::ExternalBlocked);
    assert!(trace.policy.external_navigation_blocked);
    assert_eq!(trace.policy.blocked_url.as_deref(), Some("https://partner.test/promo"));
    assert_eq!(trace.before.url, trace.after.url);
    assert!(trace.after.is_complete());
    assert!(!trace.sensors.network.available);
    assert!(page.performed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_in_window_off_origin_navigation_is_reversed() {
    let (page, out) = run(
        site_with("button#sso", vec![Effect::Navigate("https://login.test/".into())]),
        button("button#sso"),
    )
    .await;
    let trace = out.unwrap().trace;

    assert!(trace.policy.external_navigation_blocked);
    assert_eq!(trace.policy.blocked_url.as_deref(), Some("https://login.test/"));
    assert_eq!(trace.after.url, HOME);
    assert_eq!(page.url(), HOME);
    assert_eq!(trace.terminal, TerminalState::ExternalBlocked);
}

#[tokio::test(start_paused = true)]
async fn test_transient_error_is_retried_once() {
    let (_, out) = run(
        site_with(
            "button#flaky",
            vec![Effect::FailTransient {
                times: 1,
                message: "Element is not attached to the DOM".into(),
            }],
        ),
        button("button#flaky"),
    )
    .await;
    let out = out.unwrap();

    assert_eq!(out.trace.terminal, TerminalState::Assembled);
    assert_eq!(out.trace.retries_used, 1);
    assert_eq!(out.retry_events.len(), 1);
    assert_eq!(out.retry_events[0].attempt, 1);
    assert_eq!(
        out.retry_events[0].signature,
        TransientSignature::ElementNotAttached
    );
}

#[tokio::test(start_paused = true)]
async fn test_non_transient_error_fails_immediately() {
    let (page, out) = run(
        site_with("button#bad", vec![Effect::Fail("permission denied".into())]),
        button("button#bad"),
    )
    .await;
    let out = out.unwrap();

    assert!(out.states.contains(&RunnerState::Error));
    assert_eq!(out.trace.terminal, TerminalState::Error);
    assert!(out.trace.policy.execution_error);
    assert_eq!(out.trace.policy.error_phase, Some(Phase::Click));
    assert_eq!(out.trace.policy.reason.as_deref(), Some("element_error"));
    assert_eq!(out.trace.retries_used, 0);
    assert!(out.retry_events.is_empty());
    assert_eq!(page.performed().len(), 1);
    assert!(out.trace.after.is_complete());
}

#[tokio::test(start_paused = true)]
async fn test_hanging_click_times_out_with_uniform_trace() {
    let (_, out) = run(site_with("button#stuck", vec![Effect::Hang]), button("button#stuck")).await;
    let out = out.unwrap();

    assert!(out.states.contains(&RunnerState::Timeout));
    let trace = out.trace;
    assert_eq!(trace.terminal, TerminalState::Timeout);
    assert!(trace.policy.timeout);
    assert_eq!(trace.policy.timeout_phase, Some(Phase::Click));
    assert_eq!(trace.policy.reason.as_deref(), Some("interaction_timeout"));
    assert!(trace.before.is_complete());
    assert!(trace.after.is_complete());
    assert!(trace.sensors.network.available);
    assert!(trace
        .silences
        .iter()
        .any(|s| s.reason == "timeout_truncated_capture"
            && s.subject.as_deref() == Some("trace-0001")));
}

#[tokio::test(start_paused = true)]
async fn test_navigation_that_never_commits_times_out() {
    let (_, out) = run(
        site_with("button#go", vec![Effect::HangNavigation]),
        button("button#go"),
    )
    .await;
    let trace = out.unwrap().trace;
    assert_eq!(trace.policy.timeout_phase, Some(Phase::Navigation));
    assert_eq!(trace.policy.reason.as_deref(), Some("navigation_timeout"));
}

#[tokio::test(start_paused = true)]
async fn test_delayed_mutation_is_caught_by_settle_sampling() {
    let (_, out) = run(
        site_with(
            "button#async",
            vec![Effect::DelayedMutation {
                after_ms: 700,
                fragment: "<p>done</p>".into(),
            }],
        ),
        button("button#async"),
    )
    .await;
    let trace = out.unwrap().trace;
    assert!(trace.dom.settle.dom_changed_during_settle);
    assert!(trace.dom_changed());
}

#[tokio::test(start_paused = true)]
async fn test_crash_escapes_as_session_lost() {
    let (_, out) = run(site_with("button#boom", vec![Effect::Crash]), button("button#boom")).await;
    assert!(matches!(out, Err(RunnerError::SessionLost(_))));
}

#[tokio::test(start_paused = true)]
async fn test_discovery_bfs_with_unreachable_page() {
    let site = ScriptedSite::new()
        .page(
            HOME,
            PageModel::new("Home")
                .with_interaction(button("button#a"))
                .with_link("/docs")
                .with_link("/gone")
                .with_link("https://elsewhere.test/"),
        )
        .page(
            "http://app.test/docs",
            PageModel::new("Docs")
                .with_interaction(button("button#b"))
                .with_link("/"),
        );
    let mut page = ScriptedPage::new(site);

    let discovery = discover(&mut page, HOME, &Budget::default()).await.unwrap();

    let urls: Vec<_> = discovery.pages.iter().map(|p| p.url.as_str()).collect();
    assert_eq!(urls, vec![HOME, "http://app.test/docs"]);
    assert!(discovery.is_unreachable("http://app.test/gone"));
    assert_eq!(discovery.stats.candidates_discovered, 2);
    assert_eq!(discovery.stats.pages_visited, 3);
    assert_eq!(discovery.candidates()[1].page_url, "http://app.test/docs");
}

#[tokio::test(start_paused = true)]
async fn test_discovery_fails_when_start_page_does_not_load() {
    let mut page = ScriptedPage::new(ScriptedSite::new());
    assert!(discover(&mut page, HOME, &Budget::default()).await.is_err());
}
