use hush_browser::{Effect, Page, PageModel, Probe, ScriptedPage, ScriptedSite};
use hush_ir::finding::{SilenceImpact, SilenceScope};
use hush_ir::trace::{SensorKind, StateMechanism};
use hush_ir::types::{Budget, Interaction, InteractionKind};
use hush_sensors::SensorBank;

const HOME: &str = "http://shop.test/";

fn button(selector: &str) -> Interaction {
    Interaction::new(InteractionKind::Button, selector, HOME)
}

fn site(effects: Vec<Effect>) -> ScriptedSite {
    ScriptedSite::new()
        .page(
            HOME,
            PageModel::new("Shop")
                .with_interaction(button("button#go"))
                .with_state(StateMechanism::StoreSet),
        )
        .page("http://shop.test/done", PageModel::new("Done"))
        .script("button#go", effects)
}

async fn observe(page: &mut ScriptedPage, bank: &mut SensorBank) -> hush_ir::trace::SensorSummaries {
    bank.capture_before(page).await;
    bank.arm(page);
    page.perform(&button("button#go")).await.unwrap();
    bank.disarm(&*page);
    bank.capture_after_and_diff(page).await
}

#[tokio::test(start_paused = true)]
async fn test_all_sensors_report_evidence() {
    let mut page = ScriptedPage::new(site(vec![
        Effect::Request {
            url: "/api/cart".into(),
            status: 500,
        },
        Effect::ConsoleError("boom".into()),
        Effect::UnhandledRejection("nope".into()),
        Effect::SetState {
            key: "cart".into(),
            value: "1".into(),
        },
        Effect::ShowError("Something went wrong".into()),
        Effect::Announce("Cart updated".into()),
    ]));
    page.goto(HOME).await.unwrap();
    let mut bank = SensorBank::new(&Budget::default());

    let s = observe(&mut page, &mut bank).await;

    for kind in SensorKind::ALL {
        assert!(s.is_available(kind), "{kind} should be available");
    }
    assert_eq!(s.network.total_requests, 1);
    assert!(s.network.has_server_error());
    assert_eq!(
        s.network.first_request_url.as_deref(),
        Some("http://shop.test/api/cart")
    );
    assert_eq!(s.console.page_errors, 1);
    assert_eq!(s.console.unhandled_rejections, 1);
    assert_eq!(s.state.changed_keys, vec!["cart"]);
    assert!(s.ui_signal.error_appeared);
    assert_eq!(s.aria.announcements, vec!["Cart updated"]);
    assert!(!s.navigation.url_changed);
    assert_eq!(s.timing.first_feedback_ms, Some(0));
    assert!(bank.take_silences().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_navigation_and_transport_failure() {
    let mut page = ScriptedPage::new(site(vec![
        Effect::RequestFailed {
            url: "/api/ping".into(),
        },
        Effect::Navigate("/done".into()),
    ]));
    page.goto(HOME).await.unwrap();
    let mut bank = SensorBank::new(&Budget::default());

    let s = observe(&mut page, &mut bank).await;

    assert!(s.network.has_transport_failure());
    assert!(s.navigation.url_changed);
    assert_eq!(s.navigation.to_url, "http://shop.test/done");
    assert_eq!(s.navigation.navigations, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_probe_degrades_only_that_sensor() {
    let mut page = ScriptedPage::new(site(vec![Effect::MutateDom("<p>x</p>".into())]));
    page.goto(HOME).await.unwrap();
    page.fail_probe(Probe::Focus);
    let mut bank = SensorBank::new(&Budget::default());

    let s = observe(&mut page, &mut bank).await;

    assert!(!s.focus.available);
    assert!(s.network.available);
    assert!(s.ui_signal.available);
    let silences = bank.take_silences();
    assert_eq!(silences.len(), 1);
    assert_eq!(silences[0].scope, SilenceScope::Sensor(SensorKind::Focus));
    assert_eq!(silences[0].impact, SilenceImpact::Low);
    assert_eq!(silences[0].reason, "capture_before:probe_failed");
}

#[tokio::test(start_paused = true)]
async fn test_loading_polls_until_resolved() {
    let mut page = ScriptedPage::new(site(vec![Effect::Busy { for_ms: 350 }]));
    page.goto(HOME).await.unwrap();
    let mut bank = SensorBank::new(&Budget::default());

    let s = observe(&mut page, &mut bank).await;

    assert!(s.loading.seen_loading);
    assert!(!s.loading.unresolved);
    assert!(s.loading.polls >= 4);
    assert!(s.loading.resolved_after_ms.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_loading_past_timeout_is_unresolved() {
    let mut page = ScriptedPage::new(site(vec![Effect::Busy { for_ms: 60_000 }]));
    page.goto(HOME).await.unwrap();
    let mut bank = SensorBank::new(&Budget::default());

    let s = observe(&mut page, &mut bank).await;

    assert!(s.loading.seen_loading);
    assert!(s.loading.unresolved);
}

#[tokio::test(start_paused = true)]
async fn test_slow_feedback_is_timed() {
    let mut page = ScriptedPage::new(site(vec![
        Effect::Sleep(1_500),
        Effect::MutateDom("<p>late</p>".into()),
    ]));
    page.goto(HOME).await.unwrap();
    let mut bank = SensorBank::new(&Budget::default());

    let s = observe(&mut page, &mut bank).await;

    assert_eq!(s.timing.first_feedback_ms, Some(1_500));
    assert!(s.timing.slow_feedback);
    assert!(!s.timing.freeze_like);
}

#[tokio::test(start_paused = true)]
async fn test_no_feedback_over_long_window_is_freeze_like() {
    let mut page = ScriptedPage::new(site(vec![Effect::Sleep(3_200)]));
    page.goto(HOME).await.unwrap();
    let mut bank = SensorBank::new(&Budget::default());

    let s = observe(&mut page, &mut bank).await;

    assert_eq!(s.timing.first_feedback_ms, None);
    assert!(s.timing.freeze_like);
}

#[tokio::test(start_paused = true)]
async fn test_modal_without_focus() {
    let mut page = ScriptedPage::new(site(vec![Effect::OpenDialog {
        selector: "#confirm".into(),
        take_focus: false,
    }]));
    page.goto(HOME).await.unwrap();
    let mut bank = SensorBank::new(&Budget::default());

    let s = observe(&mut page, &mut bank).await;

    assert!(s.ui_signal.dialog_appeared);
    assert!(s.focus.modal_without_focus);
}

#[test]
fn test_empty_summaries_are_unavailable() {
    let bank = SensorBank::new(&Budget::default());
    let s = bank.empty_summaries();
    assert!(SensorKind::ALL.iter().all(|k| !s.is_available(*k)));
}
