use hush_explore::origin::{is_external, normalize_path, resolve};
use hush_ir::trace::{TerminalState, Trace};
use hush_ir::types::{Expectation, ExpectationKind, ExpectationTarget, SourceRef};

use crate::matcher::action_unconfirmed;

/// Derive a weak OBSERVED expectation from what a trace shows.
///
/// Tried in order: a declared internal href or data-href, an observed URL
/// change, the first observed request, visible validation feedback with no
/// request and no URL change, and the first changed state key. Blocked
/// traces and actions that never completed derive nothing.
///
/// The synthesized source reference is the page URL and the element's DOM
/// index, which keeps derived expectations in a stable canonical order.
pub fn derive_observed(trace: &Trace) -> Option<Expectation> {
    if trace.terminal == TerminalState::ExternalBlocked || action_unconfirmed(trace) {
        return None;
    }

    let interaction = &trace.interaction;
    let url_changed = trace.url_changed() || trace.sensors.navigation.url_changed;
    let network = &trace.sensors.network;

    let declared = interaction
        .declared_target()
        .filter(|href| !is_external(&trace.before.url, href))
        .and_then(|href| resolve(&trace.before.url, href))
        .map(|url| normalize_path(url.as_str()));

    let (kind, target) = if let Some(path) = declared {
        (ExpectationKind::Navigation, ExpectationTarget::Path(path))
    } else if url_changed {
        (
            ExpectationKind::Navigation,
            ExpectationTarget::Path(normalize_path(&trace.after.url)),
        )
    } else if let Some(url) = &network.first_request_url {
        (ExpectationKind::NetworkAction, ExpectationTarget::Url(url.clone()))
    } else if trace.sensors.ui_signal.validation_appeared && network.total_requests == 0 {
        (ExpectationKind::ValidationBlock, ExpectationTarget::Block)
    } else if let Some(key) = trace.sensors.state.changed_keys.first() {
        (ExpectationKind::StateAction, ExpectationTarget::StateKey(key.clone()))
    } else {
        return None;
    };

    let source = SourceRef::new(interaction.page_url.clone(), interaction.dom_index, 0);
    Some(
        Expectation::observed(format!("obs-{}", trace.id), kind, target, source)
            .with_selector(interaction.selector.clone())
            .on_page(interaction.page_url.clone()),
    )
}
