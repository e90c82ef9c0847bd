use hush_ir::types::{Interaction, InteractionKind};
use serde::{Deserialize, Serialize};

use super::origin::is_external;

/// Lowest tier; off-screen, external and anything unclassified.
pub const LOW_PRIORITY_TIER: u8 = 5;

/// Selection tier of a candidate. Lower runs first.
///
/// forms (0) > internal links (1) > buttons with an explicit navigation
/// attribute (2) > ARIA-role buttons (3) > generic buttons (4) > the rest (5).
pub fn priority_tier(interaction: &Interaction) -> u8 {
    if !interaction.visible {
        return LOW_PRIORITY_TIER;
    }
    let role_button = interaction.role.as_deref() == Some("button");
    match interaction.kind {
        InteractionKind::Form => 0,
        InteractionKind::Link => match interaction.href.as_deref() {
            Some(href) if !is_external(&interaction.page_url, href) => 1,
            _ => LOW_PRIORITY_TIER,
        },
        InteractionKind::Button if interaction.data_href.is_some() => 2,
        _ if role_button => 3,
        InteractionKind::Button => 4,
        InteractionKind::Input | InteractionKind::Other => LOW_PRIORITY_TIER,
    }
}

/// Result of capping the candidate list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// Selected candidates in priority order (tier, then discovery order).
    pub selected: Vec<Interaction>,
    pub candidates_discovered: usize,
    pub cap: usize,
    pub capped: bool,
    /// Discovery positions of `selected`, parallel to it.
    #[serde(skip)]
    positions: Vec<usize>,
}

impl Selection {
    /// Selected candidates in discovery order (page order, then DOM order),
    /// which is the order they are executed in.
    pub fn in_execution_order(&self) -> Vec<Interaction> {
        let mut paired: Vec<(usize, &Interaction)> =
            self.positions.iter().copied().zip(&self.selected).collect();
        paired.sort_by_key(|(position, _)| *position);
        paired.into_iter().map(|(_, i)| i.clone()).collect()
    }

    /// Candidates that were discovered but not selected.
    pub fn dropped(&self) -> usize {
        self.candidates_discovered - self.selected.len()
    }
}

/// Deterministically pick at most `cap` candidates.
///
/// `candidates` must already be in discovery order; that order is the stable
/// tie-break inside a tier.
pub fn select_interactions(candidates: &[Interaction], cap: usize) -> Selection {
    let mut ranked: Vec<(u8, usize)> = candidates
        .iter()
        .enumerate()
        .map(|(position, i)| (priority_tier(i), position))
        .collect();
    ranked.sort_unstable();
    ranked.truncate(cap);

    Selection {
        selected: ranked
            .iter()
            .map(|&(_, position)| candidates[position].clone())
            .collect(),
        candidates_discovered: candidates.len(),
        cap,
        capped: candidates.len() > cap,
        positions: ranked.into_iter().map(|(_, position)| position).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "http://app.test/";

    fn at(kind: InteractionKind, index: u32) -> Interaction {
        Interaction::new(kind, format!("#e{index}"), PAGE).at_index(index)
    }

    #[test]
    fn test_tiers() {
        assert_eq!(priority_tier(&at(InteractionKind::Form, 0)), 0);
        assert_eq!(priority_tier(&at(InteractionKind::Link, 0).with_href("/a")), 1);
        assert_eq!(
            priority_tier(&at(InteractionKind::Link, 0).with_href("https://elsewhere.test/")),
            LOW_PRIORITY_TIER
        );
        assert_eq!(priority_tier(&at(InteractionKind::Button, 0).with_data_href("/x")), 2);
        assert_eq!(priority_tier(&at(InteractionKind::Other, 0).with_role("button")), 3);
        assert_eq!(priority_tier(&at(InteractionKind::Button, 0)), 4);
        assert_eq!(priority_tier(&at(InteractionKind::Form, 0).hidden()), LOW_PRIORITY_TIER);
    }

    #[test]
    fn test_uncapped_keeps_everything() {
        let candidates: Vec<_> = (0..3).map(|i| at(InteractionKind::Button, i)).collect();
        let selection = select_interactions(&candidates, 10);
        assert!(!selection.capped);
        assert_eq!(selection.selected.len(), 3);
        assert_eq!(selection.dropped(), 0);
    }

    #[test]
    fn test_execution_order_restores_discovery_order() {
        let candidates = vec![
            at(InteractionKind::Link, 0).with_href("/a"),
            at(InteractionKind::Button, 1),
            at(InteractionKind::Form, 2),
        ];
        let selection = select_interactions(&candidates, 2);
        let priority: Vec<_> = selection.selected.iter().map(|i| i.dom_index).collect();
        assert_eq!(priority, vec![2, 0]);
        let execution: Vec<_> = selection
            .in_execution_order()
            .iter()
            .map(|i| i.dom_index)
            .collect();
        assert_eq!(execution, vec![0, 2]);
        assert_eq!(selection.dropped(), 1);
    }
}
