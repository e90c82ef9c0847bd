use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ── Expectations ─────────────────────────────────────────────────────

/// What kind of effect an expectation claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectationKind {
    Navigation,
    NetworkAction,
    ValidationBlock,
    StateAction,
}

impl ExpectationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpectationKind::Navigation => "navigation",
            ExpectationKind::NetworkAction => "network_action",
            ExpectationKind::ValidationBlock => "validation_block",
            ExpectationKind::StateAction => "state_action",
        }
    }
}

impl fmt::Display for ExpectationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evidentiary strength of an expectation.
///
/// PROVEN comes from source analysis and carries a source reference.
/// OBSERVED is derived post-hoc from a trace and is never upgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strength {
    Proven,
    Observed,
}

/// The type-specific target an expectation points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExpectationTarget {
    /// A route path for navigation expectations.
    Path(String),
    /// A request URL (or URL fragment) for network expectations.
    Url(String),
    /// An application-state key for state expectations.
    StateKey(String),
    /// Validation blocks have no target beyond the interaction itself.
    Block,
}

impl ExpectationTarget {
    pub fn value(&self) -> Option<&str> {
        match self {
            ExpectationTarget::Path(v)
            | ExpectationTarget::Url(v)
            | ExpectationTarget::StateKey(v) => Some(v),
            ExpectationTarget::Block => None,
        }
    }
}

/// Location in application source that proves an expectation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub file: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

impl SourceRef {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// Parse `file:line:col`, `file:line` or a bare `file`.
    ///
    /// Only trailing numeric segments are consumed, so Windows drive letters
    /// and URL schemes survive intact.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let mut numbers = Vec::new();
        let mut rest = raw;
        while numbers.len() < 2 {
            match rest.rsplit_once(':') {
                Some((head, tail)) if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => {
                    numbers.push(tail.parse::<u32>().ok()?);
                    rest = head;
                }
                _ => break,
            }
        }
        if rest.is_empty() {
            return None;
        }
        let (line, column) = match numbers.as_slice() {
            [] => (0, 0),
            [line] => (*line, 0),
            [column, line, ..] => (*line, *column),
        };
        Some(Self::new(rest, line, column))
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A claim of effect. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expectation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ExpectationKind,
    pub strength: Strength,
    pub target: ExpectationTarget,
    /// Source reference. Required for PROVEN, synthesized for OBSERVED.
    #[serde(default)]
    pub source: Option<SourceRef>,
    #[serde(default)]
    pub selector_hint: Option<String>,
    /// The page (URL or path) on which the interaction is claimed to live.
    #[serde(default)]
    pub page: Option<String>,
}

impl Expectation {
    pub fn proven(
        id: impl Into<String>,
        kind: ExpectationKind,
        target: ExpectationTarget,
        source: SourceRef,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            strength: Strength::Proven,
            target,
            source: Some(source),
            selector_hint: None,
            page: None,
        }
    }

    pub fn observed(
        id: impl Into<String>,
        kind: ExpectationKind,
        target: ExpectationTarget,
        source: SourceRef,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            strength: Strength::Observed,
            target,
            source: Some(source),
            selector_hint: None,
            page: None,
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector_hint = Some(selector.into());
        self
    }

    pub fn on_page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    pub fn is_proven(&self) -> bool {
        self.strength == Strength::Proven
    }
}

// ── Interactions ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Link,
    Button,
    Form,
    Input,
    Other,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Link => "link",
            InteractionKind::Button => "button",
            InteractionKind::Form => "form",
            InteractionKind::Input => "input",
            InteractionKind::Other => "other",
        }
    }
}

/// A discovered actionable element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    #[serde(rename = "type")]
    pub kind: InteractionKind,
    pub selector: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub data_href: Option<String>,
    #[serde(default)]
    pub form_action: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// Position in document order on its page.
    #[serde(default)]
    pub dom_index: u32,
    /// False for off-screen or hidden elements.
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// URL of the page the element was discovered on.
    #[serde(default)]
    pub page_url: String,
}

fn default_visible() -> bool {
    true
}

impl Interaction {
    pub fn new(kind: InteractionKind, selector: impl Into<String>, page_url: impl Into<String>) -> Self {
        Self {
            kind,
            selector: selector.into(),
            label: String::new(),
            href: None,
            data_href: None,
            form_action: None,
            role: None,
            dom_index: 0,
            visible: true,
            page_url: page_url.into(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    pub fn with_data_href(mut self, href: impl Into<String>) -> Self {
        self.data_href = Some(href.into());
        self
    }

    pub fn with_form_action(mut self, action: impl Into<String>) -> Self {
        self.form_action = Some(action.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn at_index(mut self, dom_index: u32) -> Self {
        self.dom_index = dom_index;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// The navigation target this element declares, if any.
    pub fn declared_target(&self) -> Option<&str> {
        self.href.as_deref().or(self.data_href.as_deref())
    }
}

// ── Budget ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BudgetError {
    #[error("budget field '{field}' must be greater than zero")]
    Zero { field: &'static str },

    #[error("settle sample offsets must be strictly increasing: {offsets:?}")]
    SettleOffsets { offsets: [u64; 3] },
}

/// Immutable numeric caps for one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Budget {
    /// Wall-clock cap for the whole scan. Checked before each interaction.
    pub max_scan_duration_ms: u64,
    /// Deadline for a post-action page transition.
    pub navigation_timeout_ms: u64,
    /// Deadline for the click/fill/submit itself.
    pub interaction_timeout_ms: u64,
    /// Deadline for the whole settle-sampling phase.
    pub settle_timeout_ms: u64,
    pub max_total_interactions: usize,
    pub max_unique_urls: usize,
    /// Page-visit cap for discovery.
    pub max_pages: usize,
    /// Offsets after the action at which the three DOM settle samples are taken.
    pub settle_sample_offsets_ms: [u64; 3],
    pub loading_poll_interval_ms: u64,
    /// A loading indicator still present after this long is unresolved.
    pub loading_timeout_ms: u64,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_scan_duration_ms: 300_000, // 5 minutes
            navigation_timeout_ms: 15_000,
            interaction_timeout_ms: 10_000,
            settle_timeout_ms: 5_000,
            max_total_interactions: 50,
            max_unique_urls: 50,
            max_pages: 20,
            settle_sample_offsets_ms: [200, 500, 1_000],
            loading_poll_interval_ms: 100,
            loading_timeout_ms: 3_000,
        }
    }
}

impl Budget {
    pub fn validate(&self) -> Result<(), BudgetError> {
        let fields: [(&'static str, u64); 9] = [
            ("maxScanDurationMs", self.max_scan_duration_ms),
            ("navigationTimeoutMs", self.navigation_timeout_ms),
            ("interactionTimeoutMs", self.interaction_timeout_ms),
            ("settleTimeoutMs", self.settle_timeout_ms),
            ("maxTotalInteractions", self.max_total_interactions as u64),
            ("maxUniqueUrls", self.max_unique_urls as u64),
            ("maxPages", self.max_pages as u64),
            ("loadingPollIntervalMs", self.loading_poll_interval_ms),
            ("loadingTimeoutMs", self.loading_timeout_ms),
        ];
        for (field, value) in fields {
            if value == 0 {
                return Err(BudgetError::Zero { field });
            }
        }
        let [a, b, c] = self.settle_sample_offsets_ms;
        if !(a < b && b < c) {
            return Err(BudgetError::SettleOffsets {
                offsets: self.settle_sample_offsets_ms,
            });
        }
        Ok(())
    }

    pub fn scan_duration(&self) -> Duration {
        Duration::from_millis(self.max_scan_duration_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn interaction_timeout(&self) -> Duration {
        Duration::from_millis(self.interaction_timeout_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    pub fn loading_poll_interval(&self) -> Duration {
        Duration::from_millis(self.loading_poll_interval_ms)
    }

    pub fn loading_timeout(&self) -> Duration {
        Duration::from_millis(self.loading_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_ref_parse_full() {
        let r = SourceRef::parse("src/App.jsx:42:7").unwrap();
        assert_eq!(r, SourceRef::new("src/App.jsx", 42, 7));
    }

    #[test]
    fn test_source_ref_parse_line_only() {
        let r = SourceRef::parse("src/App.jsx:42").unwrap();
        assert_eq!(r.line, 42);
        assert_eq!(r.column, 0);
    }

    #[test]
    fn test_source_ref_parse_keeps_drive_letter() {
        let r = SourceRef::parse("C:\\app\\main.js:3:1").unwrap();
        assert_eq!(r.file, "C:\\app\\main.js");
        assert_eq!(r.line, 3);
    }

    #[test]
    fn test_source_ref_parse_empty() {
        assert!(SourceRef::parse("   ").is_none());
    }

    #[test]
    fn test_default_budget_is_valid() {
        assert!(Budget::default().validate().is_ok());
    }

    #[test]
    fn test_budget_rejects_zero_cap() {
        let budget = Budget {
            max_total_interactions: 0,
            ..Default::default()
        };
        assert_eq!(
            budget.validate(),
            Err(BudgetError::Zero {
                field: "maxTotalInteractions"
            })
        );
    }

    #[test]
    fn test_budget_rejects_unordered_offsets() {
        let budget = Budget {
            settle_sample_offsets_ms: [300, 300, 900],
            ..Default::default()
        };
        assert!(matches!(
            budget.validate(),
            Err(BudgetError::SettleOffsets { .. })
        ));
    }

    #[test]
    fn test_interaction_declared_target_prefers_href() {
        let i = Interaction::new(InteractionKind::Link, "a#x", "http://app/")
            .with_href("/a")
            .with_data_href("/b");
        assert_eq!(i.declared_target(), Some("/a"));
    }
}
