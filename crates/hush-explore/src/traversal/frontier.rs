use std::collections::{HashSet, VecDeque};
use std::fmt;

use hush_browser::{Page, PageError};
use hush_ir::types::{Budget, Interaction};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::origin::{is_external, normalize_url, resolve};

/// Non-fatal degradations surfaced alongside the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Warning {
    InteractionsCapped,
    UrlsCapped,
    PagesCapped,
    ScanBudgetExceeded,
}

impl Warning {
    pub fn as_str(&self) -> &'static str {
        match self {
            Warning::InteractionsCapped => "INTERACTIONS_CAPPED",
            Warning::UrlsCapped => "URLS_CAPPED",
            Warning::PagesCapped => "PAGES_CAPPED",
            Warning::ScanBudgetExceeded => "SCAN_BUDGET_EXCEEDED",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coverage counters reported with every scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageStats {
    pub candidates_discovered: usize,
    pub candidates_selected: usize,
    pub cap: usize,
    pub capped: bool,
    pub pages_visited: usize,
    pub pages_discovered: usize,
    pub urls_capped: bool,
    pub pages_capped: bool,
}

/// Breadth-first queue of same-origin pages.
///
/// `max_unique_urls` bounds how many distinct URLs may ever be enqueued;
/// `max_pages` bounds how many are handed out for visiting.
#[derive(Debug, Clone)]
pub struct Frontier {
    origin: String,
    queue: VecDeque<String>,
    seen: HashSet<String>,
    visited: usize,
    max_unique_urls: usize,
    max_pages: usize,
    urls_capped: bool,
    pages_capped: bool,
}

impl Frontier {
    pub fn new(start_url: &str, budget: &Budget) -> Self {
        let start = normalize_url(start_url).unwrap_or_else(|| start_url.to_string());
        let mut seen = HashSet::new();
        seen.insert(start.clone());
        Self {
            origin: start.clone(),
            queue: VecDeque::from([start]),
            seen,
            visited: 0,
            max_unique_urls: budget.max_unique_urls,
            max_pages: budget.max_pages,
            urls_capped: false,
            pages_capped: false,
        }
    }

    /// Next page to visit, or `None` when the queue is empty or the page cap is hit.
    pub fn next_page(&mut self) -> Option<String> {
        if self.visited >= self.max_pages {
            if !self.queue.is_empty() && !self.pages_capped {
                warn!(max_pages = self.max_pages, pending = self.queue.len(), "page visit cap reached");
                self.pages_capped = true;
            }
            return None;
        }
        let next = self.queue.pop_front()?;
        self.visited += 1;
        Some(next)
    }

    /// Enqueue same-origin links found on `page_url`. Returns how many were new.
    pub fn enqueue_links(&mut self, page_url: &str, links: &[String]) -> usize {
        let mut added = 0;
        for href in links {
            if is_external(&self.origin, href) {
                continue;
            }
            let Some(url) = resolve(page_url, href).and_then(|u| normalize_url(u.as_str())) else {
                continue;
            };
            if self.seen.contains(&url) {
                continue;
            }
            if self.seen.len() >= self.max_unique_urls {
                if !self.urls_capped {
                    warn!(max_unique_urls = self.max_unique_urls, "unique URL cap reached");
                    self.urls_capped = true;
                }
                break;
            }
            self.seen.insert(url.clone());
            self.queue.push_back(url);
            added += 1;
        }
        added
    }

    pub fn pages_visited(&self) -> usize {
        self.visited
    }

    pub fn pages_discovered(&self) -> usize {
        self.seen.len()
    }

    pub fn urls_capped(&self) -> bool {
        self.urls_capped
    }

    pub fn pages_capped(&self) -> bool {
        self.pages_capped
    }
}

/// One visited page and what was found on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredPage {
    pub url: String,
    pub interactions: Vec<Interaction>,
}

/// Everything the discovery pass produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discovery {
    /// Pages in visit order.
    pub pages: Vec<DiscoveredPage>,
    /// Pages that were queued but failed to load, with a reason code.
    pub unreachable: Vec<(String, String)>,
    pub stats: CoverageStats,
    pub warnings: Vec<Warning>,
}

impl Discovery {
    /// All candidates in discovery order: page visit order, then DOM order.
    pub fn candidates(&self) -> Vec<Interaction> {
        self.pages
            .iter()
            .flat_map(|p| p.interactions.iter().cloned())
            .collect()
    }

    pub fn is_unreachable(&self, url: &str) -> bool {
        let url = normalize_url(url).unwrap_or_else(|| url.to_string());
        self.unreachable.iter().any(|(u, _)| *u == url)
    }
}

/// Breadth-first discovery from `start_url`.
///
/// A failure to load the start page, or a lost session anywhere, is returned
/// as an error. Other page load failures are recorded as unreachable pages.
pub async fn discover(
    page: &mut dyn Page,
    start_url: &str,
    budget: &Budget,
) -> Result<Discovery, PageError> {
    let mut frontier = Frontier::new(start_url, budget);
    let mut discovery = Discovery::default();
    let mut first = true;

    while let Some(url) = frontier.next_page() {
        if let Err(err) = page.goto(&url).await {
            if first || err.is_session_fatal() {
                return Err(err);
            }
            warn!(url = %url, error = %err, "page unreachable during discovery");
            discovery.unreachable.push((url, "page_load_failed".to_string()));
            continue;
        }
        first = false;

        let landed = page.url();
        let interactions = match page.discover_interactions().await {
            Ok(found) => found,
            Err(err) if err.is_session_fatal() => return Err(err),
            Err(err) => {
                warn!(url = %landed, error = %err, "interaction discovery failed");
                discovery.unreachable.push((url, "discovery_failed".to_string()));
                continue;
            }
        };
        let links = match page.discover_links().await {
            Ok(links) => links,
            Err(err) if err.is_session_fatal() => return Err(err),
            Err(err) => {
                debug!(url = %landed, error = %err, "link discovery failed");
                Vec::new()
            }
        };
        let added = frontier.enqueue_links(&landed, &links);
        debug!(url = %landed, interactions = interactions.len(), new_links = added, "page discovered");
        discovery.pages.push(DiscoveredPage {
            url: landed,
            interactions,
        });
    }

    discovery.stats = CoverageStats {
        candidates_discovered: discovery.pages.iter().map(|p| p.interactions.len()).sum(),
        pages_visited: frontier.pages_visited(),
        pages_discovered: frontier.pages_discovered(),
        urls_capped: frontier.urls_capped(),
        pages_capped: frontier.pages_capped(),
        ..Default::default()
    };
    if frontier.urls_capped() {
        discovery.warnings.push(Warning::UrlsCapped);
    }
    if frontier.pages_capped() {
        discovery.warnings.push(Warning::PagesCapped);
    }
    info!(
        pages = discovery.stats.pages_visited,
        candidates = discovery.stats.candidates_discovered,
        "discovery complete"
    );
    Ok(discovery)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget(max_unique_urls: usize, max_pages: usize) -> Budget {
        Budget {
            max_unique_urls,
            max_pages,
            ..Default::default()
        }
    }

    #[test]
    fn test_bfs_order_and_dedup() {
        let mut f = Frontier::new("http://app.test/", &budget(50, 20));
        assert_eq!(f.next_page().as_deref(), Some("http://app.test/"));
        let links = vec![
            "/a".to_string(),
            "/b#frag".to_string(),
            "/a/".to_string(),
            "https://elsewhere.test/".to_string(),
        ];
        assert_eq!(f.enqueue_links("http://app.test/", &links), 2);
        assert_eq!(f.next_page().as_deref(), Some("http://app.test/a"));
        assert_eq!(f.next_page().as_deref(), Some("http://app.test/b"));
        assert_eq!(f.next_page(), None);
    }

    #[test]
    fn test_unique_url_cap() {
        let mut f = Frontier::new("http://app.test/", &budget(2, 20));
        let links: Vec<String> = (0..5).map(|i| format!("/p{i}")).collect();
        assert_eq!(f.enqueue_links("http://app.test/", &links), 1);
        assert!(f.urls_capped());
        assert_eq!(f.pages_discovered(), 2);
    }

    #[test]
    fn test_page_cap() {
        let mut f = Frontier::new("http://app.test/", &budget(50, 1));
        f.next_page();
        f.enqueue_links("http://app.test/", &["/x".to_string()]);
        assert_eq!(f.next_page(), None);
        assert!(f.pages_capped());
    }
}
