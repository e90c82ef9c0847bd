//! Canonical ordering of emitted collections.
//!
//! Every ordered collection in a report goes through [`sort_canonical`] so
//! that two runs over the same site produce byte-identical artifacts no
//! matter the discovery order.

use std::cmp::Ordering;

use hush_ir::finding::Finding;
use hush_ir::trace::Trace;
use hush_ir::types::{Expectation, SourceRef};

/// Sort key: source file (case-insensitive), line, column, kind, id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey<'a> {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub kind: &'a str,
    pub id: &'a str,
}

impl<'a> SortKey<'a> {
    pub fn new(source: Option<&SourceRef>, kind: &'a str, id: &'a str) -> Self {
        let (file, line, column) = match source {
            Some(s) => (s.file.to_lowercase(), s.line, s.column),
            None => (String::new(), 0, 0),
        };
        Self {
            file,
            line,
            column,
            kind,
            id,
        }
    }
}

pub trait CanonicalKey {
    fn canonical_key(&self) -> SortKey<'_>;
}

impl CanonicalKey for Expectation {
    fn canonical_key(&self) -> SortKey<'_> {
        SortKey::new(self.source.as_ref(), self.kind.as_str(), &self.id)
    }
}

impl CanonicalKey for Finding {
    fn canonical_key(&self) -> SortKey<'_> {
        SortKey::new(self.source.as_ref(), self.finding_type.as_str(), &self.id)
    }
}

/// Traces have no source reference; the page URL and DOM index stand in,
/// the same way OBSERVED expectations are sourced.
impl CanonicalKey for Trace {
    fn canonical_key(&self) -> SortKey<'_> {
        SortKey {
            file: self.interaction.page_url.to_lowercase(),
            line: self.interaction.dom_index,
            column: 0,
            kind: self.interaction.kind.as_str(),
            id: &self.id,
        }
    }
}

pub fn canonical_cmp<T: CanonicalKey>(a: &T, b: &T) -> Ordering {
    a.canonical_key().cmp(&b.canonical_key())
}

pub fn sort_canonical<T: CanonicalKey>(items: &mut [T]) {
    items.sort_by(|a, b| canonical_cmp(a, b));
}

#[cfg(test)]
mod tests {
    use super::*;
    use hush_ir::types::{ExpectationKind, ExpectationTarget};

    fn nav(id: &str, file: &str, line: u32) -> Expectation {
        Expectation::proven(
            id,
            ExpectationKind::Navigation,
            ExpectationTarget::Path("/".into()),
            SourceRef::new(file, line, 0),
        )
    }

    #[test]
    fn test_file_is_case_insensitive() {
        let mut items = vec![nav("b", "src/b.jsx", 1), nav("a", "SRC/A.jsx", 9)];
        sort_canonical(&mut items);
        assert_eq!(items[0].id, "a");
    }

    #[test]
    fn test_line_before_kind_before_id() {
        let mut items = vec![nav("z", "a.js", 2), nav("y", "a.js", 1), nav("x", "a.js", 2)];
        sort_canonical(&mut items);
        let ids: Vec<_> = items.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["y", "x", "z"]);
    }
}
