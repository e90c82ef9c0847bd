use std::collections::HashSet;

use serde::Deserialize;

use crate::types::{
    Budget, BudgetError, Expectation, ExpectationKind, ExpectationTarget, SourceRef, Strength,
};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expectation '{id}' is PROVEN but carries neither sourceRef nor evidence.source")]
    UnprovenExpectation { id: String },

    #[error("Expectation '{id}' of type '{kind}' has no target")]
    MissingTarget { id: String, kind: ExpectationKind },

    #[error("Duplicate expectation id '{id}'")]
    DuplicateId { id: String },

    #[error("Invalid budget: {0}")]
    Budget(#[from] BudgetError),
}

/// A source reference as it appears on the wire: an object or a `file:line:col` string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSource {
    Structured(SourceRef),
    Text(String),
}

impl RawSource {
    fn resolve(self) -> Option<SourceRef> {
        match self {
            RawSource::Structured(r) if !r.file.trim().is_empty() => Some(r),
            RawSource::Structured(_) => None,
            RawSource::Text(s) => SourceRef::parse(&s),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawEvidence {
    #[serde(default)]
    source: Option<RawSource>,
}

/// Wire shape of one expectation record emitted by source analysis.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExpectation {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    kind: ExpectationKind,
    #[serde(default = "default_strength")]
    strength: Strength,
    #[serde(default, alias = "path")]
    target_path: Option<String>,
    #[serde(default, alias = "targetUrl")]
    url: Option<String>,
    #[serde(default)]
    state_key: Option<String>,
    #[serde(default)]
    source_ref: Option<RawSource>,
    #[serde(default)]
    evidence: Option<RawEvidence>,
    #[serde(default)]
    selector_hint: Option<String>,
    #[serde(default)]
    page: Option<String>,
}

fn default_strength() -> Strength {
    Strength::Proven
}

/// Parse and validate the expectation list produced by source analysis.
///
/// PROVEN entries must carry `sourceRef` or `evidence.source`: that is what
/// keeps a finding from ever being reported without proof.
pub fn parse_expectations(json: &str) -> Result<Vec<Expectation>, ParseError> {
    let raw: Vec<RawExpectation> = serde_json::from_str(json)?;
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());

    for (index, r) in raw.into_iter().enumerate() {
        let id = r
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("exp-{index:04}"));
        if !seen.insert(id.clone()) {
            return Err(ParseError::DuplicateId { id });
        }

        let source = r
            .source_ref
            .and_then(RawSource::resolve)
            .or_else(|| r.evidence.and_then(|e| e.source).and_then(RawSource::resolve));
        if r.strength == Strength::Proven && source.is_none() {
            return Err(ParseError::UnprovenExpectation { id });
        }

        let target = match r.kind {
            ExpectationKind::Navigation => r.target_path.map(ExpectationTarget::Path),
            ExpectationKind::NetworkAction => r.url.map(ExpectationTarget::Url),
            ExpectationKind::StateAction => r.state_key.map(ExpectationTarget::StateKey),
            ExpectationKind::ValidationBlock => Some(ExpectationTarget::Block),
        }
        .filter(|t| t.value().map_or(true, |v| !v.trim().is_empty()))
        .ok_or_else(|| ParseError::MissingTarget {
            id: id.clone(),
            kind: r.kind,
        })?;

        out.push(Expectation {
            id,
            kind: r.kind,
            strength: r.strength,
            target,
            source,
            selector_hint: r.selector_hint,
            page: r.page,
        });
    }

    Ok(out)
}

/// Parse a partial budget override; absent fields keep their defaults.
pub fn parse_budget(json: &str) -> Result<Budget, ParseError> {
    let budget: Budget = serde_json::from_str(json)?;
    budget.validate()?;
    Ok(budget)
}
