use hush_ir::parse::{parse_budget, parse_expectations, ParseError};
use hush_ir::types::{ExpectationKind, ExpectationTarget, SourceRef, Strength};

#[test]
fn test_parse_all_expectation_kinds() {
    let json = r#"[
        { "id": "nav-1", "type": "navigation", "targetPath": "/about",
          "sourceRef": "src/Nav.jsx:12:4", "selectorHint": "a#about" },
        { "id": "net-1", "type": "network_action", "url": "/api/submit",
          "sourceRef": { "file": "src/Form.jsx", "line": 30, "column": 2 } },
        { "id": "val-1", "type": "validation_block",
          "evidence": { "source": "src/Form.jsx:44" } },
        { "id": "st-1", "type": "state_action", "stateKey": "cart.items",
          "sourceRef": "src/store.js:9:1", "page": "/shop" }
    ]"#;
    let exps = parse_expectations(json).unwrap();
    assert_eq!(exps.len(), 4);

    assert_eq!(exps[0].kind, ExpectationKind::Navigation);
    assert_eq!(exps[0].target, ExpectationTarget::Path("/about".into()));
    assert_eq!(exps[0].source, Some(SourceRef::new("src/Nav.jsx", 12, 4)));
    assert_eq!(exps[0].selector_hint.as_deref(), Some("a#about"));

    assert_eq!(exps[1].target, ExpectationTarget::Url("/api/submit".into()));
    assert_eq!(exps[1].source.as_ref().unwrap().line, 30);

    assert_eq!(exps[2].target, ExpectationTarget::Block);
    assert_eq!(exps[2].source, Some(SourceRef::new("src/Form.jsx", 44, 0)));

    assert_eq!(exps[3].target, ExpectationTarget::StateKey("cart.items".into()));
    assert_eq!(exps[3].page.as_deref(), Some("/shop"));
    assert!(exps.iter().all(|e| e.strength == Strength::Proven));
}

#[test]
fn test_parse_invalid_json() {
    assert!(matches!(
        parse_expectations("not json at all"),
        Err(ParseError::Json(_))
    ));
}

#[test]
fn test_proven_without_source_is_rejected() {
    let json = r#"[{ "id": "nav-1", "type": "navigation", "targetPath": "/about" }]"#;
    match parse_expectations(json) {
        Err(ParseError::UnprovenExpectation { id }) => assert_eq!(id, "nav-1"),
        other => panic!("expected UnprovenExpectation, got {other:?}"),
    }
}

#[test]
fn test_observed_without_source_is_accepted() {
    let json = r#"[{ "id": "o-1", "type": "navigation", "strength": "OBSERVED", "path": "/x" }]"#;
    let exps = parse_expectations(json).unwrap();
    assert_eq!(exps[0].strength, Strength::Observed);
    assert!(exps[0].source.is_none());
}

#[test]
fn test_missing_target_is_rejected() {
    let json = r#"[{ "id": "net-1", "type": "network_action", "sourceRef": "a.js:1:1" }]"#;
    assert!(matches!(
        parse_expectations(json),
        Err(ParseError::MissingTarget { .. })
    ));
}

#[test]
fn test_blank_target_is_rejected() {
    let json = r#"[{ "id": "st-1", "type": "state_action", "stateKey": "  ", "sourceRef": "a.js:1" }]"#;
    assert!(matches!(
        parse_expectations(json),
        Err(ParseError::MissingTarget { .. })
    ));
}

#[test]
fn test_missing_ids_are_assigned_by_position() {
    let json = r#"[
        { "type": "navigation", "targetPath": "/a", "sourceRef": "a.js:1" },
        { "type": "navigation", "targetPath": "/b", "sourceRef": "a.js:2" }
    ]"#;
    let exps = parse_expectations(json).unwrap();
    assert_eq!(exps[0].id, "exp-0000");
    assert_eq!(exps[1].id, "exp-0001");
}

#[test]
fn test_duplicate_ids_are_rejected() {
    let json = r#"[
        { "id": "x", "type": "navigation", "targetPath": "/a", "sourceRef": "a.js:1" },
        { "id": "x", "type": "navigation", "targetPath": "/b", "sourceRef": "a.js:2" }
    ]"#;
    assert!(matches!(
        parse_expectations(json),
        Err(ParseError::DuplicateId { .. })
    ));
}

#[test]
fn test_parse_budget_partial_override() {
    let budget = parse_budget(r#"{ "maxTotalInteractions": 30, "navigationTimeoutMs": 5000 }"#)
        .unwrap();
    assert_eq!(budget.max_total_interactions, 30);
    assert_eq!(budget.navigation_timeout_ms, 5_000);
    assert_eq!(budget.interaction_timeout_ms, 10_000);
    assert_eq!(budget.settle_sample_offsets_ms, [200, 500, 1_000]);
}

#[test]
fn test_parse_budget_rejects_invalid() {
    assert!(matches!(
        parse_budget(r#"{ "maxUniqueUrls": 0 }"#),
        Err(ParseError::Budget(_))
    ));
}
