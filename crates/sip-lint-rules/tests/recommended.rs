//! End-to-end checks of the built-in rule set on whole documents.

use sip_lint_core::Engine;
use sip_lint_rules::{minimal_rules, recommended_rules, Preset};
use std::path::Path;

const VALID_SIP: &str = "---
sip: 3
title: Keyring snaps
status: Draft
discussions-to: https://github.com/MetaMask/SIPs/discussions/3
author: Alice Example (@alice), Bob <bob@example.com>
created: 2023-01-10
---

## Abstract

A short abstract with a [relative link](../assets/sip-3/diagram.png).

## Copyright

Copyright and related rights waived via [CC0](../LICENSE).
";

fn engine() -> Engine {
    Engine::builder()
        .rules(recommended_rules())
        .build()
        .expect("recommended rules have unique ids")
}

#[tokio::test]
async fn valid_document_passes() {
    let messages = engine()
        .validate_source(VALID_SIP, Some(Path::new("sips/sip-3.md")))
        .await
        .unwrap();
    assert!(messages.is_empty(), "{messages:?}");
}

#[tokio::test]
async fn findings_are_ordered_by_node_then_rule() {
    let source = VALID_SIP
        .replace("sip: 3\ntitle: Keyring snaps", "title: Keyring snaps\nsip: 4")
        .replace("## Copyright", "## License");
    let messages = engine()
        .validate_source(&source, Some(Path::new("sips/sip-3.md")))
        .await
        .unwrap();

    let ids: Vec<&str> = messages.iter().map(|m| m.rule_id.as_str()).collect();
    assert_eq!(ids, vec!["copyright", "preamble-order", "preamble-filename"]);
    assert_eq!(
        messages[1].message,
        "Front-matter property \"sip\" is not in proper order"
    );
}

#[tokio::test]
async fn missing_preamble_and_bad_name() {
    let messages = engine()
        .validate_source("# Draft\n", Some(Path::new("notes.md")))
        .await
        .unwrap();
    let ids: Vec<&str> = messages.iter().map(|m| m.rule_id.as_str()).collect();
    assert_eq!(ids, vec!["preamble-exists", "filename", "copyright"]);
}

#[tokio::test]
async fn invalid_yaml_is_reported_once() {
    let source = "---\ntitle: [broken\n---\n";
    let messages = Engine::builder()
        .rules(minimal_rules())
        .rules(vec![Box::new(sip_lint_rules::ValidYaml::new()) as sip_lint_core::RuleBox])
        .build()
        .unwrap()
        .validate_source(source, None)
        .await
        .unwrap();
    let ids: Vec<&str> = messages.iter().map(|m| m.rule_id.as_str()).collect();
    assert_eq!(ids, vec!["copyright", "preamble-exists", "yaml"]);
}

#[tokio::test]
async fn files_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("sip-3.md");
    let bad = dir.path().join("sip-4.md");
    std::fs::write(&good, VALID_SIP).unwrap();
    std::fs::write(&bad, VALID_SIP).unwrap();

    let engine = Engine::builder()
        .rules(Preset::Minimal.rules())
        .rules(vec![
            Box::new(sip_lint_rules::PreambleFilename::new()) as sip_lint_core::RuleBox,
        ])
        .build()
        .unwrap();
    let result = engine.validate_files([&good, &bad]).await.unwrap();

    assert_eq!(result.files_checked(), 2);
    assert!(result.files[0].is_clean());
    assert_eq!(result.files[1].messages.len(), 1);
    assert_eq!(result.files[1].messages[0].rule_id, "preamble-filename");
    assert_eq!(result.files[1].messages[0].line, 8);
}
