//! Integration tests for projecting rules into the applied directory.

mod common;

use common::{ALICE, applied_files, create_temp_workspace, service_for, write};
use ruledeck::apply::Toggled;
use ruledeck_core::{ApplyStrategy, RuleApplicationConfig};

// ============================================================================
// Applying
// ============================================================================

#[tokio::test]
async fn apply_copies_content_under_source_suffixed_name() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);
    let apply = service.apply_manager();

    let applied = apply.apply_rule_by_id("style.web", None).await.unwrap();

    assert_eq!(applied_files(&ws), vec!["style.web.mdc"]);
    assert_eq!(applied.id, "style.web");
    assert!(applied.applied_path.ends_with("style.web.mdc"));
    assert!(applied.applied_at.ends_with('Z'));

    let source = std::fs::read_to_string(ws.registry_dir().join("teams/Web/style.mdc")).unwrap();
    let copy = std::fs::read_to_string(&applied.applied_path).unwrap();
    assert_eq!(source, copy);
}

#[tokio::test]
async fn apply_derives_strategy_from_frontmatter() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);
    let apply = service.apply_manager();

    let always = apply.apply_rule_by_id("style.web", None).await.unwrap();
    assert_eq!(always.config.apply_strategy, ApplyStrategy::Always);

    let auto = apply
        .apply_rule_by_id("early.assetfoundations", None)
        .await
        .unwrap();
    assert_eq!(auto.config.apply_strategy, ApplyStrategy::AutoAttached);
    assert_eq!(auto.config.globs, Some(vec!["*.rs".to_string()]));

    let manual = apply
        .apply_rule_by_id("shared.security.secrets", None)
        .await
        .unwrap();
    assert_eq!(manual.config.apply_strategy, ApplyStrategy::Manual);
}

#[tokio::test]
async fn explicit_config_wins() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);
    let config = RuleApplicationConfig {
        apply_strategy: ApplyStrategy::Manual,
        globs: None,
    };
    let applied = service
        .apply_manager()
        .apply_rule_by_id("style.web", Some(config.clone()))
        .await
        .unwrap();
    assert_eq!(applied.config, config);
}

#[tokio::test]
async fn same_stem_from_different_owners_never_overwrites() {
    let (_temp, ws) = create_temp_workspace();
    write(
        &ws.registry_dir(),
        &format!("users/{ALICE}/style.mdc"),
        "Alice's own style notes.",
    );
    let service = service_for(&ws, None);
    let apply = service.apply_manager();

    apply.apply_rule_by_id("style.web", None).await.unwrap();
    apply.apply_rule_by_id("style.alicesmith", None).await.unwrap();

    assert_eq!(
        applied_files(&ws),
        vec!["style.alicesmith.mdc", "style.web.mdc"]
    );
    assert!(apply.is_rule_applied("style.web").await);
    assert!(apply.is_rule_applied("style.alicesmith").await);
}

#[tokio::test]
async fn repeated_apply_picks_counter_names() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);
    let apply = service.apply_manager();

    for _ in 0..3 {
        apply.apply_rule_by_id("style.web", None).await.unwrap();
    }
    assert_eq!(
        applied_files(&ws),
        vec!["style.web.mdc", "style.web_1.mdc", "style.web_2.mdc"]
    );
}

#[tokio::test]
async fn applying_unknown_rule_suggests_alternatives() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);
    let err = service
        .apply_manager()
        .apply_rule_by_id("style.wbe", None)
        .await
        .unwrap_err();
    let text = err.to_string();
    assert!(text.contains("Rule not found"), "{text}");
    assert!(text.contains("style.web"), "{text}");
}

// ============================================================================
// Applied state and removal
// ============================================================================

#[tokio::test]
async fn applied_state_is_false_without_directory_or_rule() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);
    let apply = service.apply_manager();

    assert!(!ws.applied_dir().exists());
    assert!(!apply.is_rule_applied("style.web").await);
    assert!(!apply.is_rule_applied("no.such.rule").await);
}

#[tokio::test]
async fn hand_placed_files_count_as_applied() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);
    let apply = service.apply_manager();

    write(&ws.applied_dir(), "early_7.mdc", "copied by hand");
    assert!(apply.is_rule_applied("early.assetfoundations").await);

    // Names that merely share a prefix are not variants.
    write(&ws.applied_dir(), "stylesheet.mdc", "unrelated");
    write(&ws.applied_dir(), "style.txt", "not a rule file");
    assert!(!apply.is_rule_applied("style.web").await);
}

#[tokio::test]
async fn remove_deletes_every_variant() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);
    let apply = service.apply_manager();

    apply.apply_rule_by_id("style.web", None).await.unwrap();
    apply.apply_rule_by_id("style.web", None).await.unwrap();
    write(&ws.applied_dir(), "style.mdc", "manual copy");
    apply
        .apply_rule_by_id("early.assetfoundations", None)
        .await
        .unwrap();

    assert!(apply.remove_applied_rule("style.web").await.unwrap());
    assert_eq!(applied_files(&ws), vec!["early.assetfoundations.mdc"]);
    assert!(!apply.is_rule_applied("style.web").await);
}

#[tokio::test]
async fn removing_unapplied_or_unknown_rule_is_not_an_error() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);
    let apply = service.apply_manager();

    assert!(!apply.remove_applied_rule("style.web").await.unwrap());
    assert!(!apply.remove_applied_rule("no.such.rule").await.unwrap());
}

#[tokio::test]
async fn toggle_flips_state() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);
    let apply = service.apply_manager();

    let first = apply.toggle_rule("personal.alicesmith", None).await.unwrap();
    assert!(matches!(first, Toggled::Applied(_)));
    assert!(apply.is_rule_applied("personal.alicesmith").await);

    let second = apply.toggle_rule("personal.alicesmith", None).await.unwrap();
    assert_eq!(second, Toggled::Removed);
    assert!(applied_files(&ws).is_empty());
}

#[tokio::test]
async fn applied_rules_lists_projections() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);
    let apply = service.apply_manager();

    apply.apply_rule_by_id("style.web", None).await.unwrap();
    apply
        .apply_rule_by_id("early.assetfoundations", None)
        .await
        .unwrap();
    write(&ws.applied_dir(), "notes.txt", "ignored");

    let listed = apply.applied_rules().await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["early.assetfoundations", "style.web"]);
    assert_eq!(listed[0].config.apply_strategy, ApplyStrategy::AutoAttached);
    assert_eq!(listed[1].config.apply_strategy, ApplyStrategy::Always);
    assert!(listed.iter().all(|a| a.original_path.is_none()));
}

#[tokio::test]
async fn unreadable_projection_does_not_hide_the_others() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);
    let apply = service.apply_manager();

    apply.apply_rule_by_id("style.web", None).await.unwrap();
    std::fs::write(ws.applied_dir().join("broken.mdc"), [0xff, 0xfe, 0x00]).unwrap();

    let listed = apply.applied_rules().await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["style.web"]);
    assert!(apply.is_rule_applied("style.web").await);
}
