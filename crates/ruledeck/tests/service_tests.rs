//! Integration tests for the request dispatcher and the JSON lines loop.

mod common;

use common::{ALICE, applied_files, create_temp_workspace, service_for};
use ruledeck::serve::serve;
use ruledeck_api::{Request, Response, RuleView};
use ruledeck_core::{CURRENT_USER, MetadataStore, RuleFilter, SortKey, SortOrder};

fn ids(rules: &[RuleView]) -> Vec<&str> {
    rules.iter().map(|v| v.rule.id.as_str()).collect()
}

fn rules_of(responses: &[Response]) -> &[RuleView] {
    responses
        .iter()
        .find_map(|r| match r {
            Response::UpdateRules { rules } => Some(rules.as_slice()),
            _ => None,
        })
        .expect("an updateRules response")
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn load_data_sends_filters_then_rules() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, Some(ALICE));

    let responses = service.handle(Request::LoadData).await;
    assert_eq!(responses.len(), 2);

    let Response::InitFilters { payload } = &responses[0] else {
        panic!("expected initFilters, got {:?}", responses[0]);
    };
    assert_eq!(payload.total_rules, 4);
    assert_eq!(payload.teams, vec!["Asset Foundations", "Web"]);
    assert_eq!(payload.users, vec![ALICE]);
    assert_eq!(payload.current_user.as_deref(), Some(ALICE));
    assert_eq!(payload.user_teams, vec!["Asset Foundations", "Web"]);

    assert_eq!(rules_of(&responses).len(), 4);
}

#[tokio::test]
async fn default_listing_is_by_title() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);

    let rules = service.list_rules(&RuleFilter::default()).await.unwrap();
    assert_eq!(
        ids(&rules),
        vec![
            "early.assetfoundations",
            "personal.alicesmith",
            "shared.security.secrets",
            "style.web",
        ]
    );
    assert!(rules.iter().all(|v| !v.applied && v.score.is_none()));
    assert_eq!(
        rules[0].preview,
        "# Early returns\nPrefer early returns over nested conditionals.\nGuard clauses make the happy path obvious."
    );
}

#[tokio::test]
async fn applied_rules_come_first_for_every_order() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);
    service
        .apply_manager()
        .apply_rule_by_id("style.web", None)
        .await
        .unwrap();

    for sort in [SortKey::Title, SortKey::LastUpdated] {
        for order in [SortOrder::Asc, SortOrder::Desc] {
            let filter = RuleFilter {
                sort,
                order,
                ..RuleFilter::default()
            };
            let rules = service.list_rules(&filter).await.unwrap();
            assert_eq!(rules[0].rule.id, "style.web", "{sort:?} {order:?}");
            assert!(rules[0].applied);
            assert!(rules[1..].iter().all(|v| !v.applied));
        }
    }
}

#[tokio::test]
async fn filters_combine() {
    let (_temp, ws) = create_temp_workspace();
    let store = MetadataStore::for_registry(&ws.registry_dir());
    store.add_tag("style.web", "frontend").unwrap();
    store.add_tag("early.assetfoundations", "rust").unwrap();
    let service = service_for(&ws, Some(ALICE));

    let by_team = RuleFilter {
        team: Some("Web".into()),
        ..RuleFilter::default()
    };
    assert_eq!(ids(&service.list_rules(&by_team).await.unwrap()), vec!["style.web"]);

    let any_tag = RuleFilter {
        tags: vec!["frontend".into(), "rust".into()],
        ..RuleFilter::default()
    };
    assert_eq!(
        ids(&service.list_rules(&any_tag).await.unwrap()),
        vec!["early.assetfoundations", "style.web"]
    );

    let mine = RuleFilter {
        user: Some(CURRENT_USER.into()),
        ..RuleFilter::default()
    };
    assert_eq!(
        ids(&service.list_rules(&mine).await.unwrap()),
        vec!["personal.alicesmith"]
    );
}

#[tokio::test]
async fn current_user_without_identity_matches_nothing() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);
    let mine = RuleFilter {
        user: Some(CURRENT_USER.into()),
        ..RuleFilter::default()
    };
    assert!(service.list_rules(&mine).await.unwrap().is_empty());
}

#[tokio::test]
async fn search_ranks_and_adds_snippets() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);

    let filter = RuleFilter {
        search: Some("EARLY".into()),
        ..RuleFilter::default()
    };
    let rules = service.list_rules(&filter).await.unwrap();
    assert_eq!(ids(&rules), vec!["early.assetfoundations"]);
    let view = &rules[0];
    assert!(view.score.is_some_and(|s| s > 0.0));
    assert!(!view.content_snippets.is_empty());
    assert!(
        view.content_snippets
            .iter()
            .all(|s| s.to_lowercase().contains("early"))
    );
}

#[tokio::test]
async fn update_rules_remembers_the_filter() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);

    let filter = RuleFilter {
        team: Some("Web".into()),
        ..RuleFilter::default()
    };
    let responses = service.handle(Request::UpdateRules { filter }).await;
    assert_eq!(ids(rules_of(&responses)), vec!["style.web"]);

    // Later rule lists reuse it.
    let responses = service
        .handle(Request::ApplyRule {
            rule_id: "early.assetfoundations".into(),
            config: None,
        })
        .await;
    assert!(matches!(responses[0], Response::Applied { .. }));
    assert_eq!(ids(rules_of(&responses)), vec!["style.web"]);
}

// ============================================================================
// Actions
// ============================================================================

#[tokio::test]
async fn tag_requests_refresh_tag_options() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);

    let responses = service
        .handle(Request::AddTag {
            rule_id: "style.web".into(),
            tag: "frontend".into(),
        })
        .await;
    assert_eq!(
        responses[0],
        Response::UpdateTagOptions {
            tags: vec!["frontend".into()]
        }
    );
    let style = rules_of(&responses)
        .iter()
        .find(|v| v.rule.id == "style.web")
        .unwrap();
    assert_eq!(style.rule.tags(), ["frontend"]);

    let responses = service
        .handle(Request::RemoveTag {
            rule_id: "style.web".into(),
            tag: "frontend".into(),
        })
        .await;
    assert_eq!(responses[0], Response::UpdateTagOptions { tags: vec![] });
}

#[tokio::test]
async fn tagging_unknown_rule_is_an_error() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);
    let responses = service
        .handle(Request::AddTag {
            rule_id: "nope".into(),
            tag: "x".into(),
        })
        .await;
    assert_eq!(responses.len(), 1);
    assert!(responses[0].is_error());
    assert!(MetadataStore::for_registry(&ws.registry_dir()).load().is_empty());
}

#[tokio::test]
async fn edit_metadata_sets_and_clears_overrides() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);

    let responses = service
        .handle(Request::EditMetadata {
            rule_id: "early.assetfoundations".into(),
            title: Some("Guard clauses".into()),
            description: None,
        })
        .await;
    let early = rules_of(&responses)
        .iter()
        .find(|v| v.rule.id == "early.assetfoundations")
        .unwrap();
    assert_eq!(early.rule.title, "Guard clauses");
    assert_eq!(early.rule.description.as_deref(), Some("Keep functions flat"));

    service
        .handle(Request::EditMetadata {
            rule_id: "early.assetfoundations".into(),
            title: Some(String::new()),
            description: None,
        })
        .await;
    let early = service
        .discovery()
        .require_rule("early.assetfoundations")
        .await
        .unwrap();
    assert_eq!(early.title, "Early returns");
}

#[tokio::test]
async fn preview_and_toggle() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);

    let responses = service
        .handle(Request::PreviewRule {
            rule_id: "personal.alicesmith".into(),
            max_lines: Some(1),
        })
        .await;
    let Response::Preview { title, preview, .. } = &responses[0] else {
        panic!("expected preview, got {responses:?}");
    };
    assert_eq!(title, "Personal shortcuts");
    assert_eq!(preview, "# Personal shortcuts");

    let responses = service
        .handle(Request::ToggleRule {
            rule_id: "personal.alicesmith".into(),
            config: None,
        })
        .await;
    assert!(matches!(responses[0], Response::Applied { .. }));
    assert_eq!(applied_files(&ws), vec!["personal.alicesmith.mdc"]);

    let responses = service
        .handle(Request::ToggleRule {
            rule_id: "personal.alicesmith".into(),
            config: None,
        })
        .await;
    assert!(matches!(
        responses[0],
        Response::Removed { removed: true, .. }
    ));
    assert!(applied_files(&ws).is_empty());
}

#[tokio::test]
async fn refresh_picks_up_new_rules() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);
    service.handle(Request::LoadData).await;

    common::write(&ws.registry_dir(), "teams/Web/layout.mdc", "Grid first.");
    let responses = service.handle(Request::Refresh).await;
    let Response::InitFilters { payload } = &responses[0] else {
        panic!("expected initFilters, got {responses:?}");
    };
    assert_eq!(payload.total_rules, 5);
    assert_eq!(rules_of(&responses).len(), 5);
}

// ============================================================================
// JSON lines
// ============================================================================

#[tokio::test]
async fn serve_answers_each_line() {
    let (_temp, ws) = create_temp_workspace();
    let service = service_for(&ws, None);

    let input = concat!(
        r#"{"command":"applyRule","ruleId":"style.web"}"#,
        "\n\n",
        "not json\n",
        r#"{"command":"removeRule","ruleId":"style.web"}"#,
        "\n",
    );
    let mut output = Vec::new();
    serve(&service, input.as_bytes(), &mut output).await.unwrap();

    let lines: Vec<serde_json::Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let types: Vec<&str> = lines.iter().map(|v| v["type"].as_str().unwrap()).collect();
    assert_eq!(
        types,
        vec!["applied", "updateRules", "error", "removed", "updateRules"]
    );
    assert_eq!(lines[0]["ruleId"], "style.web");
    assert_eq!(lines[0]["applied"]["config"]["applyStrategy"], "Always");
    assert_eq!(lines[3]["removed"], true);
    assert!(applied_files(&ws).is_empty());
}
