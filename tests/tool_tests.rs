// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::sync::Arc;

use bizdesk::chat::StickyIds;
use bizdesk::llm::backend::FixedBackendResolver;
use bizdesk::llm::mock_provider::MockProvider;
use bizdesk::llm::provider::ModelSelection;
use bizdesk::store::InMemoryStore;
use bizdesk::tools::builtin::{
    BuiltinServices, CREATE_ORGANIZATION, FORMAT_MEETING_NOTE_CONTENT, GET_ORGANIZATION_TREE,
    SEARCH_KNOWLEDGE_GRAPH,
};
use bizdesk::tools::{
    ExecutionPhase, ToolContext, ToolExecutor, ToolInvocation, ToolRegistry, ToolResult, ToolRole,
};
use serde_json::{json, Value};

fn registry() -> ToolRegistry {
    let store = Arc::new(InMemoryStore::new());
    ToolRegistry::with_builtins(&BuiltinServices {
        organizations: store.clone(),
        meeting_notes: store.clone(),
        knowledge: store,
        resolver: Arc::new(FixedBackendResolver::new(Arc::new(MockProvider::new()))),
    })
}

fn invocation(tool: &str, args: Value) -> ToolInvocation {
    let Value::Object(map) = args else {
        panic!("arguments must be an object")
    };
    ToolInvocation::new(tool, map)
}

#[test]
fn test_tool_result_success() {
    let result = ToolResult::success(json!({"count": 2}));
    assert!(!result.is_error());
    assert_eq!(result.data["count"], 2);
}

#[test]
fn test_tool_result_failure() {
    let result = ToolResult::failure("Something went wrong");
    assert!(result.is_error());
    assert_eq!(result.error.as_deref(), Some("Something went wrong"));
}

#[test]
fn test_registry_with_builtins() {
    let registry = registry();
    for name in [
        GET_ORGANIZATION_TREE,
        CREATE_ORGANIZATION,
        FORMAT_MEETING_NOTE_CONTENT,
        SEARCH_KNOWLEDGE_GRAPH,
    ] {
        assert!(registry.get(name).is_some(), "{} missing", name);
    }
    assert_eq!(registry.len(), 4);
    assert_eq!(registry.canonical_name("search"), Some(SEARCH_KNOWLEDGE_GRAPH));
}

#[test]
fn test_roles_and_commit_switches() {
    let registry = registry();
    let role = |name: &str| registry.get(name).map(|t| t.role());
    assert_eq!(role(SEARCH_KNOWLEDGE_GRAPH), Some(ToolRole::Search));
    assert_eq!(role(GET_ORGANIZATION_TREE), Some(ToolRole::TreeListing));
    assert_eq!(role(CREATE_ORGANIZATION), Some(ToolRole::RecordCreation));

    let switch = |name: &str| registry.get(name).and_then(|t| t.commit_switch());
    assert_eq!(switch(CREATE_ORGANIZATION), Some("commit"));
    assert_eq!(switch(FORMAT_MEETING_NOTE_CONTENT), Some("save"));
    assert_eq!(switch(SEARCH_KNOWLEDGE_GRAPH), None);
}

#[test]
fn test_list_allowed_filters_definitions() {
    let registry = registry();
    let allowed = vec![CREATE_ORGANIZATION.to_string()];
    let definitions = registry.list_allowed(Some(&allowed));
    assert_eq!(definitions.len(), 1);
    assert_eq!(definitions[0].name, CREATE_ORGANIZATION);
    assert_eq!(registry.list_allowed(None).len(), 4);
}

#[tokio::test]
async fn test_executor_runs_aliases_and_keeps_order() {
    let registry = registry();
    let executor = ToolExecutor::new(&registry, FORMAT_MEETING_NOTE_CONTENT, "rawContent");
    let context = ToolContext::new("売上", ModelSelection::for_model("gpt-5-mini"))
        .with_sticky(StickyIds::default());

    let executed = executor
        .execute_all(
            &[
                invocation("search", json!({"query": "売上"})),
                invocation("nonexistent", json!({})),
                invocation(CREATE_ORGANIZATION, json!({"name": "新本部", "commit": true})),
            ],
            &context,
        )
        .await;

    assert_eq!(executed.len(), 3);
    assert_eq!(executed[0].tool_name(), SEARCH_KNOWLEDGE_GRAPH);
    assert!(executed[0].result.success);
    assert!(executed[1].canonical.is_none());
    assert!(!executed[1].result.success);
    assert_eq!(executed[2].phase, ExecutionPhase::Preview);
    assert_eq!(executed[2].invocation.arguments["commit"], json!(false));
    assert!(executed[2].is_pending_preview());
}
