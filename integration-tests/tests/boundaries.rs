//! Boundary-behavior checks called out as testable properties: illegal
//! `agent_id`s, empty specifications, and N-way concurrent launches.

use std::sync::Arc;

use orchestrator_core::engine::{LaunchAgentRequest, LaunchAgentResult, OrchestrationEngine};
use orchestrator_core::events::EventEmitter;
use orchestrator_core::scope_control::ScopeControl;
use orchestrator_core::workspace::sanitize_agent_id;

use mocks::{InMemoryCleanupScheduleRepository, InMemoryHandoffRepository, InMemoryWorkflowRepository, MockWorkspaceManager};

fn build_engine() -> Arc<OrchestrationEngine> {
    Arc::new(
        OrchestrationEngine::new(
            Arc::new(InMemoryWorkflowRepository::new()),
            Arc::new(InMemoryHandoffRepository::new()),
            Arc::new(InMemoryCleanupScheduleRepository::default()),
            Arc::new(ScopeControl::new()),
            Arc::new(EventEmitter::default()),
        )
        .with_workspace(Arc::new(MockWorkspaceManager::new())),
    )
}

#[test]
fn agent_id_of_only_illegal_characters_sanitizes_to_none() {
    assert!(sanitize_agent_id("///...").is_none());
    assert!(sanitize_agent_id("***").is_none());
}

/// An empty specification is still accepted and queued: scope control has
/// no rule that rejects it outright, only the missing-completion-criteria
/// warning it would also emit for any vague spec.
#[tokio::test]
async fn empty_specification_is_accepted_and_queued_with_a_warning() {
    let engine = build_engine();

    let result = engine
        .launch_agent(LaunchAgentRequest {
            workflow_id: None,
            agent_type: "test-writer".to_string(),
            specifications: String::new(),
            from_agent: None,
            workspace_base_ref: None,
            workspace_resources: None,
            create_workspace: false,
        })
        .await
        .unwrap();

    match result {
        LaunchAgentResult::Queued { violations, .. } => {
            assert!(violations.iter().any(|v| v.kind == "completion_criteria"));
        }
        other => panic!("expected Queued, got {other:?}"),
    }
}

/// N different roles launched concurrently onto the same workflow all
/// succeed; N further duplicate-role launches all fail.
#[tokio::test]
async fn concurrent_distinct_roles_all_succeed_then_all_duplicates_fail() {
    use tokio::task::JoinSet;

    let engine = build_engine();
    let workflow_id = "wf-concurrent-roles".to_string();
    let roles = ["backend-developer", "frontend-developer", "database-engineer", "testing-specialist"];

    let mut set = JoinSet::new();
    for role in roles {
        let engine = engine.clone();
        let workflow_id = workflow_id.clone();
        set.spawn(async move {
            engine
                .launch_agent(LaunchAgentRequest {
                    workflow_id: Some(workflow_id),
                    agent_type: role.to_string(),
                    specifications: format!("Implement the {role} piece of the release"),
                    from_agent: None,
                    workspace_base_ref: None,
                    workspace_resources: None,
                    create_workspace: false,
                })
                .await
                .unwrap()
        });
    }
    let mut queued_count = 0;
    while let Some(result) = set.join_next().await {
        if matches!(result.unwrap(), LaunchAgentResult::Queued { .. }) {
            queued_count += 1;
        }
    }
    assert_eq!(queued_count, roles.len());

    let mut duplicate_set = JoinSet::new();
    for role in roles {
        let engine = engine.clone();
        let workflow_id = workflow_id.clone();
        duplicate_set.spawn(async move {
            engine
                .launch_agent(LaunchAgentRequest {
                    workflow_id: Some(workflow_id),
                    agent_type: role.to_string(),
                    specifications: "retry of the same role".to_string(),
                    from_agent: None,
                    workspace_base_ref: None,
                    workspace_resources: None,
                    create_workspace: false,
                })
                .await
                .unwrap()
        });
    }
    let mut duplicate_count = 0;
    while let Some(result) = duplicate_set.join_next().await {
        if matches!(result.unwrap(), LaunchAgentResult::DuplicateBlocked { .. }) {
            duplicate_count += 1;
        }
    }
    assert_eq!(duplicate_count, roles.len());

    assert_eq!(engine.get_pending_tasks(None).await.len(), roles.len());
}
