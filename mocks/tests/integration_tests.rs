//! Integration tests for the mocks crate itself: exercises the mock
//! implementations and utilities to make sure they behave the way the
//! engine and repository tests that depend on them expect.

use mocks::*;
use orchestrator_core::error::OrchestratorError;
use orchestrator_core::models::{AgentRole, HandoffType, WorkflowStatus};
use orchestrator_core::repository::{HandoffRepository, WorkflowRepository};
use orchestrator_core::workspace::{CreateWorkspaceRequest, WorkspaceCreateStatus, WorkspaceManager};

#[tokio::test]
async fn workflow_repository_basic_operations() {
    let repo = InMemoryWorkflowRepository::new();
    let workflow = WorkflowBuilder::new().with_id("wf-basic").build();

    repo.upsert(&workflow).await.unwrap();
    repo.assert_called("upsert");

    let retrieved = repo.get("wf-basic").await.unwrap().unwrap();
    assert_eq!(retrieved.id, "wf-basic");
    repo.assert_called("get");
}

#[tokio::test]
async fn workflow_repository_error_injection() {
    let repo = InMemoryWorkflowRepository::new();
    repo.inject_error(OrchestratorError::Database("forced failure".to_string()));

    let result = repo.get("whatever").await;
    assert!(result.is_err());
    assert!(matches!(result.unwrap_err(), OrchestratorError::Database(_)));

    // error injection is one-shot
    let result = repo.get("whatever").await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn workflow_fixtures_cover_every_status() {
    let workflows = create_workflows_in_all_statuses();
    assert_eq!(workflows.len(), 9);

    let statuses: Vec<_> = workflows.iter().map(|w| w.status).collect();
    assert!(statuses.contains(&WorkflowStatus::Initialized));
    assert!(statuses.contains(&WorkflowStatus::Active));
    assert!(statuses.contains(&WorkflowStatus::Completed));
    assert!(statuses.contains(&WorkflowStatus::Stale));
}

#[tokio::test]
async fn workflow_builder_classifies_agent_role() {
    let workflow = WorkflowBuilder::new().with_agent_type("team-manager").build();
    assert_eq!(workflow.agent_role, AgentRole::Manager);
}

#[test]
fn assertions_catch_status_mismatch() {
    let mut actual = create_test_workflow();
    let expected = actual.clone();
    assert_workflow_equals(&actual, &expected);

    actual.status = WorkflowStatus::Completed;
    let result = std::panic::catch_unwind(|| assert_workflow_equals(&actual, &expected));
    assert!(result.is_err());
}

#[test]
fn assertions_status_transitions() {
    assert_status_transition_valid(WorkflowStatus::Initialized, WorkflowStatus::Active);
    assert_status_transition_valid(WorkflowStatus::Stale, WorkflowStatus::Active);
    assert_status_transition_invalid(WorkflowStatus::Completed, WorkflowStatus::Active);
    assert_status_transition_invalid(WorkflowStatus::Stale, WorkflowStatus::Delegation);
}

#[test]
fn generators_produce_realistic_data() {
    let workflow = generate_random_workflow();
    assert!(!workflow.id.is_empty());
    assert!(workflow.id.starts_with("wf-"));
    assert!(!workflow.specifications.is_empty());
    assert!(!workflow.agent_type.is_empty());
}

#[tokio::test]
async fn mock_workspace_manager_create_is_idempotent() {
    let manager = MockWorkspaceManager::new();
    let request = CreateWorkspaceRequest {
        agent_id: "backend-developer".to_string(),
        base_ref: None,
        resources: None,
    };

    let first = manager.create(request.clone()).await.unwrap();
    assert_eq!(first.status, WorkspaceCreateStatus::Created);

    let second = manager.create(request).await.unwrap();
    assert_eq!(second.status, WorkspaceCreateStatus::Exists);
    assert_eq!(second.workspace_path, first.workspace_path);
}

#[tokio::test]
async fn mock_workspace_manager_cleanup_of_missing_reports_not_found() {
    let manager = MockWorkspaceManager::new();
    let response = manager.cleanup("never-created", false).await.unwrap();
    assert_eq!(
        response.status,
        orchestrator_core::workspace::WorkspaceCleanupStatus::NotFound
    );
}

#[tokio::test]
async fn handoff_repository_contract_suite_passes_against_the_mock() {
    let repo = InMemoryHandoffRepository::new();
    mocks::test_handoff_repository_contract(&repo).await;
}

#[tokio::test]
async fn workflow_repository_contract_suite_passes_against_the_mock() {
    let repo = InMemoryWorkflowRepository::new();
    mocks::test_workflow_repository_contract(&repo).await;
}

#[tokio::test]
async fn concurrent_upserts_all_land() {
    use std::sync::Arc;
    use tokio::task::JoinSet;

    let repo = Arc::new(InMemoryWorkflowRepository::new());
    let mut set = JoinSet::new();

    for i in 0..10 {
        let repo = repo.clone();
        set.spawn(async move {
            let workflow = WorkflowBuilder::new().with_id(format!("wf-concurrent-{i:03}")).build();
            repo.upsert(&workflow).await.unwrap();
        });
    }

    while let Some(result) = set.join_next().await {
        result.unwrap();
    }

    let filter = Default::default();
    let all = repo.list(&filter).await.unwrap();
    assert_eq!(all.iter().filter(|w| w.id.starts_with("wf-concurrent-")).count(), 10);
}

#[tokio::test]
async fn handoff_builder_and_create_round_trip() {
    let repo = InMemoryHandoffRepository::new();
    let handoff = HandoffBuilder::new()
        .with_id("handoff-roundtrip")
        .with_type(HandoffType::IntegrationReady)
        .build();

    repo.create(&handoff).await.unwrap();
    let retrieved = repo.get("handoff-roundtrip").await.unwrap().unwrap();
    assert_eq!(retrieved.handoff_type, HandoffType::IntegrationReady);
}
