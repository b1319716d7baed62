//! Workspace create/cleanup idempotence and scheduled-cleanup draining,
//! wired the way `ApprovedForIntegration` leaves them for the sweep task.

use std::sync::Arc;

use orchestrator_core::engine::OrchestrationEngine;
use orchestrator_core::events::EventEmitter;
use orchestrator_core::scope_control::ScopeControl;
use orchestrator_core::workspace::{
    CleanupWorkspaceResponse, CreateWorkspaceRequest, CreateWorkspaceResponse, WorkspaceCleanupStatus,
    WorkspaceCreateStatus, WorkspaceManager,
};

use mocks::{InMemoryCleanupScheduleRepository, InMemoryHandoffRepository, InMemoryWorkflowRepository, MockWorkspaceManager};

fn build_engine(workspace: Arc<MockWorkspaceManager>) -> Arc<OrchestrationEngine> {
    Arc::new(
        OrchestrationEngine::new(
            Arc::new(InMemoryWorkflowRepository::new()),
            Arc::new(InMemoryHandoffRepository::new()),
            Arc::new(InMemoryCleanupScheduleRepository::default()),
            Arc::new(ScopeControl::new()),
            Arc::new(EventEmitter::default()),
        )
        .with_workspace(workspace),
    )
}

/// Scenario: create, repeat (exists), cleanup, repeat (not_found).
#[tokio::test]
async fn create_then_cleanup_cycle_is_fully_idempotent() {
    let manager = MockWorkspaceManager::new();
    let request = CreateWorkspaceRequest {
        agent_id: "test-agent-1".to_string(),
        base_ref: Some("main".to_string()),
        resources: None,
    };

    let created: CreateWorkspaceResponse = manager.create(request.clone()).await.unwrap();
    assert_eq!(created.status, WorkspaceCreateStatus::Created);
    let exists = manager.create(request).await.unwrap();
    assert_eq!(exists.status, WorkspaceCreateStatus::Exists);

    let cleaned: CleanupWorkspaceResponse = manager.cleanup("test-agent-1", false).await.unwrap();
    assert_eq!(cleaned.status, WorkspaceCleanupStatus::Cleaned);
    let not_found = manager.cleanup("test-agent-1", false).await.unwrap();
    assert_eq!(not_found.status, WorkspaceCleanupStatus::NotFound);
}

/// `process_scheduled_cleanups` only acts on rows whose `scheduled_for` has
/// passed, and never revisits a row it has already marked processed.
#[tokio::test]
async fn scheduled_cleanup_is_idempotent_across_reinvocations() {
    let workspace = Arc::new(MockWorkspaceManager::new());
    workspace
        .create(CreateWorkspaceRequest {
            agent_id: "backend-developer-wf-cleanup".to_string(),
            base_ref: None,
            resources: None,
        })
        .await
        .unwrap();

    let engine = build_engine(workspace.clone());
    // scheduled in the past so the first sweep picks it up immediately.
    engine.schedule_workspace_cleanup("wf-cleanup", -1).await.unwrap();

    let processed_first = engine.process_scheduled_cleanups().await.unwrap();
    assert_eq!(processed_first, 1);
    assert_eq!(
        workspace.cleanup("backend-developer-wf-cleanup", false).await.unwrap().status,
        WorkspaceCleanupStatus::NotFound,
        "the sweep should already have cleaned the workspace"
    );

    let processed_second = engine.process_scheduled_cleanups().await.unwrap();
    assert_eq!(processed_second, 0, "an already-processed row must not be swept again");
}
