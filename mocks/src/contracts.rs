//! Contract test suites that any [`WorkflowRepository`]/[`HandoffRepository`]
//! implementation should pass. Run against the in-memory mocks here (see
//! `mocks/tests/integration_tests.rs`) and against the sqlite-backed store
//! in the `database` crate (see `database/tests/sqlite_integration.rs`).

use chrono::{Duration, Utc};

use orchestrator_core::models::{HandoffType, Workflow, WorkflowStatus};
use orchestrator_core::repository::{HandoffRepository, WorkflowFilter, WorkflowRepository};

use crate::{HandoffBuilder, WorkflowBuilder};

/// Runs every workflow-repository contract test against `repo`.
pub async fn test_workflow_repository_contract<R: WorkflowRepository>(repo: &R) {
    test_upsert_is_idempotent(repo).await;
    test_get_returns_none_for_missing(repo).await;
    test_list_filters_by_status_and_agent_type(repo).await;
    test_update_status_rejects_missing(repo).await;
    test_mark_stale_before_threshold(repo).await;
    test_delete_stale_before_threshold(repo).await;
    test_count_by_status_matches_inserted(repo).await;
}

pub async fn test_upsert_is_idempotent<R: WorkflowRepository>(repo: &R) {
    let workflow = WorkflowBuilder::new().with_id("contract-upsert").build();
    repo.upsert(&workflow).await.expect("first upsert should succeed");
    repo.upsert(&workflow).await.expect("second upsert of the same id should succeed");

    let stored = repo.get("contract-upsert").await.expect("get should succeed").expect("row should exist");
    assert_eq!(stored.id, workflow.id);
}

pub async fn test_get_returns_none_for_missing<R: WorkflowRepository>(repo: &R) {
    let result = repo.get("contract-does-not-exist").await.expect("get of a missing id should not error");
    assert!(result.is_none(), "expected no row for a never-inserted id");
}

pub async fn test_list_filters_by_status_and_agent_type<R: WorkflowRepository>(repo: &R) {
    let active = WorkflowBuilder::new()
        .with_id("contract-list-active")
        .with_status(WorkflowStatus::Active)
        .with_agent_type("backend-developer")
        .build();
    let completed = WorkflowBuilder::new()
        .with_id("contract-list-completed")
        .with_status(WorkflowStatus::Completed)
        .with_agent_type("frontend-developer")
        .build();
    repo.upsert(&active).await.unwrap();
    repo.upsert(&completed).await.unwrap();

    let by_status = repo
        .list(&WorkflowFilter { status: Some(WorkflowStatus::Active), ..Default::default() })
        .await
        .expect("list by status should succeed");
    assert!(by_status.iter().all(|w| w.status == WorkflowStatus::Active));
    assert!(by_status.iter().any(|w| w.id == "contract-list-active"));

    let by_agent_type = repo
        .list(&WorkflowFilter { agent_type: Some("frontend-developer".to_string()), ..Default::default() })
        .await
        .expect("list by agent_type should succeed");
    assert!(by_agent_type.iter().all(|w| w.agent_type == "frontend-developer"));
}

pub async fn test_update_status_rejects_missing<R: WorkflowRepository>(repo: &R) {
    let workflow = WorkflowBuilder::new().with_id("contract-update-status").build();
    repo.upsert(&workflow).await.unwrap();

    repo.update_status("contract-update-status", WorkflowStatus::Active, Utc::now())
        .await
        .expect("updating an existing row should succeed");
    let updated = repo.get("contract-update-status").await.unwrap().unwrap();
    assert_eq!(updated.status, WorkflowStatus::Active);

    let missing_result = repo.update_status("contract-never-inserted", WorkflowStatus::Active, Utc::now()).await;
    assert!(missing_result.is_err(), "updating a missing row should fail");
}

pub async fn test_mark_stale_before_threshold<R: WorkflowRepository>(repo: &R) {
    let old_active: Workflow = WorkflowBuilder::new()
        .with_id("contract-stale-old")
        .with_status(WorkflowStatus::Active)
        .with_updated_at(Utc::now() - Duration::hours(2))
        .build();
    let recent_active = WorkflowBuilder::new()
        .with_id("contract-stale-recent")
        .with_status(WorkflowStatus::Active)
        .with_updated_at(Utc::now())
        .build();
    repo.upsert(&old_active).await.unwrap();
    repo.upsert(&recent_active).await.unwrap();

    let marked = repo.mark_stale_before(Utc::now() - Duration::hours(1)).await.expect("mark_stale_before should succeed");
    assert!(marked.contains(&"contract-stale-old".to_string()));
    assert!(!marked.contains(&"contract-stale-recent".to_string()));

    let stale = repo.get("contract-stale-old").await.unwrap().unwrap();
    assert_eq!(stale.status, WorkflowStatus::Stale);
}

pub async fn test_delete_stale_before_threshold<R: WorkflowRepository>(repo: &R) {
    let long_stale = WorkflowBuilder::new()
        .with_id("contract-delete-stale")
        .with_status(WorkflowStatus::Stale)
        .with_updated_at(Utc::now() - Duration::days(2))
        .build();
    repo.upsert(&long_stale).await.unwrap();

    let deleted = repo
        .delete_stale_before(Utc::now() - Duration::days(1))
        .await
        .expect("delete_stale_before should succeed");
    assert!(deleted >= 1);
    assert!(repo.get("contract-delete-stale").await.unwrap().is_none());
}

pub async fn test_count_by_status_matches_inserted<R: WorkflowRepository>(repo: &R) {
    let workflow = WorkflowBuilder::new()
        .with_id("contract-count-by-status")
        .with_status(WorkflowStatus::AwaitingApproval)
        .build();
    repo.upsert(&workflow).await.unwrap();

    let counts = repo.count_by_status().await.expect("count_by_status should succeed");
    let awaiting = counts.iter().find(|(status, _)| *status == WorkflowStatus::AwaitingApproval);
    assert!(awaiting.is_some_and(|(_, count)| *count >= 1));
}

/// Runs every handoff-repository contract test against `repo`.
pub async fn test_handoff_repository_contract<R: HandoffRepository>(repo: &R) {
    test_handoff_list_for_workflow_respects_processed_flag(repo).await;
    test_handoff_list_unprocessed_excludes_processed(repo).await;
    test_handoff_mark_processed_rejects_missing(repo).await;
}

pub async fn test_handoff_list_for_workflow_respects_processed_flag<R: HandoffRepository>(repo: &R) {
    let unprocessed = HandoffBuilder::new()
        .with_id("contract-handoff-unprocessed")
        .with_workflow_id("contract-handoff-wf")
        .with_type(HandoffType::TaskAssignment)
        .build();
    let processed = HandoffBuilder::new()
        .with_id("contract-handoff-processed")
        .with_workflow_id("contract-handoff-wf")
        .with_type(HandoffType::ReviewRequest)
        .processed()
        .build();
    repo.create(&unprocessed).await.unwrap();
    repo.create(&processed).await.unwrap();

    let excluding = repo.list_for_workflow("contract-handoff-wf", false).await.unwrap();
    assert!(excluding.iter().all(|h| !h.processed));

    let including = repo.list_for_workflow("contract-handoff-wf", true).await.unwrap();
    assert_eq!(including.len(), 2);
}

pub async fn test_handoff_list_unprocessed_excludes_processed<R: HandoffRepository>(repo: &R) {
    let handoff = HandoffBuilder::new().with_id("contract-handoff-global-unprocessed").build();
    repo.create(&handoff).await.unwrap();

    let unprocessed = repo.list_unprocessed().await.unwrap();
    assert!(unprocessed.iter().any(|h| h.id == "contract-handoff-global-unprocessed"));

    repo.mark_processed("contract-handoff-global-unprocessed").await.unwrap();
    let unprocessed_after = repo.list_unprocessed().await.unwrap();
    assert!(!unprocessed_after.iter().any(|h| h.id == "contract-handoff-global-unprocessed"));
}

pub async fn test_handoff_mark_processed_rejects_missing<R: HandoffRepository>(repo: &R) {
    let result = repo.mark_processed("contract-handoff-never-inserted").await;
    assert!(result.is_err(), "marking a missing handoff as processed should fail");
}
