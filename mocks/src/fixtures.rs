//! Standard test fixtures: pre-built workflows, handoffs, and memory
//! records covering the common states a caller is expected to handle.

use chrono::Utc;
use orchestrator_core::models::{AgentRole, CleanupScheduleRow, Handoff, HandoffType, MemoryRecord, Workflow, WorkflowStatus};

/// A single `initialized` workflow with sensible defaults.
pub fn create_test_workflow() -> Workflow {
    let now = Utc::now();
    Workflow {
        id: "wf-test-001".to_string(),
        name: None,
        status: WorkflowStatus::Initialized,
        agent_type: "backend-developer".to_string(),
        agent_role: AgentRole::Specialist,
        specifications: "Add unit tests for calculateTotal".to_string(),
        created_at: now,
        updated_at: now,
    }
}

/// A workflow in a specific status.
pub fn create_test_workflow_with_status(status: WorkflowStatus) -> Workflow {
    let mut workflow = create_test_workflow();
    workflow.status = status;
    workflow
}

/// A workflow owned by a specific agent type, role classified from it.
pub fn create_test_workflow_with_agent_type(agent_type: &str) -> Workflow {
    let mut workflow = create_test_workflow();
    workflow.agent_role = AgentRole::classify(agent_type);
    workflow.agent_type = agent_type.to_string();
    workflow
}

/// `count` distinct workflows, cycling through agent types and statuses.
pub fn create_test_workflows(count: usize) -> Vec<Workflow> {
    let now = Utc::now();
    (1..=count)
        .map(|i| {
            let status = match i % 4 {
                0 => WorkflowStatus::Initialized,
                1 => WorkflowStatus::Active,
                2 => WorkflowStatus::AwaitingApproval,
                _ => WorkflowStatus::Completed,
            };
            let agent_type = format!("agent-type-{}", i % 3 + 1);
            Workflow {
                id: format!("wf-{i:03}"),
                name: None,
                status,
                agent_role: AgentRole::classify(&agent_type),
                agent_type,
                specifications: format!("Specification for workflow {i}"),
                created_at: now,
                updated_at: now,
            }
        })
        .collect()
}

/// One workflow in each lifecycle status.
pub fn create_workflows_in_all_statuses() -> Vec<Workflow> {
    let now = Utc::now();
    [
        WorkflowStatus::Initialized,
        WorkflowStatus::Active,
        WorkflowStatus::Delegation,
        WorkflowStatus::AwaitingApproval,
        WorkflowStatus::RevisionRequired,
        WorkflowStatus::Approved,
        WorkflowStatus::Completed,
        WorkflowStatus::Failed,
        WorkflowStatus::Stale,
    ]
    .into_iter()
    .enumerate()
    .map(|(i, status)| Workflow {
        id: format!("wf-status-{i:03}"),
        name: None,
        status,
        agent_type: "backend-developer".to_string(),
        agent_role: AgentRole::Specialist,
        specifications: format!("Workflow in {status} state"),
        created_at: now,
        updated_at: now,
    })
    .collect()
}

/// An unprocessed `task_assignment` handoff for [`create_test_workflow`].
pub fn create_test_handoff() -> Handoff {
    Handoff {
        id: "handoff-test-001".to_string(),
        from_agent: "team-manager".to_string(),
        to_agent: "backend-developer".to_string(),
        workflow_id: "wf-test-001".to_string(),
        handoff_type: HandoffType::TaskAssignment,
        task_details: "Implement the feature per the attached specification".to_string(),
        created_at: Utc::now(),
        processed: false,
    }
}

/// An unprocessed cleanup row scheduled `minutes_from_now` in the future.
pub fn create_test_cleanup_row(minutes_from_now: i64) -> CleanupScheduleRow {
    CleanupScheduleRow {
        id: "cleanup-test-001".to_string(),
        workflow_id: "wf-test-001".to_string(),
        scheduled_for: Utc::now() + chrono::Duration::minutes(minutes_from_now),
        processed: false,
    }
}

/// A plain-text memory record tagged `note`.
pub fn create_test_memory_record() -> MemoryRecord {
    MemoryRecord {
        id: "mem-test-001".to_string(),
        content: "Decided to use a repository-pattern abstraction for persistence".to_string(),
        record_type: "note".to_string(),
        tags: vec!["architecture".to_string()],
        workflow_id: Some("wf-test-001".to_string()),
        metadata: Default::default(),
        created_at: Utc::now(),
    }
}
