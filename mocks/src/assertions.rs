//! Custom assertion helpers with clearer failure messages than a bare
//! `assert_eq!` on a whole struct.

use orchestrator_core::models::{Workflow, WorkflowStatus};

/// Asserts two workflows are equal ignoring `created_at`/`updated_at`.
pub fn assert_workflow_equals(actual: &Workflow, expected: &Workflow) {
    assert_eq!(actual.id, expected.id, "workflow ids don't match");
    assert_eq!(actual.status, expected.status, "workflow statuses don't match");
    assert_eq!(actual.agent_type, expected.agent_type, "workflow agent_types don't match");
    assert_eq!(actual.agent_role, expected.agent_role, "workflow agent_roles don't match");
    assert_eq!(actual.specifications, expected.specifications, "workflow specifications don't match");
}

/// Asserts a workflow matches a partial [`WorkflowMatcher`].
pub fn assert_workflow_matches(workflow: &Workflow, matcher: &WorkflowMatcher) {
    if let Some(ref id) = matcher.id {
        assert_eq!(&workflow.id, id, "workflow id doesn't match expected");
    }
    if let Some(status) = matcher.status {
        assert_eq!(workflow.status, status, "workflow status doesn't match expected");
    }
    if let Some(ref agent_type) = matcher.agent_type {
        assert_eq!(&workflow.agent_type, agent_type, "workflow agent_type doesn't match expected");
    }
}

/// Asserts `from -> to` is a legal transition per [`Workflow::can_transition_to`].
pub fn assert_status_transition_valid(from: WorkflowStatus, to: WorkflowStatus) {
    let workflow = workflow_in_status(from);
    assert!(
        workflow.can_transition_to(to),
        "expected transition from {from:?} to {to:?} to be valid, but it's not"
    );
}

/// Asserts `from -> to` is rejected by [`Workflow::can_transition_to`].
pub fn assert_status_transition_invalid(from: WorkflowStatus, to: WorkflowStatus) {
    let workflow = workflow_in_status(from);
    assert!(
        !workflow.can_transition_to(to),
        "expected transition from {from:?} to {to:?} to be invalid, but it's valid"
    );
}

fn workflow_in_status(status: WorkflowStatus) -> Workflow {
    let now = chrono::Utc::now();
    Workflow {
        id: "wf-assert".to_string(),
        name: None,
        status,
        agent_type: "backend-developer".to_string(),
        agent_role: orchestrator_core::models::AgentRole::Specialist,
        specifications: "spec".to_string(),
        created_at: now,
        updated_at: now,
    }
}

/// Asserts `workflows` contains a workflow with the given id.
pub fn assert_contains_workflow_with_id(workflows: &[Workflow], id: &str) {
    assert!(
        workflows.iter().any(|w| w.id == id),
        "expected to find workflow with id '{id}' in list, but it wasn't found. available ids: {:?}",
        workflows.iter().map(|w| &w.id).collect::<Vec<_>>()
    );
}

/// Asserts `workflows` is sorted most-recently-created first.
pub fn assert_workflows_sorted_by_date(workflows: &[Workflow]) {
    for window in workflows.windows(2) {
        assert!(
            window[0].created_at >= window[1].created_at,
            "workflows are not sorted by creation date (most recent first): '{}' ({}) comes before '{}' ({})",
            window[0].id,
            window[0].created_at,
            window[1].id,
            window[1].created_at
        );
    }
}

/// Flexible partial matcher for [`assert_workflow_matches`].
#[derive(Debug, Default)]
pub struct WorkflowMatcher {
    pub id: Option<String>,
    pub status: Option<WorkflowStatus>,
    pub agent_type: Option<String>,
}

impl WorkflowMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_agent_type(mut self, agent_type: impl Into<String>) -> Self {
        self.agent_type = Some(agent_type.into());
        self
    }
}
