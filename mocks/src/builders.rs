//! Fluent builders for constructing domain entities in tests.

use chrono::{DateTime, Utc};
use orchestrator_core::models::{
    AgentRole, CleanupScheduleRow, Handoff, HandoffType, MemoryRecord, Workflow, WorkflowStatus,
};
use orchestrator_core::repository::WorkflowFilter;

/// Builder for [`Workflow`] instances, defaulting to a freshly
/// `initialized` backend-developer workflow.
pub struct WorkflowBuilder {
    workflow: Workflow,
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            workflow: Workflow {
                id: "wf-test-001".to_string(),
                name: None,
                status: WorkflowStatus::Initialized,
                agent_type: "backend-developer".to_string(),
                agent_role: AgentRole::Specialist,
                specifications: "Test specification".to_string(),
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.workflow.id = id.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.workflow.name = Some(name.into());
        self
    }

    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.workflow.status = status;
        self
    }

    pub fn with_agent_type(mut self, agent_type: impl Into<String>) -> Self {
        let agent_type = agent_type.into();
        self.workflow.agent_role = AgentRole::classify(&agent_type);
        self.workflow.agent_type = agent_type;
        self
    }

    pub fn with_agent_role(mut self, role: AgentRole) -> Self {
        self.workflow.agent_role = role;
        self
    }

    pub fn with_specifications(mut self, specifications: impl Into<String>) -> Self {
        self.workflow.specifications = specifications.into();
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.workflow.created_at = created_at;
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.workflow.updated_at = updated_at;
        self
    }

    pub fn build(self) -> Workflow {
        self.workflow
    }
}

/// Builder for [`Handoff`] instances.
pub struct HandoffBuilder {
    handoff: Handoff,
}

impl Default for HandoffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HandoffBuilder {
    pub fn new() -> Self {
        Self {
            handoff: Handoff {
                id: "handoff-test-001".to_string(),
                from_agent: "team-manager".to_string(),
                to_agent: "backend-developer".to_string(),
                workflow_id: "wf-test-001".to_string(),
                handoff_type: HandoffType::TaskAssignment,
                task_details: "Implement the thing".to_string(),
                created_at: Utc::now(),
                processed: false,
            },
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.handoff.id = id.into();
        self
    }

    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.handoff.workflow_id = workflow_id.into();
        self
    }

    pub fn with_from_agent(mut self, from_agent: impl Into<String>) -> Self {
        self.handoff.from_agent = from_agent.into();
        self
    }

    pub fn with_to_agent(mut self, to_agent: impl Into<String>) -> Self {
        self.handoff.to_agent = to_agent.into();
        self
    }

    pub fn with_type(mut self, handoff_type: HandoffType) -> Self {
        self.handoff.handoff_type = handoff_type;
        self
    }

    pub fn with_task_details(mut self, task_details: impl Into<String>) -> Self {
        self.handoff.task_details = task_details.into();
        self
    }

    pub fn processed(mut self) -> Self {
        self.handoff.processed = true;
        self
    }

    pub fn build(self) -> Handoff {
        self.handoff
    }
}

/// Builder for [`CleanupScheduleRow`] instances.
pub struct CleanupScheduleRowBuilder {
    row: CleanupScheduleRow,
}

impl Default for CleanupScheduleRowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CleanupScheduleRowBuilder {
    pub fn new() -> Self {
        Self {
            row: CleanupScheduleRow {
                id: "cleanup-test-001".to_string(),
                workflow_id: "wf-test-001".to_string(),
                scheduled_for: Utc::now(),
                processed: false,
            },
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.row.id = id.into();
        self
    }

    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.row.workflow_id = workflow_id.into();
        self
    }

    pub fn with_scheduled_for(mut self, scheduled_for: DateTime<Utc>) -> Self {
        self.row.scheduled_for = scheduled_for;
        self
    }

    pub fn processed(mut self) -> Self {
        self.row.processed = true;
        self
    }

    pub fn build(self) -> CleanupScheduleRow {
        self.row
    }
}

/// Builder for [`MemoryRecord`] instances.
pub struct MemoryRecordBuilder {
    record: MemoryRecord,
}

impl Default for MemoryRecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordBuilder {
    pub fn new() -> Self {
        Self {
            record: MemoryRecord {
                id: "mem-test-001".to_string(),
                content: "test memory content".to_string(),
                record_type: "note".to_string(),
                tags: Vec::new(),
                workflow_id: None,
                metadata: Default::default(),
                created_at: Utc::now(),
            },
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.record.id = id.into();
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.record.content = content.into();
        self
    }

    pub fn with_type(mut self, record_type: impl Into<String>) -> Self {
        self.record.record_type = record_type.into();
        self
    }

    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.record.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.record.tags = tags;
        self
    }

    pub fn build(self) -> MemoryRecord {
        self.record
    }
}

/// Builder for [`WorkflowFilter`] instances.
#[derive(Default)]
pub struct WorkflowFilterBuilder {
    filter: WorkflowFilter,
}

impl WorkflowFilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.filter.status = Some(status);
        self
    }

    pub fn with_agent_type(mut self, agent_type: impl Into<String>) -> Self {
        self.filter.agent_type = Some(agent_type.into());
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.filter.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.filter.offset = Some(offset);
        self
    }

    pub fn build(self) -> WorkflowFilter {
        self.filter
    }
}
