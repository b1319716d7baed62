//! Random test data generators using the `fake` crate.

use chrono::Utc;
use fake::faker::lorem::en::{Paragraph, Sentence};
use fake::Fake;
use rand::Rng;

use orchestrator_core::models::{AgentRole, Workflow, WorkflowStatus};

/// A realistic agent-type label (e.g. `backend-developer`, `team-manager`).
pub fn generate_agent_type() -> String {
    let agent_types = [
        "team-manager",
        "backend-developer",
        "frontend-developer",
        "database-engineer",
        "protocol-specialist",
        "integration-associate",
        "testing-specialist",
        "documentation-specialist",
        "security-auditor",
    ];
    agent_types[rand::thread_rng().gen_range(0..agent_types.len())].to_string()
}

/// A short specification sentence.
pub fn generate_specifications() -> String {
    Sentence(8..20).fake()
}

/// A multi-sentence task-details paragraph, as used in handoffs.
pub fn generate_task_details() -> String {
    Paragraph(2..5).fake()
}

/// A random workflow id in the `wf-<uuid>` shape the engine assigns.
pub fn generate_workflow_id() -> String {
    format!("wf-{}", uuid::Uuid::new_v4())
}

fn generate_random_status() -> WorkflowStatus {
    let statuses = [
        WorkflowStatus::Initialized,
        WorkflowStatus::Active,
        WorkflowStatus::Delegation,
        WorkflowStatus::AwaitingApproval,
        WorkflowStatus::RevisionRequired,
        WorkflowStatus::Approved,
        WorkflowStatus::Completed,
        WorkflowStatus::Failed,
        WorkflowStatus::Stale,
    ];
    statuses[rand::thread_rng().gen_range(0..statuses.len())]
}

/// A random, fully-populated [`Workflow`].
pub fn generate_random_workflow() -> Workflow {
    let agent_type = generate_agent_type();
    let now = Utc::now();
    Workflow {
        id: generate_workflow_id(),
        name: None,
        status: generate_random_status(),
        agent_role: AgentRole::classify(&agent_type),
        agent_type,
        specifications: generate_specifications(),
        created_at: now,
        updated_at: now,
    }
}

/// Configurable workflow generator, for tests that want a fixed pool of
/// agent types rather than the full realistic spread.
pub struct WorkflowGenerator {
    pub agent_type_pool: Vec<String>,
}

impl Default for WorkflowGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowGenerator {
    pub fn new() -> Self {
        Self {
            agent_type_pool: vec![
                "backend-developer".to_string(),
                "frontend-developer".to_string(),
                "team-manager".to_string(),
            ],
        }
    }

    pub fn generate(&self) -> Workflow {
        let agent_type = self.agent_type_pool[rand::thread_rng().gen_range(0..self.agent_type_pool.len())].clone();
        let now = Utc::now();
        Workflow {
            id: generate_workflow_id(),
            name: None,
            status: WorkflowStatus::Initialized,
            agent_role: AgentRole::classify(&agent_type),
            agent_type,
            specifications: generate_specifications(),
            created_at: now,
            updated_at: now,
        }
    }
}
