//! Domain entities owned by the orchestrator core: [`Workflow`], [`Handoff`],
//! [`PendingTask`], [`TaskScope`]/[`Constraints`], [`CleanupScheduleRow`], and
//! [`MemoryRecord`]. See the module-level ownership rule: each table/map is
//! exclusively owned by one component (engine, scope control, or the memory
//! store); no cross-component mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A named, persisted unit of work attributed to an agent role.
///
/// # Examples
///
/// ```rust
/// use orchestrator_core::models::{Workflow, WorkflowStatus};
/// use chrono::Utc;
///
/// let now = Utc::now();
/// let workflow = Workflow {
///     id: "wf-1".to_string(),
///     name: None,
///     status: WorkflowStatus::Initialized,
///     agent_type: "backend-developer".to_string(),
///     agent_role: AgentRole::Associate,
///     specifications: "Add unit tests for calculateTotal".to_string(),
///     created_at: now,
///     updated_at: now,
/// };
/// assert!(workflow.can_transition_to(WorkflowStatus::Active));
/// # use orchestrator_core::models::AgentRole;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workflow {
    /// Stable unique identifier.
    pub id: String,
    /// Optional human-readable label; not part of the specified contract
    /// but persisted alongside the row (see `workflows` table layout).
    pub name: Option<String>,
    pub status: WorkflowStatus,
    pub agent_type: String,
    pub agent_role: AgentRole,
    pub specifications: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Whether this workflow's status machine permits moving to `to`.
    ///
    /// The specification names the status set but not an exhaustive
    /// transition table; this implementation permits any forward move out
    /// of a non-terminal state, and treats `completed`/`failed`/`stale` as
    /// terminal except that `stale` workflows are explicitly revivable by
    /// a fresh `launchAgent` (returned to `active`).
    pub fn can_transition_to(&self, to: WorkflowStatus) -> bool {
        use WorkflowStatus::*;
        match self.status {
            Completed | Failed => false,
            Stale => matches!(to, Active),
            _ => to != self.status,
        }
    }
}

/// Workflow lifecycle states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Initialized,
    Active,
    Delegation,
    AwaitingApproval,
    RevisionRequired,
    Approved,
    Completed,
    Failed,
    Stale,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkflowStatus::Initialized => "initialized",
            WorkflowStatus::Active => "active",
            WorkflowStatus::Delegation => "delegation",
            WorkflowStatus::AwaitingApproval => "awaiting_approval",
            WorkflowStatus::RevisionRequired => "revision_required",
            WorkflowStatus::Approved => "approved",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Stale => "stale",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "initialized" => WorkflowStatus::Initialized,
            "active" => WorkflowStatus::Active,
            "delegation" => WorkflowStatus::Delegation,
            "awaiting_approval" => WorkflowStatus::AwaitingApproval,
            "revision_required" => WorkflowStatus::RevisionRequired,
            "approved" => WorkflowStatus::Approved,
            "completed" => WorkflowStatus::Completed,
            "failed" => WorkflowStatus::Failed,
            "stale" => WorkflowStatus::Stale,
            other => return Err(format!("unknown workflow status: {other}")),
        })
    }
}

impl WorkflowStatus {
    /// Runner must not spawn a worker for a task whose workflow is in one
    /// of these statuses (§4.2 poll cycle step 3a).
    pub fn blocks_spawn(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Failed
                | WorkflowStatus::Completed
                | WorkflowStatus::Stale
                | WorkflowStatus::Approved
        )
    }
}

/// Distinguishes managers (may spawn associates) from associates (may not).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Manager,
    Associate,
    Specialist,
}

impl AgentRole {
    /// Classifies an `agent_type` label like `team-manager` or
    /// `backend-developer` into a role, by substring match.
    pub fn classify(agent_type: &str) -> Self {
        let lower = agent_type.to_lowercase();
        if lower.contains("manager") || lower.contains("lead") {
            AgentRole::Manager
        } else if lower.contains("associate") {
            AgentRole::Associate
        } else {
            AgentRole::Specialist
        }
    }
}

/// A recorded intent to transition control between agent roles within a
/// workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Handoff {
    pub id: String,
    pub from_agent: String,
    pub to_agent: String,
    pub workflow_id: String,
    #[serde(rename = "type")]
    pub handoff_type: HandoffType,
    pub task_details: String,
    pub created_at: DateTime<Utc>,
    /// Monotonically false→true; never reset.
    pub processed: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HandoffType {
    TaskAssignment,
    ReviewRequest,
    IntegrationReady,
    RevisionRequest,
}

impl std::fmt::Display for HandoffType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HandoffType::TaskAssignment => "task_assignment",
            HandoffType::ReviewRequest => "review_request",
            HandoffType::IntegrationReady => "integration_ready",
            HandoffType::RevisionRequest => "revision_request",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for HandoffType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "task_assignment" => HandoffType::TaskAssignment,
            "review_request" => HandoffType::ReviewRequest,
            "integration_ready" => HandoffType::IntegrationReady,
            "revision_request" => HandoffType::RevisionRequest,
            other => return Err(format!("unknown handoff type: {other}")),
        })
    }
}

/// An in-memory, non-durable request to spawn a worker subprocess for a
/// given agent role within a workflow. At most one pending task exists per
/// `(workflow_id, agent_type)` pair (duplicate-role rule).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingTask {
    pub workflow_id: String,
    pub agent_type: String,
    /// `${agent_type}-${workflow_id}`
    pub task_id: String,
    pub prompt: String,
    pub scope_constraints: Constraints,
    pub created_at: DateTime<Utc>,
}

impl PendingTask {
    pub fn make_task_id(agent_type: &str, workflow_id: &str) -> String {
        format!("{agent_type}-{workflow_id}")
    }
}

/// Coarse work-size classification driving the constraints table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Simple,
    Moderate,
    Complex,
}

impl std::fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ComplexityLevel::Simple => "simple",
            ComplexityLevel::Moderate => "moderate",
            ComplexityLevel::Complex => "complex",
        };
        write!(f, "{s}")
    }
}

/// Immutable value object attached to a [`TaskScope`] at admission time.
/// See the per-complexity table in the scope-control component design.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Constraints {
    pub max_workspace_size_bytes: u64,
    pub max_execution_time_secs: u64,
    pub max_agent_count: u32,
    pub max_file_count: u32,
    pub max_team_size: u32,
    pub max_directory_depth: u32,
    pub max_spec_length: usize,
    pub max_delegation_depth: u32,
    pub max_concurrent_tasks: u32,
    pub requires_approval: bool,
    pub auto_stop_on_overengineering: bool,
}

const MIB: u64 = 1024 * 1024;

impl Constraints {
    pub fn for_complexity(level: ComplexityLevel) -> Self {
        match level {
            ComplexityLevel::Simple => Constraints {
                max_workspace_size_bytes: MIB,
                max_execution_time_secs: 5 * 60,
                max_agent_count: 1,
                max_file_count: 10,
                max_team_size: 1,
                max_directory_depth: 4,
                max_spec_length: 2000,
                max_delegation_depth: 2,
                max_concurrent_tasks: 2,
                requires_approval: false,
                auto_stop_on_overengineering: true,
            },
            ComplexityLevel::Moderate => Constraints {
                max_workspace_size_bytes: 5 * MIB,
                max_execution_time_secs: 10 * 60,
                max_agent_count: 2,
                max_file_count: 25,
                max_team_size: 2,
                max_directory_depth: 4,
                max_spec_length: 2000,
                max_delegation_depth: 2,
                max_concurrent_tasks: 2,
                requires_approval: false,
                auto_stop_on_overengineering: true,
            },
            ComplexityLevel::Complex => Constraints {
                max_workspace_size_bytes: 15 * MIB,
                max_execution_time_secs: 20 * 60,
                max_agent_count: 4,
                max_file_count: 75,
                max_team_size: 4,
                max_directory_depth: 4,
                max_spec_length: 2000,
                max_delegation_depth: 2,
                max_concurrent_tasks: 2,
                requires_approval: true,
                auto_stop_on_overengineering: true,
            },
        }
    }

    pub fn max_workspace_size_mib(&self) -> f64 {
        self.max_workspace_size_bytes as f64 / MIB as f64
    }
}

/// In-memory, scope-control-only record of an active task: resource/time
/// accounting lives here, not on the durable `Workflow` row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskScope {
    pub id: String,
    pub workflow_id: String,
    pub agent_type: String,
    pub specifications: String,
    pub constraints: Constraints,
    pub start_time: DateTime<Utc>,
    pub estimated_complexity: ComplexityLevel,
    pub success_criteria: Vec<String>,
    pub boundaries: Vec<String>,
}

/// A due cleanup row: `workspace.cleanup` is invoked for `workflow_id` once
/// `scheduled_for` has passed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CleanupScheduleRow {
    pub id: String,
    pub workflow_id: String,
    pub scheduled_for: DateTime<Utc>,
    pub processed: bool,
}

/// Opaque-to-core memory record; the memory store owns retrieval/embedding
/// semantics, the core only writes and tags records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    pub id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub tags: Vec<String>,
    pub workflow_id: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
