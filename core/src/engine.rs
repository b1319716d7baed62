//! [`OrchestrationEngine`]: the single stateful component tying together
//! the durable repositories, the workspace manager, the memory store, and
//! scope control. Every mutation to `workflows`/`handoffs`/the pending-task
//! queue goes through here; no other component writes them (ownership rule,
//! §5).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::error::{OrchestratorError, Result};
use crate::events::{Event, EventEmitter};
use crate::memory::MemoryStore;
use crate::models::{
    AgentRole, CleanupScheduleRow, Handoff, HandoffType, PendingTask, Workflow, WorkflowStatus,
};
use crate::prompts::compose_prompt;
use crate::repository::{
    CleanupScheduleRepository, HandoffRepository, MemoryRepository, WorkflowFilter,
    WorkflowRepository,
};
use crate::scope_control::ScopeControl;
use crate::workspace::{CreateWorkspaceRequest, WorkspaceManager, WorkspaceResources};

/// Request accepted by [`OrchestrationEngine::launch_agent`].
#[derive(Debug, Clone)]
pub struct LaunchAgentRequest {
    pub workflow_id: Option<String>,
    pub agent_type: String,
    pub specifications: String,
    pub from_agent: Option<String>,
    pub workspace_base_ref: Option<String>,
    pub workspace_resources: Option<WorkspaceResources>,
    pub create_workspace: bool,
}

/// Outcome of a [`OrchestrationEngine::launch_agent`] call. `Blocked` and
/// `DuplicateBlocked` are structured successes, not errors: scope control
/// and the duplicate-role rule are admission decisions the caller must
/// react to, not failures.
#[derive(Debug, Clone)]
pub enum LaunchAgentResult {
    Queued {
        task_id: String,
        workflow_id: String,
        violations: Vec<crate::scope_control::Violation>,
        scope_constraints: crate::models::Constraints,
    },
    Blocked {
        violations: Vec<crate::scope_control::Violation>,
    },
    DuplicateBlocked {
        workflow_id: String,
        agent_type: String,
        existing_roles: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub struct SignalCompletionRequest {
    pub agent_id: String,
    pub workflow_id: Option<String>,
    pub result: String,
    pub artifacts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SignalCompletionResponse {
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub task_removed: bool,
}

#[derive(Debug, Clone)]
pub struct CreateHandoffRequest {
    pub workflow_id: String,
    pub from_agent: String,
    pub to_agent: String,
    pub handoff_type: HandoffType,
    pub task_details: String,
}

/// In-memory index the engine keeps on top of the durable tables: the
/// pending-task queue (never persisted — restart drains it) and the
/// active-role registry used to enforce the duplicate-role rule.
struct State {
    pending_tasks: VecDeque<PendingTask>,
    active_roles: HashMap<String, HashSet<String>>,
    task_workflow_index: HashMap<String, String>,
}

impl State {
    fn new() -> Self {
        State {
            pending_tasks: VecDeque::new(),
            active_roles: HashMap::new(),
            task_workflow_index: HashMap::new(),
        }
    }
}

pub struct OrchestrationEngine {
    workflows: Arc<dyn WorkflowRepository>,
    handoffs: Arc<dyn HandoffRepository>,
    cleanups: Arc<dyn CleanupScheduleRepository>,
    memories: Option<Arc<dyn MemoryRepository>>,
    memory_store: Option<Arc<dyn MemoryStore>>,
    workspace: Option<Arc<dyn WorkspaceManager>>,
    scope: Arc<ScopeControl>,
    events: Arc<EventEmitter>,
    state: Mutex<State>,
}

impl OrchestrationEngine {
    pub fn new(
        workflows: Arc<dyn WorkflowRepository>,
        handoffs: Arc<dyn HandoffRepository>,
        cleanups: Arc<dyn CleanupScheduleRepository>,
        scope: Arc<ScopeControl>,
        events: Arc<EventEmitter>,
    ) -> Self {
        OrchestrationEngine {
            workflows,
            handoffs,
            cleanups,
            memories: None,
            memory_store: None,
            workspace: None,
            scope,
            events,
            state: Mutex::new(State::new()),
        }
    }

    pub fn with_memory(
        mut self,
        memories: Arc<dyn MemoryRepository>,
        memory_store: Arc<dyn MemoryStore>,
    ) -> Self {
        self.memories = Some(memories);
        self.memory_store = Some(memory_store);
        self
    }

    pub fn with_workspace(mut self, workspace: Arc<dyn WorkspaceManager>) -> Self {
        self.workspace = Some(workspace);
        self
    }

    pub fn events(&self) -> Arc<EventEmitter> {
        self.events.clone()
    }

    #[instrument(skip(self, request), fields(agent_type = %request.agent_type))]
    pub async fn launch_agent(&self, request: LaunchAgentRequest) -> Result<LaunchAgentResult> {
        let workflow_id = request
            .workflow_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let task_id = PendingTask::make_task_id(&request.agent_type, &workflow_id);

        {
            let state = self.state.lock().await;
            if let Some(roles) = state.active_roles.get(&workflow_id) {
                if roles.contains(&request.agent_type) {
                    return Ok(LaunchAgentResult::DuplicateBlocked {
                        workflow_id,
                        agent_type: request.agent_type,
                        existing_roles: roles.iter().cloned().collect(),
                    });
                }
            }
        }

        let (admitted, violations, constraints) = self.scope.register_task(
            &task_id,
            &workflow_id,
            &request.agent_type,
            &request.specifications,
        );
        if !admitted {
            return Ok(LaunchAgentResult::Blocked { violations });
        }

        let existing = self.workflows.get(&workflow_id).await?;
        let now = Utc::now();
        let agent_role = AgentRole::classify(&request.agent_type);
        let workflow = match existing {
            Some(mut wf) => {
                wf.status = WorkflowStatus::Active;
                wf.agent_type = request.agent_type.clone();
                wf.agent_role = agent_role;
                wf.specifications = request.specifications.clone();
                wf.updated_at = now;
                wf
            }
            None => Workflow {
                id: workflow_id.clone(),
                name: None,
                status: WorkflowStatus::Active,
                agent_type: request.agent_type.clone(),
                agent_role,
                specifications: request.specifications.clone(),
                created_at: now,
                updated_at: now,
            },
        };
        self.workflows.upsert(&workflow).await?;

        if let (Some(repo), Some(_)) = (&self.memories, &self.memory_store) {
            let record = crate::models::MemoryRecord {
                id: uuid::Uuid::new_v4().to_string(),
                content: request.specifications.clone(),
                record_type: "specifications".to_string(),
                tags: vec![request.agent_type.clone()],
                workflow_id: Some(workflow_id.clone()),
                metadata: HashMap::new(),
                created_at: now,
            };
            if let Err(e) = repo.store(&record).await {
                warn!(error = %e, "failed to persist specifications to memory store");
            }
        }

        if request.create_workspace {
            let workspace = self
                .workspace
                .as_ref()
                .ok_or_else(|| OrchestratorError::Configuration("no workspace manager configured".into()))?;
            workspace
                .create(CreateWorkspaceRequest {
                    agent_id: task_id.clone(),
                    base_ref: request.workspace_base_ref.clone(),
                    resources: request.workspace_resources.clone(),
                })
                .await?;
        }

        let scoped_specs =
            crate::scope_control::ScopeControl::generate_scoped_specifications(
                &request.specifications,
                &constraints,
            );
        let prompt = compose_prompt(agent_role, &workflow_id, &scoped_specs, constraints.max_team_size);

        let pending = PendingTask {
            workflow_id: workflow_id.clone(),
            agent_type: request.agent_type.clone(),
            task_id: task_id.clone(),
            prompt,
            scope_constraints: constraints,
            created_at: now,
        };

        {
            let mut state = self.state.lock().await;
            state
                .active_roles
                .entry(workflow_id.clone())
                .or_default()
                .insert(request.agent_type.clone());
            state
                .task_workflow_index
                .insert(task_id.clone(), workflow_id.clone());
            state.pending_tasks.push_back(pending);
        }

        self.events.emit(Event::AgentLaunched {
            task_id: task_id.clone(),
            workflow_id: workflow_id.clone(),
            agent_type: request.agent_type.clone(),
        });
        if !violations.is_empty() {
            self.events.emit(Event::ScopeViolations {
                task_id: task_id.clone(),
                violations: violations.clone(),
            });
        }

        info!(%task_id, %workflow_id, "agent queued");
        Ok(LaunchAgentResult::Queued {
            task_id,
            workflow_id,
            violations,
            scope_constraints: constraints,
        })
    }

    /// Returns every pending task, optionally filtered by `agent_type`.
    /// Callers (the runner) are expected to track which task ids they have
    /// already spawned themselves; the queue is not drained here.
    pub async fn get_pending_tasks(&self, agent_type: Option<&str>) -> Vec<PendingTask> {
        let state = self.state.lock().await;
        state
            .pending_tasks
            .iter()
            .filter(|t| match agent_type {
                Some(at) => at == t.agent_type,
                None => true,
            })
            .cloned()
            .collect()
    }

    #[instrument(skip(self, request), fields(agent_id = %request.agent_id))]
    pub async fn signal_completion(
        &self,
        request: SignalCompletionRequest,
    ) -> Result<SignalCompletionResponse> {
        let workflow_id = {
            let state = self.state.lock().await;
            request
                .workflow_id
                .clone()
                .or_else(|| state.task_workflow_index.get(&request.agent_id).cloned())
        }
        .ok_or_else(|| {
            OrchestratorError::validation(format!(
                "cannot resolve workflow for agent_id {}",
                request.agent_id
            ))
        })?;

        let mut workflow = self
            .workflows
            .get(&workflow_id)
            .await?
            .ok_or_else(|| OrchestratorError::WorkflowNotFound(workflow_id.clone()))?;

        let new_status = if request.result == "ok" {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::Failed
        };
        let now = Utc::now();
        workflow.status = new_status;
        workflow.updated_at = now;
        self.workflows
            .update_status(&workflow_id, new_status, now)
            .await?;

        let task_removed = {
            let mut state = self.state.lock().await;
            let before = state.pending_tasks.len();
            state
                .pending_tasks
                .retain(|t| t.task_id != request.agent_id);
            let removed = state.pending_tasks.len() != before;
            if let Some(roles) = state.active_roles.get_mut(&workflow_id) {
                roles.remove(&workflow.agent_type);
                if roles.is_empty() {
                    state.active_roles.remove(&workflow_id);
                }
            }
            state.task_workflow_index.remove(&request.agent_id);
            removed
        };

        self.scope.complete_task(&request.agent_id);

        if let (Some(repo), Some(_)) = (&self.memories, &self.memory_store) {
            let mut metadata = HashMap::new();
            metadata.insert(
                "artifacts".to_string(),
                serde_json::Value::from(request.artifacts.clone()),
            );
            let record = crate::models::MemoryRecord {
                id: uuid::Uuid::new_v4().to_string(),
                content: request.result.clone(),
                record_type: "completion".to_string(),
                tags: vec![request.agent_id.clone()],
                workflow_id: Some(workflow_id.clone()),
                metadata,
                created_at: now,
            };
            if let Err(e) = repo.store(&record).await {
                warn!(error = %e, "failed to persist completion to memory store");
            }
        }

        self.events.emit(Event::AgentCompleted {
            task_id: request.agent_id.clone(),
            workflow_id: workflow_id.clone(),
            agent_id: request.agent_id,
            result: request.result,
        });

        Ok(SignalCompletionResponse {
            workflow_id,
            status: new_status,
            task_removed,
        })
    }

    pub async fn get_workflow_status(
        &self,
        workflow_id: &str,
    ) -> Result<Option<(Workflow, Vec<Handoff>)>> {
        let workflow = self.workflows.get(workflow_id).await?;
        match workflow {
            Some(wf) => {
                let handoffs = self.handoffs.list_for_workflow(workflow_id, true).await?;
                Ok(Some((wf, handoffs)))
            }
            None => Ok(None),
        }
    }

    pub async fn list_workflows(&self, filter: &WorkflowFilter) -> Result<Vec<Workflow>> {
        self.workflows.list(filter).await
    }

    pub async fn get_workflow_handoffs(
        &self,
        workflow_id: &str,
        include_processed: bool,
    ) -> Result<Vec<Handoff>> {
        self.handoffs
            .list_for_workflow(workflow_id, include_processed)
            .await
    }

    /// Marks a handoff as processed without running its downstream effect.
    /// Used by [`crate::hook::HookDispatcher`], which applies a handoff's
    /// effect inline via `launch_agent` rather than waiting for the next
    /// [`Self::process_pending_events`] drain.
    pub async fn mark_handoff_processed(&self, handoff_id: &str) -> Result<()> {
        self.handoffs.mark_processed(handoff_id).await
    }

    pub async fn create_handoff(&self, request: CreateHandoffRequest) -> Result<Handoff> {
        let handoff = Handoff {
            id: uuid::Uuid::new_v4().to_string(),
            from_agent: request.from_agent,
            to_agent: request.to_agent,
            workflow_id: request.workflow_id.clone(),
            handoff_type: request.handoff_type,
            task_details: request.task_details,
            created_at: Utc::now(),
            processed: false,
        };
        self.handoffs.create(&handoff).await?;
        self.events.emit(Event::HandoffCreated {
            handoff: Some(handoff.clone()),
            handoff_id: handoff.id.clone(),
            workflow_id: handoff.workflow_id.clone(),
        });
        Ok(handoff)
    }

    pub async fn update_workflow_status(
        &self,
        workflow_id: &str,
        status: WorkflowStatus,
    ) -> Result<()> {
        let workflow = self
            .workflows
            .get(workflow_id)
            .await?
            .ok_or_else(|| OrchestratorError::WorkflowNotFound(workflow_id.to_string()))?;
        if !workflow.can_transition_to(status) {
            warn!(
                %workflow_id,
                from = %workflow.status,
                to = %status,
                "applying a status transition the state machine does not expect"
            );
        }
        self.workflows
            .update_status(workflow_id, status, Utc::now())
            .await
    }

    pub async fn schedule_workspace_cleanup(
        &self,
        workflow_id: &str,
        delay_minutes: i64,
    ) -> Result<()> {
        let row = CleanupScheduleRow {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow_id.to_string(),
            scheduled_for: Utc::now() + Duration::minutes(delay_minutes),
            processed: false,
        };
        self.cleanups.schedule(&row).await
    }

    /// Runs every cleanup row whose `scheduled_for` has passed. Workspaces
    /// are keyed by `task_id` (`${agent_type}-${workflow_id}`), not by
    /// `workflow_id` alone, so every workspace record whose `agent_id` ends
    /// in `-${workflow_id}` is cleaned for a due row.
    pub async fn process_scheduled_cleanups(&self) -> Result<usize> {
        let Some(workspace) = self.workspace.clone() else {
            return Ok(0);
        };
        let due = self.cleanups.due(Utc::now()).await?;
        let mut processed = 0usize;
        for row in due {
            let suffix = format!("-{}", row.workflow_id);
            match workspace.list_all().await {
                Ok(records) => {
                    for record in records.into_iter().filter(|r| r.agent_id.ends_with(&suffix)) {
                        if let Err(e) = workspace.cleanup(&record.agent_id, false).await {
                            warn!(error = %e, agent_id = %record.agent_id, "scheduled cleanup failed");
                        }
                    }
                }
                Err(e) => warn!(error = %e, "failed to list workspaces for scheduled cleanup"),
            }
            self.cleanups.mark_processed(&row.id).await?;
            processed += 1;
        }
        Ok(processed)
    }

    pub async fn detect_and_mark_stale_workflows(&self, threshold_minutes: i64) -> Result<Vec<String>> {
        let threshold = Utc::now() - Duration::minutes(threshold_minutes);
        self.workflows.mark_stale_before(threshold).await
    }

    pub async fn cleanup_old_stale_workflows(&self, retention_days: i64) -> Result<u64> {
        let threshold = Utc::now() - Duration::days(retention_days);
        self.workflows.delete_stale_before(threshold).await
    }

    /// Drains unprocessed handoffs in creation order. A handoff is only
    /// marked processed after its downstream effect (if any) succeeds, so a
    /// crash mid-drain never leaves a handoff processed without its launch
    /// having actually happened.
    pub async fn process_pending_events(&self) -> Result<usize> {
        let mut unprocessed = self.handoffs.list_unprocessed().await?;
        unprocessed.sort_by_key(|h| h.created_at);

        let mut processed = 0usize;
        for handoff in unprocessed {
            self.apply_handoff_effect(&handoff).await?;
            self.handoffs.mark_processed(&handoff.id).await?;
            processed += 1;
        }
        Ok(processed)
    }

    /// Internal: the side effect a given handoff triggers, if any. Exposed
    /// to [`crate::hook`] so the hook dispatcher can apply a handoff's
    /// effect immediately without waiting for the next drain.
    pub(crate) async fn apply_handoff_effect(&self, handoff: &Handoff) -> Result<()> {
        if handoff.handoff_type == HandoffType::TaskAssignment
            && handoff.to_agent.to_lowercase().contains("associate")
        {
            let workflow = self.workflows.get(&handoff.workflow_id).await?;
            let specifications = workflow
                .map(|w| w.specifications)
                .unwrap_or_else(|| handoff.task_details.clone());
            self.launch_agent(LaunchAgentRequest {
                workflow_id: Some(handoff.workflow_id.clone()),
                agent_type: handoff.to_agent.clone(),
                specifications,
                from_agent: Some(handoff.from_agent.clone()),
                workspace_base_ref: None,
                workspace_resources: None,
                create_workspace: false,
            })
            .await?;
        }
        Ok(())
    }

    pub fn last_activity_threshold(minutes: i64) -> DateTime<Utc> {
        Utc::now() - Duration::minutes(minutes)
    }
}
