//! RPC surface: per-operation argument/result DTOs plus a [`dispatch`]
//! function mapping the twelve named operations (§6) onto
//! [`crate::engine::OrchestrationEngine`] and the workspace manager. The
//! wire framing itself (HTTP + JSON-RPC 2.0 envelope, SSE) lives in the
//! `mcp-protocol` crate; this module only decodes/encodes the argument and
//! result bags so that crate stays a thin transport shim.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::{
    CreateHandoffRequest, LaunchAgentRequest, LaunchAgentResult, OrchestrationEngine,
    SignalCompletionRequest,
};
use crate::error::{OrchestratorError, Result};
use crate::models::{HandoffType, WorkflowStatus};
use crate::repository::{ToolUsageRepository, WorkflowFilter};
use crate::scope_control::Violation;
use crate::workspace::{
    CreateWorkspaceRequest, WorkspaceManager, WorkspaceResources, WorkspaceStats,
};

#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceConfigArg {
    #[serde(default)]
    pub base_ref: Option<String>,
    #[serde(default)]
    pub resources: Option<WorkspaceResources>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LaunchAgentParams {
    pub agent_type: String,
    pub specifications: String,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub workspace_config: Option<WorkspaceConfigArg>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LaunchAgentOutcome {
    Queued {
        workflow_id: String,
        task_id: String,
        scope_constraints: crate::models::Constraints,
        violations: Vec<Violation>,
        prompt_preview: String,
    },
    Blocked {
        reason: String,
        violations: Vec<Violation>,
    },
    DuplicateBlocked {
        reason: String,
        existing_roles: Vec<String>,
    },
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GetPendingTasksParams {
    #[serde(default)]
    pub agent_type: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetPendingTasksResult {
    pub count: usize,
    pub tasks: Vec<crate::models::PendingTask>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalCompletionParams {
    pub agent_id: String,
    #[serde(default)]
    pub workflow_id: Option<String>,
    pub result: String,
    #[serde(default)]
    pub artifacts: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignalCompletionResult {
    pub status: WorkflowStatus,
    pub tasks_removed: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateWorkspaceParams {
    pub agent_id: String,
    #[serde(default)]
    pub base_ref: Option<String>,
    #[serde(default)]
    pub resources: Option<WorkspaceResources>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CleanupWorkspaceParams {
    pub agent_id: String,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GetSystemStatusParams {
    #[serde(default)]
    pub include_metrics: bool,
    #[serde(default)]
    pub include_health_checks: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatusResult {
    pub workflows_by_status: std::collections::HashMap<String, u64>,
    pub total_workflows: u64,
    pub workspace_stats: Option<WorkspaceStats>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListWorkflowsParams {
    #[serde(default)]
    pub status: Option<WorkflowStatus>,
    #[serde(default)]
    pub agent_type: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetWorkflowHandoffsParams {
    pub workflow_id: String,
    #[serde(default)]
    pub include_processed: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DetectStaleWorkflowsParams {
    #[serde(default = "default_stale_threshold_minutes")]
    pub threshold_minutes: i64,
}

fn default_stale_threshold_minutes() -> i64 {
    60
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CleanupStaleWorkflowsParams {
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

fn default_retention_days() -> i64 {
    7
}

/// The holders the dispatcher needs: the engine and (optionally) a
/// workspace manager for the `*_workspace`/`list_workspaces` operations
/// that act on it directly rather than through `launch_agent`.
pub struct Handlers {
    pub engine: Arc<OrchestrationEngine>,
    pub workspace: Option<Arc<dyn WorkspaceManager>>,
    pub tool_usage: Option<Arc<dyn ToolUsageRepository>>,
}

/// Decodes `arguments` per `name`, invokes the matching engine/workspace
/// operation, and serializes the result back to JSON. Unknown operation
/// names and malformed argument bags both surface as
/// [`OrchestratorError::Validation`].
///
/// `session_id` identifies the caller for the `tool_usage` audit trail; a
/// failure to record it is logged and never fails the RPC itself.
pub async fn dispatch(handlers: &Handlers, name: &str, session_id: &str, arguments: Value) -> Result<Value> {
    fn decode<T: serde::de::DeserializeOwned>(arguments: Value) -> Result<T> {
        serde_json::from_value(arguments)
            .map_err(|e| OrchestratorError::validation(format!("invalid arguments: {e}")))
    }

    if let Some(tool_usage) = &handlers.tool_usage {
        if let Err(e) = tool_usage.record(name, session_id).await {
            tracing::warn!(error = %e, tool = %name, "failed to record tool usage");
        }
    }

    match name {
        "launch_agent" => {
            let params: LaunchAgentParams = decode(arguments)?;
            let (create_workspace, base_ref, resources) = match params.workspace_config {
                Some(cfg) => (true, cfg.base_ref, cfg.resources),
                None => (false, None, None),
            };
            let result = handlers
                .engine
                .launch_agent(LaunchAgentRequest {
                    workflow_id: params.workflow_id,
                    agent_type: params.agent_type,
                    specifications: params.specifications,
                    from_agent: None,
                    workspace_base_ref: base_ref,
                    workspace_resources: resources,
                    create_workspace,
                })
                .await?;
            let outcome = match result {
                LaunchAgentResult::Queued {
                    task_id,
                    workflow_id,
                    violations,
                    scope_constraints,
                } => LaunchAgentOutcome::Queued {
                    prompt_preview: preview_for(&handlers.engine, &task_id).await,
                    scope_constraints,
                    workflow_id,
                    task_id,
                    violations,
                },
                LaunchAgentResult::Blocked { violations } => LaunchAgentOutcome::Blocked {
                    reason: "scope control rejected this task".to_string(),
                    violations,
                },
                LaunchAgentResult::DuplicateBlocked {
                    workflow_id,
                    agent_type,
                    existing_roles,
                } => LaunchAgentOutcome::DuplicateBlocked {
                    reason: format!(
                        "role {agent_type} is already active on workflow {workflow_id}"
                    ),
                    existing_roles,
                },
            };
            Ok(serde_json::to_value(outcome)?)
        }
        "get_pending_tasks" => {
            let params: GetPendingTasksParams = decode(arguments)?;
            let tasks = handlers
                .engine
                .get_pending_tasks(params.agent_type.as_deref())
                .await;
            Ok(serde_json::to_value(GetPendingTasksResult {
                count: tasks.len(),
                tasks,
            })?)
        }
        "signal_completion" => {
            let params: SignalCompletionParams = decode(arguments)?;
            let response = handlers
                .engine
                .signal_completion(SignalCompletionRequest {
                    agent_id: params.agent_id,
                    workflow_id: params.workflow_id,
                    result: params.result,
                    artifacts: params.artifacts,
                })
                .await?;
            Ok(serde_json::to_value(SignalCompletionResult {
                status: response.status,
                tasks_removed: usize::from(response.task_removed),
            })?)
        }
        "create_workspace" => {
            let params: CreateWorkspaceParams = decode(arguments)?;
            let workspace = handlers.workspace.as_ref().ok_or_else(|| {
                OrchestratorError::Configuration("no workspace manager configured".into())
            })?;
            let response = workspace
                .create(CreateWorkspaceRequest {
                    agent_id: params.agent_id,
                    base_ref: params.base_ref,
                    resources: params.resources,
                })
                .await?;
            Ok(serde_json::to_value(response)?)
        }
        "cleanup_workspace" => {
            let params: CleanupWorkspaceParams = decode(arguments)?;
            let workspace = handlers.workspace.as_ref().ok_or_else(|| {
                OrchestratorError::Configuration("no workspace manager configured".into())
            })?;
            let response = workspace.cleanup(&params.agent_id, params.force).await?;
            Ok(serde_json::to_value(response)?)
        }
        "list_workspaces" => {
            let workspace = handlers.workspace.as_ref().ok_or_else(|| {
                OrchestratorError::Configuration("no workspace manager configured".into())
            })?;
            let records = workspace.list_all().await?;
            Ok(serde_json::to_value(records)?)
        }
        "get_system_status" => {
            let _params: GetSystemStatusParams = decode(arguments)?;
            let workflows = handlers.engine.list_workflows(&WorkflowFilter::default()).await?;
            let mut workflows_by_status = std::collections::HashMap::new();
            for wf in &workflows {
                *workflows_by_status.entry(wf.status.to_string()).or_insert(0u64) += 1;
            }
            let workspace_stats = match &handlers.workspace {
                Some(w) => Some(w.get_stats().await?),
                None => None,
            };
            Ok(serde_json::to_value(SystemStatusResult {
                total_workflows: workflows.len() as u64,
                workflows_by_status,
                workspace_stats,
            })?)
        }
        "get_workflow_status" => {
            let workflow_id = expect_workflow_id(&arguments)?;
            let status = handlers.engine.get_workflow_status(&workflow_id).await?;
            Ok(serde_json::to_value(status)?)
        }
        "list_workflows" => {
            let params: ListWorkflowsParams = decode(arguments)?;
            let filter = WorkflowFilter {
                status: params.status,
                agent_type: params.agent_type,
                limit: params.limit,
                offset: params.offset,
            };
            let workflows = handlers.engine.list_workflows(&filter).await?;
            Ok(serde_json::to_value(workflows)?)
        }
        "get_workflow_handoffs" => {
            let params: GetWorkflowHandoffsParams = decode(arguments)?;
            let handoffs = handlers
                .engine
                .get_workflow_handoffs(&params.workflow_id, params.include_processed)
                .await?;
            Ok(serde_json::to_value(handoffs)?)
        }
        "detect_stale_workflows" => {
            let params: DetectStaleWorkflowsParams = decode(arguments)?;
            let ids = handlers
                .engine
                .detect_and_mark_stale_workflows(params.threshold_minutes)
                .await?;
            Ok(serde_json::to_value(ids)?)
        }
        "cleanup_stale_workflows" => {
            let params: CleanupStaleWorkflowsParams = decode(arguments)?;
            let deleted = handlers
                .engine
                .cleanup_old_stale_workflows(params.retention_days)
                .await?;
            Ok(serde_json::to_value(deleted)?)
        }
        other => Err(OrchestratorError::validation(format!(
            "unknown operation: {other}"
        ))),
    }
}

async fn preview_for(engine: &OrchestrationEngine, task_id: &str) -> String {
    engine
        .get_pending_tasks(None)
        .await
        .into_iter()
        .find(|t| t.task_id == task_id)
        .map(|t| t.prompt.chars().take(280).collect())
        .unwrap_or_default()
}

fn expect_workflow_id(arguments: &Value) -> Result<String> {
    arguments
        .get("workflow_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| OrchestratorError::validation("missing required field: workflow_id"))
}

/// Helper re-export so callers composing handoffs through the RPC layer
/// (rather than `HookDispatcher`) can construct the request without
/// depending on `crate::engine` directly.
pub fn handoff_type_from_str(s: &str) -> Result<HandoffType> {
    s.parse().map_err(OrchestratorError::validation)
}

pub fn create_handoff_request(
    workflow_id: String,
    from_agent: String,
    to_agent: String,
    handoff_type: HandoffType,
    task_details: String,
) -> CreateHandoffRequest {
    CreateHandoffRequest {
        workflow_id,
        from_agent,
        to_agent,
        handoff_type,
        task_details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_operation_is_validation_error() {
        let err = handoff_type_from_str("not_a_type").unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }
}
