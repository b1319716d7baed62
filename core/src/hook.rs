//! `HookDispatcher`: the engine-facing contract for the component that
//! watches agent transcripts for completion markers. Transcript parsing
//! itself is out of scope (§1 non-goals); this module only defines what
//! happens once a marker has already been recognized as one of the four
//! named kinds.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::{CreateHandoffRequest, LaunchAgentRequest, OrchestrationEngine};
use crate::error::Result;
use crate::models::{HandoffType, WorkflowStatus};

/// The four transcript markers the dispatcher reacts to. Parsing raw
/// transcript text into one of these is the caller's job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMarker {
    TaskAssignment,
    ReviewRequired,
    ImplementationComplete,
    ApprovedForIntegration,
}

#[derive(Debug, Clone)]
pub struct MarkerEvent {
    pub marker: CompletionMarker,
    pub workflow_id: String,
    pub from_agent: String,
    pub to_agent: String,
    pub specifications: String,
    pub task_details: String,
}

/// Reacts to a recognized transcript marker by creating the matching
/// handoff, updating workflow status, and — for the markers that call for
/// it — immediately invoking `launch_agent` rather than waiting for the
/// next `process_pending_events` sweep.
pub struct HookDispatcher {
    engine: Arc<OrchestrationEngine>,
}

impl HookDispatcher {
    pub fn new(engine: Arc<OrchestrationEngine>) -> Self {
        HookDispatcher { engine }
    }

    pub async fn dispatch(&self, event: MarkerEvent) -> Result<()> {
        let (handoff_type, new_status) = match event.marker {
            CompletionMarker::TaskAssignment => (HandoffType::TaskAssignment, WorkflowStatus::Delegation),
            CompletionMarker::ReviewRequired => (HandoffType::ReviewRequest, WorkflowStatus::AwaitingApproval),
            CompletionMarker::ImplementationComplete => {
                (HandoffType::ReviewRequest, WorkflowStatus::AwaitingApproval)
            }
            CompletionMarker::ApprovedForIntegration => {
                (HandoffType::IntegrationReady, WorkflowStatus::Approved)
            }
        };

        let handoff = self
            .engine
            .create_handoff(CreateHandoffRequest {
                workflow_id: event.workflow_id.clone(),
                from_agent: event.from_agent.clone(),
                to_agent: event.to_agent.clone(),
                handoff_type,
                task_details: event.task_details.clone(),
            })
            .await?;

        self.engine
            .update_workflow_status(&event.workflow_id, new_status)
            .await?;

        match event.marker {
            CompletionMarker::TaskAssignment | CompletionMarker::ReviewRequired => {
                self.engine
                    .launch_agent(LaunchAgentRequest {
                        workflow_id: Some(event.workflow_id.clone()),
                        agent_type: event.to_agent.clone(),
                        specifications: event.specifications.clone(),
                        from_agent: Some(event.from_agent.clone()),
                        workspace_base_ref: None,
                        workspace_resources: None,
                        create_workspace: false,
                    })
                    .await?;
                self.engine.mark_handoff_processed(&handoff.id).await?;
            }
            CompletionMarker::ImplementationComplete => {
                self.engine
                    .launch_agent(LaunchAgentRequest {
                        workflow_id: Some(event.workflow_id.clone()),
                        agent_type: event.to_agent.clone(),
                        specifications: event.specifications.clone(),
                        from_agent: Some(event.from_agent.clone()),
                        workspace_base_ref: None,
                        workspace_resources: None,
                        create_workspace: false,
                    })
                    .await?;
                self.engine.mark_handoff_processed(&handoff.id).await?;
            }
            CompletionMarker::ApprovedForIntegration => {
                self.engine
                    .schedule_workspace_cleanup(&event.workflow_id, 15)
                    .await?;
                self.engine.mark_handoff_processed(&handoff.id).await?;
            }
        }

        self.engine.process_pending_events().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::OrchestrationEngine;
    use crate::events::EventEmitter;
    use crate::scope_control::ScopeControl;
    use std::sync::Arc;

    struct NullWorkflowRepo;
    struct NullHandoffRepo;
    struct NullCleanupRepo;

    #[async_trait::async_trait]
    impl crate::repository::WorkflowRepository for NullWorkflowRepo {
        async fn upsert(&self, _workflow: &crate::models::Workflow) -> Result<()> {
            Ok(())
        }
        async fn get(&self, _id: &str) -> Result<Option<crate::models::Workflow>> {
            Ok(Some(crate::models::Workflow {
                id: "w1".into(),
                name: None,
                status: WorkflowStatus::Active,
                agent_type: "team-manager".into(),
                agent_role: crate::models::AgentRole::Manager,
                specifications: "spec".into(),
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            }))
        }
        async fn list(
            &self,
            _filter: &crate::repository::WorkflowFilter,
        ) -> Result<Vec<crate::models::Workflow>> {
            Ok(Vec::new())
        }
        async fn update_status(
            &self,
            _id: &str,
            _status: WorkflowStatus,
            _updated_at: chrono::DateTime<chrono::Utc>,
        ) -> Result<()> {
            Ok(())
        }
        async fn mark_stale_before(
            &self,
            _threshold: chrono::DateTime<chrono::Utc>,
        ) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn delete_stale_before(&self, _threshold: chrono::DateTime<chrono::Utc>) -> Result<u64> {
            Ok(0)
        }
        async fn count_by_status(&self) -> Result<Vec<(WorkflowStatus, u64)>> {
            Ok(Vec::new())
        }
    }

    #[async_trait::async_trait]
    impl crate::repository::HandoffRepository for NullHandoffRepo {
        async fn create(&self, _handoff: &crate::models::Handoff) -> Result<()> {
            Ok(())
        }
        async fn get(&self, _id: &str) -> Result<Option<crate::models::Handoff>> {
            Ok(None)
        }
        async fn list_for_workflow(
            &self,
            _workflow_id: &str,
            _include_processed: bool,
        ) -> Result<Vec<crate::models::Handoff>> {
            Ok(Vec::new())
        }
        async fn list_unprocessed(&self) -> Result<Vec<crate::models::Handoff>> {
            Ok(Vec::new())
        }
        async fn mark_processed(&self, _id: &str) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl crate::repository::CleanupScheduleRepository for NullCleanupRepo {
        async fn schedule(&self, _row: &crate::models::CleanupScheduleRow) -> Result<()> {
            Ok(())
        }
        async fn due(
            &self,
            _now: chrono::DateTime<chrono::Utc>,
        ) -> Result<Vec<crate::models::CleanupScheduleRow>> {
            Ok(Vec::new())
        }
        async fn mark_processed(&self, _id: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn approved_for_integration_schedules_cleanup() {
        let engine = Arc::new(OrchestrationEngine::new(
            Arc::new(NullWorkflowRepo),
            Arc::new(NullHandoffRepo),
            Arc::new(NullCleanupRepo),
            Arc::new(ScopeControl::new()),
            Arc::new(EventEmitter::default()),
        ));
        let dispatcher = HookDispatcher::new(engine);
        let result = dispatcher
            .dispatch(MarkerEvent {
                marker: CompletionMarker::ApprovedForIntegration,
                workflow_id: "w1".into(),
                from_agent: "team-manager-w1".into(),
                to_agent: "orchestrator".into(),
                specifications: "spec".into(),
                task_details: "approved".into(),
            })
            .await;
        assert!(result.is_ok());
    }
}
