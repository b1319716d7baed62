//! Persistence traits the engine is generic over. Concrete implementations
//! (SQLite today) live in the sibling `database` crate; the `mocks` crate
//! provides in-memory test doubles of the same traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{CleanupScheduleRow, Handoff, MemoryRecord, Workflow, WorkflowStatus};

/// Filters accepted by [`WorkflowRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct WorkflowFilter {
    pub status: Option<WorkflowStatus>,
    pub agent_type: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    async fn upsert(&self, workflow: &Workflow) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Workflow>>;
    async fn list(&self, filter: &WorkflowFilter) -> Result<Vec<Workflow>>;
    async fn update_status(
        &self,
        id: &str,
        status: WorkflowStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()>;
    /// Marks every `active` row whose `updated_at < threshold` as `stale`,
    /// returning the affected ids.
    async fn mark_stale_before(&self, threshold: DateTime<Utc>) -> Result<Vec<String>>;
    /// Deletes `stale` rows whose `updated_at < threshold`, returning the
    /// number of deleted rows.
    async fn delete_stale_before(&self, threshold: DateTime<Utc>) -> Result<u64>;
    async fn count_by_status(&self) -> Result<Vec<(WorkflowStatus, u64)>>;
}

#[async_trait]
pub trait HandoffRepository: Send + Sync {
    async fn create(&self, handoff: &Handoff) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Handoff>>;
    async fn list_for_workflow(
        &self,
        workflow_id: &str,
        include_processed: bool,
    ) -> Result<Vec<Handoff>>;
    async fn list_unprocessed(&self) -> Result<Vec<Handoff>>;
    async fn mark_processed(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait CleanupScheduleRepository: Send + Sync {
    async fn schedule(&self, row: &CleanupScheduleRow) -> Result<()>;
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<CleanupScheduleRow>>;
    async fn mark_processed(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait MemoryRepository: Send + Sync {
    async fn store(&self, record: &MemoryRecord) -> Result<()>;
    async fn retrieve_by_workflow(
        &self,
        workflow_id: &str,
        record_type: Option<&str>,
    ) -> Result<Vec<MemoryRecord>>;
    async fn retrieve_by_text(&self, query: &str, limit: u32) -> Result<Vec<MemoryRecord>>;
}

/// Records a single RPC invocation for later usage analysis. Distinct from
/// [`WorkflowRepository`] et al. because it has no read side the engine
/// needs: the transport layer writes, nothing downstream of it reads back.
#[async_trait]
pub trait ToolUsageRepository: Send + Sync {
    async fn record(&self, tool_name: &str, session_id: &str) -> Result<()>;
}

/// Aggregate counters surfaced by `get_system_status`.
#[derive(Debug, Clone, Default)]
pub struct RepositoryStats {
    pub workflows_by_status: std::collections::HashMap<String, u64>,
    pub total_workflows: u64,
}
