//! In-memory doubles of the four persistence traits plus the workspace and
//! memory-store collaborators, for engine-level tests that don't need a
//! real SQLite file or real git worktrees.
//!
//! Each mock supports error injection (fail the next call with a given
//! error) and call-history tracking, mirroring how the database crate's
//! own tests exercise the trait boundary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::memory::{MemoryStore, RetrieveRequest, RetrieveResponse, RetrievedItem, StoreRequest, StoreResponse};
use orchestrator_core::models::{CleanupScheduleRow, Handoff, MemoryRecord, Workflow, WorkflowStatus};
use orchestrator_core::repository::{
    CleanupScheduleRepository, HandoffRepository, MemoryRepository, ToolUsageRepository, WorkflowFilter,
    WorkflowRepository,
};
use orchestrator_core::workspace::{
    sanitize_agent_id, CleanupWorkspaceResponse, CreateWorkspaceRequest, CreateWorkspaceResponse,
    WorkspaceCleanupStatus, WorkspaceCreateStatus, WorkspaceManager, WorkspaceRecord, WorkspaceStats,
};

/// In-memory [`WorkflowRepository`] backed by a `HashMap`.
pub struct InMemoryWorkflowRepository {
    rows: Mutex<HashMap<String, Workflow>>,
    error_injection: Mutex<Option<OrchestratorError>>,
    call_history: Mutex<Vec<String>>,
}

impl Default for InMemoryWorkflowRepository {
    fn default() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            error_injection: Mutex::new(None),
            call_history: Mutex::new(Vec::new()),
        }
    }
}

impl InMemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workflows(workflows: Vec<Workflow>) -> Self {
        let repo = Self::default();
        let mut rows = repo.rows.lock();
        for wf in workflows {
            rows.insert(wf.id.clone(), wf);
        }
        drop(rows);
        repo
    }

    /// Fails the next call with `error`, then clears itself.
    pub fn inject_error(&self, error: OrchestratorError) {
        *self.error_injection.lock() = Some(error);
    }

    pub fn call_history(&self) -> Vec<String> {
        self.call_history.lock().clone()
    }

    pub fn assert_called(&self, method: &str) {
        let history = self.call_history.lock();
        assert!(
            history.iter().any(|c| c.contains(method)),
            "method '{method}' was not called. call history: {:?}",
            *history
        );
    }

    fn check_error(&self) -> Result<()> {
        if let Some(error) = self.error_injection.lock().take() {
            return Err(error);
        }
        Ok(())
    }

    fn record(&self, call: impl Into<String>) {
        self.call_history.lock().push(call.into());
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn upsert(&self, workflow: &Workflow) -> Result<()> {
        self.record(format!("upsert(id={})", workflow.id));
        self.check_error()?;
        self.rows.lock().insert(workflow.id.clone(), workflow.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Workflow>> {
        self.record(format!("get(id={id})"));
        self.check_error()?;
        Ok(self.rows.lock().get(id).cloned())
    }

    async fn list(&self, filter: &WorkflowFilter) -> Result<Vec<Workflow>> {
        self.record("list");
        self.check_error()?;
        let rows = self.rows.lock();
        let mut result: Vec<Workflow> = rows
            .values()
            .filter(|wf| filter.status.map(|s| s == wf.status).unwrap_or(true))
            .filter(|wf| filter.agent_type.as_deref().map(|t| t == wf.agent_type).unwrap_or(true))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(offset) = filter.offset {
            if offset as usize >= result.len() {
                return Ok(Vec::new());
            }
            result = result.into_iter().skip(offset as usize).collect();
        }
        if let Some(limit) = filter.limit {
            result.truncate(limit as usize);
        }
        Ok(result)
    }

    async fn update_status(&self, id: &str, status: WorkflowStatus, updated_at: DateTime<Utc>) -> Result<()> {
        self.record(format!("update_status(id={id}, status={status})"));
        self.check_error()?;
        let mut rows = self.rows.lock();
        let wf = rows.get_mut(id).ok_or_else(|| OrchestratorError::WorkflowNotFound(id.to_string()))?;
        wf.status = status;
        wf.updated_at = updated_at;
        Ok(())
    }

    async fn mark_stale_before(&self, threshold: DateTime<Utc>) -> Result<Vec<String>> {
        self.record("mark_stale_before");
        self.check_error()?;
        let mut rows = self.rows.lock();
        let mut ids = Vec::new();
        for wf in rows.values_mut() {
            if wf.status == WorkflowStatus::Active && wf.updated_at < threshold {
                wf.status = WorkflowStatus::Stale;
                ids.push(wf.id.clone());
            }
        }
        Ok(ids)
    }

    async fn delete_stale_before(&self, threshold: DateTime<Utc>) -> Result<u64> {
        self.record("delete_stale_before");
        self.check_error()?;
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|_, wf| !(wf.status == WorkflowStatus::Stale && wf.updated_at < threshold));
        Ok((before - rows.len()) as u64)
    }

    async fn count_by_status(&self) -> Result<Vec<(WorkflowStatus, u64)>> {
        self.record("count_by_status");
        self.check_error()?;
        let rows = self.rows.lock();
        let mut counts: HashMap<WorkflowStatus, u64> = HashMap::new();
        for wf in rows.values() {
            *counts.entry(wf.status).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

/// In-memory [`HandoffRepository`].
#[derive(Default)]
pub struct InMemoryHandoffRepository {
    rows: Mutex<HashMap<String, Handoff>>,
    error_injection: Mutex<Option<OrchestratorError>>,
}

impl InMemoryHandoffRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject_error(&self, error: OrchestratorError) {
        *self.error_injection.lock() = Some(error);
    }

    fn check_error(&self) -> Result<()> {
        if let Some(error) = self.error_injection.lock().take() {
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl HandoffRepository for InMemoryHandoffRepository {
    async fn create(&self, handoff: &Handoff) -> Result<()> {
        self.check_error()?;
        self.rows.lock().insert(handoff.id.clone(), handoff.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Handoff>> {
        self.check_error()?;
        Ok(self.rows.lock().get(id).cloned())
    }

    async fn list_for_workflow(&self, workflow_id: &str, include_processed: bool) -> Result<Vec<Handoff>> {
        self.check_error()?;
        Ok(self
            .rows
            .lock()
            .values()
            .filter(|h| h.workflow_id == workflow_id && (include_processed || !h.processed))
            .cloned()
            .collect())
    }

    async fn list_unprocessed(&self) -> Result<Vec<Handoff>> {
        self.check_error()?;
        Ok(self.rows.lock().values().filter(|h| !h.processed).cloned().collect())
    }

    async fn mark_processed(&self, id: &str) -> Result<()> {
        self.check_error()?;
        let mut rows = self.rows.lock();
        let handoff = rows.get_mut(id).ok_or_else(|| OrchestratorError::HandoffNotFound(id.to_string()))?;
        handoff.processed = true;
        Ok(())
    }
}

/// In-memory [`CleanupScheduleRepository`].
#[derive(Default)]
pub struct InMemoryCleanupScheduleRepository {
    rows: Mutex<HashMap<String, CleanupScheduleRow>>,
}

impl InMemoryCleanupScheduleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CleanupScheduleRepository for InMemoryCleanupScheduleRepository {
    async fn schedule(&self, row: &CleanupScheduleRow) -> Result<()> {
        self.rows.lock().insert(row.id.clone(), row.clone());
        Ok(())
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<CleanupScheduleRow>> {
        Ok(self
            .rows
            .lock()
            .values()
            .filter(|r| !r.processed && r.scheduled_for <= now)
            .cloned()
            .collect())
    }

    async fn mark_processed(&self, id: &str) -> Result<()> {
        let mut rows = self.rows.lock();
        if let Some(row) = rows.get_mut(id) {
            row.processed = true;
        }
        Ok(())
    }
}

/// In-memory [`MemoryRepository`], doing the same substring match as
/// [`orchestrator_core::memory::TextOnlyMemoryStore`] but without the SQL
/// layer underneath, for testing callers that only depend on the trait.
#[derive(Default)]
pub struct InMemoryMemoryRepository {
    records: Mutex<Vec<MemoryRecord>>,
}

impl InMemoryMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryRepository for InMemoryMemoryRepository {
    async fn store(&self, record: &MemoryRecord) -> Result<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    async fn retrieve_by_workflow(&self, workflow_id: &str, record_type: Option<&str>) -> Result<Vec<MemoryRecord>> {
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|r| r.workflow_id.as_deref() == Some(workflow_id))
            .filter(|r| record_type.map(|t| t == r.record_type).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn retrieve_by_text(&self, query: &str, limit: u32) -> Result<Vec<MemoryRecord>> {
        let query_lower = query.to_lowercase();
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|r| query_lower.is_empty() || r.content.to_lowercase().contains(&query_lower))
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

/// In-memory [`WorkspaceManager`] that tracks fake paths instead of
/// creating real git worktrees. Mirrors [`sanitize_agent_id`] and the
/// idempotent-create / not-found-cleanup rules the real
/// `GitWorkspaceManager` implements.
pub struct MockWorkspaceManager {
    root: String,
    workspaces: Mutex<HashMap<String, WorkspaceRecord>>,
    error_injection: Mutex<Option<OrchestratorError>>,
}

impl Default for MockWorkspaceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWorkspaceManager {
    pub fn new() -> Self {
        Self {
            root: "/mock-workspaces".to_string(),
            workspaces: Mutex::new(HashMap::new()),
            error_injection: Mutex::new(None),
        }
    }

    pub fn inject_error(&self, error: OrchestratorError) {
        *self.error_injection.lock() = Some(error);
    }

    fn check_error(&self) -> Result<()> {
        if let Some(error) = self.error_injection.lock().take() {
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl WorkspaceManager for MockWorkspaceManager {
    async fn create(&self, request: CreateWorkspaceRequest) -> Result<CreateWorkspaceResponse> {
        self.check_error()?;
        let sanitized = sanitize_agent_id(&request.agent_id)
            .ok_or_else(|| OrchestratorError::Validation("agent_id has no usable characters".to_string()))?;
        let path = format!("{}/{sanitized}", self.root);

        let mut workspaces = self.workspaces.lock();
        if workspaces.contains_key(&sanitized) {
            return Ok(CreateWorkspaceResponse {
                status: WorkspaceCreateStatus::Exists,
                workspace_path: path,
            });
        }
        workspaces.insert(
            sanitized.clone(),
            WorkspaceRecord {
                agent_id: sanitized,
                path: path.clone(),
                branch: request.base_ref.clone(),
                head_commit: Some("0000000000000000000000000000000000000000".to_string()),
                bare: false,
            },
        );
        Ok(CreateWorkspaceResponse {
            status: WorkspaceCreateStatus::Created,
            workspace_path: path,
        })
    }

    async fn cleanup(&self, agent_id: &str, _force: bool) -> Result<CleanupWorkspaceResponse> {
        self.check_error()?;
        let sanitized = sanitize_agent_id(agent_id)
            .ok_or_else(|| OrchestratorError::Validation("agent_id has no usable characters".to_string()))?;
        let mut workspaces = self.workspaces.lock();
        match workspaces.remove(&sanitized) {
            Some(record) => Ok(CleanupWorkspaceResponse {
                status: WorkspaceCleanupStatus::Cleaned,
                workspace_path: record.path,
            }),
            None => Ok(CleanupWorkspaceResponse {
                status: WorkspaceCleanupStatus::NotFound,
                workspace_path: format!("{}/{sanitized}", self.root),
            }),
        }
    }

    async fn list_all(&self) -> Result<Vec<WorkspaceRecord>> {
        self.check_error()?;
        Ok(self.workspaces.lock().values().cloned().collect())
    }

    async fn get_stats(&self) -> Result<WorkspaceStats> {
        self.check_error()?;
        let workspaces = self.workspaces.lock();
        Ok(WorkspaceStats {
            workspace_count: workspaces.len() as u64,
            total_bytes: 0,
        })
    }
}

/// In-memory [`MemoryStore`] independent of [`InMemoryMemoryRepository`],
/// for tests exercising callers that depend on the store trait directly
/// rather than on a repository-backed implementation.
#[derive(Default)]
pub struct MockMemoryStore {
    records: Mutex<Vec<MemoryRecord>>,
    next_id: AtomicU64,
}

impl MockMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for MockMemoryStore {
    async fn store(&self, request: StoreRequest) -> Result<StoreResponse> {
        let id = format!("mem-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.records.lock().push(MemoryRecord {
            id: id.clone(),
            content: request.content,
            record_type: request.record_type,
            tags: request.tags,
            workflow_id: request.workflow_id,
            metadata: request.metadata,
            created_at: Utc::now(),
        });
        Ok(StoreResponse {
            status: "stored".to_string(),
            id,
            vector_stored: false,
        })
    }

    async fn retrieve(&self, request: RetrieveRequest) -> Result<RetrieveResponse> {
        let query_lower = request.query.to_lowercase();
        let limit = request.limit.unwrap_or(20) as usize;
        let results: Vec<RetrievedItem> = self
            .records
            .lock()
            .iter()
            .filter(|r| {
                request
                    .filters
                    .workflow_id
                    .as_deref()
                    .map(|w| r.workflow_id.as_deref() == Some(w))
                    .unwrap_or(true)
            })
            .filter(|r| query_lower.is_empty() || r.content.to_lowercase().contains(&query_lower))
            .take(limit)
            .map(|r| RetrievedItem {
                id: r.id.clone(),
                content: r.content.clone(),
                score: 1.0,
            })
            .collect();
        Ok(RetrieveResponse {
            count: results.len(),
            results,
            search_methods: vec!["text".to_string()],
        })
    }
}

/// In-memory [`ToolUsageRepository`], recording calls in order for
/// assertions on what the transport layer reported.
#[derive(Default)]
pub struct InMemoryToolUsageRepository {
    calls: Mutex<Vec<(String, String)>>,
}

impl InMemoryToolUsageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ToolUsageRepository for InMemoryToolUsageRepository {
    async fn record(&self, tool_name: &str, session_id: &str) -> Result<()> {
        self.calls.lock().push((tool_name.to_string(), session_id.to_string()));
        Ok(())
    }
}
