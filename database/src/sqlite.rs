use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{migrate::MigrateDatabase, Row, Sqlite, SqlitePool};

use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::models::{CleanupScheduleRow, Handoff, MemoryRecord, Workflow, WorkflowStatus};
use orchestrator_core::repository::{
    CleanupScheduleRepository, HandoffRepository, MemoryRepository, ToolUsageRepository,
    WorkflowFilter, WorkflowRepository,
};

use crate::common::{
    agent_role_to_string, row_to_cleanup_schedule, row_to_handoff, row_to_memory_record,
    row_to_workflow, serialize_metadata, serialize_tags, sqlx_error_to_orchestrator_error,
};

/// SQLite-backed implementation of every persistence trait the engine
/// depends on. One pool, one connection; all four tables share it the way
/// the original task-management store shared a single pool across its
/// task/message tables.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        let db_url = if database_url.starts_with(":memory:") || database_url.starts_with("sqlite://") {
            database_url.to_string()
        } else {
            format!("sqlite://{database_url}")
        };

        if !db_url.contains(":memory:") && !Sqlite::database_exists(&db_url).await.unwrap_or(false) {
            Sqlite::create_database(&db_url)
                .await
                .map_err(|e| OrchestratorError::Database(format!("failed to create database: {e}")))?;
        }

        let connect_options = if db_url.contains(":memory:") {
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(&db_url)
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Memory)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
        } else {
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(db_url.replace("sqlite://", ""))
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
        };

        let pool = SqlitePool::connect_with(connect_options)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/sqlite")
            .run(&self.pool)
            .await
            .map_err(|e| OrchestratorError::Database(format!("migration failed: {e}")))?;
        tracing::info!("database migrations completed successfully");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ToolUsageRepository for SqliteStore {
    async fn record(&self, tool_name: &str, session_id: &str) -> Result<()> {
        sqlx::query("INSERT INTO tool_usage (id, tool_name, session_id, timestamp) VALUES (?, ?, ?, ?)")
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(tool_name)
            .bind(session_id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }
}

#[async_trait]
impl WorkflowRepository for SqliteStore {
    async fn upsert(&self, workflow: &Workflow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workflows (id, name, status, agent_type, agent_role, specifications, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                status = excluded.status,
                agent_type = excluded.agent_type,
                agent_role = excluded.agent_role,
                specifications = excluded.specifications,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&workflow.id)
        .bind(&workflow.name)
        .bind(workflow.status.to_string())
        .bind(&workflow.agent_type)
        .bind(agent_role_to_string(workflow.agent_role))
        .bind(&workflow.specifications)
        .bind(workflow.created_at)
        .bind(workflow.updated_at)
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Workflow>> {
        let row = sqlx::query("SELECT * FROM workflows WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        row.as_ref().map(row_to_workflow).transpose()
    }

    async fn list(&self, filter: &WorkflowFilter) -> Result<Vec<Workflow>> {
        let mut query = String::from("SELECT * FROM workflows WHERE 1 = 1");
        if filter.status.is_some() {
            query.push_str(" AND status = ?");
        }
        if filter.agent_type.is_some() {
            query.push_str(" AND agent_type = ?");
        }
        query.push_str(" ORDER BY updated_at DESC");
        if filter.limit.is_some() {
            query.push_str(" LIMIT ?");
        }
        if filter.offset.is_some() {
            query.push_str(" OFFSET ?");
        }

        let mut q = sqlx::query(&query);
        if let Some(status) = filter.status {
            q = q.bind(status.to_string());
        }
        if let Some(agent_type) = &filter.agent_type {
            q = q.bind(agent_type);
        }
        if let Some(limit) = filter.limit {
            q = q.bind(limit as i64);
        }
        if let Some(offset) = filter.offset {
            q = q.bind(offset as i64);
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        rows.iter().map(row_to_workflow).collect()
    }

    async fn update_status(
        &self,
        id: &str,
        status: WorkflowStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE workflows SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(updated_at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }

    async fn mark_stale_before(&self, threshold: DateTime<Utc>) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT id FROM workflows WHERE status = 'active' AND updated_at < ?")
            .bind(threshold)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        let ids: Vec<String> = rows.iter().map(|r| r.get::<String, _>("id")).collect();

        sqlx::query("UPDATE workflows SET status = 'stale', updated_at = ? WHERE status = 'active' AND updated_at < ?")
            .bind(Utc::now())
            .bind(threshold)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;

        Ok(ids)
    }

    async fn delete_stale_before(&self, threshold: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM workflows WHERE status = 'stale' AND updated_at < ?")
            .bind(threshold)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(result.rows_affected())
    }

    async fn count_by_status(&self) -> Result<Vec<(WorkflowStatus, u64)>> {
        let rows = sqlx::query("SELECT status, COUNT(*) as n FROM workflows GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        rows.iter()
            .map(|r| {
                let status_str: String = r.get("status");
                let status: WorkflowStatus = status_str
                    .parse()
                    .map_err(|e| OrchestratorError::Database(format!("invalid status: {e}")))?;
                Ok((status, r.get::<i64, _>("n") as u64))
            })
            .collect()
    }
}

#[async_trait]
impl HandoffRepository for SqliteStore {
    async fn create(&self, handoff: &Handoff) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO handoffs (id, from_agent, to_agent, workflow_id, type, task_details, created_at, processed)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&handoff.id)
        .bind(&handoff.from_agent)
        .bind(&handoff.to_agent)
        .bind(&handoff.workflow_id)
        .bind(handoff.handoff_type.to_string())
        .bind(&handoff.task_details)
        .bind(handoff.created_at)
        .bind(handoff.processed as i64)
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Handoff>> {
        let row = sqlx::query("SELECT * FROM handoffs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        row.as_ref().map(row_to_handoff).transpose()
    }

    async fn list_for_workflow(&self, workflow_id: &str, include_processed: bool) -> Result<Vec<Handoff>> {
        let rows = if include_processed {
            sqlx::query("SELECT * FROM handoffs WHERE workflow_id = ? ORDER BY created_at ASC")
                .bind(workflow_id)
                .fetch_all(&self.pool)
                .await
        } else {
            sqlx::query(
                "SELECT * FROM handoffs WHERE workflow_id = ? AND processed = 0 ORDER BY created_at ASC",
            )
            .bind(workflow_id)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(sqlx_error_to_orchestrator_error)?;
        rows.iter().map(row_to_handoff).collect()
    }

    async fn list_unprocessed(&self) -> Result<Vec<Handoff>> {
        let rows = sqlx::query("SELECT * FROM handoffs WHERE processed = 0 ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        rows.iter().map(row_to_handoff).collect()
    }

    async fn mark_processed(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE handoffs SET processed = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }
}

#[async_trait]
impl CleanupScheduleRepository for SqliteStore {
    async fn schedule(&self, row: &CleanupScheduleRow) -> Result<()> {
        sqlx::query(
            "INSERT INTO cleanup_schedule (id, workflow_id, scheduled_for, processed) VALUES (?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.workflow_id)
        .bind(row.scheduled_for)
        .bind(row.processed as i64)
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<CleanupScheduleRow>> {
        let rows = sqlx::query("SELECT * FROM cleanup_schedule WHERE processed = 0 AND scheduled_for <= ?")
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(rows.iter().map(row_to_cleanup_schedule).collect())
    }

    async fn mark_processed(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE cleanup_schedule SET processed = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }
}

#[async_trait]
impl MemoryRepository for SqliteStore {
    async fn store(&self, record: &MemoryRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO memories (id, content, type, tags, workflow_id, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.content)
        .bind(&record.record_type)
        .bind(serialize_tags(&record.tags))
        .bind(&record.workflow_id)
        .bind(serialize_metadata(&record.metadata))
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }

    async fn retrieve_by_workflow(
        &self,
        workflow_id: &str,
        record_type: Option<&str>,
    ) -> Result<Vec<MemoryRecord>> {
        let rows = if let Some(record_type) = record_type {
            sqlx::query("SELECT * FROM memories WHERE workflow_id = ? AND type = ? ORDER BY created_at DESC")
                .bind(workflow_id)
                .bind(record_type)
                .fetch_all(&self.pool)
                .await
        } else {
            sqlx::query("SELECT * FROM memories WHERE workflow_id = ? ORDER BY created_at DESC")
                .bind(workflow_id)
                .fetch_all(&self.pool)
                .await
        }
        .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(rows.iter().map(row_to_memory_record).collect())
    }

    async fn retrieve_by_text(&self, query: &str, limit: u32) -> Result<Vec<MemoryRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM memories WHERE content LIKE ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(format!("%{query}%"))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(rows.iter().map(row_to_memory_record).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_core::models::{AgentRole, HandoffType};

    async fn store() -> SqliteStore {
        let store = SqliteStore::new(":memory:").await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    fn workflow(id: &str, status: WorkflowStatus) -> Workflow {
        let now = Utc::now();
        Workflow {
            id: id.to_string(),
            name: None,
            status,
            agent_type: "backend-developer".into(),
            agent_role: AgentRole::Specialist,
            specifications: "fix the thing".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = store().await;
        let wf = workflow("w1", WorkflowStatus::Active);
        store.upsert(&wf).await.unwrap();
        let fetched = store.get("w1").await.unwrap().unwrap();
        assert_eq!(fetched.id, "w1");
        assert_eq!(fetched.status, WorkflowStatus::Active);
    }

    #[tokio::test]
    async fn upsert_is_idempotent_on_conflict() {
        let store = store().await;
        store.upsert(&workflow("w2", WorkflowStatus::Active)).await.unwrap();
        let mut updated = workflow("w2", WorkflowStatus::Completed);
        updated.specifications = "different spec".into();
        store.upsert(&updated).await.unwrap();
        let fetched = store.get("w2").await.unwrap().unwrap();
        assert_eq!(fetched.status, WorkflowStatus::Completed);
        assert_eq!(fetched.specifications, "different spec");
    }

    #[tokio::test]
    async fn mark_stale_before_only_touches_active_rows() {
        let store = store().await;
        store.upsert(&workflow("w3", WorkflowStatus::Active)).await.unwrap();
        store.upsert(&workflow("w4", WorkflowStatus::Completed)).await.unwrap();
        let future = Utc::now() + chrono::Duration::minutes(1);
        let ids = store.mark_stale_before(future).await.unwrap();
        assert_eq!(ids, vec!["w3".to_string()]);
        assert_eq!(store.get("w4").await.unwrap().unwrap().status, WorkflowStatus::Completed);
    }

    #[tokio::test]
    async fn handoffs_round_trip_and_filter_unprocessed() {
        let store = store().await;
        store.upsert(&workflow("w5", WorkflowStatus::Active)).await.unwrap();
        let handoff = Handoff {
            id: "h1".into(),
            from_agent: "team-manager-w5".into(),
            to_agent: "backend-associate".into(),
            workflow_id: "w5".into(),
            handoff_type: HandoffType::TaskAssignment,
            task_details: "do it".into(),
            created_at: Utc::now(),
            processed: false,
        };
        store.create(&handoff).await.unwrap();
        assert_eq!(store.list_unprocessed().await.unwrap().len(), 1);
        store.mark_processed("h1").await.unwrap();
        assert_eq!(store.list_unprocessed().await.unwrap().len(), 0);
        assert_eq!(store.list_for_workflow("w5", true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn memory_text_search_matches_substring() {
        let store = store().await;
        let record = MemoryRecord {
            id: "m1".into(),
            content: "the calculateTotal function needs unit tests".into(),
            record_type: "specifications".into(),
            tags: vec!["test-writer".into()],
            workflow_id: Some("w6".into()),
            metadata: Default::default(),
            created_at: Utc::now(),
        };
        store.store(&record).await.unwrap();
        let found = store.retrieve_by_text("calculateTotal", 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "m1");
    }

    #[tokio::test]
    async fn tool_usage_is_recorded_per_call() {
        let store = store().await;
        store.record("launch_agent", "session-1").await.unwrap();
        store.record("get_pending_tasks", "session-1").await.unwrap();

        let rows: Vec<(String, String)> = sqlx::query_as("SELECT tool_name, session_id FROM tool_usage ORDER BY timestamp")
            .fetch_all(store.pool())
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], ("launch_agent".to_string(), "session-1".to_string()));
        assert_eq!(rows[1], ("get_pending_tasks".to_string(), "session-1".to_string()));
    }
}
