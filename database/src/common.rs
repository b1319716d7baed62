use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use std::collections::HashMap;

use orchestrator_core::error::OrchestratorError;
use orchestrator_core::models::{
    AgentRole, CleanupScheduleRow, Handoff, HandoffType, MemoryRecord, Workflow, WorkflowStatus,
};

pub fn agent_role_to_string(role: AgentRole) -> &'static str {
    match role {
        AgentRole::Manager => "manager",
        AgentRole::Associate => "associate",
        AgentRole::Specialist => "specialist",
    }
}

pub fn string_to_agent_role(s: &str) -> AgentRole {
    match s {
        "manager" => AgentRole::Manager,
        "associate" => AgentRole::Associate,
        _ => AgentRole::Specialist,
    }
}

pub fn row_to_workflow(row: &SqliteRow) -> Result<Workflow, OrchestratorError> {
    let status_str: String = row.get("status");
    let status: WorkflowStatus = status_str
        .parse()
        .map_err(|e| OrchestratorError::Database(format!("invalid workflow status in row: {e}")))?;
    let agent_role_str: String = row.get("agent_role");

    Ok(Workflow {
        id: row.get("id"),
        name: row.try_get("name").ok().flatten(),
        status,
        agent_type: row.get("agent_type"),
        agent_role: string_to_agent_role(&agent_role_str),
        specifications: row.get("specifications"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub fn row_to_handoff(row: &SqliteRow) -> Result<Handoff, OrchestratorError> {
    let type_str: String = row.get("type");
    let handoff_type: HandoffType = type_str
        .parse()
        .map_err(|e| OrchestratorError::Database(format!("invalid handoff type in row: {e}")))?;

    Ok(Handoff {
        id: row.get("id"),
        from_agent: row.get("from_agent"),
        to_agent: row.get("to_agent"),
        workflow_id: row.get("workflow_id"),
        handoff_type,
        task_details: row.get("task_details"),
        created_at: row.get("created_at"),
        processed: row.get::<i64, _>("processed") != 0,
    })
}

pub fn row_to_cleanup_schedule(row: &SqliteRow) -> CleanupScheduleRow {
    CleanupScheduleRow {
        id: row.get("id"),
        workflow_id: row.get("workflow_id"),
        scheduled_for: row.get("scheduled_for"),
        processed: row.get::<i64, _>("processed") != 0,
    }
}

pub fn row_to_memory_record(row: &SqliteRow) -> MemoryRecord {
    let tags_json: String = row.get("tags");
    let metadata_json: String = row.get("metadata");
    MemoryRecord {
        id: row.get("id"),
        content: row.get("content"),
        record_type: row.get("type"),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        workflow_id: row.try_get("workflow_id").ok().flatten(),
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        created_at: row.get("created_at"),
    }
}

/// Maps an `sqlx::Error` onto the core error taxonomy. Constraint
/// violations surface as `Validation` so callers can tell "bad input" apart
/// from `Database` (treated as retryable infrastructure trouble).
pub fn sqlx_error_to_orchestrator_error(err: sqlx::Error) -> OrchestratorError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message();
            if message.contains("UNIQUE constraint failed") {
                OrchestratorError::Validation(format!("duplicate row: {message}"))
            } else {
                OrchestratorError::Database(format!("database constraint error: {message}"))
            }
        }
        sqlx::Error::RowNotFound => OrchestratorError::Database("row not found".to_string()),
        other => OrchestratorError::Database(other.to_string()),
    }
}

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

pub fn serialize_tags(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

pub fn serialize_metadata(metadata: &HashMap<String, serde_json::Value>) -> String {
    serde_json::to_string(metadata).unwrap_or_else(|_| "{}".to_string())
}
