//! Contract for the workspace manager: a lightweight copy of a shared
//! content-addressed repository, keyed by a sanitized `agent_id`. The
//! concrete git-worktree implementation lives in the `workspace-orchestrator`
//! crate; this module defines the trait the engine depends on and the
//! sanitization rule every implementation must share (invariant #3, §8).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkspaceResources {
    pub cpu_limit: Option<String>,
    pub memory_limit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub agent_id: String,
    pub base_ref: Option<String>,
    pub resources: Option<WorkspaceResources>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceCreateStatus {
    Created,
    Exists,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkspaceResponse {
    pub status: WorkspaceCreateStatus,
    pub workspace_path: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceCleanupStatus {
    Cleaned,
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupWorkspaceResponse {
    pub status: WorkspaceCleanupStatus,
    pub workspace_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    pub agent_id: String,
    pub path: String,
    pub branch: Option<String>,
    pub head_commit: Option<String>,
    pub bare: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkspaceStats {
    pub workspace_count: u64,
    pub total_bytes: u64,
}

/// Sanitizes a caller-supplied `agent_id` into a filesystem-safe leaf
/// component: characters outside `[A-Za-z0-9._-]` become `_`, leading
/// dots are stripped, the result is trimmed and truncated to 100 chars.
/// Returns `None` if nothing survives (all-illegal input).
pub fn sanitize_agent_id(agent_id: &str) -> Option<String> {
    if !agent_id.chars().any(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    let replaced: String = agent_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stripped = replaced.trim_start_matches('.');
    let trimmed = stripped.trim();
    let truncated: String = trimmed.chars().take(100).collect();
    if truncated.is_empty() {
        None
    } else {
        Some(truncated)
    }
}

#[async_trait]
pub trait WorkspaceManager: Send + Sync {
    async fn create(&self, request: CreateWorkspaceRequest) -> Result<CreateWorkspaceResponse>;
    async fn cleanup(&self, agent_id: &str, force: bool) -> Result<CleanupWorkspaceResponse>;
    async fn list_all(&self) -> Result<Vec<WorkspaceRecord>>;
    async fn get_stats(&self) -> Result<WorkspaceStats>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_illegal_characters() {
        assert_eq!(
            sanitize_agent_id("agent/../../etc").unwrap(),
            "agent_.._.._etc"
        );
    }

    #[test]
    fn sanitize_strips_leading_dots() {
        assert_eq!(sanitize_agent_id("...hidden").unwrap(), "hidden");
    }

    #[test]
    fn sanitize_truncates_to_100_chars() {
        let long = "a".repeat(200);
        let sanitized = sanitize_agent_id(&long).unwrap();
        assert_eq!(sanitized.len(), 100);
    }

    #[test]
    fn sanitize_rejects_all_illegal_input() {
        assert!(sanitize_agent_id("...").is_none());
        assert!(sanitize_agent_id("   ").is_none());
        assert!(sanitize_agent_id("///...").is_none());
        assert!(sanitize_agent_id("***").is_none());
    }

    #[test]
    fn sanitize_accepts_normal_agent_id() {
        assert_eq!(
            sanitize_agent_id("test-agent-1").unwrap(),
            "test-agent-1"
        );
    }
}
