//! Git-worktree-backed [`WorkspaceManager`].
//!
//! Each workspace is a detached working tree checked out from the shared
//! repository the server process itself lives in, rooted under a configured
//! `workspaces_dir` and keyed by a sanitized `agent_id`. Worktree creation
//! and removal shell out to the system `git` binary, matching the
//! lineage's established pattern of treating git as an external dependency.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::workspace::{
    sanitize_agent_id, CleanupWorkspaceResponse, CreateWorkspaceRequest, CreateWorkspaceResponse,
    WorkspaceCleanupStatus, WorkspaceCreateStatus, WorkspaceManager, WorkspaceRecord,
    WorkspaceStats,
};
use tokio::process::Command;
use tracing::{info, warn};

use crate::subprocess::{run_with_timeout, GIT_WORKTREE_TIMEOUT};

/// Scopes every `tracing` event emitted by workspace-management code.
#[macro_export]
macro_rules! workspace_span {
    ($name:expr) => {
        tracing::info_span!("workspace", op = $name)
    };
}

pub struct GitWorkspaceManager {
    repo_root: PathBuf,
    workspaces_dir: PathBuf,
}

impl GitWorkspaceManager {
    pub fn new(repo_root: impl Into<PathBuf>, workspaces_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            workspaces_dir: workspaces_dir.into(),
        }
    }

    fn git(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.env_remove("GIT_DIR").env_remove("GIT_WORK_TREE");
        cmd
    }

    async fn verify_repository(&self) -> Result<()> {
        let mut cmd = self.git();
        cmd.args([
            "-C",
            &self.repo_root.display().to_string(),
            "rev-parse",
            "--is-inside-work-tree",
        ]);
        let output = run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git rev-parse").await?;
        if !output.status.success() {
            return Err(OrchestratorError::GitRepositoryInvalid(format!(
                "{} is not inside a git working tree",
                self.repo_root.display()
            )));
        }
        Ok(())
    }

    async fn resolve_ref(&self, base_ref: &str) -> Result<()> {
        let mut cmd = self.git();
        cmd.args([
            "-C",
            &self.repo_root.display().to_string(),
            "rev-parse",
            "--verify",
            &format!("{base_ref}^{{commit}}"),
        ]);
        let output = run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git rev-parse --verify").await?;
        if !output.status.success() {
            return Err(OrchestratorError::Workspace(format!(
                "base_ref {base_ref} does not resolve to a commit"
            )));
        }
        Ok(())
    }

    async fn add_worktree(&self, path: &Path, base_ref: &str) -> Result<()> {
        let mut cmd = self.git();
        cmd.args([
            "-C",
            &self.repo_root.display().to_string(),
            "worktree",
            "add",
            "--detach",
            &path.display().to_string(),
            base_ref,
        ]);
        let output = run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git worktree add").await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OrchestratorError::Workspace(format!(
                "git worktree add failed: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }

    async fn verify_worktree_usable(&self, path: &Path) -> Result<()> {
        let mut cmd = Command::new("git");
        cmd.args(["status", "--porcelain"]).current_dir(path);
        let output = run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git status").await?;
        if !output.status.success() {
            return Err(OrchestratorError::Workspace(format!(
                "newly created workspace at {} is not a usable working tree",
                path.display()
            )));
        }
        Ok(())
    }

    async fn force_clean(&self, path: &Path) {
        let mut cmd = self.git();
        cmd.args([
            "-C",
            &self.repo_root.display().to_string(),
            "worktree",
            "remove",
            "--force",
            &path.display().to_string(),
        ]);
        let _ = run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git worktree remove").await;
        let _ = tokio::fs::remove_dir_all(path).await;
    }
}

#[async_trait]
impl WorkspaceManager for GitWorkspaceManager {
    async fn create(&self, request: CreateWorkspaceRequest) -> Result<CreateWorkspaceResponse> {
        let _span = workspace_span!("create").entered();

        let sanitized = sanitize_agent_id(&request.agent_id).ok_or_else(|| {
            OrchestratorError::validation(format!(
                "agent_id {:?} sanitizes to an empty string",
                request.agent_id
            ))
        })?;
        let workspace_path = self.workspaces_dir.join(&sanitized);

        self.verify_repository().await?;

        tokio::fs::create_dir_all(&self.workspaces_dir)
            .await
            .map_err(|e| OrchestratorError::Workspace(format!("create workspaces_dir: {e}")))?;

        if workspace_path.exists() {
            return Ok(CreateWorkspaceResponse {
                status: WorkspaceCreateStatus::Exists,
                workspace_path: workspace_path.display().to_string(),
            });
        }

        let base_ref = request.base_ref.as_deref().unwrap_or("HEAD");
        self.resolve_ref(base_ref).await?;

        if let Err(e) = self.add_worktree(&workspace_path, base_ref).await {
            self.force_clean(&workspace_path).await;
            return Err(e);
        }

        if let Err(e) = self.verify_worktree_usable(&workspace_path).await {
            self.force_clean(&workspace_path).await;
            return Err(e);
        }

        info!(agent_id = %request.agent_id, path = %workspace_path.display(), "workspace created");
        Ok(CreateWorkspaceResponse {
            status: WorkspaceCreateStatus::Created,
            workspace_path: workspace_path.display().to_string(),
        })
    }

    async fn cleanup(&self, agent_id: &str, force: bool) -> Result<CleanupWorkspaceResponse> {
        let _span = workspace_span!("cleanup").entered();

        let sanitized = sanitize_agent_id(agent_id).ok_or_else(|| {
            OrchestratorError::validation(format!("agent_id {agent_id:?} sanitizes to empty"))
        })?;
        let workspace_path = self.workspaces_dir.join(&sanitized);

        if !workspace_path.exists() {
            return Ok(CleanupWorkspaceResponse {
                status: WorkspaceCleanupStatus::NotFound,
                workspace_path: workspace_path.display().to_string(),
            });
        }

        let mut cmd = self.git();
        cmd.args(["-C", &self.repo_root.display().to_string(), "worktree", "remove"]);
        if force {
            cmd.arg("--force");
        }
        cmd.arg(&workspace_path.display().to_string());
        let outcome = run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git worktree remove").await;

        let removed_cleanly = matches!(&outcome, Ok(output) if output.status.success());
        if !removed_cleanly {
            if !force {
                let stderr = match &outcome {
                    Ok(output) => String::from_utf8_lossy(&output.stderr).trim().to_string(),
                    Err(e) => e.to_string(),
                };
                return Err(OrchestratorError::Workspace(format!(
                    "git worktree remove failed: {stderr}"
                )));
            }

            warn!(path = %workspace_path.display(), "worktree remove failed, forcing best-effort cleanup");
            let mut prune = self.git();
            prune.args(["-C", &self.repo_root.display().to_string(), "worktree", "prune"]);
            let _ = run_with_timeout(prune, GIT_WORKTREE_TIMEOUT, "git worktree prune").await;

            if workspace_path.exists() {
                tokio::fs::remove_dir_all(&workspace_path)
                    .await
                    .map_err(|e| OrchestratorError::Workspace(format!("remove_dir_all: {e}")))?;
            }
        }

        Ok(CleanupWorkspaceResponse {
            status: WorkspaceCleanupStatus::Cleaned,
            workspace_path: workspace_path.display().to_string(),
        })
    }

    async fn list_all(&self) -> Result<Vec<WorkspaceRecord>> {
        let mut cmd = self.git();
        cmd.args([
            "-C",
            &self.repo_root.display().to_string(),
            "worktree",
            "list",
            "--porcelain",
        ]);
        let output = run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, "git worktree list").await?;
        if !output.status.success() {
            return Err(OrchestratorError::Workspace(
                "git worktree list failed".to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut records = Vec::new();
        let mut path: Option<String> = None;
        let mut head_commit: Option<String> = None;
        let mut branch: Option<String> = None;
        let mut bare = false;

        let flush = |path: &mut Option<String>,
                     head_commit: &mut Option<String>,
                     branch: &mut Option<String>,
                     bare: &mut bool,
                     records: &mut Vec<WorkspaceRecord>| {
            if let Some(p) = path.take() {
                let agent_id = Path::new(&p)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| p.clone());
                records.push(WorkspaceRecord {
                    agent_id,
                    path: p,
                    branch: branch.take(),
                    head_commit: head_commit.take(),
                    bare: *bare,
                });
            }
            *bare = false;
        };

        for line in stdout.lines() {
            if line.is_empty() {
                flush(&mut path, &mut head_commit, &mut branch, &mut bare, &mut records);
                continue;
            }
            if let Some(rest) = line.strip_prefix("worktree ") {
                flush(&mut path, &mut head_commit, &mut branch, &mut bare, &mut records);
                path = Some(rest.to_string());
            } else if let Some(rest) = line.strip_prefix("HEAD ") {
                head_commit = Some(rest.to_string());
            } else if let Some(rest) = line.strip_prefix("branch ") {
                branch = Some(rest.trim_start_matches("refs/heads/").to_string());
            } else if line == "bare" {
                bare = true;
            }
        }
        flush(&mut path, &mut head_commit, &mut branch, &mut bare, &mut records);

        let workspaces_dir = self.workspaces_dir.canonicalize().unwrap_or_else(|_| self.workspaces_dir.clone());
        records.retain(|r| Path::new(&r.path).starts_with(&workspaces_dir) || Path::new(&r.path).starts_with(&self.workspaces_dir));
        Ok(records)
    }

    async fn get_stats(&self) -> Result<WorkspaceStats> {
        let mut workspace_count = 0u64;
        let mut total_bytes = 0u64;

        let mut entries = match tokio::fs::read_dir(&self.workspaces_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(WorkspaceStats::default());
            }
            Err(e) => return Err(OrchestratorError::Workspace(format!("read_dir: {e}"))),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| OrchestratorError::Workspace(format!("read_dir entry: {e}")))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| OrchestratorError::Workspace(format!("file_type: {e}")))?;
            if file_type.is_dir() {
                workspace_count += 1;
                total_bytes += directory_size(&entry.path()).await?;
            }
        }

        Ok(WorkspaceStats {
            workspace_count,
            total_bytes,
        })
    }
}

/// Recursively sums file sizes under `root`. Implemented iteratively (a
/// work-stack of directories) since async fns can't recurse into
/// themselves without boxing.
async fn directory_size(root: &Path) -> Result<u64> {
    let mut total = 0u64;
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| OrchestratorError::Workspace(format!("read_dir entry: {e}")))?
        {
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(_) => continue,
            };
            if metadata.is_dir() {
                stack.push(entry.path());
            } else {
                total += metadata.len();
            }
        }
    }

    Ok(total)
}
