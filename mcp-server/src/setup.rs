use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use database::SqliteStore;
use mcp_protocol::McpServer;
use orchestrator_core::engine::OrchestrationEngine;
use orchestrator_core::events::EventEmitter;
use orchestrator_core::memory::TextOnlyMemoryStore;
use orchestrator_core::protocol::Handlers;
use orchestrator_core::scope_control::ScopeControl;
use orchestrator_core::workspace::WorkspaceManager;
use tracing::{info, warn};
use workspace_orchestrator::{AgentRunner, GitWorkspaceManager, RunnerConfig};

use crate::config::Config;

/// Opens (and migrates) the SQLite store backing every repository trait.
pub async fn create_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let database_url = config.database_url();
    info!(%database_url, "opening sqlite store");

    let store = SqliteStore::new(&database_url)
        .await
        .context("failed to open sqlite store")?;
    store.migrate().await.context("failed to run database migrations")?;

    Ok(Arc::new(store))
}

/// A git-worktree manager rooted at the process's current working
/// directory, writing workspaces under `workspace.workspaces_dir`.
pub fn create_workspace_manager(config: &Config) -> Arc<dyn WorkspaceManager> {
    let repo_root = std::env::current_dir().unwrap_or_else(|_| ".".into());
    Arc::new(GitWorkspaceManager::new(repo_root, &config.workspace.workspaces_dir))
}

/// Assembles the engine from the store, scope control, event emitter, and
/// the given workspace manager (shared with [`Handlers::workspace`] so both
/// `launch_agent`'s auto-create path and the direct `create_workspace`/
/// `cleanup_workspace`/`list_workspaces` RPCs see the same backing git
/// worktrees).
pub fn create_engine(
    store: Arc<SqliteStore>,
    workspace: Arc<dyn WorkspaceManager>,
) -> Arc<OrchestrationEngine> {
    let scope = Arc::new(ScopeControl::new());
    let events = Arc::new(EventEmitter::default());

    let engine = OrchestrationEngine::new(store.clone(), store.clone(), store.clone(), scope, events)
        .with_memory(store.clone(), Arc::new(TextOnlyMemoryStore::new(store)))
        .with_workspace(workspace);

    Arc::new(engine)
}

/// Builds the HTTP+SSE transport around an already-constructed engine and
/// workspace manager.
pub fn create_server(
    engine: Arc<OrchestrationEngine>,
    workspace: Arc<dyn WorkspaceManager>,
    tool_usage: Arc<SqliteStore>,
) -> McpServer {
    McpServer::new(Arc::new(Handlers {
        engine,
        workspace: Some(workspace),
        tool_usage: Some(tool_usage),
    }))
}

/// Handle to the background tasks spawned by [`initialize_app`]. Dropping
/// it leaves the tasks running (they die with the process); call
/// [`Background::shutdown`] to stop the runner gracefully first.
pub struct Background {
    runner_shutdown_tx: tokio::sync::oneshot::Sender<()>,
    runner_handle: tokio::task::JoinHandle<()>,
    sweep_handle: tokio::task::JoinHandle<()>,
}

impl Background {
    /// Signals the runner to terminate its subprocesses and waits for it
    /// to finish, then cancels the sweep loop (which holds no subprocess
    /// state worth draining).
    pub async fn shutdown(self) {
        let _ = self.runner_shutdown_tx.send(());
        let _ = self.runner_handle.await;
        self.sweep_handle.abort();
    }
}

/// Initializes the store, engine, runner, and transport, returning the
/// server and a [`Background`] handle for coordinated shutdown.
pub async fn initialize_app(config: &Config) -> Result<(McpServer, Background)> {
    let store = create_store(config).await?;
    let workspace = create_workspace_manager(config);
    let engine = create_engine(store.clone(), workspace.clone());

    let server = McpServer::new(Arc::new(Handlers {
        engine: engine.clone(),
        workspace: Some(workspace),
        tool_usage: Some(store),
    }));

    let runner = Arc::new(AgentRunner::new(
        engine.clone(),
        RunnerConfig {
            max_concurrent: config.workspace.max_agents as usize,
            ..RunnerConfig::default()
        },
    ));

    let (runner_shutdown_tx, runner_shutdown_rx) = tokio::sync::oneshot::channel();
    let runner_handle = tokio::spawn(async move {
        runner.run(runner_shutdown_rx).await;
    });

    let sweep_handle = spawn_sweep_tasks(engine, config.clone());

    Ok((
        server,
        Background {
            runner_shutdown_tx,
            runner_handle,
            sweep_handle,
        },
    ))
}

/// Runs the event-processor and scheduled-cleanup sweeps on their own
/// fixed intervals, independent of each other and of the runner's poll
/// loop (scheduled tasks are independent per the concurrency design).
fn spawn_sweep_tasks(engine: Arc<OrchestrationEngine>, config: Config) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut event_ticker = tokio::time::interval(Duration::from_secs(5));
        let mut cleanup_ticker =
            tokio::time::interval(Duration::from_secs(config.runner.cleanup_interval_minutes * 60));

        loop {
            tokio::select! {
                _ = event_ticker.tick() => {
                    match engine.process_pending_events().await {
                        Ok(count) if count > 0 => info!(count, "processed pending handoff events"),
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "event sweep failed"),
                    }
                }
                _ = cleanup_ticker.tick() => {
                    match engine.process_scheduled_cleanups().await {
                        Ok(count) if count > 0 => info!(count, "processed scheduled cleanups"),
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "scheduled cleanup sweep failed"),
                    }
                    match engine.detect_and_mark_stale_workflows(60).await {
                        Ok(ids) if !ids.is_empty() => info!(count = ids.len(), "marked workflows stale"),
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "stale detection failed"),
                    }
                    match engine.cleanup_old_stale_workflows(30).await {
                        Ok(count) if count > 0 => info!(count, "deleted long-stale workflows"),
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "stale cleanup failed"),
                    }
                }
            }
        }
    })
}

/// Ensures the parent directory of a `sqlite://` database URL exists.
pub fn ensure_database_directory_from_config(config: &Config) -> Result<()> {
    ensure_database_directory(&config.database_url())
}

pub fn ensure_database_directory(database_url: &str) -> Result<()> {
    if let Some(db_path) = database_url.strip_prefix("sqlite://") {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                info!(path = %parent.display(), "creating database directory");
                std::fs::create_dir_all(parent).context("failed to create database directory")?;
            }
        }
    }
    Ok(())
}
