//! Drains the pending-task queue under a concurrency cap, spawning one
//! external worker subprocess per task and reporting completion back to
//! the engine.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::{Duration, Instant};

use orchestrator_core::engine::{OrchestrationEngine, SignalCompletionRequest};
use orchestrator_core::models::PendingTask;
use tokio::process::Child;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Scopes every `tracing` event emitted by the runner.
#[macro_export]
macro_rules! runner_span {
    ($name:expr) => {
        tracing::info_span!("runner", op = $name)
    };
}

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_CONCURRENT: usize = 3;
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Executable invoked for every spawned worker. Receives the prompt
    /// scratch file path as its sole argument.
    pub worker_command: String,
    pub max_concurrent: usize,
    pub poll_interval: Duration,
    pub shutdown_grace: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            worker_command: "true".to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

struct RunningTask {
    child: Child,
    workflow_id: String,
    #[allow(dead_code)]
    agent_type: String,
    start_time: Instant,
    _scratch: tempfile::TempDir,
}

/// Polls [`OrchestrationEngine::get_pending_tasks`] on a fixed interval,
/// spawning worker subprocesses under `max_concurrent` and reporting exit
/// status back via [`OrchestrationEngine::signal_completion`].
pub struct AgentRunner {
    engine: Arc<OrchestrationEngine>,
    config: RunnerConfig,
    running: Mutex<HashMap<String, RunningTask>>,
}

impl AgentRunner {
    pub fn new(engine: Arc<OrchestrationEngine>, config: RunnerConfig) -> Self {
        Self {
            engine,
            config,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Runs the poll loop until `shutdown` resolves, then terminates any
    /// still-running workers.
    pub async fn run(&self, mut shutdown: tokio::sync::oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.reap_finished().await;
                    if let Err(e) = self.poll_once().await {
                        warn!(error = %e, "runner poll cycle failed");
                    }
                }
                _ = &mut shutdown => {
                    info!("runner shutting down");
                    self.shutdown().await;
                    return;
                }
            }
        }
    }

    /// One iteration of the poll cycle (§4.2): compute available slots,
    /// pull pending tasks, revalidate workflow liveness, and spawn.
    async fn poll_once(&self) -> anyhow::Result<()> {
        let _span = runner_span!("poll").entered();

        let available = {
            let running = self.running.lock().await;
            self.config.max_concurrent.saturating_sub(running.len())
        };
        if available == 0 {
            return Ok(());
        }

        let pending = self.engine.get_pending_tasks(None).await;
        let mut spawned = 0;
        for task in pending {
            if spawned >= available {
                break;
            }
            {
                let running = self.running.lock().await;
                if running.contains_key(&task.task_id) {
                    continue;
                }
            }
            if self.should_skip(&task).await {
                continue;
            }
            if let Err(e) = self.spawn_task(&task).await {
                warn!(task_id = %task.task_id, error = %e, "failed to spawn worker");
                continue;
            }
            spawned += 1;
        }
        Ok(())
    }

    /// Step 3a: a workflow in a terminal or approved state must not have a
    /// worker spawned for it. A status-check error fails open (proceed to
    /// spawn) rather than silently dropping the task.
    async fn should_skip(&self, task: &PendingTask) -> bool {
        match self.engine.get_workflow_status(&task.workflow_id).await {
            Ok(Some((workflow, _))) => workflow.status.blocks_spawn(),
            Ok(None) => true,
            Err(e) => {
                warn!(workflow_id = %task.workflow_id, error = %e, "workflow status check failed, spawning anyway");
                false
            }
        }
    }

    async fn spawn_task(&self, task: &PendingTask) -> anyhow::Result<()> {
        let scratch = tempfile::TempDir::new()?;
        let prompt_path: PathBuf = scratch.path().join("prompt.md");
        tokio::fs::write(&prompt_path, &task.prompt).await?;

        let mut cmd = tokio::process::Command::new(&self.config.worker_command);
        cmd.arg(&prompt_path)
            .env("workflow_id", &task.workflow_id)
            .env("agent_type", &task.agent_type)
            .kill_on_drop(true);

        let child = cmd.spawn()?;
        info!(task_id = %task.task_id, workflow_id = %task.workflow_id, "agent launched");

        let mut running = self.running.lock().await;
        running.insert(
            task.task_id.clone(),
            RunningTask {
                child,
                workflow_id: task.workflow_id.clone(),
                agent_type: task.agent_type.clone(),
                start_time: Instant::now(),
                _scratch: scratch,
            },
        );
        Ok(())
    }

    /// Checks every tracked child for exit without blocking, reporting
    /// completion for any that have finished.
    async fn reap_finished(&self) {
        let finished: Vec<(String, ExitStatus, Duration, String)> = {
            let mut running = self.running.lock().await;
            let mut done = Vec::new();
            let mut still_running = HashMap::new();
            for (task_id, mut task) in running.drain() {
                match task.child.try_wait() {
                    Ok(Some(status)) => {
                        done.push((task_id, status, task.start_time.elapsed(), task.workflow_id));
                    }
                    Ok(None) => {
                        still_running.insert(task_id, task);
                    }
                    Err(e) => {
                        warn!(task_id = %task_id, error = %e, "failed to poll child status");
                        still_running.insert(task_id, task);
                    }
                }
            }
            *running = still_running;
            done
        };

        for (task_id, status, duration, workflow_id) in finished {
            let (result, artifacts) = if status.success() {
                ("ok".to_string(), Vec::new())
            } else {
                (
                    format!("worker exited with {status} after {:?}", duration),
                    Vec::new(),
                )
            };
            let outcome = self
                .engine
                .signal_completion(SignalCompletionRequest {
                    agent_id: task_id.clone(),
                    workflow_id: Some(workflow_id),
                    result,
                    artifacts,
                })
                .await;
            if let Err(e) = outcome {
                warn!(task_id = %task_id, error = %e, "failed to signal completion");
            }
        }
    }

    /// Sends a graceful termination signal to every running subprocess,
    /// waits up to `shutdown_grace`, then force-kills survivors.
    async fn shutdown(&self) {
        let mut running = self.running.lock().await;
        for task in running.values() {
            if let Some(pid) = task.child.id() {
                terminate_gracefully(pid);
            }
        }
        drop(running);

        tokio::time::sleep(self.config.shutdown_grace).await;

        let mut running = self.running.lock().await;
        for (task_id, task) in running.iter_mut() {
            match task.child.try_wait() {
                Ok(Some(_)) => {}
                _ => {
                    warn!(task_id = %task_id, "worker did not exit gracefully, killing");
                    let _ = task.child.start_kill();
                }
            }
        }
    }
}

#[cfg(unix)]
fn terminate_gracefully(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        warn!(pid, error = %e, "failed to send SIGTERM to worker");
    }
}

#[cfg(not(unix))]
fn terminate_gracefully(_pid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use orchestrator_core::engine::LaunchAgentRequest;
    use orchestrator_core::events::EventEmitter;
    use orchestrator_core::models::{CleanupScheduleRow, Handoff, MemoryRecord, Workflow, WorkflowStatus};
    use orchestrator_core::repository::{
        CleanupScheduleRepository, HandoffRepository, WorkflowFilter, WorkflowRepository,
    };
    use orchestrator_core::scope_control::ScopeControl;

    #[derive(Default)]
    struct InMemoryWorkflowRepo(StdMutex<StdHashMap<String, Workflow>>);

    #[async_trait]
    impl WorkflowRepository for InMemoryWorkflowRepo {
        async fn upsert(&self, workflow: &Workflow) -> orchestrator_core::error::Result<()> {
            self.0.lock().unwrap().insert(workflow.id.clone(), workflow.clone());
            Ok(())
        }
        async fn get(&self, id: &str) -> orchestrator_core::error::Result<Option<Workflow>> {
            Ok(self.0.lock().unwrap().get(id).cloned())
        }
        async fn list(&self, _filter: &WorkflowFilter) -> orchestrator_core::error::Result<Vec<Workflow>> {
            Ok(self.0.lock().unwrap().values().cloned().collect())
        }
        async fn update_status(
            &self,
            id: &str,
            status: WorkflowStatus,
            updated_at: DateTime<Utc>,
        ) -> orchestrator_core::error::Result<()> {
            if let Some(wf) = self.0.lock().unwrap().get_mut(id) {
                wf.status = status;
                wf.updated_at = updated_at;
            }
            Ok(())
        }
        async fn mark_stale_before(
            &self,
            _threshold: DateTime<Utc>,
        ) -> orchestrator_core::error::Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn delete_stale_before(&self, _threshold: DateTime<Utc>) -> orchestrator_core::error::Result<u64> {
            Ok(0)
        }
        async fn count_by_status(&self) -> orchestrator_core::error::Result<Vec<(WorkflowStatus, u64)>> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct InMemoryHandoffRepo;

    #[async_trait]
    impl HandoffRepository for InMemoryHandoffRepo {
        async fn create(&self, _handoff: &Handoff) -> orchestrator_core::error::Result<()> {
            Ok(())
        }
        async fn get(&self, _id: &str) -> orchestrator_core::error::Result<Option<Handoff>> {
            Ok(None)
        }
        async fn list_for_workflow(
            &self,
            _workflow_id: &str,
            _include_processed: bool,
        ) -> orchestrator_core::error::Result<Vec<Handoff>> {
            Ok(Vec::new())
        }
        async fn list_unprocessed(&self) -> orchestrator_core::error::Result<Vec<Handoff>> {
            Ok(Vec::new())
        }
        async fn mark_processed(&self, _id: &str) -> orchestrator_core::error::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryCleanupRepo;

    #[async_trait]
    impl CleanupScheduleRepository for InMemoryCleanupRepo {
        async fn schedule(&self, _row: &CleanupScheduleRow) -> orchestrator_core::error::Result<()> {
            Ok(())
        }
        async fn due(&self, _now: DateTime<Utc>) -> orchestrator_core::error::Result<Vec<CleanupScheduleRow>> {
            Ok(Vec::new())
        }
        async fn mark_processed(&self, _id: &str) -> orchestrator_core::error::Result<()> {
            Ok(())
        }
    }

    fn test_engine() -> Arc<OrchestrationEngine> {
        Arc::new(OrchestrationEngine::new(
            Arc::new(InMemoryWorkflowRepo::default()),
            Arc::new(InMemoryHandoffRepo),
            Arc::new(InMemoryCleanupRepo),
            Arc::new(ScopeControl::new()),
            Arc::new(EventEmitter::default()),
        ))
    }

    #[tokio::test]
    async fn poll_cycle_spawns_and_reaps_a_true_worker() {
        let engine = test_engine();
        engine
            .launch_agent(LaunchAgentRequest {
                workflow_id: None,
                agent_type: "backend-developer".to_string(),
                specifications: "fix a small typo in the README for the release".to_string(),
                from_agent: None,
                workspace_base_ref: None,
                workspace_resources: None,
                create_workspace: false,
            })
            .await
            .unwrap();

        let config = RunnerConfig {
            worker_command: "true".to_string(),
            max_concurrent: 3,
            poll_interval: Duration::from_millis(10),
            shutdown_grace: Duration::from_millis(50),
        };
        let runner = AgentRunner::new(engine.clone(), config);

        runner.poll_once().await.unwrap();
        assert_eq!(runner.running.lock().await.len(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        runner.reap_finished().await;
        assert!(runner.running.lock().await.is_empty());
        assert!(engine.get_pending_tasks(None).await.is_empty());
    }

    #[tokio::test]
    async fn respects_max_concurrent() {
        let engine = test_engine();
        for agent_type in ["backend-developer", "qa-reviewer", "docs-writer", "devops"] {
            engine
                .launch_agent(LaunchAgentRequest {
                    workflow_id: None,
                    agent_type: agent_type.to_string(),
                    specifications: "fix a small typo for the release".to_string(),
                    from_agent: None,
                    workspace_base_ref: None,
                    workspace_resources: None,
                    create_workspace: false,
                })
                .await
                .unwrap();
        }

        let config = RunnerConfig {
            worker_command: "sleep".to_string(),
            max_concurrent: 2,
            poll_interval: Duration::from_millis(10),
            shutdown_grace: Duration::from_millis(50),
        };
        let runner = AgentRunner::new(engine, config);
        runner.poll_once().await.unwrap();
        assert_eq!(runner.running.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn second_task_is_not_spawned_after_workflow_fails() {
        let engine = test_engine();
        let first = engine
            .launch_agent(LaunchAgentRequest {
                workflow_id: None,
                agent_type: "backend-developer".to_string(),
                specifications: "fix a small typo in the README for the release".to_string(),
                from_agent: None,
                workspace_base_ref: None,
                workspace_resources: None,
                create_workspace: false,
            })
            .await
            .unwrap();
        let workflow_id = match first {
            orchestrator_core::engine::LaunchAgentResult::Queued { workflow_id, .. } => workflow_id,
            other => panic!("expected Queued, got {other:?}"),
        };

        let config = RunnerConfig {
            worker_command: "true".to_string(),
            max_concurrent: 3,
            poll_interval: Duration::from_millis(10),
            shutdown_grace: Duration::from_millis(50),
        };
        let runner = AgentRunner::new(engine.clone(), config);
        runner.poll_once().await.unwrap();
        assert_eq!(runner.running.lock().await.len(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        runner.reap_finished().await;
        assert!(runner.running.lock().await.is_empty());

        engine
            .update_workflow_status(&workflow_id, WorkflowStatus::Failed)
            .await
            .unwrap();
        engine
            .launch_agent(LaunchAgentRequest {
                workflow_id: Some(workflow_id.clone()),
                agent_type: "qa-reviewer".to_string(),
                specifications: "review the failed attempt for the release".to_string(),
                from_agent: None,
                workspace_base_ref: None,
                workspace_resources: None,
                create_workspace: false,
            })
            .await
            .unwrap();

        runner.poll_once().await.unwrap();
        assert!(
            runner.running.lock().await.is_empty(),
            "a task on a failed workflow must never be spawned"
        );
    }
}
