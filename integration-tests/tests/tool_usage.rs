//! `dispatch` records every successful RPC call against the configured
//! tool-usage sink, keyed by the caller-supplied session id.

use std::sync::Arc;

use orchestrator_core::protocol::{dispatch, Handlers};
use orchestrator_core::scope_control::ScopeControl;
use orchestrator_core::OrchestrationEngine;
use serde_json::json;

use mocks::{
    InMemoryCleanupScheduleRepository, InMemoryHandoffRepository, InMemoryToolUsageRepository,
    InMemoryWorkflowRepository, MockWorkspaceManager,
};

fn build_handlers(tool_usage: Arc<InMemoryToolUsageRepository>) -> Handlers {
    let engine = Arc::new(
        OrchestrationEngine::new(
            Arc::new(InMemoryWorkflowRepository::new()),
            Arc::new(InMemoryHandoffRepository::new()),
            Arc::new(InMemoryCleanupScheduleRepository::default()),
            Arc::new(ScopeControl::new()),
            Arc::new(orchestrator_core::events::EventEmitter::default()),
        )
        .with_workspace(Arc::new(MockWorkspaceManager::new())),
    );

    Handlers { engine, workspace: None, tool_usage: Some(tool_usage) }
}

#[tokio::test]
async fn successful_calls_are_recorded_under_the_caller_session() {
    let tool_usage = Arc::new(InMemoryToolUsageRepository::new());
    let handlers = build_handlers(tool_usage.clone());

    dispatch(
        &handlers,
        "launch_agent",
        "session-abc",
        json!({"agent_type": "test-writer", "specifications": "add a regression test"}),
    )
    .await
    .unwrap();

    dispatch(&handlers, "get_pending_tasks", "session-abc", json!({})).await.unwrap();

    assert_eq!(
        tool_usage.calls(),
        vec![
            ("launch_agent".to_string(), "session-abc".to_string()),
            ("get_pending_tasks".to_string(), "session-abc".to_string()),
        ]
    );
}

#[tokio::test]
async fn a_failed_call_is_still_recorded_before_it_errors() {
    let tool_usage = Arc::new(InMemoryToolUsageRepository::new());
    let handlers = build_handlers(tool_usage.clone());

    let result = dispatch(&handlers, "launch_agent", "session-bad", json!({})).await;
    assert!(result.is_err());
    assert_eq!(tool_usage.calls(), vec![("launch_agent".to_string(), "session-bad".to_string())]);
}

#[tokio::test]
async fn missing_tool_usage_sink_does_not_affect_dispatch() {
    let engine = Arc::new(
        OrchestrationEngine::new(
            Arc::new(InMemoryWorkflowRepository::new()),
            Arc::new(InMemoryHandoffRepository::new()),
            Arc::new(InMemoryCleanupScheduleRepository::default()),
            Arc::new(ScopeControl::new()),
            Arc::new(orchestrator_core::events::EventEmitter::default()),
        )
        .with_workspace(Arc::new(MockWorkspaceManager::new())),
    );
    let handlers = Handlers { engine, workspace: None, tool_usage: None };

    let result = dispatch(&handlers, "get_pending_tasks", "session-none", json!({})).await;
    assert!(result.is_ok());
}
