//! MCP server: SSE event stream plus JSON-RPC 2.0 request/response.
//!
//! `POST /mcp/v1/rpc` dispatches the twelve named operations through
//! [`orchestrator_core::protocol::dispatch`]; `GET /mcp/v1/events` relays
//! the engine's [`EventEmitter`] broadcast as Server-Sent Events with a
//! 30-second heartbeat; `GET /health` is a liveness probe.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Sse,
    routing::{get, post},
    Json, Router,
};
use orchestrator_core::protocol::{dispatch, Handlers};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::info;

use crate::{error::McpError, serialization::create_success_response};

const CAPABILITIES: &[&str] = &[
    "launch_agent",
    "get_pending_tasks",
    "signal_completion",
    "create_workspace",
    "cleanup_workspace",
    "list_workspaces",
    "get_system_status",
    "get_workflow_status",
    "list_workflows",
    "get_workflow_handoffs",
    "detect_stale_workflows",
    "cleanup_stale_workflows",
];

/// MCP server over HTTP, wrapping a [`Handlers`] bundle shared across
/// requests.
pub struct McpServer {
    handlers: Arc<Handlers>,
}

impl McpServer {
    pub fn new(handlers: Arc<Handlers>) -> Self {
        Self { handlers }
    }

    pub async fn serve(self, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.create_router();
        info!("starting orchestrator MCP server on {addr}");
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }

    pub fn create_router(self) -> Router {
        Router::new()
            .route("/mcp/v1/events", get(sse_handler))
            .route("/mcp/v1/rpc", post(rpc_handler))
            .route("/health", get(health_handler))
            .with_state(self.handlers)
    }
}

async fn sse_handler(
    State(handlers): State<Arc<Handlers>>,
) -> Result<Sse<UnboundedReceiverStream<Result<axum::response::sse::Event, axum::Error>>>, StatusCode>
{
    let (tx, rx) = mpsc::unbounded_channel();

    let welcome = axum::response::sse::Event::default().data(
        json!({
            "jsonrpc": "2.0",
            "method": "connection_established",
            "params": {
                "server": "agent-orchestrator",
                "version": env!("CARGO_PKG_VERSION"),
                "capabilities": CAPABILITIES,
            }
        })
        .to_string(),
    );
    if tx.send(Ok(welcome)).is_err() {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let mut events = handlers.engine.events().subscribe();
    tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(std::time::Duration::from_secs(30));
        heartbeat.tick().await; // skip the immediate first tick
        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    let beat = axum::response::sse::Event::default().event("heartbeat").data("ping");
                    if tx.send(Ok(beat)).is_err() {
                        break;
                    }
                }
                received = events.recv() => {
                    let event = match received {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    };
                    let sse_event = axum::response::sse::Event::default().data(
                        serde_json::to_string(&event).unwrap_or_default(),
                    );
                    if tx.send(Ok(sse_event)).is_err() {
                        break;
                    }
                }
            }
        }
    });

    Ok(Sse::new(UnboundedReceiverStream::new(rx)))
}

async fn rpc_handler(State(handlers): State<Arc<Handlers>>, Json(request): Json<Value>) -> Json<Value> {
    let id = request.get("id").cloned();

    let method = match request.get("method").and_then(Value::as_str) {
        Some(method) => method,
        None => {
            let err = McpError::InvalidRequest("missing or invalid 'method' field".to_string());
            return Json(err.to_json_rpc_error(id));
        }
    };
    let params = request.get("params").cloned().unwrap_or(Value::Null);
    let session_id = request
        .get("session_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| id.as_ref().map(Value::to_string))
        .unwrap_or_else(|| "anonymous".to_string());

    match dispatch(&handlers, method, &session_id, params).await {
        Ok(result) => Json(create_success_response(id, result)),
        Err(err) => Json(McpError::from(err).to_json_rpc_error(id)),
    }
}

async fn health_handler() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use orchestrator_core::engine::OrchestrationEngine;
    use orchestrator_core::events::EventEmitter;
    use orchestrator_core::models::{CleanupScheduleRow, Handoff, Workflow, WorkflowStatus};
    use orchestrator_core::repository::{
        CleanupScheduleRepository, HandoffRepository, WorkflowFilter, WorkflowRepository,
    };
    use orchestrator_core::scope_control::ScopeControl;

    struct NullWorkflowRepo;
    #[async_trait]
    impl WorkflowRepository for NullWorkflowRepo {
        async fn upsert(&self, _workflow: &Workflow) -> orchestrator_core::error::Result<()> {
            Ok(())
        }
        async fn get(&self, _id: &str) -> orchestrator_core::error::Result<Option<Workflow>> {
            Ok(None)
        }
        async fn list(&self, _filter: &WorkflowFilter) -> orchestrator_core::error::Result<Vec<Workflow>> {
            Ok(Vec::new())
        }
        async fn update_status(
            &self,
            _id: &str,
            _status: WorkflowStatus,
            _updated_at: DateTime<Utc>,
        ) -> orchestrator_core::error::Result<()> {
            Ok(())
        }
        async fn mark_stale_before(&self, _threshold: DateTime<Utc>) -> orchestrator_core::error::Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn delete_stale_before(&self, _threshold: DateTime<Utc>) -> orchestrator_core::error::Result<u64> {
            Ok(0)
        }
        async fn count_by_status(&self) -> orchestrator_core::error::Result<Vec<(WorkflowStatus, u64)>> {
            Ok(Vec::new())
        }
    }

    struct NullHandoffRepo;
    #[async_trait]
    impl HandoffRepository for NullHandoffRepo {
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

    struct NullCleanupRepo;
    #[async_trait]
    impl CleanupScheduleRepository for NullCleanupRepo {
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

    fn test_handlers() -> Arc<Handlers> {
        let engine = OrchestrationEngine::new(
            Arc::new(NullWorkflowRepo),
            Arc::new(NullHandoffRepo),
            Arc::new(NullCleanupRepo),
            Arc::new(ScopeControl::new()),
            Arc::new(EventEmitter::default()),
        );
        Arc::new(Handlers {
            engine: Arc::new(engine),
            workspace: None,
            tool_usage: None,
        })
    }

    #[tokio::test]
    async fn rpc_handler_rejects_missing_method() {
        let handlers = test_handlers();
        let Json(response) = rpc_handler(State(handlers), Json(json!({"id": 1}))).await;
        assert_eq!(response["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn rpc_handler_dispatches_known_method() {
        let handlers = test_handlers();
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "get_pending_tasks",
            "params": {}
        });
        let Json(response) = rpc_handler(State(handlers), Json(request)).await;
        assert_eq!(response["result"]["count"], 0);
    }

    #[tokio::test]
    async fn health_handler_returns_ok() {
        assert_eq!(health_handler().await, "OK");
    }
}
