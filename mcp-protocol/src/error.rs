//! JSON-RPC error mapping for the MCP transport.
//!
//! Translates [`OrchestratorError`] into JSON-RPC 2.0 error envelopes,
//! keeping the string `error_code()` the engine exposes alongside a
//! numeric code for clients that expect one.

use orchestrator_core::error::OrchestratorError;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum McpError {
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error("invalid JSON-RPC request: {0}")]
    InvalidRequest(String),

    #[error("unknown method: {0}")]
    MethodNotFound(String),
}

impl McpError {
    /// Numeric JSON-RPC error code. Reserves the standard `-3200x` range
    /// for protocol-level problems and maps orchestrator error codes onto
    /// a stable per-variant offset so clients can switch on either the
    /// numeric code or `data.error_code`.
    pub fn to_error_code(&self) -> i32 {
        match self {
            McpError::InvalidRequest(_) => -32600,
            McpError::MethodNotFound(_) => -32601,
            McpError::Orchestrator(e) => match e.error_code() {
                "VALIDATION_ERROR" => -32001,
                "NOT_FOUND" => -32002,
                "TOOL_EXECUTION_ERROR" => -32003,
                "GIT_REPOSITORY_INVALID" => -32004,
                "MEMORY_STORE_ERROR" => -32005,
                "MEMORY_RETRIEVE_ERROR" => -32006,
                "CIRCUIT_BREAKER_OPEN" => -32007,
                _ => -32000,
            },
        }
    }

    pub fn to_json_rpc_error(&self, id: Option<Value>) -> Value {
        let data = match self {
            McpError::Orchestrator(e) => json!({
                "error_code": e.error_code(),
                "retryable": e.retryable(),
            }),
            _ => Value::Null,
        };
        json!({
            "jsonrpc": "2.0",
            "error": {
                "code": self.to_error_code(),
                "message": self.to_string(),
                "data": data,
            },
            "id": id
        })
    }
}
