//! MCP transport: JSON-RPC 2.0 over HTTP plus a Server-Sent Events stream.
//!
//! This crate is a thin shim — it owns the axum router, the SSE wiring,
//! and JSON-RPC error framing. All operation semantics live in
//! `orchestrator_core::protocol::dispatch`; this crate only decodes the
//! wire envelope and hands `{method, params}` to it.
//!
//! # Usage
//!
//! ```no_run
//! use mcp_protocol::McpServer;
//! use orchestrator_core::protocol::Handlers;
//! use std::sync::Arc;
//!
//! async fn start_server(handlers: Arc<Handlers>) -> Result<(), Box<dyn std::error::Error>> {
//!     let server = McpServer::new(handlers);
//!     server.serve("127.0.0.1:3000").await
//! }
//! ```

pub mod error;
pub mod serialization;
pub mod server;

pub use error::McpError;
pub use serialization::{create_null_response, create_success_response};
pub use server::McpServer;
