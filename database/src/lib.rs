//! SQLite-backed persistence for the orchestrator core.
//!
//! Provides [`SqliteStore`], a single-pool implementation of every
//! repository trait the engine depends on (`WorkflowRepository`,
//! `HandoffRepository`, `CleanupScheduleRepository`, `MemoryRepository`,
//! `ToolUsageRepository`), with WAL-mode journaling and
//! `sqlx::migrate!`-driven schema management.
//!
//! # Usage
//!
//! ```rust,no_run
//! use database::SqliteStore;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteStore::new(":memory:").await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

mod common;
mod sqlite;

pub use sqlite::SqliteStore;

pub use orchestrator_core::{
    error::{OrchestratorError, Result},
    repository::{
        CleanupScheduleRepository, HandoffRepository, MemoryRepository, RepositoryStats,
        ToolUsageRepository, WorkflowFilter, WorkflowRepository,
    },
};
