//! Mock implementations and test utilities for the agent-orchestration
//! server.
//!
//! This crate provides:
//! - In-memory doubles of the four repository traits, plus the workspace
//!   manager and memory store
//! - Builders and fixtures for the core domain entities
//! - Realistic data generators
//! - Custom assertion helpers
//! - Contract test suites any repository implementation should pass

pub mod assertions;
pub mod builders;
pub mod contracts;
pub mod fixtures;
pub mod generators;
pub mod repository;

pub use assertions::*;
pub use builders::*;
pub use contracts::*;
pub use fixtures::*;
pub use generators::*;
pub use repository::{
    InMemoryCleanupScheduleRepository, InMemoryHandoffRepository, InMemoryMemoryRepository,
    InMemoryToolUsageRepository, InMemoryWorkflowRepository, MockMemoryStore, MockWorkspaceManager,
};
