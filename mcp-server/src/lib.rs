//! Agent orchestrator server binary's library half: configuration,
//! persistence/engine wiring, and telemetry setup shared by `main.rs` and
//! the integration-test suite.

pub mod config;
pub mod setup;
pub mod telemetry;

pub use config::Config;
pub use setup::{
    create_engine, create_server, create_store, create_workspace_manager,
    ensure_database_directory, ensure_database_directory_from_config, initialize_app, Background,
};
pub use telemetry::init_telemetry;
