use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::{LogFormat, LoggingConfig};

/// Initializes the tracing subscriber. When `config.file` is set, output is
/// redirected to a daily rolling file appender instead of stdout; the
/// returned guard must be held for the process lifetime or buffered lines
/// are lost on exit.
pub fn init_telemetry(config: &LoggingConfig) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("invalid log level configuration")?;

    let registry = Registry::default().with(env_filter);

    let guard = match &config.file {
        Some(path) => {
            let path = std::path::Path::new(path);
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "orchestrator.log".to_string());
            let appender = tracing_appender::rolling::daily(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);

            match config.format {
                LogFormat::Pretty => registry
                    .with(fmt::layer().pretty().with_writer(non_blocking))
                    .init(),
                LogFormat::Json => registry
                    .with(fmt::layer().json().with_span_list(true).flatten_event(true).with_writer(non_blocking))
                    .init(),
                LogFormat::Compact => registry
                    .with(fmt::layer().compact().with_writer(non_blocking))
                    .init(),
            }
            Some(guard)
        }
        None => {
            match config.format {
                LogFormat::Pretty => registry
                    .with(
                        fmt::layer()
                            .pretty()
                            .with_target(true)
                            .with_thread_ids(true)
                            .with_thread_names(true)
                            .with_file(true)
                            .with_line_number(true),
                    )
                    .init(),
                LogFormat::Json => registry
                    .with(
                        fmt::layer()
                            .json()
                            .with_target(true)
                            .with_thread_ids(true)
                            .with_thread_names(true)
                            .with_file(true)
                            .with_line_number(true)
                            .with_span_list(true)
                            .flatten_event(true),
                    )
                    .init(),
                LogFormat::Compact => registry
                    .with(
                        fmt::layer()
                            .compact()
                            .with_target(true)
                            .with_thread_ids(false)
                            .with_thread_names(false)
                            .with_file(false)
                            .with_line_number(false),
                    )
                    .init(),
            }
            None
        }
    };

    tracing::info!(
        log_level = %config.level,
        log_format = ?config.format,
        log_file = ?config.file,
        "telemetry initialized"
    );

    Ok(guard)
}

/// Scopes `tracing` events to orchestration-engine operations.
#[macro_export]
macro_rules! engine_span {
    ($operation:expr) => {
        tracing::info_span!("engine_operation", operation = $operation)
    };
    ($operation:expr, $($key:expr => $value:expr),*) => {
        tracing::info_span!("engine_operation", operation = $operation, $($key = $value),*)
    };
}

/// Scopes `tracing` events to agent-runner operations.
#[macro_export]
macro_rules! runner_span {
    ($operation:expr) => {
        tracing::info_span!("runner_operation", operation = $operation)
    };
    ($operation:expr, $($key:expr => $value:expr),*) => {
        tracing::info_span!("runner_operation", operation = $operation, $($key = $value),*)
    };
}

/// Scopes `tracing` events to workspace-manager operations.
#[macro_export]
macro_rules! workspace_span {
    ($operation:expr) => {
        tracing::info_span!("workspace_operation", operation = $operation)
    };
    ($operation:expr, $($key:expr => $value:expr),*) => {
        tracing::info_span!("workspace_operation", operation = $operation, $($key = $value),*)
    };
}

pub fn log_startup_info(config: &crate::config::Config) {
    tracing::info!(
        server_address = %config.server_address(),
        database_url = %config.database_url(),
        max_connections = config.database.max_connections,
        max_agents = config.workspace.max_agents,
        max_workflows = config.runner.max_workflows,
        "agent-orchestrator starting up"
    );
}

#[allow(dead_code)]
pub fn log_shutdown_info() {
    tracing::info!("agent-orchestrator shutting down gracefully");
}

pub fn log_config_validation(config: &crate::config::Config) {
    match config.validate() {
        Ok(()) => tracing::info!("configuration validation passed"),
        Err(e) => tracing::error!(error = %e, "configuration validation failed"),
    }
}

#[allow(dead_code)]
pub fn report_error(error: &anyhow::Error, context: &str) {
    tracing::error!(error = %error, context = context, "operation failed");

    let mut current = error.source();
    let mut depth = 1;
    while let Some(err) = current {
        tracing::error!(error = %err, depth, "error cause");
        current = err.source();
        depth += 1;
    }
}

#[allow(dead_code)]
pub struct PerformanceTimer {
    start: std::time::Instant,
    operation: String,
}

impl PerformanceTimer {
    #[allow(dead_code)]
    pub fn new(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        tracing::debug!(operation = %operation, "starting performance timer");
        Self {
            start: std::time::Instant::now(),
            operation,
        }
    }

    #[allow(dead_code)]
    pub fn finish(self) {
        let duration = self.start.elapsed();
        tracing::info!(operation = %self.operation, duration_ms = duration.as_millis(), "operation completed");
        if duration.as_millis() > 1000 {
            tracing::warn!(operation = %self.operation, duration_ms = duration.as_millis(), "slow operation detected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn performance_timer_does_not_panic() {
        let timer = PerformanceTimer::new("test_operation");
        std::thread::sleep(Duration::from_millis(5));
        timer.finish();
    }

    #[test]
    fn logging_config_formats_are_distinct() {
        let configs = vec![
            LoggingConfig { level: "info".to_string(), format: LogFormat::Pretty, file: None },
            LoggingConfig { level: "debug".to_string(), format: LogFormat::Json, file: None },
            LoggingConfig { level: "warn".to_string(), format: LogFormat::Compact, file: Some("/tmp/x.log".to_string()) },
        ];
        for config in configs {
            assert!(matches!(config.format, LogFormat::Pretty | LogFormat::Json | LogFormat::Compact));
        }
    }
}
