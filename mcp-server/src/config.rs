use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub workspace: WorkspaceConfig,
    pub runner: RunnerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file. Defaults to `~/.agent-orchestrator/orchestrator.sqlite`.
    pub path: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WorkspaceConfig {
    /// Root directory git worktrees are created under.
    pub workspaces_dir: String,
    pub max_agents: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RunnerConfig {
    pub max_workflows: u32,
    pub cleanup_interval_minutes: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub file: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl Config {
    /// Load configuration from the baked-in defaults, then a config file
    /// (if named via `CONFIG_FILE`), then `ORCHESTRATOR_`-prefixed
    /// environment variables, then the specific environment variables
    /// named in the operation contract.
    pub fn from_env() -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        builder = builder.add_source(File::from_str(
            include_str!("../config/default.toml"),
            FileFormat::Toml,
        ));

        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(
                File::with_name(&config_file)
                    .required(false)
                    .format(FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("ORCHESTRATOR")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build().context("failed to build configuration")?;
        let mut result: Config = config
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        Self::apply_standard_env_vars(&mut result);
        Ok(result)
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let builder = ConfigBuilder::builder()
            .add_source(File::with_name(path).format(FileFormat::Toml))
            .add_source(
                Environment::with_prefix("ORCHESTRATOR")
                    .separator("_")
                    .try_parsing(true),
            );

        let config = builder
            .build()
            .context("failed to build configuration from file")?;
        let mut result: Config = config
            .try_deserialize()
            .context("failed to deserialize configuration from file")?;
        Self::apply_standard_env_vars(&mut result);
        Ok(result)
    }

    /// Applies the named environment variables from the operation
    /// contract, which take precedence over both the config file and
    /// the `ORCHESTRATOR_`-prefixed overrides.
    fn apply_standard_env_vars(config: &mut Config) {
        if let Ok(path) = env::var("DATABASE_PATH") {
            config.database.path = Some(path);
        }
        if let Ok(dir) = env::var("WORKSPACES_DIR") {
            config.workspace.workspaces_dir = dir;
        }
        if let Ok(max_workflows) = env::var("MAX_WORKFLOWS") {
            if let Ok(parsed) = max_workflows.parse() {
                config.runner.max_workflows = parsed;
            }
        }
        if let Ok(interval) = env::var("CLEANUP_INTERVAL_MINUTES") {
            if let Ok(parsed) = interval.parse() {
                config.runner.cleanup_interval_minutes = parsed;
            }
        }
        if let Ok(max_agents) = env::var("MAX_AGENTS") {
            if let Ok(parsed) = max_agents.parse() {
                config.workspace.max_agents = parsed;
            }
        }
        if let Ok(level) = env::var("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(file) = env::var("LOG_FILE") {
            config.logging.file = Some(file);
        }
    }

    pub fn database_url(&self) -> String {
        match &self.database.path {
            Some(path) => format!("sqlite://{path}"),
            None => Self::default_database_url(),
        }
    }

    pub fn default_database_url() -> String {
        if let Ok(xdg_data) = env::var("XDG_DATA_HOME") {
            return format!("sqlite://{xdg_data}/agent-orchestrator/orchestrator.sqlite");
        }
        let home = env::var("HOME")
            .or_else(|_| env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        format!("sqlite://{home}/.agent-orchestrator/orchestrator.sqlite")
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.listen_addr, self.server.port)
    }

    /// Rejects unknown log levels, zero concurrency caps, and non-`sqlite://`
    /// database URLs before the engine starts.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(anyhow::anyhow!(
                    "invalid log level: {}. must be one of: trace, debug, info, warn, error",
                    self.logging.level
                ));
            }
        }

        let database_url = self.database_url();
        if !database_url.starts_with("sqlite://") {
            return Err(anyhow::anyhow!(
                "only sqlite databases are supported, got: {database_url}"
            ));
        }

        if self.server.port == 0 {
            return Err(anyhow::anyhow!("server port cannot be 0"));
        }
        if self.database.max_connections == 0 {
            return Err(anyhow::anyhow!(
                "database max_connections must be greater than 0"
            ));
        }
        if self.workspace.max_agents == 0 {
            return Err(anyhow::anyhow!("workspace.max_agents must be greater than 0"));
        }
        if self.runner.max_workflows == 0 {
            return Err(anyhow::anyhow!("runner.max_workflows must be greater than 0"));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: None,
                max_connections: 5,
                connection_timeout: 30,
            },
            server: ServerConfig {
                listen_addr: "127.0.0.1".to_string(),
                port: 3000,
            },
            workspace: WorkspaceConfig {
                workspaces_dir: "./workspaces".to_string(),
                max_agents: 4,
            },
            runner: RunnerConfig {
                max_workflows: 50,
                cleanup_interval_minutes: 15,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
                file: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.server.listen_addr, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn database_url_defaults_under_home() {
        let config = Config::default();
        let url = config.database_url();
        assert!(url.starts_with("sqlite://"));
        assert!(url.contains("orchestrator.sqlite"));
    }

    #[test]
    fn database_url_with_explicit_path() {
        let mut config = Config::default();
        config.database.path = Some("/tmp/custom.db".to_string());
        assert_eq!(config.database_url(), "sqlite:///tmp/custom.db");
    }

    #[test]
    fn server_address_combines_host_and_port() {
        let config = Config::default();
        assert_eq!(config.server_address(), "127.0.0.1:3000");
    }

    #[test]
    fn validation_rejects_unknown_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_zero_max_agents() {
        let mut config = Config::default();
        config.workspace.max_agents = 0;
        assert!(config.validate().is_err());
    }
}
