//! Application initialization shared by the CLI commands
//!
//! Loads configuration and, for commands that run the capture engine,
//! brings up file logging.

use std::path::PathBuf;

use anyhow::{Context, Result};
use rollcall_core::{
    get_default_config_path, init_logger, load_config_from_path, Config, LogLevel, LoggerConfig,
    LoggerGuard,
};

/// Application context holding initialized components
pub struct AppContext {
    /// Application configuration
    pub config: Config,
    /// Logger guard (keeps logger alive)
    #[allow(dead_code)]
    logger_guard: Option<LoggerGuard>,
}

impl AppContext {
    /// Returns reference to the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Application initialization options
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Whether to initialize the logger
    pub init_logger: bool,
    /// Log level override
    pub log_level: Option<LogLevel>,
}

impl InitOptions {
    /// Creates options for read-only commands (no logger)
    pub fn command() -> Self {
        Self {
            init_logger: false,
            log_level: None,
        }
    }

    /// Creates options for commands that run the capture engine
    pub fn engine() -> Self {
        Self {
            init_logger: true,
            log_level: Some(LogLevel::Info),
        }
    }
}

/// Initializes the rollcall application
///
/// Loads configuration from `config_path` (or `~/.rollcall/config.toml` when
/// none is given), writing a default file if it does not exist yet, then
/// initializes file logging under the data directory if requested.
pub fn initialize(config_path: Option<PathBuf>, options: InitOptions) -> Result<AppContext> {
    let path = config_path.unwrap_or_else(get_default_config_path);
    let config = load_config_from_path(&path).context("Failed to load configuration")?;

    let logger_guard = if options.init_logger {
        let log_level = options.log_level.unwrap_or(LogLevel::Info);
        let logger_config =
            LoggerConfig::new(config.storage.data_dir.join("logs")).with_level(log_level);

        Some(init_logger(logger_config).context("Failed to initialize logger")?)
    } else {
        None
    };

    Ok(AppContext {
        config,
        logger_guard,
    })
}
