//! Application configuration.
//!
//! Loaded from YAML files and environment variables into a single `Config`.

mod limits;

pub use limits::{DispatchConfig, EngineConfig, DEFAULT_MAX_CALLS_PER_STAGE, DEFAULT_PARTITION_COUNT};

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "stagewright.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "STAGEWRIGHT_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "STAGEWRIGHT";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "STAGEWRIGHT_LOG";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid config value '{field}': {message}")]
    Invalid { field: &'static str, message: String },
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Compound procedure execution.
    pub engine: EngineConfig,
    /// Sub-procedure dispatch.
    pub dispatch: DispatchConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `stagewright.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config: Config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.max_calls_per_stage == 0 {
            return Err(ConfigError::Invalid {
                field: "engine.max_calls_per_stage",
                message: "must be at least 1".to_string(),
            });
        }
        if self.engine.procedure_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid {
                field: "engine.procedure_timeout_ms",
                message: "must be positive when set".to_string(),
            });
        }
        if self.dispatch.partition_count == 0 {
            return Err(ConfigError::Invalid {
                field: "dispatch.partition_count",
                message: "must be at least 1".to_string(),
            });
        }
        if self.dispatch.call_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid {
                field: "dispatch.call_timeout_ms",
                message: "must be positive when set".to_string(),
            });
        }
        Ok(())
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}
