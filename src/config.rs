//! Configuration for the migrator.
//!
//! [`MigratorConfig`] holds the connection descriptor and the version table
//! name. Applications load it from `config/driftwood.toml` or environment
//! variables using `MigratorConfig::load()`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_CONFIG_FILE: &str = "config/driftwood.toml";
const ENV_PREFIX: &str = "DRIFTWOOD";

/// Connection descriptor for the target MySQL server
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_user() -> String {
    "root".to_string()
}

fn default_database() -> String {
    "driftwood_dev".to_string()
}

fn default_version_table() -> String {
    "schema_versions".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: String::new(),
            database: default_database(),
        }
    }
}

/// Migrator configuration: where to connect and where to record versions
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MigratorConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default = "default_version_table")]
    pub version_table: String,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            version_table: default_version_table(),
        }
    }
}

impl MigratorConfig {
    /// Create a config for the given descriptor with the default version table
    pub fn new(database: DatabaseConfig) -> Self {
        Self {
            database,
            version_table: default_version_table(),
        }
    }

    /// Load the configuration from `config/driftwood.toml`, falling back to env vars.
    ///
    /// An unreadable default file is logged and skipped.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_layered(Path::new(DEFAULT_CONFIG_FILE), true)
    }

    /// Load the configuration from `path` (optional file) layered under
    /// `DRIFTWOOD__*` environment variables.
    ///
    /// A file that exists but fails to parse is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::load_layered(path, false)
    }

    fn load_layered(path: &Path, env_fallback: bool) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) if !env_fallback => {
                return Err(ConfigError::Message(format!(
                    "Failed to load configuration file {}: {}",
                    path.display(),
                    err
                )))
            }
            Err(err) => {
                if path.exists() {
                    log::warn!(
                        "failed to load config file {}, falling back to env: {}",
                        path.display(),
                        err
                    );
                }
                Config::builder()
                    .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {}, then env-only error: {}",
                            err, env_err
                        ))
                    })?
            }
        };

        let migrator_config: MigratorConfig = settings.try_deserialize().map_err(|e| {
            ConfigError::Message(format!(
                "Migrator configuration could not be loaded from file or environment: {}",
                e
            ))
        })?;

        migrator_config.validate()?;
        Ok(migrator_config)
    }

    /// Check the version table name is a plain identifier
    ///
    /// The name is spliced into SQL text, so only `[A-Za-z0-9_]` is accepted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if is_plain_identifier(&self.version_table) {
            Ok(())
        } else {
            Err(ConfigError::Message(format!(
                "version_table '{}' must be a non-empty identifier of letters, digits and underscores",
                self.version_table
            )))
        }
    }
}

pub(crate) fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
