//! Migrator - the contract surface used by the migration CLI and by
//! applications that migrate on startup.

use crate::config::MigratorConfig;
use crate::connection::connect;
use crate::migration::runner::{self, MigrationReport, Plan};
use crate::migration::validate::validate;
use crate::migration::version_table;
use crate::migration::introspect::MysqlIntrospector;
use crate::migration::{Command, MigrationError};
use serde_json::Value;

/// Backend-specific migrator
///
/// Implementations hold configuration only; every call opens what it needs and
/// releases it before returning. Calls block until the backend answers.
/// Concurrent `migrate` calls against one database are not coordinated.
pub trait Migrator {
    /// Ensure the target database and the version table exist
    fn init(&self) -> Result<(), MigrationError>;

    /// Greatest applied version, `"0"` when none
    fn version(&self) -> Result<String, MigrationError>;

    /// Apply `commands` and record `version`
    fn migrate(&self, version: &str, commands: &Value) -> Result<MigrationReport, MigrationError>;
}

/// `Migrator` for MySQL
#[derive(Debug, Clone)]
pub struct MysqlMigrator {
    config: MigratorConfig,
}

impl MysqlMigrator {
    pub fn new(config: MigratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// Apply typed commands and record `version`
    pub fn migrate_commands(
        &self,
        version: &str,
        commands: &[Command],
    ) -> Result<MigrationReport, MigrationError> {
        runner::validate_version(version)?;
        let executor = connect(&self.config.database, true)?;
        runner::run_commands(&executor, &self.config.version_table, version, commands)
    }

    /// Statements `commands` would run against the live schema, without running them
    pub fn plan(&self, commands: &Value) -> Result<Plan, MigrationError> {
        let commands = validate(commands)?;
        let executor = connect(&self.config.database, true)?;
        let introspector = MysqlIntrospector::new(&executor);
        runner::plan(&commands, Some(&introspector))
    }
}

impl Migrator for MysqlMigrator {
    fn init(&self) -> Result<(), MigrationError> {
        let executor = connect(&self.config.database, false)?;
        version_table::initialize(&executor, &self.config)
    }

    fn version(&self) -> Result<String, MigrationError> {
        let executor = connect(&self.config.database, true)?;
        version_table::current_version(&executor, &self.config.version_table)
    }

    fn migrate(&self, version: &str, commands: &Value) -> Result<MigrationReport, MigrationError> {
        // Reject malformed input before opening a connection
        runner::validate_version(version)?;
        let commands = validate(commands)?;
        let executor = connect(&self.config.database, true)?;
        runner::run_commands(&executor, &self.config.version_table, version, &commands)
    }
}
