//! Migration runner - executes one migration
//!
//! A run goes through fixed steps:
//! 1. validate the version and the command set
//! 2. bind the executor as the introspection context for this run
//! 3. generate every statement, in command order
//! 4. execute statements one by one, stopping at the first failure
//! 5. record the version once every statement succeeded
//!
//! Nothing reaches the backend until steps 1-3 succeeded for the whole
//! migration. DDL is not transactional, so a failure in step 4 leaves the
//! statements before it applied.

use crate::executor::Executor;
use crate::migration::error::clean_message;
use crate::migration::generator::{ConstraintSkip, SqlGenerator};
use crate::migration::introspect::{MysqlIntrospector, SchemaIntrospector};
use crate::migration::record::MAX_VERSION_LEN;
use crate::migration::validate::validate;
use crate::migration::version_table::record_version;
use crate::migration::{Command, MigrationError, VersionRecord};
use serde_json::Value;

/// Statements a migration would run, without running them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub statements: Vec<String>,
    pub skipped: Vec<ConstraintSkip>,
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub version: String,
    pub statements: Vec<String>,
    pub skipped: Vec<ConstraintSkip>,
    pub created: i64,
}

/// Check a version string fits the version table
pub fn validate_version(version: &str) -> Result<(), MigrationError> {
    if version.trim().is_empty() || version.chars().count() > MAX_VERSION_LEN {
        Err(MigrationError::InvalidVersion(version.to_string()))
    } else {
        Ok(())
    }
}

/// Generate the statements for `commands`, in order
///
/// Within a command the per-kind sub-order applies (see `SqlGenerator`).
pub fn plan(
    commands: &[Command],
    introspector: Option<&dyn SchemaIntrospector>,
) -> Result<Plan, MigrationError> {
    let mut generator = SqlGenerator::new(introspector);
    let mut statements = Vec::new();
    for command in commands {
        statements.extend(generator.generate(command)?);
    }
    Ok(Plan {
        statements,
        skipped: generator.into_skipped(),
    })
}

/// Execute statements in order, stopping at the first failure
///
/// Each statement is logged before it runs.
pub fn execute_statements(
    executor: &dyn Executor,
    version: &str,
    statements: &[String],
) -> Result<(), MigrationError> {
    let total = statements.len();
    for (i, statement) in statements.iter().enumerate() {
        log::info!("[{}] {}", version, statement);
        if let Err(e) = executor.execute(statement, &[]) {
            let message = clean_message(&e.to_string());
            log::error!(
                "[{}] statement {} of {} failed: {}",
                version,
                i + 1,
                total,
                message
            );
            return Err(MigrationError::Execution {
                version: version.to_string(),
                index: i + 1,
                total,
                statement: statement.clone(),
                message,
            });
        }
    }
    Ok(())
}

/// Run a migration given as a dynamic command set
pub fn run_migration(
    executor: &dyn Executor,
    version_table: &str,
    version: &str,
    commands: &Value,
) -> Result<MigrationReport, MigrationError> {
    validate_version(version)?;
    let commands = validate(commands)?;
    run_commands(executor, version_table, version, &commands)
}

/// Run a migration given as typed commands
pub fn run_commands(
    executor: &dyn Executor,
    version_table: &str,
    version: &str,
    commands: &[Command],
) -> Result<MigrationReport, MigrationError> {
    validate_version(version)?;

    let introspector = MysqlIntrospector::new(executor);
    let Plan { statements, skipped } = plan(commands, Some(&introspector))?;

    execute_statements(executor, version, &statements)?;

    let record = VersionRecord::now(version);
    record_version(executor, version_table, &record)?;

    log::info!(
        "[{}] applied {} statement(s), skipped {} constraint change(s)",
        version,
        statements.len(),
        skipped.len()
    );

    Ok(MigrationReport {
        version: record.version,
        statements,
        skipped,
        created: record.created,
    })
}
