//! Version table management
//!
//! The version table holds one row per applied migration:
//! `(version VARCHAR(14) NOT NULL, created BIGINT NOT NULL)`.

use crate::config::{is_plain_identifier, MigratorConfig};
use crate::executor::{Executor, SqlValue};
use crate::migration::introspect::{MysqlIntrospector, SchemaIntrospector};
use crate::migration::record::latest_version;
use crate::migration::{MigrationError, VersionRecord};

/// `CREATE TABLE` statement for the version table
pub fn create_version_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE {} (version VARCHAR(14) NOT NULL, created BIGINT NOT NULL)",
        table
    )
}

fn quote_database(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn checked_table(table: &str) -> Result<&str, MigrationError> {
    if is_plain_identifier(table) {
        Ok(table)
    } else {
        Err(MigrationError::Validation(format!(
            "version table name '{}' must contain only letters, digits and underscores",
            table
        )))
    }
}

/// Create the target database if absent and make it the session default
///
/// Returns `true` if the database was created.
pub fn ensure_database(executor: &dyn Executor, name: &str) -> Result<bool, MigrationError> {
    let introspector = MysqlIntrospector::new(executor);
    let created = if introspector.database_exists(name)? {
        log::debug!("database {} already exists", name);
        false
    } else {
        log::info!("creating database {}", name);
        executor.execute(&format!("CREATE DATABASE {}", quote_database(name)), &[])?;
        true
    };
    executor.execute(&format!("USE {}", quote_database(name)), &[])?;
    Ok(created)
}

/// Create the version table if absent
///
/// Returns `true` if the table was created.
pub fn ensure_version_table(executor: &dyn Executor, table: &str) -> Result<bool, MigrationError> {
    let table = checked_table(table)?;
    let introspector = MysqlIntrospector::new(executor);
    if introspector.table_exists(table)? {
        log::debug!("version table {} already exists", table);
        return Ok(false);
    }
    log::info!("creating version table {}", table);
    executor.execute(&create_version_table_sql(table), &[])?;
    Ok(true)
}

/// Ensure the database and the version table exist
///
/// Safe to call on every startup.
pub fn initialize(executor: &dyn Executor, config: &MigratorConfig) -> Result<(), MigrationError> {
    checked_table(&config.version_table)?;
    ensure_database(executor, &config.database.database)?;
    ensure_version_table(executor, &config.version_table)?;
    Ok(())
}

/// All recorded versions, in table order
pub fn applied_versions(executor: &dyn Executor, table: &str) -> Result<Vec<String>, MigrationError> {
    let table = checked_table(table)?;
    let sql = format!("SELECT version FROM {}", table);
    Ok(executor.query_column(&sql, &[])?)
}

/// Greatest recorded version, or `"0"` for an empty table
pub fn current_version(executor: &dyn Executor, table: &str) -> Result<String, MigrationError> {
    Ok(latest_version(applied_versions(executor, table)?))
}

/// Insert one version row
pub fn record_version(
    executor: &dyn Executor,
    table: &str,
    record: &VersionRecord,
) -> Result<(), MigrationError> {
    let table = checked_table(table)?;
    let sql = format!("INSERT INTO {} (version, created) VALUES (?, ?)", table);
    executor.execute(
        &sql,
        &[SqlValue::Text(&record.version), SqlValue::BigInt(record.created)],
    )?;
    log::info!("recorded version {} in {}", record.version, table);
    Ok(())
}
