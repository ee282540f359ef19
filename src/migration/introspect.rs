//! Schema introspection
//!
//! Read-only existence checks against the backend catalog. The generator
//! consults these to decide whether constraint mutations are needed.

use crate::executor::{Executor, ExecutorError, SqlValue};

/// Catalog query: does a schema with this name exist
pub const DATABASE_EXISTS_SQL: &str =
    "SELECT SCHEMA_NAME FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = ?";

/// Catalog query: does a table with this name exist in the current schema
pub const TABLE_EXISTS_SQL: &str =
    "SELECT TABLE_NAME FROM information_schema.TABLES WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?";

/// Catalog query: does a foreign key with this name exist in the current schema
pub const CONSTRAINT_EXISTS_SQL: &str = "SELECT CONSTRAINT_NAME FROM information_schema.TABLE_CONSTRAINTS \
     WHERE CONSTRAINT_SCHEMA = DATABASE() AND CONSTRAINT_TYPE = 'FOREIGN KEY' AND CONSTRAINT_NAME = ?";

/// Existence predicates over backend catalog metadata
///
/// None of these mutate state; calling them repeatedly gives the same answer
/// until the schema changes.
pub trait SchemaIntrospector {
    fn database_exists(&self, name: &str) -> Result<bool, ExecutorError>;

    fn table_exists(&self, name: &str) -> Result<bool, ExecutorError>;

    /// Scoped to the currently selected database
    fn constraint_exists(&self, name: &str) -> Result<bool, ExecutorError>;
}

/// `SchemaIntrospector` over MySQL's `information_schema`
pub struct MysqlIntrospector<'a> {
    executor: &'a dyn Executor,
}

impl<'a> MysqlIntrospector<'a> {
    pub fn new(executor: &'a dyn Executor) -> Self {
        Self { executor }
    }

    fn any_row(&self, sql: &str, name: &str) -> Result<bool, ExecutorError> {
        let rows = self.executor.query_column(sql, &[SqlValue::Text(name)])?;
        Ok(!rows.is_empty())
    }
}

impl SchemaIntrospector for MysqlIntrospector<'_> {
    fn database_exists(&self, name: &str) -> Result<bool, ExecutorError> {
        let exists = self.any_row(DATABASE_EXISTS_SQL, name)?;
        log::debug!("database {} exists: {}", name, exists);
        Ok(exists)
    }

    fn table_exists(&self, name: &str) -> Result<bool, ExecutorError> {
        let exists = self.any_row(TABLE_EXISTS_SQL, name)?;
        log::debug!("table {} exists: {}", name, exists);
        Ok(exists)
    }

    fn constraint_exists(&self, name: &str) -> Result<bool, ExecutorError> {
        let exists = self.any_row(CONSTRAINT_EXISTS_SQL, name)?;
        log::debug!("constraint {} exists: {}", name, exists);
        Ok(exists)
    }
}

/// Constraint lookup through an optional introspector
///
/// With no backend bound the constraint is reported absent, so the caller
/// emits the mutation rather than silently dropping it.
pub fn constraint_exists(
    introspector: Option<&dyn SchemaIntrospector>,
    name: &str,
) -> Result<bool, ExecutorError> {
    match introspector {
        Some(introspector) => introspector.constraint_exists(name),
        None => {
            log::warn!(
                "no backend bound for introspection, treating constraint {} as absent",
                name
            );
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::RecordingExecutor;

    #[test]
    fn test_mysql_introspector_queries_catalog() {
        let executor = RecordingExecutor::new()
            .with_database("shop")
            .with_table("orders")
            .with_constraint("fk_orders_user");
        let introspector = MysqlIntrospector::new(&executor);

        assert!(introspector.database_exists("shop").unwrap());
        assert!(!introspector.database_exists("other").unwrap());
        assert!(introspector.table_exists("orders").unwrap());
        assert!(!introspector.table_exists("users").unwrap());
        assert!(introspector.constraint_exists("fk_orders_user").unwrap());
        assert!(!introspector.constraint_exists("fk_missing").unwrap());

        // Lookups are read-only
        assert!(executor.executed().is_empty());
    }

    #[test]
    fn test_unbound_constraint_lookup_is_absent() {
        assert!(!constraint_exists(None, "fk_orders_user").unwrap());
    }

    #[test]
    fn test_failed_lookup_is_an_error() {
        let executor = RecordingExecutor::new().failing_queries("catalog offline");
        let introspector = MysqlIntrospector::new(&executor);
        let err = constraint_exists(Some(&introspector), "fk_orders_user").unwrap_err();
        assert_eq!(err.message, "catalog offline");
    }
}
