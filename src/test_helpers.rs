//! In-memory stand-ins for the backend, for tests and offline dry runs.
//!
//! [`RecordingExecutor`] records every statement it is given and keeps just
//! enough catalog state (databases, tables, foreign keys, version rows) to
//! answer the introspection and version-table queries issued by this crate.
//! [`FixedIntrospector`] answers existence checks from fixed sets.

use crate::executor::{Executor, ExecutorError, SqlValue};
use crate::migration::introspect::{
    SchemaIntrospector, CONSTRAINT_EXISTS_SQL, DATABASE_EXISTS_SQL, TABLE_EXISTS_SQL,
};
use crate::migration::VersionRecord;
use std::cell::RefCell;
use std::collections::BTreeSet;

/// Executor that records statements instead of sending them anywhere
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    executed: RefCell<Vec<String>>,
    databases: RefCell<BTreeSet<String>>,
    tables: RefCell<BTreeSet<String>>,
    constraints: RefCell<BTreeSet<String>>,
    versions: RefCell<Vec<VersionRecord>>,
    failing_statement: Option<(String, String)>,
    failing_queries: Option<String>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(self, name: &str) -> Self {
        self.databases.borrow_mut().insert(name.to_string());
        self
    }

    pub fn with_table(self, name: &str) -> Self {
        self.tables.borrow_mut().insert(name.to_string());
        self
    }

    pub fn with_constraint(self, name: &str) -> Self {
        self.constraints.borrow_mut().insert(name.to_string());
        self
    }

    pub fn with_version(self, version: &str, created: i64) -> Self {
        self.versions.borrow_mut().push(VersionRecord {
            version: version.to_string(),
            created,
        });
        self
    }

    /// Fail any statement containing `pattern` with `message`
    pub fn failing_statement(mut self, pattern: &str, message: &str) -> Self {
        self.failing_statement = Some((pattern.to_string(), message.to_string()));
        self
    }

    /// Fail every query with `message`
    pub fn failing_queries(mut self, message: &str) -> Self {
        self.failing_queries = Some(message.to_string());
        self
    }

    /// Statements that were executed successfully, in order
    pub fn executed(&self) -> Vec<String> {
        self.executed.borrow().clone()
    }

    /// Version rows written so far
    pub fn versions(&self) -> Vec<VersionRecord> {
        self.versions.borrow().clone()
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.borrow().contains(name)
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.databases.borrow().contains(name)
    }

    pub fn has_constraint(&self, name: &str) -> bool {
        self.constraints.borrow().contains(name)
    }

    fn track_catalog(&self, sql: &str, params: &[SqlValue<'_>]) {
        let words: Vec<&str> = sql.split_whitespace().collect();
        let name_at = |i: usize| {
            words.get(i).map(|w| {
                w.trim_matches('`')
                    .split('(')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            })
        };

        match words.as_slice() {
            ["CREATE", "DATABASE", ..] => {
                if let Some(name) = name_at(2) {
                    self.databases.borrow_mut().insert(name);
                }
            }
            ["CREATE", "TABLE", ..] => {
                if let Some(name) = name_at(2) {
                    self.tables.borrow_mut().insert(name);
                }
            }
            ["DROP", "TABLE", ..] => {
                if let Some(name) = name_at(2) {
                    self.tables.borrow_mut().remove(&name);
                }
            }
            ["ALTER", "TABLE", _, "ADD", "CONSTRAINT", ..] => {
                if let Some(name) = name_at(5) {
                    self.constraints.borrow_mut().insert(name);
                }
            }
            ["ALTER", "TABLE", _, "DROP", "FOREIGN", "KEY", ..] => {
                if let Some(name) = name_at(6) {
                    self.constraints.borrow_mut().remove(&name);
                }
            }
            ["INSERT", "INTO", _, "(version,", "created)", ..] => {
                if let [SqlValue::Text(version), SqlValue::BigInt(created)] = params {
                    self.versions.borrow_mut().push(VersionRecord {
                        version: version.to_string(),
                        created: *created,
                    });
                }
            }
            _ => {}
        }
    }
}

fn matching(set: &RefCell<BTreeSet<String>>, params: &[SqlValue<'_>]) -> Vec<String> {
    match params {
        [SqlValue::Text(name)] if set.borrow().contains(*name) => vec![name.to_string()],
        _ => Vec::new(),
    }
}

impl Executor for RecordingExecutor {
    fn execute(&self, sql: &str, params: &[SqlValue<'_>]) -> Result<u64, ExecutorError> {
        if let Some((pattern, message)) = &self.failing_statement {
            if sql.contains(pattern.as_str()) {
                return Err(ExecutorError::new(message.clone()));
            }
        }
        self.executed.borrow_mut().push(sql.to_string());
        self.track_catalog(sql, params);
        Ok(0)
    }

    fn query_column(&self, sql: &str, params: &[SqlValue<'_>]) -> Result<Vec<String>, ExecutorError> {
        if let Some(message) = &self.failing_queries {
            return Err(ExecutorError::new(message.clone()));
        }
        if sql == DATABASE_EXISTS_SQL {
            Ok(matching(&self.databases, params))
        } else if sql == TABLE_EXISTS_SQL {
            Ok(matching(&self.tables, params))
        } else if sql == CONSTRAINT_EXISTS_SQL {
            Ok(matching(&self.constraints, params))
        } else if let Some(table) = sql.strip_prefix("SELECT version FROM ") {
            if !self.tables.borrow().contains(table.trim()) {
                return Err(ExecutorError {
                    message: format!("Table '{}' doesn't exist", table.trim()),
                    code: Some(1146),
                    state: Some("42S02".to_string()),
                });
            }
            Ok(self.versions.borrow().iter().map(|r| r.version.clone()).collect())
        } else {
            Err(ExecutorError::new(format!("unexpected query: {}", sql)))
        }
    }
}

/// Introspector answering from fixed sets
#[derive(Debug, Default)]
pub struct FixedIntrospector {
    pub databases: BTreeSet<String>,
    pub tables: BTreeSet<String>,
    pub constraints: BTreeSet<String>,
}

impl FixedIntrospector {
    pub fn with_constraints(names: &[&str]) -> Self {
        Self {
            constraints: names.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }
}

impl SchemaIntrospector for FixedIntrospector {
    fn database_exists(&self, name: &str) -> Result<bool, ExecutorError> {
        Ok(self.databases.contains(name))
    }

    fn table_exists(&self, name: &str) -> Result<bool, ExecutorError> {
        Ok(self.tables.contains(name))
    }

    fn constraint_exists(&self, name: &str) -> Result<bool, ExecutorError> {
        Ok(self.constraints.contains(name))
    }
}
