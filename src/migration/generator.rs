//! SQL generator for migration commands (MySQL dialect).
//!
//! Maps each [`Command`] to zero or more statements. Statement shapes,
//! keyword casing and clause order are fixed: migration history written
//! against earlier releases must replay to the same SQL.
//!
//! Constraint mutations inside `alter-table` are idempotent: an add is only
//! emitted when the named constraint is absent, a drop only when it is present.
//! Skipped mutations are recorded as [`ConstraintSkip`] events.

use crate::executor::ExecutorError;
use crate::migration::introspect::{constraint_exists, SchemaIntrospector};
use crate::migration::{AlterTable, ColumnSpec, Command, ConstraintSpec};
use serde_json::Value;

/// Why a constraint mutation produced no SQL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Add requested, a constraint with the same name already exists
    AlreadyPresent,
    /// Drop requested, no constraint with that name exists
    NotPresent,
}

/// A constraint mutation that was not emitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintSkip {
    pub table: String,
    pub constraint: String,
    pub reason: SkipReason,
    /// Requested definition for skipped adds; the existing definition is not compared
    pub definition: Option<String>,
}

/// Compiles commands to SQL, consulting an optional introspector
pub struct SqlGenerator<'a> {
    introspector: Option<&'a dyn SchemaIntrospector>,
    skipped: Vec<ConstraintSkip>,
}

impl<'a> SqlGenerator<'a> {
    /// Create a generator
    ///
    /// Without an introspector every constraint is treated as absent.
    pub fn new(introspector: Option<&'a dyn SchemaIntrospector>) -> Self {
        Self {
            introspector,
            skipped: Vec::new(),
        }
    }

    /// Constraint mutations skipped so far
    pub fn skipped(&self) -> &[ConstraintSkip] {
        &self.skipped
    }

    pub fn into_skipped(self) -> Vec<ConstraintSkip> {
        self.skipped
    }

    /// Generate the statements for one command
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError` if a constraint lookup fails.
    pub fn generate(&mut self, command: &Command) -> Result<Vec<String>, ExecutorError> {
        match command {
            Command::CreateTable {
                table,
                columns,
                primary_key,
                constraints,
            } => Ok(vec![create_table(table, columns, primary_key, constraints)]),
            Command::DropTable { table } => Ok(vec![format!("DROP TABLE {}", table)]),
            Command::AlterTable(alter) => self.alter_table(alter),
            Command::CreateIndex {
                name,
                table,
                columns,
                unique,
            } => Ok(vec![format!(
                "CREATE {}INDEX {} ON {} ({})",
                if *unique { "UNIQUE " } else { "" },
                name,
                table,
                columns.join(", ")
            )]),
            Command::DropIndex { name, table } => Ok(vec![format!("DROP INDEX {} ON {}", name, table)]),
            Command::InsertInto { table, rows } => Ok(vec![insert_into(table, rows)]),
        }
    }

    /// Drop constraints, drop columns, add columns, modify columns, add constraints
    ///
    /// Constraints referencing dropped columns go first; constraints
    /// referencing added columns go last.
    fn alter_table(&mut self, alter: &AlterTable) -> Result<Vec<String>, ExecutorError> {
        let table = &alter.table;
        let mut statements = Vec::new();

        for name in &alter.drop_constraints {
            if constraint_exists(self.introspector, name)? {
                statements.push(format!("ALTER TABLE {} DROP FOREIGN KEY {}", table, name));
            } else {
                log::warn!(
                    "skipping drop of constraint {} on {}: not present",
                    name,
                    table
                );
                self.skipped.push(ConstraintSkip {
                    table: table.clone(),
                    constraint: name.clone(),
                    reason: SkipReason::NotPresent,
                    definition: None,
                });
            }
        }

        statements.extend(
            alter
                .drop_columns
                .iter()
                .map(|column| format!("ALTER TABLE {} DROP COLUMN {}", table, column)),
        );
        statements.extend(
            alter
                .add_columns
                .iter()
                .map(|column| format!("ALTER TABLE {} ADD COLUMN {}", table, column.to_sql())),
        );
        statements.extend(
            alter
                .modify_columns
                .iter()
                .map(|column| format!("ALTER TABLE {} MODIFY COLUMN {}", table, column.to_sql())),
        );

        for constraint in &alter.add_constraints {
            if constraint_exists(self.introspector, &constraint.name)? {
                log::warn!(
                    "skipping add of constraint {} on {}: already present",
                    constraint.name,
                    table
                );
                self.skipped.push(ConstraintSkip {
                    table: table.clone(),
                    constraint: constraint.name.clone(),
                    reason: SkipReason::AlreadyPresent,
                    definition: Some(constraint.definition_sql()),
                });
            } else {
                statements.push(format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY {}",
                    table,
                    constraint.name,
                    constraint.definition_sql()
                ));
            }
        }

        Ok(statements)
    }
}

fn create_table(
    table: &str,
    columns: &[ColumnSpec],
    primary_key: &[String],
    constraints: &[ConstraintSpec],
) -> String {
    let mut clauses: Vec<String> = columns.iter().map(ColumnSpec::to_sql).collect();
    if !primary_key.is_empty() {
        clauses.push(format!("PRIMARY KEY ({})", primary_key.join(", ")));
    }
    clauses.extend(constraints.iter().map(|c| {
        format!("CONSTRAINT {} FOREIGN KEY {}", c.name, c.definition_sql())
    }));
    format!("CREATE TABLE {} ({})", table, clauses.join(", "))
}

fn insert_into(table: &str, rows: &[Vec<Value>]) -> String {
    let rows: Vec<String> = rows
        .iter()
        .map(|row| {
            let values: Vec<String> = row.iter().map(render_literal).collect();
            format!("({})", values.join(","))
        })
        .collect();
    format!("INSERT INTO {} VALUES {}", table, rows.join(","))
}

/// Render a value as a MySQL literal
///
/// Strings are double-quoted with backslash escapes, numbers are bare,
/// booleans are `TRUE`/`FALSE`, null is `NULL`. Arrays and maps are stored as
/// their JSON text.
pub fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote_string(s),
        Value::Array(_) | Value::Object(_) => quote_string(&value.to_string()),
    }
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            '\u{1a}' => out.push_str("\\Z"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
