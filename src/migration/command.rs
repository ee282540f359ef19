//! Migration commands
//!
//! A command is one backend-agnostic schema change. Migration files describe
//! commands as maps keyed by their kind, for example:
//!
//! ```json
//! {"create-table": "users",
//!  "columns": [["id", "INT", "NOT NULL"], ["email", "VARCHAR(255)"]],
//!  "primary-key": ["id"]}
//! ```
//!
//! [`Command::from_map`] turns one such map into the closed [`Command`] enum.
//! The kind is the first key present from [`COMMAND_KINDS`]; a map with none of
//! them is an [`MigrationError::UnsupportedCommand`].

use crate::migration::MigrationError;
use serde_json::{Map, Value};

/// Supported command kinds, in detection order
pub const COMMAND_KINDS: [&str; 6] = [
    "create-table",
    "drop-table",
    "alter-table",
    "create-index",
    "drop-index",
    "insert-into",
];

/// Column declaration: name followed by verbatim type and modifier text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub definition: Vec<String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, definition: &[&str]) -> Self {
        Self {
            name: name.into(),
            definition: definition.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// `name TYPE MODIFIERS...`
    pub fn to_sql(&self) -> String {
        join_spec(&self.name, &self.definition)
    }
}

/// Named foreign-key constraint: name followed by verbatim definition text
///
/// The definition follows the `FOREIGN KEY` keywords, e.g.
/// `["fk_orders_user", "(user_id)", "REFERENCES users(id)"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintSpec {
    pub name: String,
    pub definition: Vec<String>,
}

impl ConstraintSpec {
    pub fn new(name: impl Into<String>, definition: &[&str]) -> Self {
        Self {
            name: name.into(),
            definition: definition.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Definition text joined by single spaces
    pub fn definition_sql(&self) -> String {
        self.definition.join(" ")
    }
}

fn join_spec(name: &str, parts: &[String]) -> String {
    if parts.is_empty() {
        name.to_string()
    } else {
        format!("{} {}", name, parts.join(" "))
    }
}

/// Body of an `alter-table` command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlterTable {
    pub table: String,
    pub add_columns: Vec<ColumnSpec>,
    pub drop_columns: Vec<String>,
    pub modify_columns: Vec<ColumnSpec>,
    pub add_constraints: Vec<ConstraintSpec>,
    pub drop_constraints: Vec<String>,
}

/// One schema change
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateTable {
        table: String,
        columns: Vec<ColumnSpec>,
        primary_key: Vec<String>,
        constraints: Vec<ConstraintSpec>,
    },
    DropTable {
        table: String,
    },
    AlterTable(AlterTable),
    CreateIndex {
        name: String,
        table: String,
        columns: Vec<String>,
        unique: bool,
    },
    DropIndex {
        name: String,
        table: String,
    },
    InsertInto {
        table: String,
        rows: Vec<Vec<Value>>,
    },
}

impl Command {
    /// Kind tag as it appears in migration files
    pub fn kind(&self) -> &'static str {
        match self {
            Command::CreateTable { .. } => "create-table",
            Command::DropTable { .. } => "drop-table",
            Command::AlterTable(_) => "alter-table",
            Command::CreateIndex { .. } => "create-index",
            Command::DropIndex { .. } => "drop-index",
            Command::InsertInto { .. } => "insert-into",
        }
    }

    /// Parse one command map
    ///
    /// # Errors
    ///
    /// - `UnsupportedCommand` if no known kind key is present
    /// - `Validation` if a required key is missing, a value has the wrong
    ///   shape, or a key does not belong to the detected kind
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, MigrationError> {
        let kind = COMMAND_KINDS
            .iter()
            .copied()
            .find(|k| map.contains_key(*k))
            .ok_or_else(|| MigrationError::UnsupportedCommand {
                kind: map.keys().next().cloned().unwrap_or_else(|| "{}".to_string()),
            })?;

        let fields = Fields { kind, map };

        match kind {
            "create-table" => {
                fields.allow_only(&["columns", "primary-key", "constraints"])?;
                Ok(Command::CreateTable {
                    table: fields.name(kind)?,
                    columns: fields.columns("columns", true)?,
                    primary_key: fields.primary_key()?,
                    constraints: fields.constraints("constraints")?,
                })
            }
            "drop-table" => {
                fields.allow_only(&[])?;
                Ok(Command::DropTable {
                    table: fields.name(kind)?,
                })
            }
            "alter-table" => {
                fields.allow_only(&[
                    "add-columns",
                    "drop-columns",
                    "modify-columns",
                    "add-constraints",
                    "drop-constraints",
                ])?;
                Ok(Command::AlterTable(AlterTable {
                    table: fields.name(kind)?,
                    add_columns: fields.columns("add-columns", false)?,
                    drop_columns: fields.names("drop-columns", false)?,
                    modify_columns: fields.columns("modify-columns", false)?,
                    add_constraints: fields.constraints("add-constraints")?,
                    drop_constraints: fields.names("drop-constraints", false)?,
                }))
            }
            "create-index" => {
                fields.allow_only(&["on", "columns", "unique"])?;
                Ok(Command::CreateIndex {
                    name: fields.name(kind)?,
                    table: fields.name("on")?,
                    columns: fields.non_empty_names("columns")?,
                    unique: fields.flag("unique")?,
                })
            }
            "drop-index" => {
                fields.allow_only(&["on"])?;
                Ok(Command::DropIndex {
                    name: fields.name(kind)?,
                    table: fields.name("on")?,
                })
            }
            "insert-into" => {
                fields.allow_only(&["values"])?;
                Ok(Command::InsertInto {
                    table: fields.name(kind)?,
                    rows: fields.rows()?,
                })
            }
            _ => Err(MigrationError::UnsupportedCommand {
                kind: kind.to_string(),
            }),
        }
    }
}

/// Field accessors for one command map, with errors naming the command kind
struct Fields<'a> {
    kind: &'static str,
    map: &'a Map<String, Value>,
}

impl Fields<'_> {
    fn invalid(&self, msg: String) -> MigrationError {
        MigrationError::Validation(format!("{}: {}", self.kind, msg))
    }

    fn allow_only(&self, keys: &[&str]) -> Result<(), MigrationError> {
        for key in self.map.keys() {
            if key != self.kind && !keys.contains(&key.as_str()) {
                return Err(self.invalid(format!("unexpected key '{}'", key)));
            }
        }
        Ok(())
    }

    fn required(&self, key: &str) -> Result<&Value, MigrationError> {
        self.map
            .get(key)
            .ok_or_else(|| self.invalid(format!("missing required key '{}'", key)))
    }

    fn name(&self, key: &str) -> Result<String, MigrationError> {
        match self.required(key)? {
            Value::String(s) if !s.trim().is_empty() => Ok(s.clone()),
            other => Err(self.invalid(format!("'{}' must be a non-empty name, got {}", key, other))),
        }
    }

    /// Array of names; absent is empty unless `required`
    fn names(&self, key: &str, required: bool) -> Result<Vec<String>, MigrationError> {
        let items = match self.array(key, required)? {
            Some(items) => items,
            None => return Ok(Vec::new()),
        };
        items
            .iter()
            .map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Ok(s.clone()),
                other => Err(self.invalid(format!("'{}' entries must be names, got {}", key, other))),
            })
            .collect()
    }

    /// Required array of at least one name
    fn non_empty_names(&self, key: &str) -> Result<Vec<String>, MigrationError> {
        let names = self.names(key, true)?;
        if names.is_empty() {
            return Err(self.invalid(format!("'{}' must name at least one column", key)));
        }
        Ok(names)
    }

    fn array(&self, key: &str, required: bool) -> Result<Option<&Vec<Value>>, MigrationError> {
        match self.map.get(key) {
            None | Some(Value::Null) if !required => Ok(None),
            None | Some(Value::Null) => Err(self.invalid(format!("missing required key '{}'", key))),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(other) => Err(self.invalid(format!("'{}' must be an array, got {}", key, other))),
        }
    }

    /// `[name, text...]` entries
    fn specs(&self, key: &str, required: bool) -> Result<Vec<(String, Vec<String>)>, MigrationError> {
        let items = match self.array(key, required)? {
            Some(items) => items,
            None => return Ok(Vec::new()),
        };
        items
            .iter()
            .map(|item| {
                let parts = match item {
                    Value::Array(parts) if !parts.is_empty() => parts,
                    other => {
                        return Err(self.invalid(format!(
                            "'{}' entries must be non-empty arrays of [name, definition...], got {}",
                            key, other
                        )))
                    }
                };
                let name = match &parts[0] {
                    Value::String(s) if !s.trim().is_empty() => s.clone(),
                    other => return Err(self.invalid(format!("'{}' entry name must be a name, got {}", key, other))),
                };
                let definition = parts[1..]
                    .iter()
                    .map(|part| match part {
                        Value::String(s) => Ok(s.clone()),
                        Value::Number(n) => Ok(n.to_string()),
                        other => Err(self.invalid(format!(
                            "'{}' definition for '{}' must be text, got {}",
                            key, name, other
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((name, definition))
            })
            .collect()
    }

    fn columns(&self, key: &str, required: bool) -> Result<Vec<ColumnSpec>, MigrationError> {
        let columns: Vec<ColumnSpec> = self
            .specs(key, required)?
            .into_iter()
            .map(|(name, definition)| ColumnSpec { name, definition })
            .collect();
        if required && columns.is_empty() {
            return Err(self.invalid(format!("'{}' must declare at least one column", key)));
        }
        Ok(columns)
    }

    fn constraints(&self, key: &str) -> Result<Vec<ConstraintSpec>, MigrationError> {
        self.specs(key, false)?
            .into_iter()
            .map(|(name, definition)| {
                if definition.is_empty() {
                    Err(self.invalid(format!("constraint '{}' has no definition", name)))
                } else {
                    Ok(ConstraintSpec { name, definition })
                }
            })
            .collect()
    }

    fn primary_key(&self) -> Result<Vec<String>, MigrationError> {
        match self.map.get("primary-key") {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(vec![s.clone()]),
            Some(Value::String(_)) => Err(self.invalid("'primary-key' must not be empty".to_string())),
            _ => self.names("primary-key", false),
        }
    }

    fn flag(&self, key: &str) -> Result<bool, MigrationError> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(self.invalid(format!("'{}' must be true or false, got {}", key, other))),
        }
    }

    fn rows(&self) -> Result<Vec<Vec<Value>>, MigrationError> {
        let rows = self.array("values", true)?.map(Vec::as_slice).unwrap_or_default();
        if rows.is_empty() {
            return Err(self.invalid("'values' must hold at least one row".to_string()));
        }
        rows.iter()
            .enumerate()
            .map(|(i, row)| match row {
                Value::Array(values) if !values.is_empty() => Ok(values.clone()),
                other => Err(self.invalid(format!("row {} must be a non-empty array, got {}", i + 1, other))),
            })
            .collect()
    }
}
