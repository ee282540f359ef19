//! Migration file discovery and parsing
//!
//! Migration files live in one directory and are named
//! `{YYYYMMDDHHMMSS}_{name}.toml`. Each holds `up` and `down` commands:
//!
//! ```toml
//! [[up]]
//! create-table = "users"
//! columns = [["id", "INT", "NOT NULL"], ["email", "VARCHAR(255)"]]
//! primary-key = ["id"]
//!
//! [[down]]
//! drop-table = "users"
//! ```

use chrono::{DateTime, Utc};
use driftwood::migration::{validate, MigrationError};
use regex::Regex;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const FILE_PATTERN: &str = r"^(\d{14})_([A-Za-z0-9_]+)\.toml$";
const ALLOWED_KEYS: [&str; 3] = ["up", "down", "description"];

/// Errors raised while discovering or reading migration files
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Migrations directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Migration file name '{0}' does not match expected pattern: {{YYYYMMDDHHMMSS}}_{{name}}.toml")]
    InvalidFileName(String),

    #[error("Invalid migration file {}: {message}", .path.display())]
    InvalidFile { path: PathBuf, message: String },

    #[error("Duplicate migration version {version}: {} and {}", .first.display(), .second.display())]
    DuplicateVersion {
        version: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Migration name '{0}' must contain only letters, digits and underscores")]
    InvalidName(String),
}

/// A discovered migration file
#[derive(Debug, Clone)]
pub struct MigrationFile {
    /// Path to the migration file
    pub path: PathBuf,

    /// Migration version (timestamp: YYYYMMDDHHMMSS)
    pub version: String,

    /// Human-readable migration name
    pub name: String,

    /// Optional free-text description
    pub description: Option<String>,

    /// Forward commands
    pub up: Value,

    /// Backward commands
    pub down: Value,
}

impl MigrationFile {
    /// Parse a migration file name into version and name
    ///
    /// # Example
    /// - `20240120120000_create_users_table.toml` → ("20240120120000", "create_users_table")
    pub fn parse_filename(filename: &str) -> Result<(String, String), DiscoveryError> {
        let re = Regex::new(FILE_PATTERN)
            .map_err(|e| DiscoveryError::InvalidFileName(format!("{}: {}", filename, e)))?;

        match re.captures(filename) {
            Some(caps) => Ok((caps[1].to_string(), caps[2].to_string())),
            None => Err(DiscoveryError::InvalidFileName(filename.to_string())),
        }
    }

    /// Read and parse one migration file
    pub fn load(path: &Path) -> Result<Self, DiscoveryError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DiscoveryError::InvalidFileName(path.display().to_string()))?;
        let (version, name) = Self::parse_filename(filename)?;

        let content = fs::read_to_string(path).map_err(|source| DiscoveryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table: toml::Table = content.parse().map_err(|e: toml::de::Error| {
            DiscoveryError::InvalidFile {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;

        if let Some(key) = table.keys().find(|k| !ALLOWED_KEYS.contains(&k.as_str())) {
            return Err(DiscoveryError::InvalidFile {
                path: path.to_path_buf(),
                message: format!("unexpected key '{}', expected up, down or description", key),
            });
        }

        let mut table = table;
        let description = match table.remove("description") {
            None => None,
            Some(toml::Value::String(s)) => Some(s),
            Some(other) => {
                return Err(DiscoveryError::InvalidFile {
                    path: path.to_path_buf(),
                    message: format!("description must be a string, got {}", other),
                })
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            version,
            name,
            description,
            up: table.remove("up").map(toml_to_json).unwrap_or(Value::Null),
            down: table.remove("down").map(toml_to_json).unwrap_or(Value::Null),
        })
    }

    /// Validate the `up` and `down` commands without touching a database
    pub fn check(&self) -> Result<(), MigrationError> {
        validate(&self.up)?;
        validate(&self.down)?;
        Ok(())
    }
}

/// Convert a TOML value into the JSON value type commands are written in
///
/// TOML datetimes become their RFC 3339 text.
pub fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Discover all migration files in a directory
///
/// Files without a `.toml` extension are ignored. Returns the files sorted by
/// version (oldest first).
///
/// # Errors
///
/// Returns errors if:
/// - The directory doesn't exist or can't be read
/// - A `.toml` file has an invalid name or content
/// - Two files share a version
pub fn discover_migrations(migrations_dir: &Path) -> Result<Vec<MigrationFile>, DiscoveryError> {
    if !migrations_dir.is_dir() {
        return Err(DiscoveryError::DirectoryNotFound(migrations_dir.to_path_buf()));
    }

    let entries = fs::read_dir(migrations_dir).map_err(|source| DiscoveryError::Io {
        path: migrations_dir.to_path_buf(),
        source,
    })?;

    let mut migrations = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DiscoveryError::Io {
            path: migrations_dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();

        if path.extension().and_then(|s| s.to_str()) != Some("toml") {
            continue;
        }

        migrations.push(MigrationFile::load(&path)?);
    }

    migrations.sort_by(|a, b| a.version.cmp(&b.version));

    for pair in migrations.windows(2) {
        if pair[0].version == pair[1].version {
            return Err(DiscoveryError::DuplicateVersion {
                version: pair[0].version.clone(),
                first: pair[0].path.clone(),
                second: pair[1].path.clone(),
            });
        }
    }

    Ok(migrations)
}

/// Migrations newer than `current`, up to and including `target` if given
pub fn pending_migrations<'a>(
    migrations: &'a [MigrationFile],
    current: &str,
    target: Option<&str>,
) -> Vec<&'a MigrationFile> {
    migrations
        .iter()
        .filter(|m| m.version.as_str() > current)
        .filter(|m| target.map_or(true, |t| m.version.as_str() <= t))
        .collect()
}

/// Write an empty migration file stamped with `now`
///
/// Refuses to overwrite an existing file.
pub fn create_migration_file(
    migrations_dir: &Path,
    name: &str,
    now: DateTime<Utc>,
) -> Result<PathBuf, DiscoveryError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DiscoveryError::InvalidName(name.to_string()));
    }

    let version = now.format("%Y%m%d%H%M%S").to_string();
    let path = migrations_dir.join(format!("{}_{}.toml", version, name));
    let io_err = |source| DiscoveryError::Io {
        path: path.clone(),
        source,
    };

    fs::create_dir_all(migrations_dir).map_err(|source| DiscoveryError::Io {
        path: migrations_dir.to_path_buf(),
        source,
    })?;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(io_err)?;

    write!(
        file,
        "# {version}_{name}\n\
         #\n\
         # [[up]]\n\
         # create-table = \"example\"\n\
         # columns = [[\"id\", \"INT\", \"NOT NULL\"]]\n\
         # primary-key = [\"id\"]\n\
         #\n\
         # [[down]]\n\
         # drop-table = \"example\"\n"
    )
    .map_err(io_err)?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_filename() {
        assert_eq!(
            MigrationFile::parse_filename("20240120120000_create_users.toml").unwrap(),
            ("20240120120000".to_string(), "create_users".to_string())
        );
        for bad in [
            "2024012012000_short.toml",
            "20240120120000-create_users.toml",
            "20240120120000_create users.toml",
            "m20240120120000_create_users.rs",
        ] {
            assert!(MigrationFile::parse_filename(bad).is_err(), "Should reject: {}", bad);
        }
    }

    #[test]
    fn test_toml_to_json() {
        let table: toml::Table = r#"
            create-table = "users"
            columns = [["id", "INT"], ["ratio", "DECIMAL", 5]]
            flag = true
            when = 2024-01-20T12:00:00Z
        "#
        .parse()
        .unwrap();

        assert_eq!(
            toml_to_json(toml::Value::Table(table)),
            json!({
                "create-table": "users",
                "columns": [["id", "INT"], ["ratio", "DECIMAL", 5]],
                "flag": true,
                "when": "2024-01-20T12:00:00Z"
            })
        );
    }

    fn file(version: &str) -> MigrationFile {
        MigrationFile {
            path: PathBuf::from(format!("{}_m.toml", version)),
            version: version.to_string(),
            name: "m".to_string(),
            description: None,
            up: Value::Null,
            down: Value::Null,
        }
    }

    #[test]
    fn test_pending_migrations() {
        let files = vec![
            file("20230101000000"),
            file("20230201000000"),
            file("20230301000000"),
        ];

        let versions = |pending: Vec<&MigrationFile>| -> Vec<String> {
            pending.iter().map(|m| m.version.clone()).collect()
        };

        assert_eq!(versions(pending_migrations(&files, "0", None)).len(), 3);
        assert_eq!(
            versions(pending_migrations(&files, "20230101000000", None)),
            vec!["20230201000000", "20230301000000"]
        );
        assert_eq!(
            versions(pending_migrations(&files, "0", Some("20230201000000"))),
            vec!["20230101000000", "20230201000000"]
        );
        assert!(pending_migrations(&files, "20230301000000", None).is_empty());
    }
}
