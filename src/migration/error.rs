//! Migration-specific error types

use crate::connection::ConnectionError;
use crate::executor::ExecutorError;

/// Server error for `Unknown database`
const ER_BAD_DB_ERROR: u16 = 1049;
/// Server error for `Table doesn't exist`
const ER_NO_SUCH_TABLE: u16 = 1146;

/// Migration-specific errors
///
/// `Validation`, `UnsupportedCommand` and `InvalidVersion` are raised before
/// any generated statement reaches the backend. `Execution` is raised after
/// partial application: statements before `index` were applied and are not
/// undone.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Malformed command set or command fields
    #[error("Invalid command set: {0}")]
    Validation(String),

    /// Command kind outside the supported set
    #[error("Unsupported command '{kind}': expected one of create-table, drop-table, alter-table, create-index, drop-index, insert-into")]
    UnsupportedCommand { kind: String },

    /// Version string that cannot be recorded
    #[error("Invalid migration version '{0}': must be 1 to 14 characters")]
    InvalidVersion(String),

    /// A generated statement failed at the backend
    #[error(
        "Migration {version} failed at statement {index} of {total}: {message}\n\
         Statement: {statement}\n\
         {applied} statement(s) were applied before the failure and were not rolled back",
        applied = .index.saturating_sub(1)
    )]
    Execution {
        version: String,
        index: usize,
        total: usize,
        statement: String,
        message: String,
    },

    /// Catalog lookup or version table I/O failed
    #[error("Database error: {0}")]
    Backend(#[from] ExecutorError),

    /// Connection could not be established
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}

impl MigrationError {
    /// True when the error was raised before any statement touched the backend
    pub fn is_pre_execution(&self) -> bool {
        matches!(
            self,
            MigrationError::Validation(_)
                | MigrationError::UnsupportedCommand { .. }
                | MigrationError::InvalidVersion(_)
        )
    }

    /// True when the server reported that the target database does not exist
    pub fn is_unknown_database(&self) -> bool {
        self.server_code() == Some(ER_BAD_DB_ERROR)
    }

    /// True when the server reported a missing table, e.g. the version table
    /// before `init`
    pub fn is_missing_table(&self) -> bool {
        self.server_code() == Some(ER_NO_SUCH_TABLE)
    }

    fn server_code(&self) -> Option<u16> {
        match self {
            MigrationError::Backend(err) => err.code,
            MigrationError::Connection(ConnectionError::MySqlError(mysql::Error::MySqlError(err))) => {
                Some(err.code)
            }
            _ => None,
        }
    }

    /// Number of statements applied before an `Execution` failure
    pub fn applied_statements(&self) -> Option<usize> {
        match self {
            MigrationError::Execution { index, .. } => Some(index.saturating_sub(1)),
            _ => None,
        }
    }
}

/// Strip a leading severity prefix from a backend error message
pub fn clean_message(message: &str) -> String {
    let trimmed = message.trim();
    for prefix in ["FATAL: ", "ERROR: "] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    trimmed.to_string()
}
