//! # Driftwood
//!
//! Declarative schema migrations for MySQL: describe changes as commands,
//! get deterministic SQL, apply it in order and record the version.
//!
//! See the [`migration`] module for the command format and the `Migrator`
//! contract.

pub mod config;
pub mod connection;
pub mod executor;
pub mod migration;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use config::{DatabaseConfig, MigratorConfig};
pub use connection::{connect, ConnectionError};
pub use executor::{Executor, ExecutorError, MysqlExecutor, SqlValue};
pub use migration::{Command, MigrationError, Migrator, MysqlMigrator};
