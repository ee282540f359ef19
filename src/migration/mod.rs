//! Migration system for Driftwood
//!
//! This module compiles declarative migration commands into MySQL statements
//! and applies them:
//! - Command model and command-set validation
//! - SQL generation, with idempotent foreign-key mutations
//! - Schema introspection
//! - Version table bookkeeping
//! - Migration execution and the `Migrator` facade
//!
//! # Example
//!
//! ```rust,no_run
//! use driftwood::config::MigratorConfig;
//! use driftwood::migration::{Migrator, MysqlMigrator};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let migrator = MysqlMigrator::new(MigratorConfig::load()?);
//! migrator.init()?;
//!
//! if migrator.version()?.as_str() < "20240120120000" {
//!     migrator.migrate(
//!         "20240120120000",
//!         &json!([
//!             {"create-table": "users",
//!              "columns": [["id", "INT", "NOT NULL", "AUTO_INCREMENT"], ["email", "VARCHAR(255)"]],
//!              "primary-key": ["id"]},
//!             {"create-index": "idx_users_email", "on": "users", "columns": ["email"], "unique": true}
//!         ]),
//!     )?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod error;
pub mod generator;
pub mod introspect;
pub mod migrator;
pub mod record;
pub mod runner;
pub mod validate;
pub mod version_table;

pub use command::{AlterTable, ColumnSpec, Command, ConstraintSpec, COMMAND_KINDS};
pub use error::MigrationError;
pub use generator::{ConstraintSkip, SkipReason, SqlGenerator};
pub use introspect::{MysqlIntrospector, SchemaIntrospector};
pub use migrator::{Migrator, MysqlMigrator};
pub use record::{VersionRecord, ZERO_VERSION};
pub use runner::{MigrationReport, Plan};
pub use validate::validate;
