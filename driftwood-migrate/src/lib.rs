//! Driftwood Migration Library
//!
//! Discovers and parses migration files for the `driftwood-migrate` CLI.
//! The CLI tool (main.rs) uses this library.

pub mod file;

pub use file::{
    create_migration_file, discover_migrations, pending_migrations, toml_to_json, DiscoveryError,
    MigrationFile,
};
