//! Connection Module
//!
//! Provides connection establishment for MySQL.
//!
//! This module turns a [`DatabaseConfig`] connection descriptor into a blocking
//! `mysql::Conn`:
//! - Descriptor validation
//! - Connection establishment, with or without selecting the target database
//! - Error handling

use crate::config::DatabaseConfig;
use crate::executor::MysqlExecutor;
use mysql::{Conn, Opts, OptsBuilder};
use std::time::Instant;

/// Connection error type
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Invalid connection descriptor
    #[error("Invalid connection descriptor: {0}")]
    InvalidDescriptor(String),
    /// Network/authentication error from the MySQL driver
    #[error("MySQL error: {0}")]
    MySqlError(#[from] mysql::Error),
}

/// Validates a connection descriptor
///
/// # Returns
///
/// Returns `Ok(())` if the descriptor has a host, a user and a database name.
pub fn validate_descriptor(config: &DatabaseConfig) -> Result<(), ConnectionError> {
    if config.host.trim().is_empty() {
        return Err(ConnectionError::InvalidDescriptor(
            "host cannot be empty".to_string(),
        ));
    }
    if config.user.trim().is_empty() {
        return Err(ConnectionError::InvalidDescriptor(
            "user cannot be empty".to_string(),
        ));
    }
    if config.database.trim().is_empty() {
        return Err(ConnectionError::InvalidDescriptor(
            "database cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Build driver options from a connection descriptor
///
/// When `with_database` is false no schema is selected, which is what `init`
/// needs before the target database exists.
pub fn connect_options(config: &DatabaseConfig, with_database: bool) -> Opts {
    let password = if config.password.is_empty() {
        None
    } else {
        Some(config.password.clone())
    };
    let database = with_database.then(|| config.database.clone());

    OptsBuilder::new()
        .ip_or_hostname(Some(config.host.clone()))
        .tcp_port(config.port)
        .user(Some(config.user.clone()))
        .pass(password)
        .db_name(database)
        .into()
}

/// Establishes a connection to MySQL
///
/// # Arguments
///
/// * `config` - Connection descriptor
/// * `with_database` - Select `config.database` as the default schema
///
/// # Notes
///
/// This is a blocking call. The connection lives as long as the returned
/// executor.
pub fn connect(config: &DatabaseConfig, with_database: bool) -> Result<MysqlExecutor, ConnectionError> {
    let start = Instant::now();

    validate_descriptor(config)?;

    let conn = Conn::new(connect_options(config, with_database))?;

    log::debug!(
        "connected to {}:{} in {:?}",
        config.host,
        config.port,
        start.elapsed()
    );

    Ok(MysqlExecutor::new(conn))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> DatabaseConfig {
        DatabaseConfig {
            host: "db.internal".to_string(),
            port: 3307,
            user: "deploy".to_string(),
            password: "secret".to_string(),
            database: "inventory".to_string(),
        }
    }

    #[test]
    fn test_validate_descriptor_valid() {
        assert!(validate_descriptor(&descriptor()).is_ok());
        assert!(validate_descriptor(&DatabaseConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_descriptor_invalid() {
        let mut no_host = descriptor();
        no_host.host = " ".to_string();
        let mut no_user = descriptor();
        no_user.user = String::new();
        let mut no_db = descriptor();
        no_db.database = String::new();

        for config in [no_host, no_user, no_db] {
            assert!(validate_descriptor(&config).is_err(), "Should reject: {:?}", config);
        }
    }

    #[test]
    fn test_connect_options() {
        let opts = connect_options(&descriptor(), true);
        assert_eq!(opts.get_ip_or_hostname(), "db.internal");
        assert_eq!(opts.get_tcp_port(), 3307);
        assert_eq!(opts.get_user(), Some("deploy"));
        assert_eq!(opts.get_pass(), Some("secret"));
        assert_eq!(opts.get_db_name(), Some("inventory"));

        let server_only = connect_options(&descriptor(), false);
        assert_eq!(server_only.get_db_name(), None);
    }

    #[test]
    fn test_connection_error_display() {
        let err = ConnectionError::InvalidDescriptor("test".to_string());
        assert!(err.to_string().contains("Invalid connection descriptor"));
    }
}
