//! Integration tests for the migration system
//!
//! These tests run against a real MySQL server. They are skipped unless
//! `DRIFTWOOD_TEST_HOST` is set; `DRIFTWOOD_TEST_PORT`, `DRIFTWOOD_TEST_USER`
//! and `DRIFTWOOD_TEST_PASSWORD` are optional.
//!
//! Each test works in its own throwaway database and drops it afterwards.
//!
//! Test flow:
//! 1. Initialize a fresh database and version table
//! 2. Apply migrations through the `Migrator`
//! 3. Verify the version table
//! 4. Verify the actual schema through information_schema

use driftwood::config::{DatabaseConfig, MigratorConfig};
use driftwood::migration::{MigrationError, Migrator, MysqlMigrator, SkipReason};
use driftwood::{connect, Executor, SqlValue};
use serde_json::json;
use std::env;

/// Throwaway database, dropped on scope exit
struct TestDatabase {
    migrator: MysqlMigrator,
}

impl TestDatabase {
    fn new(test_name: &str) -> Option<Self> {
        let host = match env::var("DRIFTWOOD_TEST_HOST") {
            Ok(host) => host,
            Err(_) => {
                eprintln!("DRIFTWOOD_TEST_HOST not set, skipping {}", test_name);
                return None;
            }
        };

        let database = DatabaseConfig {
            host,
            port: env::var("DRIFTWOOD_TEST_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3306),
            user: env::var("DRIFTWOOD_TEST_USER").unwrap_or_else(|_| "root".to_string()),
            password: env::var("DRIFTWOOD_TEST_PASSWORD").unwrap_or_default(),
            database: format!(
                "driftwood_it_{}_{}",
                test_name,
                chrono::Utc::now().timestamp_millis()
            ),
        };

        Some(Self {
            migrator: MysqlMigrator::new(MigratorConfig::new(database)),
        })
    }

    fn executor(&self) -> driftwood::MysqlExecutor {
        connect(&self.migrator.config().database, true).expect("connect to test database")
    }

    fn exists(&self, sql: &str, name: &str) -> bool {
        !self
            .executor()
            .query_column(sql, &[SqlValue::Text(name)])
            .expect("catalog query")
            .is_empty()
    }

    fn table_exists(&self, table: &str) -> bool {
        self.exists(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_name = ?",
            table,
        )
    }

    fn index_exists(&self, index: &str) -> bool {
        self.exists(
            "SELECT index_name FROM information_schema.statistics \
             WHERE table_schema = DATABASE() AND index_name = ?",
            index,
        )
    }

    fn columns(&self, table: &str) -> Vec<String> {
        self.executor()
            .query_column(
                "SELECT column_name FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND table_name = ? ORDER BY ordinal_position",
                &[SqlValue::Text(table)],
            )
            .expect("column query")
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        let config = &self.migrator.config().database;
        if let Ok(executor) = connect(config, false) {
            let _ = executor.execute(&format!("DROP DATABASE IF EXISTS `{}`", config.database), &[]);
        }
    }
}

#[test]
fn test_migration_lifecycle() {
    let Some(db) = TestDatabase::new("lifecycle") else {
        return;
    };
    let migrator = &db.migrator;

    migrator.init().expect("init");
    // init is idempotent
    migrator.init().expect("second init");
    assert_eq!(migrator.version().unwrap(), "0");

    migrator
        .migrate(
            "20230101000000",
            &json!([
                {"create-table": "users",
                 "columns": [["id", "INT", "NOT NULL"], ["email", "VARCHAR(255)"]],
                 "primary-key": ["id"]},
                {"create-index": "idx_users_email", "on": "users", "columns": ["email"], "unique": true},
                {"insert-into": "users", "values": [[1, "a@example.com"], [2, null]]}
            ]),
        )
        .expect("first migration");

    assert!(db.table_exists("users"));
    assert!(db.index_exists("idx_users_email"));
    assert_eq!(db.columns("users"), vec!["id", "email"]);
    assert_eq!(migrator.version().unwrap(), "20230101000000");

    migrator
        .migrate(
            "20230201000000",
            &json!({"alter-table": "users", "add-columns": [["name", "VARCHAR(64)"]], "drop-columns": ["email"]}),
        )
        .expect("second migration");

    assert_eq!(db.columns("users"), vec!["id", "name"]);
    assert_eq!(migrator.version().unwrap(), "20230201000000");
}

#[test]
fn test_foreign_key_changes_are_idempotent() {
    let Some(db) = TestDatabase::new("fk") else {
        return;
    };
    let migrator = &db.migrator;
    migrator.init().unwrap();

    migrator
        .migrate(
            "20230101000000",
            &json!([
                {"create-table": "users", "columns": [["id", "INT", "NOT NULL"]], "primary-key": ["id"]},
                {"create-table": "orders", "columns": [["id", "INT", "NOT NULL"], ["user_id", "INT"]], "primary-key": ["id"]}
            ]),
        )
        .unwrap();

    let add_fk = json!({
        "alter-table": "orders",
        "add-constraints": [["fk_orders_user", "(user_id)", "REFERENCES users(id)"]]
    });

    let first = migrator.migrate("20230102000000", &add_fk).unwrap();
    assert_eq!(first.statements.len(), 1);

    let second = migrator.migrate("20230103000000", &add_fk).unwrap();
    assert!(second.statements.is_empty());
    assert_eq!(second.skipped[0].reason, SkipReason::AlreadyPresent);

    let drop_fk = json!({"alter-table": "orders", "drop-constraints": ["fk_orders_user"]});
    assert_eq!(migrator.migrate("20230104000000", &drop_fk).unwrap().statements.len(), 1);

    let again = migrator.migrate("20230105000000", &drop_fk).unwrap();
    assert!(again.statements.is_empty());
    assert_eq!(again.skipped[0].reason, SkipReason::NotPresent);
}

#[test]
fn test_failed_statement_stops_migration() {
    let Some(db) = TestDatabase::new("failure") else {
        return;
    };
    let migrator = &db.migrator;
    migrator.init().unwrap();

    let err = migrator
        .migrate(
            "20230101000000",
            &json!([
                {"create-table": "t1", "columns": [["id", "INT"]]},
                {"create-table": "t1", "columns": [["id", "INT"]]},
                {"create-table": "t2", "columns": [["id", "INT"]]}
            ]),
        )
        .unwrap_err();

    match &err {
        MigrationError::Execution { index, total, .. } => {
            assert_eq!(*index, 2);
            assert_eq!(*total, 3);
        }
        other => panic!("expected Execution error, got {:?}", other),
    }
    // DDL auto-commits in MySQL: the first table stays, the third never runs
    assert!(db.table_exists("t1"));
    assert!(!db.table_exists("t2"));
    assert_eq!(migrator.version().unwrap(), "0");
}
