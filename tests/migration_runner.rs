//! Runner-level tests for the migration system
//!
//! These drive `run_migration` and the version table helpers through the
//! in-memory `RecordingExecutor`, so they need no database.

use driftwood::config::MigratorConfig;
use driftwood::migration::runner::{plan, run_migration};
use driftwood::migration::version_table::{current_version, initialize};
use driftwood::migration::{validate, MigrationError, SkipReason};
use driftwood::test_helpers::RecordingExecutor;
use serde_json::json;

const VERSIONS: &str = "schema_versions";

fn initialized() -> RecordingExecutor {
    let executor = RecordingExecutor::new();
    initialize(&executor, &MigratorConfig::default()).unwrap();
    executor
}

fn applied_since(executor: &RecordingExecutor, before: usize) -> Vec<String> {
    executor.executed().into_iter().skip(before).collect()
}

#[test]
fn test_version_progression() {
    let executor = initialized();
    assert_eq!(current_version(&executor, VERSIONS).unwrap(), "0");

    run_migration(
        &executor,
        VERSIONS,
        "20230101000000",
        &json!({"create-table": "users", "columns": [["id", "INT", "NOT NULL"]], "primary-key": "id"}),
    )
    .unwrap();
    run_migration(
        &executor,
        VERSIONS,
        "20230201000000",
        &json!({"alter-table": "users", "add-columns": [["email", "VARCHAR(255)"]]}),
    )
    .unwrap();

    assert_eq!(
        current_version(&executor, VERSIONS).unwrap(),
        "20230201000000"
    );
}

#[test]
fn test_unknown_command_aborts_before_any_statement() {
    let executor = initialized();
    let before = executor.executed().len();

    let err = run_migration(
        &executor,
        VERSIONS,
        "20230101000000",
        &json!([
            {"create-table": "users", "columns": [["id", "INT"]]},
            {"rename-table": "users", "to": "members"},
            {"drop-table": "legacy"}
        ]),
    )
    .unwrap_err();

    assert!(matches!(err, MigrationError::UnsupportedCommand { ref kind } if kind == "rename-table"));
    assert!(err.is_pre_execution());
    assert!(applied_since(&executor, before).is_empty());
    assert!(executor.versions().is_empty());
}

#[test]
fn test_invalid_shape_aborts_before_any_statement() {
    let executor = initialized();
    let before = executor.executed().len();

    let err = run_migration(&executor, VERSIONS, "20230101000000", &json!(["drop-table"])).unwrap_err();

    assert!(matches!(err, MigrationError::Validation(_)));
    assert!(applied_since(&executor, before).is_empty());
}

#[test]
fn test_empty_index_columns_or_rows_abort_before_any_statement() {
    for bad in [
        json!({"insert-into": "t", "values": []}),
        json!({"create-index": "idx_t_id", "on": "t", "columns": []}),
    ] {
        let executor = initialized();
        let before = executor.executed().len();

        let err = run_migration(
            &executor,
            VERSIONS,
            "20230101000000",
            &json!([{"create-table": "t", "columns": [["id", "INT"]]}, bad]),
        )
        .unwrap_err();

        assert!(matches!(err, MigrationError::Validation(_)), "got {:?}", err);
        assert!(err.is_pre_execution());
        assert!(applied_since(&executor, before).is_empty());
        assert!(!executor.has_table("t"));
        assert!(executor.versions().is_empty());
    }
}

#[test]
fn test_failure_mid_migration_leaves_partial_application() {
    let executor = initialized().failing_statement("ADD COLUMN email", "ERROR: Duplicate column name 'email'");
    let before = executor.executed().len();

    let err = run_migration(
        &executor,
        VERSIONS,
        "20230101000000",
        &json!([
            {"create-table": "users", "columns": [["id", "INT"]]},
            {"alter-table": "users", "add-columns": [["email", "VARCHAR(255)"]]},
            {"create-index": "idx_users_email", "on": "users", "columns": ["email"]}
        ]),
    )
    .unwrap_err();

    assert_eq!(
        applied_since(&executor, before),
        vec!["CREATE TABLE users (id INT)"]
    );
    assert!(executor.versions().is_empty());
    assert!(!err.is_pre_execution());
    assert_eq!(err.applied_statements(), Some(1));
    match err {
        MigrationError::Execution { index, total, statement, message, .. } => {
            assert_eq!(index, 2);
            assert_eq!(total, 3);
            assert_eq!(statement, "ALTER TABLE users ADD COLUMN email VARCHAR(255)");
            assert_eq!(message, "Duplicate column name 'email'");
        }
        other => panic!("expected Execution error, got {:?}", other),
    }
}

#[test]
fn test_rerunning_constraint_changes_is_idempotent() {
    let executor = initialized()
        .with_table("users")
        .with_table("orders");
    let commands = json!({
        "alter-table": "orders",
        "drop-constraints": ["fk_orders_legacy"],
        "add-constraints": [["fk_orders_user", "(user_id)", "REFERENCES users(id)"]]
    });

    let first = run_migration(&executor, VERSIONS, "20230101000000", &commands).unwrap();
    assert_eq!(
        first.statements,
        vec!["ALTER TABLE orders ADD CONSTRAINT fk_orders_user FOREIGN KEY (user_id) REFERENCES users(id)"]
    );
    assert_eq!(first.skipped.len(), 1);
    assert_eq!(first.skipped[0].reason, SkipReason::NotPresent);
    assert!(executor.has_constraint("fk_orders_user"));

    let second = run_migration(&executor, VERSIONS, "20230102000000", &commands).unwrap();
    assert!(second.statements.is_empty());
    assert_eq!(second.skipped.len(), 2);
    assert_eq!(second.skipped[1].reason, SkipReason::AlreadyPresent);
}

#[test]
fn test_alter_drops_constraints_before_adding() {
    let executor = initialized().with_constraint("fk_orders_user");
    let commands = validate(&json!({
        "alter-table": "orders",
        "add-constraints": [["fk_orders_customer", "(customer_id)", "REFERENCES customers(id)"]],
        "add-columns": [["customer_id", "INT"]],
        "drop-constraints": ["fk_orders_user"],
        "drop-columns": ["user_id"]
    }))
    .unwrap();

    let introspector = driftwood::migration::MysqlIntrospector::new(&executor);
    let plan = plan(&commands, Some(&introspector)).unwrap();

    assert_eq!(
        plan.statements,
        vec![
            "ALTER TABLE orders DROP FOREIGN KEY fk_orders_user",
            "ALTER TABLE orders DROP COLUMN user_id",
            "ALTER TABLE orders ADD COLUMN customer_id INT",
            "ALTER TABLE orders ADD CONSTRAINT fk_orders_customer FOREIGN KEY (customer_id) REFERENCES customers(id)",
        ]
    );
}

#[test]
fn test_empty_migration_still_records_version() {
    let executor = initialized();
    let report = run_migration(&executor, VERSIONS, "20230101000000", &json!(null)).unwrap();

    assert!(report.statements.is_empty());
    assert_eq!(current_version(&executor, VERSIONS).unwrap(), "20230101000000");
}

#[test]
fn test_insert_rows_render_in_order() {
    let executor = initialized();
    let report = run_migration(
        &executor,
        VERSIONS,
        "20230101000000",
        &json!({"insert-into": "t", "values": [[1, "a"], [2, "b"]]}),
    )
    .unwrap();

    assert_eq!(report.statements, vec![r#"INSERT INTO t VALUES (1,"a"),(2,"b")"#]);
}
