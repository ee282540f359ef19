//! Executor Module
//!
//! Provides the `Executor` trait that abstracts blocking statement execution
//! against the backend, and `MysqlExecutor`, its implementation over a single
//! `mysql::Conn`.
//!
//! The migration runner, the schema introspector and the version table helpers
//! all talk to the database through this trait, so any of them can be driven by
//! an in-memory executor in tests.

use mysql::prelude::Queryable;
use mysql::{Conn, Params, Row, Value};
use std::cell::RefCell;
use std::fmt;
use std::time::Instant;

/// A value bound to a statement parameter (`?`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue<'a> {
    /// Text parameter
    Text(&'a str),
    /// 64-bit integer parameter
    BigInt(i64),
}

impl From<&SqlValue<'_>> for Value {
    fn from(value: &SqlValue<'_>) -> Self {
        match value {
            SqlValue::Text(s) => Value::from(*s),
            SqlValue::BigInt(i) => Value::Int(*i),
        }
    }
}

/// Error raised by an `Executor`
///
/// Keeps the backend's message and, when the server reported them, the numeric
/// error code and SQLSTATE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorError {
    /// Backend message
    pub message: String,
    /// Server error code (`1064`, `1146`, ...)
    pub code: Option<u16>,
    /// SQLSTATE
    pub state: Option<String>,
}

impl ExecutorError {
    /// Create an error carrying only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            state: None,
        }
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.state) {
            (Some(code), Some(state)) => write!(f, "{} (code {code}, state {state})", self.message),
            (Some(code), None) => write!(f, "{} (code {code})", self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ExecutorError {}

impl From<mysql::Error> for ExecutorError {
    fn from(err: mysql::Error) -> Self {
        match err {
            mysql::Error::MySqlError(e) => ExecutorError {
                message: e.message,
                code: Some(e.code),
                state: Some(e.state),
            },
            other => ExecutorError::new(other.to_string()),
        }
    }
}

/// Trait for executing statements against the backend
///
/// Every call blocks until the backend answers. Implementations are used from a
/// single thread for the lifetime of one migrator operation.
pub trait Executor {
    /// Execute a statement and return the number of rows affected
    ///
    /// Statements without parameters are sent as plain text, parameterised
    /// ones are prepared and bound.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError` if the backend rejects the statement.
    fn execute(&self, sql: &str, params: &[SqlValue<'_>]) -> Result<u64, ExecutorError>;

    /// Run a query and return the first column of every row as text
    ///
    /// `NULL` values are skipped.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError` if the query fails.
    fn query_column(&self, sql: &str, params: &[SqlValue<'_>]) -> Result<Vec<String>, ExecutorError>;
}

/// Implementation of `Executor` for a blocking `mysql::Conn`
///
/// `Queryable` needs `&mut Conn`; the connection sits in a `RefCell` so the
/// executor can be shared by reference between the runner and the introspector.
pub struct MysqlExecutor {
    conn: RefCell<Conn>,
}

impl MysqlExecutor {
    /// Create a new executor from an open connection
    pub fn new(conn: Conn) -> Self {
        Self {
            conn: RefCell::new(conn),
        }
    }

    /// Consume the executor and return the underlying connection
    pub fn into_conn(self) -> Conn {
        self.conn.into_inner()
    }
}

fn to_params(params: &[SqlValue<'_>]) -> Params {
    if params.is_empty() {
        Params::Empty
    } else {
        Params::Positional(params.iter().map(Value::from).collect())
    }
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::Int(i) => Some(i.to_string()),
        Value::UInt(u) => Some(u.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Double(d) => Some(d.to_string()),
        other => Some(other.as_sql(true)),
    }
}

impl Executor for MysqlExecutor {
    fn execute(&self, sql: &str, params: &[SqlValue<'_>]) -> Result<u64, ExecutorError> {
        let start = Instant::now();
        let mut conn = self.conn.borrow_mut();
        if params.is_empty() {
            conn.query_drop(sql)?;
        } else {
            conn.exec_drop(sql, to_params(params))?;
        }
        log::trace!("statement finished in {:?}", start.elapsed());
        Ok(conn.affected_rows())
    }

    fn query_column(&self, sql: &str, params: &[SqlValue<'_>]) -> Result<Vec<String>, ExecutorError> {
        let mut conn = self.conn.borrow_mut();
        let rows: Vec<Row> = conn.exec(sql, to_params(params))?;
        Ok(rows
            .iter()
            .filter_map(|row| row.as_ref(0).and_then(value_to_text))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_error_display() {
        let err = ExecutorError {
            message: "Table 'app.users' doesn't exist".to_string(),
            code: Some(1146),
            state: Some("42S02".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Table 'app.users' doesn't exist (code 1146, state 42S02)"
        );
        assert_eq!(ExecutorError::new("boom").to_string(), "boom");
    }

    #[test]
    fn test_to_params() {
        assert!(matches!(to_params(&[]), Params::Empty));
        match to_params(&[SqlValue::Text("v1"), SqlValue::BigInt(7)]) {
            Params::Positional(values) => {
                assert_eq!(values, vec![Value::from("v1"), Value::Int(7)]);
            }
            other => panic!("expected positional params, got {:?}", other),
        }
    }

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(&Value::NULL), None);
        assert_eq!(value_to_text(&Value::from("users")), Some("users".to_string()));
        assert_eq!(value_to_text(&Value::Int(-3)), Some("-3".to_string()));
        assert_eq!(value_to_text(&Value::UInt(3)), Some("3".to_string()));
    }
}
