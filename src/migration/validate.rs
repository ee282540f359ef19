//! Command set validation
//!
//! Checks the overall shape of a migration's command set before anything is
//! generated, then parses each entry into a [`Command`].

use crate::migration::{Command, MigrationError};
use serde_json::{Map, Value};

/// Check the shape of a command set
///
/// Accepts a single command map (normalised to a one-element sequence), an
/// array of command maps, or nothing (`null` / empty array) meaning no
/// commands. Anything else is a `Validation` error.
pub fn validate_shape(commands: &Value) -> Result<Vec<&Map<String, Value>>, MigrationError> {
    match commands {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(vec![map]),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(map) => Ok(map),
                other => Err(MigrationError::Validation(format!(
                    "entry {} is not a command map: {}",
                    i + 1,
                    other
                ))),
            })
            .collect(),
        other => Err(MigrationError::Validation(format!(
            "expected a command map or an array of command maps, got {}",
            other
        ))),
    }
}

/// Validate a command set and parse it into ordered commands
///
/// # Errors
///
/// `Validation` for a malformed set or malformed command, `UnsupportedCommand`
/// for an unknown kind. Either way no command of the set is returned.
pub fn validate(commands: &Value) -> Result<Vec<Command>, MigrationError> {
    validate_shape(commands)?
        .into_iter()
        .map(Command::from_map)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_and_empty_are_no_commands() {
        assert!(validate(&Value::Null).unwrap().is_empty());
        assert!(validate(&json!([])).unwrap().is_empty());
    }

    #[test]
    fn test_single_command_is_normalised() {
        let commands = validate(&json!({"drop-table": "sessions"})).unwrap();
        assert_eq!(
            commands,
            vec![Command::DropTable {
                table: "sessions".to_string()
            }]
        );
    }

    #[test]
    fn test_sequence_keeps_order() {
        let commands = validate(&json!([
            {"drop-index": "idx_a", "on": "t"},
            {"drop-table": "t"}
        ]))
        .unwrap();
        let kinds: Vec<&str> = commands.iter().map(Command::kind).collect();
        assert_eq!(kinds, vec!["drop-index", "drop-table"]);
    }

    #[test]
    fn test_bad_shapes() {
        for bad in [json!(42), json!("drop-table"), json!(true), json!([{"drop-table": "t"}, 7])] {
            match validate(&bad) {
                Err(MigrationError::Validation(_)) => {}
                other => panic!("expected Validation for {}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_unknown_kind_in_sequence() {
        let err = validate(&json!([{"drop-table": "t"}, {"rename-table": "t", "to": "u"}])).unwrap_err();
        assert!(matches!(err, MigrationError::UnsupportedCommand { .. }));
    }
}
