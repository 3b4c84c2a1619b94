//! Row validation against the ordered field rules.
//!
//! Evaluation is fail-fast and totally ordered: fields in declared order,
//! validators in declared order, first failure wins. One message per row.

use crate::core::rules::{FieldRule, Validator};
use crate::core::types::Row;

/// Validate `row` against `fields`.
///
/// Returns `None` when the row is acceptable, otherwise the rejection reason.
pub fn validate_row(row: &Row, fields: &[FieldRule]) -> Option<String> {
    for rule in fields {
        let value = row.value(&rule.column);
        let Some(value) = value else {
            if rule.rejects_empty() {
                return Some(format!("Missing required field: {}", rule.column));
            }
            continue;
        };
        for validator in &rule.validators {
            if let Some(reason) = check_value(&rule.column, validator, &value) {
                return Some(reason);
            }
        }
    }
    None
}

/// Evaluate one validator against a non-empty stringified value.
fn check_value(column: &str, validator: &Validator, value: &str) -> Option<String> {
    match validator {
        Validator::Regex { pattern, message } => {
            if pattern.is_match(value) {
                None
            } else {
                Some(
                    message
                        .clone()
                        .unwrap_or_else(|| format!("Invalid value for {column}")),
                )
            }
        }
        Validator::Enum { values, message } => {
            if values.iter().any(|allowed| allowed == value) {
                None
            } else {
                Some(message.clone().unwrap_or_else(|| {
                    format!("{column} must be one of [{}]", values.join(", "))
                }))
            }
        }
        Validator::Unknown { .. } => None,
    }
}
