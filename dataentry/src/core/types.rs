//! Shared deterministic types for rows and outcomes.
//!
//! These types define stable contracts between the tabular source, the run
//! coordinator, and the outcome log. They carry no I/O and serialize to the
//! stable `row,status,message` record format.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One raw tabular value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// Absent, NaN, and empty-after-stringification are all "empty".
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Number(n) => n.is_nan(),
            Cell::Text(s) => s.is_empty(),
            Cell::Bool(_) => false,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) if n.is_nan() => Ok(()),
            // Spreadsheets store integers as floats; render `42`, not `42.0`.
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

/// One record of column name to raw cell. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: HashMap<String, Cell>,
}

impl Row {
    pub fn new(cells: HashMap<String, Cell>) -> Self {
        Self { cells }
    }

    /// Cell for `column`, or `None` when the column is absent.
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells.get(column)
    }

    /// Non-empty stringified value for `column`.
    pub fn value(&self, column: &str) -> Option<String> {
        self.get(column)
            .filter(|cell| !cell.is_empty())
            .map(ToString::to_string)
    }
}

impl<K: Into<String>, V: Into<Cell>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            cells: iter
                .into_iter()
                .map(|(column, cell)| (column.into(), cell.into()))
                .collect(),
        }
    }
}

/// A row together with its 1-based position in the input table.
///
/// `number` never changes under slicing or filtering; it is the identity used
/// to correlate outcome records across runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub number: usize,
    pub row: Row,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

/// One line of the outcome log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub row: usize,
    pub status: OutcomeStatus,
    pub message: String,
}

impl OutcomeRecord {
    pub fn success(row: usize) -> Self {
        Self {
            row,
            status: OutcomeStatus::Success,
            message: String::new(),
        }
    }

    pub fn failed(row: usize, message: impl Into<String>) -> Self {
        Self {
            row,
            status: OutcomeStatus::Failed,
            message: message.into(),
        }
    }
}

/// Aggregate counters for a run.
///
/// `successes + failures + skipped == considered` holds after every row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub considered: usize,
    pub successes: usize,
    pub failures: usize,
    pub skipped: usize,
}

impl RunSummary {
    pub fn is_balanced(&self) -> bool {
        self.successes + self.failures + self.skipped == self.considered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_covers_absent_nan_and_blank() {
        assert!(Cell::Empty.is_empty());
        assert!(Cell::Number(f64::NAN).is_empty());
        assert!(Cell::Text(String::new()).is_empty());
        assert!(!Cell::Text(" ".to_string()).is_empty());
        assert!(!Cell::Number(0.0).is_empty());
        assert!(!Cell::Bool(false).is_empty());
    }

    #[test]
    fn integral_numbers_render_without_decimal_point() {
        assert_eq!(Cell::Number(42.0).to_string(), "42");
        assert_eq!(Cell::Number(-3.0).to_string(), "-3");
        assert_eq!(Cell::Number(1.5).to_string(), "1.5");
        assert_eq!(Cell::Number(f64::NAN).to_string(), "");
        assert_eq!(Cell::Bool(true).to_string(), "true");
    }

    #[test]
    fn row_value_skips_empty_cells() {
        let row: Row = [("email", Cell::from("a@b.com")), ("age", Cell::Number(f64::NAN))]
            .into_iter()
            .collect();
        assert_eq!(row.value("email").as_deref(), Some("a@b.com"));
        assert_eq!(row.value("age"), None);
        assert_eq!(row.value("missing"), None);
    }

    #[test]
    fn outcome_record_serializes_lowercase_status() {
        let record = OutcomeRecord::failed(7, "Missing required field: email");
        let json = serde_json::to_string(&record).expect("serialize");
        assert_eq!(
            json,
            r#"{"row":7,"status":"failed","message":"Missing required field: email"}"#
        );
    }
}
