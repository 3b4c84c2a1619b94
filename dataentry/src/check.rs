//! Offline validation for `dataentry check`.

use std::path::Path;

use anyhow::Result;

use crate::core::filter::RowFilter;
use crate::core::rules::Mapping;
use crate::core::selection::{RowRange, select_rows};
use crate::core::types::SourceRow;
use crate::core::validator::validate_row;
use crate::io::mapping::load_mapping;
use crate::io::table::read_table;

/// One row the validator would reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    pub row: usize,
    pub reason: String,
}

/// Result of validating every selected row without a browser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckOutcome {
    pub checked: usize,
    pub rejected: Vec<RejectedRow>,
}

impl CheckOutcome {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Validate the selected rows against the mapping's field rules.
pub fn check_rows(
    mapping: &Mapping,
    rows: Vec<SourceRow>,
    range: RowRange,
    filter: Option<&RowFilter>,
) -> CheckOutcome {
    let mut outcome = CheckOutcome::default();
    for source in select_rows(rows, range, filter) {
        outcome.checked += 1;
        if let Some(reason) = validate_row(&source.row, &mapping.fields) {
            outcome.rejected.push(RejectedRow {
                row: source.number,
                reason,
            });
        }
    }
    outcome
}

/// Load mapping and table from disk, then validate the selected rows.
pub fn check_files(
    mapping_path: &Path,
    input_path: &Path,
    range: RowRange,
    filter: Option<&RowFilter>,
) -> Result<CheckOutcome> {
    let mapping = load_mapping(mapping_path)?;
    let rows = read_table(input_path)?;
    Ok(check_rows(&mapping, rows, range, filter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MAPPING: &str = "\
url: https://forms.example.test/signup
fields:
  email:
    selector: '#email'
    required: true
    validators:
      - {type: regex, pattern: '[^@]+@[^@]+', message: 'Invalid email'}
  country:
    selector: '#country'
    type: select
    validators:
      - {type: enum, values: [US, CA]}
";

    #[test]
    fn rejected_rows_keep_source_numbers() {
        let temp = tempfile::tempdir().expect("tempdir");
        let map = temp.path().join("form.yaml");
        let input = temp.path().join("rows.csv");
        fs::write(&map, MAPPING).expect("write mapping");
        fs::write(
            &input,
            "email,country\na@b.com,US\n,CA\nbad,US\nc@d.com,MX\n",
        )
        .expect("write rows");

        let outcome = check_files(&map, &input, RowRange::new(2, None).expect("range"), None)
            .expect("check");
        assert_eq!(outcome.checked, 3);
        assert_eq!(
            outcome.rejected,
            vec![
                RejectedRow {
                    row: 2,
                    reason: "Missing required field: email".to_string()
                },
                RejectedRow {
                    row: 3,
                    reason: "Invalid email".to_string()
                },
                RejectedRow {
                    row: 4,
                    reason: "country must be one of [US, CA]".to_string()
                },
            ]
        );
        assert!(!outcome.is_clean());
    }

    #[test]
    fn filter_narrows_the_checked_rows() {
        let temp = tempfile::tempdir().expect("tempdir");
        let map = temp.path().join("form.yaml");
        let input = temp.path().join("rows.csv");
        fs::write(&map, MAPPING).expect("write mapping");
        fs::write(&input, "email,country\na@b.com,US\nbad,CA\n").expect("write rows");

        let filter = RowFilter::parse("country == 'US'").expect("filter");
        let outcome =
            check_files(&map, &input, RowRange::default(), Some(&filter)).expect("check");
        assert_eq!(outcome.checked, 1);
        assert!(outcome.is_clean());
    }
}
