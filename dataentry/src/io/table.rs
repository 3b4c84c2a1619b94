//! Tabular source loading (CSV or spreadsheet, chosen by extension).
//!
//! Both readers yield `SourceRow`s numbered by their 1-based position after
//! the header row, which is the row identity used in the outcome log.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use calamine::{Data, Reader, open_workbook_auto};
use tracing::debug;

use crate::core::types::{Cell, Row, SourceRow};

const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xls", "xlsb", "ods"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Spreadsheet,
}

impl TableFormat {
    /// Spreadsheet extensions select the workbook reader; anything else is CSV.
    pub fn for_path(path: &Path) -> Self {
        let is_spreadsheet = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                SPREADSHEET_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });
        if is_spreadsheet {
            TableFormat::Spreadsheet
        } else {
            TableFormat::Csv
        }
    }
}

/// Read every data row of the table at `path`.
pub fn read_table(path: &Path) -> Result<Vec<SourceRow>> {
    let format = TableFormat::for_path(path);
    let rows = match format {
        TableFormat::Csv => read_csv(path),
        TableFormat::Spreadsheet => read_spreadsheet(path),
    }
    .with_context(|| format!("read table {}", path.display()))?;
    debug!(path = %path.display(), ?format, rows = rows.len(), "table loaded");
    Ok(rows)
}

fn read_csv(path: &Path) -> Result<Vec<SourceRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context("open csv")?;
    let headers = reader.headers().context("read csv header")?.clone();
    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("read csv row {}", idx + 1))?;
        if record.len() > headers.len() {
            bail!(
                "csv row {} has {} fields but the header has {}",
                idx + 1,
                record.len(),
                headers.len()
            );
        }
        let cells: HashMap<String, Cell> = headers
            .iter()
            .zip(record.iter())
            .map(|(column, value)| {
                let cell = if value.is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(value.to_string())
                };
                (column.to_string(), cell)
            })
            .collect();
        rows.push(SourceRow {
            number: idx + 1,
            row: Row::new(cells),
        });
    }
    Ok(rows)
}

fn read_spreadsheet(path: &Path) -> Result<Vec<SourceRow>> {
    let mut workbook = open_workbook_auto(path).context("open workbook")?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook has no worksheets"))?
        .context("read first worksheet")?;
    let mut data_rows = range.rows();
    let Some(header) = data_rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header.iter().map(|data| cell_from_data(data).to_string()).collect();
    let rows = data_rows
        .enumerate()
        .map(|(idx, data)| {
            let cells: HashMap<String, Cell> = headers
                .iter()
                .zip(data.iter())
                .filter(|(column, _)| !column.is_empty())
                .map(|(column, value)| (column.clone(), cell_from_data(value)))
                .collect();
            SourceRow {
                number: idx + 1,
                row: Row::new(cells),
            }
        })
        .collect();
    Ok(rows)
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(text) if text.is_empty() => Cell::Empty,
        Data::String(text) => Cell::Text(text.clone()),
        Data::Float(value) => Cell::Number(*value),
        Data::Int(value) => Cell::Number(*value as f64),
        Data::Bool(value) => Cell::Bool(*value),
        other => Cell::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn format_is_chosen_by_extension() {
        assert_eq!(TableFormat::for_path(&PathBuf::from("rows.csv")), TableFormat::Csv);
        assert_eq!(
            TableFormat::for_path(&PathBuf::from("rows.XLSX")),
            TableFormat::Spreadsheet
        );
        assert_eq!(TableFormat::for_path(&PathBuf::from("rows.txt")), TableFormat::Csv);
        assert_eq!(TableFormat::for_path(&PathBuf::from("rows")), TableFormat::Csv);
    }

    #[test]
    fn csv_rows_are_numbered_after_header() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("rows.csv");
        fs::write(&path, "email,country\na@b.com,US\n,CA\nc@d.com\n").expect("write");

        let rows = read_table(&path).expect("read");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].number, 1);
        assert_eq!(rows[0].row.value("email").as_deref(), Some("a@b.com"));
        assert_eq!(rows[1].row.get("email"), Some(&Cell::Empty));
        assert_eq!(rows[1].row.value("country").as_deref(), Some("CA"));
        // Short records leave trailing columns absent.
        assert_eq!(rows[2].number, 3);
        assert_eq!(rows[2].row.get("country"), None);
    }

    #[test]
    fn csv_records_longer_than_the_header_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("rows.csv");
        fs::write(&path, "email,country\na@b.com,US\nc@d.com,CA,extra\n").expect("write");

        let err = read_table(&path).unwrap_err();
        assert!(
            format!("{err:#}").contains("csv row 2 has 3 fields but the header has 2"),
            "{err:#}"
        );
    }

    #[test]
    fn csv_quoting_is_respected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("rows.csv");
        fs::write(&path, "name,note\n\"Doe, Jane\",\"said \"\"hi\"\"\"\n").expect("write");

        let rows = read_table(&path).expect("read");
        assert_eq!(rows[0].row.value("name").as_deref(), Some("Doe, Jane"));
        assert_eq!(rows[0].row.value("note").as_deref(), Some("said \"hi\""));
    }

    #[test]
    fn spreadsheet_cells_map_to_typed_cells() {
        assert_eq!(cell_from_data(&Data::Empty), Cell::Empty);
        assert_eq!(cell_from_data(&Data::String(String::new())), Cell::Empty);
        assert_eq!(cell_from_data(&Data::Int(7)), Cell::Number(7.0));
        assert_eq!(cell_from_data(&Data::Float(2.5)), Cell::Number(2.5));
        assert_eq!(cell_from_data(&Data::Bool(true)), Cell::Bool(true));
    }

    #[test]
    fn missing_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(read_table(&temp.path().join("absent.csv")).is_err());
    }
}
