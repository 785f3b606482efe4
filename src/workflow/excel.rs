//! Spreadsheet row loading for `group_excel`: 1-based `start_row`, halting
//! on the first fully-blank row, with 1-based column lookup. Reads with
//! `calamine`, the ecosystem's standard `.xlsx`/`.xls` reader.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::{Error, Result};

/// One spreadsheet row, as a zero-based sequence of cell strings. Blank
/// cells are the empty string.
pub type ExcelRow = Vec<String>;

/// Loads every row from `start_row` onward,
/// halting at the first fully-blank row.
pub fn load_excel_rows(file_path: &Path, start_row: usize) -> Result<Vec<ExcelRow>> {
    if !file_path.is_file() {
        return Err(Error::SpreadsheetError(format!(
            "Excel file not found: {}",
            file_path.display()
        )));
    }

    let mut workbook = open_workbook_auto(file_path)
        .map_err(|e| Error::SpreadsheetError(format!("Failed to open {}: {e}", file_path.display())))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| Error::SpreadsheetError(format!("{} has no sheets", file_path.display())))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| Error::SpreadsheetError(format!("Failed to read sheet '{sheet_name}': {e}")))?;

    let mut rows = Vec::new();
    for (idx, row) in range.rows().enumerate() {
        let row_number = idx + 1; // 1-based, matching openpyxl's enumerate(start=1)
        if row_number < start_row {
            continue;
        }
        let cells: ExcelRow = row.iter().map(cell_to_string).collect();
        if cells.iter().all(|c| c.is_empty()) {
            break;
        }
        rows.push(cells);
    }

    Ok(rows)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(d) => d.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#ERROR: {e:?}"),
    }
}

/// Reads one 1-based column from a row,
/// returning an empty string (with the caller expected to log a warning)
/// if the column is out of range for this row — a row shorter than its
/// neighbors is not itself an error.
pub fn column_value(row: &ExcelRow, write_from_col: usize) -> Option<&str> {
    if write_from_col == 0 {
        return None;
    }
    row.get(write_from_col - 1).map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_value_is_1_indexed_and_bounds_checked() {
        let row: ExcelRow = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(column_value(&row, 1), Some("a"));
        assert_eq!(column_value(&row, 3), Some("c"));
        assert_eq!(column_value(&row, 4), None);
        assert_eq!(column_value(&row, 0), None);
    }
}
