use calamine::{Data, Reader, open_workbook_auto};
use serde_json::{Map, Value};
use std::path::Path;

use crate::error::InputError;

/// One worksheet, with the first non-empty row taken as the header.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(column.trim()))
    }

    pub fn require_column(&self, column: &str) -> Result<usize, InputError> {
        self.column_index(column).ok_or_else(|| InputError::MissingColumn {
            sheet: self.name.clone(),
            column: column.to_string(),
        })
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render rows as a JSON array of header -> value objects
    pub fn to_json_records(&self) -> Value {
        let records = self
            .rows
            .iter()
            .map(|row| {
                let mut record = Map::new();
                for (i, header) in self.headers.iter().enumerate() {
                    if header.is_empty() {
                        continue;
                    }
                    let value = row.get(i).cloned().unwrap_or_default();
                    record.insert(header.clone(), Value::String(value));
                }
                Value::Object(record)
            })
            .collect();
        Value::Array(records)
    }
}

pub struct WorkbookReader;

impl WorkbookReader {
    pub fn read_sheet(path: &Path, sheet: &str) -> Result<Sheet, InputError> {
        Self::check_path(path)?;

        let mut workbook = open_workbook_auto(path).map_err(|e| InputError::Workbook {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if !workbook.sheet_names().iter().any(|name| name == sheet) {
            return Err(InputError::MissingSheet {
                path: path.to_path_buf(),
                sheet: sheet.to_string(),
            });
        }

        let range = workbook
            .worksheet_range(sheet)
            .map_err(|e| InputError::Workbook {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut rows = range
            .rows()
            .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>())
            .filter(|row| row.iter().any(|cell| !cell.is_empty()));

        let headers = rows.next().unwrap_or_default();
        let rows = rows.collect();

        Ok(Sheet {
            name: sheet.to_string(),
            headers,
            rows,
        })
    }

    fn check_path(path: &Path) -> Result<(), InputError> {
        if !path.is_file() {
            return Err(InputError::NotFound(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match extension.as_str() {
            "xlsx" | "xlsm" | "xls" | "ods" => Ok(()),
            _ => Err(InputError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}
