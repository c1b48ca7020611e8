use analyze::DeviationAnalysis;
use extract::ExtractionTable;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::metadata::RunMetadata;

pub const METADATA_SHEET: &str = "Metadata";
/// Sheet names are capped at 31 characters, so the label is left out
pub const DEVIATION_SHEET: &str = "Deviation_Analysis";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("could not create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write workbook {path}: {source}")]
    Xlsx {
        path: PathBuf,
        #[source]
        source: XlsxError,
    },
}

/// `{Client}_{Label}_Data.xlsx`: data sheet plus Metadata
pub fn write_extracted(path: &Path, table: &ExtractionTable, metadata: &RunMetadata) -> Result<(), OutputError> {
    let xlsx = |source: XlsxError| OutputError::Xlsx { path: path.to_path_buf(), source };

    let mut workbook = Workbook::new();
    write_data_sheet(workbook.add_worksheet(), table).map_err(xlsx)?;
    write_metadata_sheet(workbook.add_worksheet(), metadata).map_err(xlsx)?;

    save(workbook, path)?;
    info!(path = %path.display(), rows = table.len(), "Extracted data saved");
    Ok(())
}

/// The analysis workbook repeats the data sheet so it can be reviewed on
/// its own.
pub fn write_analysis(
    path: &Path,
    table: &ExtractionTable,
    analysis: &DeviationAnalysis,
    metadata: &RunMetadata,
) -> Result<(), OutputError> {
    let xlsx = |source: XlsxError| OutputError::Xlsx { path: path.to_path_buf(), source };

    let mut workbook = Workbook::new();
    write_data_sheet(workbook.add_worksheet(), table).map_err(xlsx)?;
    write_deviation_sheet(workbook.add_worksheet(), table.domain.status_column(), analysis).map_err(xlsx)?;
    write_metadata_sheet(workbook.add_worksheet(), metadata).map_err(xlsx)?;

    save(workbook, path)?;
    info!(
        path = %path.display(),
        results = analysis.rows.len(),
        deviations = analysis.deviation_count(),
        "Deviation analysis saved"
    );
    Ok(())
}

fn save(mut workbook: Workbook, path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| OutputError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    workbook.save(path).map_err(|source| OutputError::Xlsx {
        path: path.to_path_buf(),
        source,
    })
}

fn write_header(sheet: &mut Worksheet, headers: &[&str]) -> Result<(), XlsxError> {
    let bold = Format::new().set_bold();
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }
    Ok(())
}

fn write_data_sheet(sheet: &mut Worksheet, table: &ExtractionTable) -> Result<(), XlsxError> {
    sheet.set_name(table.domain.data_sheet())?;

    let columns: Vec<&str> = table.columns().iter().map(String::as_str).collect();
    write_header(sheet, &columns)?;

    for (r, row) in table.rows().iter().enumerate() {
        for (c, column) in columns.iter().enumerate() {
            let value = row.get(column).unwrap_or_default();
            sheet.write_string(r as u32 + 1, c as u16, value)?;
        }
    }

    sheet.autofit();
    Ok(())
}

fn write_deviation_sheet(
    sheet: &mut Worksheet,
    status_column: &str,
    analysis: &DeviationAnalysis,
) -> Result<(), XlsxError> {
    sheet.set_name(DEVIATION_SHEET)?;
    write_header(sheet, &["System_Name", status_column, "Missing_Environments", "Reason"])?;

    for (r, row) in analysis.rows.iter().enumerate() {
        let r = r as u32 + 1;
        sheet.write_string(r, 0, &row.system_name)?;
        sheet.write_string(r, 1, row.status.as_str())?;
        sheet.write_string(r, 2, analyze::schema::format_environments(&row.missing_environments))?;
        sheet.write_string(r, 3, &row.explanation)?;
    }

    sheet.autofit();
    Ok(())
}

fn write_metadata_sheet(sheet: &mut Worksheet, metadata: &RunMetadata) -> Result<(), XlsxError> {
    sheet.set_name(METADATA_SHEET)?;
    write_header(sheet, &["Key", "Value"])?;

    for (r, (key, value)) in metadata.entries().into_iter().enumerate() {
        sheet.write_string(r as u32 + 1, 0, key)?;
        sheet.write_string(r as u32 + 1, 1, value)?;
    }

    sheet.autofit();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use analyze::{DeviationRow, DeviationStatus, Environment};
    use calamine::{Reader, open_workbook_auto};
    use extract::ExtractedRow;
    use ingest::{Domain, ExtractionParameter};
    use std::collections::BTreeSet;

    fn billing_table() -> ExtractionTable {
        let mut table = ExtractionTable::new(Domain::Environment);
        table.push(ExtractedRow::from_pairs([
            ("Env-ID", "E1"),
            ("System Name", "Billing"),
            ("Environment Type", "DEV"),
        ]));
        table.push(ExtractedRow::from_pairs([
            ("Env-ID", "E2"),
            ("System Name", "Billing"),
            ("Environment Type", "PROD"),
        ]));
        table
    }

    fn metadata(table: &ExtractionTable) -> RunMetadata {
        let params = vec![ExtractionParameter::new("Acme", "Billing")];
        RunMetadata::new("Acme", &params, table, Path::new("extraction_parameters.xlsx"))
    }

    fn read(path: &Path, sheet: &str) -> Vec<Vec<String>> {
        let mut workbook = open_workbook_auto(path).unwrap();
        let range = workbook.worksheet_range(sheet).unwrap();
        range
            .rows()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_write_extracted_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("Acme_Environment_Data.xlsx");
        let table = billing_table();

        write_extracted(&path, &table, &metadata(&table)).unwrap();

        let workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Environment_Register", "Metadata"]);

        let rows = read(&path, "Environment_Register");
        assert_eq!(rows[0], vec!["Env-ID", "System Name", "Environment Type"]);
        assert_eq!(rows[2], vec!["E2", "Billing", "PROD"]);

        let meta = read(&path, "Metadata");
        assert!(meta.iter().any(|r| r[0] == "Record count" && r[1] == "2"));
    }

    #[test]
    fn test_write_analysis_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Acme_Environment_Data_Deviation_Analysis.xlsx");
        let table = billing_table();
        let analysis = DeviationAnalysis {
            rows: vec![DeviationRow {
                system_name: "Billing".into(),
                status: DeviationStatus::Deviation,
                missing_environments: BTreeSet::from([Environment::Test]),
                explanation: "No TEST environment available".into(),
            }],
            systems_analyzed: 1,
            disagreements: Vec::new(),
        };

        write_analysis(&path, &table, &analysis, &metadata(&table).with_analysis(&analysis)).unwrap();

        let workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(
            workbook.sheet_names(),
            vec!["Environment_Register", DEVIATION_SHEET, METADATA_SHEET]
        );

        let rows = read(&path, DEVIATION_SHEET);
        assert_eq!(rows[0], vec!["System_Name", "Environment_DTAP", "Missing_Environments", "Reason"]);
        assert_eq!(rows[1], vec!["Billing", "Deviation", "TEST", "No TEST environment available"]);

        let meta = read(&path, METADATA_SHEET);
        assert!(meta.iter().any(|r| r[0] == "Exception records" && r[1] == "1"));
    }
}
