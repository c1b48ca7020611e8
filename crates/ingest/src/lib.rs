pub mod domain;
pub mod error;
pub mod params;
pub mod reader;

pub use domain::Domain;
pub use error::InputError;
pub use params::{ExtractionParameter, group_by_client, load_parameters, resolve_parameter_file};
pub use reader::{Sheet, WorkbookReader};

use std::path::Path;

/// Load the domain's sheet from the input data workbook.
///
/// The rows are only handed to the agent as prompt context, so a missing
/// workbook or sheet is not an error for the caller: it gets `None`.
pub fn load_domain_context(data_file: &Path, domain: Domain) -> Option<Sheet> {
    match WorkbookReader::read_sheet(data_file, domain.data_sheet()) {
        Ok(sheet) if !sheet.is_empty() => Some(sheet),
        Ok(_) => {
            tracing::warn!(domain = %domain, "Input data sheet is empty");
            None
        }
        Err(e) => {
            tracing::warn!(domain = %domain, error = %e, "No input data context available");
            None
        }
    }
}
