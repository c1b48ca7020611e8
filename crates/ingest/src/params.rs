use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::domain::Domain;
use crate::error::InputError;
use crate::reader::WorkbookReader;

pub const PARAMETER_SHEET: &str = "Sheet1";
pub const SHARED_PARAMETER_FILE: &str = "extraction_parameters.xlsx";
pub const CLIENT_COLUMN: &str = "Client Name";
pub const SYSTEM_COLUMN: &str = "System Name";

/// A (client, system) pair to run the extraction prompt for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionParameter {
    pub client_name: String,
    pub system_name: String,
}

impl ExtractionParameter {
    pub fn new(client_name: impl Into<String>, system_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            system_name: system_name.into(),
        }
    }

    /// `All` in the System Name column selects every system of the client
    pub fn is_all_systems(&self) -> bool {
        self.system_name.eq_ignore_ascii_case("all")
    }
}

/// Parameter file for a domain: `{key}_extraction_parameters.xlsx` when
/// present, otherwise the shared `extraction_parameters.xlsx`.
pub fn resolve_parameter_file(data_dir: &Path, domain: Domain) -> Option<PathBuf> {
    let specific = data_dir.join(format!("{}_{}", domain.key(), SHARED_PARAMETER_FILE));
    if specific.is_file() {
        return Some(specific);
    }

    let shared = data_dir.join(SHARED_PARAMETER_FILE);
    shared.is_file().then_some(shared)
}

/// Read the parameters sheet. A comma-separated System Name cell expands to
/// one parameter per system; a blank Client Name cell repeats the client of
/// the row above.
pub fn load_parameters(path: &Path) -> Result<Vec<ExtractionParameter>, InputError> {
    let sheet = WorkbookReader::read_sheet(path, PARAMETER_SHEET)?;
    let client_col = sheet.require_column(CLIENT_COLUMN)?;
    let system_col = sheet.require_column(SYSTEM_COLUMN)?;

    let mut parameters = Vec::new();
    let mut current_client: Option<String> = None;

    for row in 0..sheet.rows.len() {
        let client = sheet.cell(row, client_col);
        if !client.is_empty() {
            current_client = Some(client.to_string());
        }

        let Some(client) = current_client.as_deref() else {
            warn!(row = row + 2, "Skipping parameter row without a client name");
            continue;
        };

        let systems = sheet.cell(row, system_col);
        if systems.is_empty() {
            debug!(row = row + 2, client, "Skipping parameter row without systems");
            continue;
        }

        parameters.extend(
            systems
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|system| ExtractionParameter::new(client, system)),
        );
    }

    Ok(parameters)
}

/// Group parameters by client, keeping the order clients first appear in
pub fn group_by_client(parameters: &[ExtractionParameter]) -> Vec<(String, Vec<ExtractionParameter>)> {
    let mut groups: Vec<(String, Vec<ExtractionParameter>)> = Vec::new();

    for param in parameters {
        match groups.iter_mut().find(|(client, _)| *client == param.client_name) {
            Some((_, group)) => group.push(param.clone()),
            None => groups.push((param.client_name.clone(), vec![param.clone()])),
        }
    }

    groups
}
