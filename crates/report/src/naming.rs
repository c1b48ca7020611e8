use ingest::Domain;
use std::path::{Path, PathBuf};

/// Keep alphanumerics, space, `_` and `-`, then turn spaces into `_`
pub fn sanitize_client_name(raw: &str) -> String {
    let kept: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    let name = kept.trim().replace(' ', "_");

    if name.is_empty() {
        "Unknown_Client".to_string()
    } else {
        name
    }
}

pub fn extracted_file_name(client_name: &str, domain: Domain) -> String {
    format!("{}_{}_Data.xlsx", sanitize_client_name(client_name), domain.label())
}

pub fn analysis_file_name(client_name: &str, domain: Domain) -> String {
    format!(
        "{}_{}_Data_Deviation_Analysis.xlsx",
        sanitize_client_name(client_name),
        domain.label()
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub extracted: PathBuf,
    pub analysis: PathBuf,
}

impl OutputPaths {
    pub fn new(output_dir: &Path, client_name: &str, domain: Domain) -> Self {
        Self {
            extracted: output_dir.join(extracted_file_name(client_name, domain)),
            analysis: output_dir.join(analysis_file_name(client_name, domain)),
        }
    }
}
