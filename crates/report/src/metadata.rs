use analyze::DeviationAnalysis;
use chrono::{DateTime, Local};
use extract::ExtractionTable;
use ingest::{Domain, ExtractionParameter};
use sha2::{Digest, Sha256};
use std::path::Path;

pub const PROCESS_KIND: &str = "Agentic";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnalysisCounts {
    pub systems_analyzed: usize,
    pub total: usize,
    pub deviations: usize,
    pub ok: usize,
    pub unknown: usize,
    pub disagreements: usize,
}

impl From<&DeviationAnalysis> for AnalysisCounts {
    fn from(analysis: &DeviationAnalysis) -> Self {
        Self {
            systems_analyzed: analysis.systems_analyzed,
            total: analysis.rows.len(),
            deviations: analysis.deviation_count(),
            ok: analysis.ok_count(),
            unknown: analysis.unknown_count(),
            disagreements: analysis.disagreements.len(),
        }
    }
}

/// Facts about one domain run for one client, written as the Metadata sheet
#[derive(Debug, Clone)]
pub struct RunMetadata {
    pub domain: Domain,
    pub timestamp: DateTime<Local>,
    pub parameter_count: usize,
    pub row_count: usize,
    pub client_name: String,
    pub user: String,
    pub agent_name: String,
    pub system_names: Vec<String>,
    pub hash_total: String,
    pub parameter_file: String,
    pub analysis: Option<AnalysisCounts>,
}

impl RunMetadata {
    pub fn new(
        client_name: &str,
        parameters: &[ExtractionParameter],
        table: &ExtractionTable,
        parameter_file: &Path,
    ) -> Self {
        Self {
            domain: table.domain,
            timestamp: Local::now(),
            parameter_count: parameters.len(),
            row_count: table.len(),
            client_name: client_name.to_string(),
            user: current_user(),
            agent_name: table.domain.extractor_name(),
            system_names: parameters.iter().map(|p| p.system_name.clone()).collect(),
            hash_total: hash_total(table),
            parameter_file: parameter_file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            analysis: None,
        }
    }

    pub fn with_analysis(mut self, analysis: &DeviationAnalysis) -> Self {
        self.analysis = Some(AnalysisCounts::from(analysis));
        self
    }

    /// Key/Value rows, in the order they appear on the sheet
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = vec![
            ("Domain", self.domain.display_name().to_string()),
            ("Client name", self.client_name.clone()),
            ("Extraction timestamp", self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
            ("Extracted by user ID", self.user.clone()),
            ("Agentic/Non-agentic process", PROCESS_KIND.to_string()),
            ("Agent name", self.agent_name.clone()),
            ("System name", self.system_names.join(", ")),
            ("Parameter count", self.parameter_count.to_string()),
            ("Record count", self.row_count.to_string()),
            ("Hash total", self.hash_total.clone()),
            ("Parameter file used", self.parameter_file.clone()),
        ];

        if let Some(counts) = &self.analysis {
            entries.extend([
                ("Analyzed by", self.domain.analyzer_name()),
                ("Systems analyzed", counts.systems_analyzed.to_string()),
                ("Total records analyzed", counts.total.to_string()),
                ("Exception records", counts.deviations.to_string()),
                ("OK records", counts.ok.to_string()),
                ("Unknown records", counts.unknown.to_string()),
                ("Local check disagreements", counts.disagreements.to_string()),
            ]);
        }

        entries
    }
}

/// SHA-256 over the table's text dump, hex encoded
pub fn hash_total(table: &ExtractionTable) -> String {
    let mut hasher = Sha256::new();
    hasher.update(table.to_text().as_bytes());
    hex::encode(hasher.finalize())
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
