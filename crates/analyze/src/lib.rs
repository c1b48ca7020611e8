pub mod coverage;
pub mod prompt;
pub mod schema;

pub use coverage::{Disagreement, SystemCoverage, cross_check, summarize};
pub use schema::{DeviationRow, DeviationStatus, Environment};

use extract::{AgentClient, ExtractionTable, ParseOutcome, parse_table};
use ingest::Domain;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Result of one analysis pass: the agent's rows plus the systems where the
/// local DEV/TEST/PROD check saw something different.
#[derive(Debug, Clone, Default)]
pub struct DeviationAnalysis {
    pub rows: Vec<DeviationRow>,
    pub systems_analyzed: usize,
    pub disagreements: Vec<Disagreement>,
}

impl DeviationAnalysis {
    pub fn deviation_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_deviation()).count()
    }

    pub fn ok_count(&self) -> usize {
        self.count(DeviationStatus::Ok)
    }

    pub fn unknown_count(&self) -> usize {
        self.count(DeviationStatus::Unknown)
    }

    fn count(&self, status: DeviationStatus) -> usize {
        self.rows.iter().filter(|r| r.status == status).count()
    }
}

/// Asks the agent which systems lack one of the required environments
pub struct DeviationAnalyzer {
    domain: Domain,
    agent: Arc<dyn AgentClient>,
    batch_size: usize,
}

impl DeviationAnalyzer {
    pub fn new(domain: Domain, agent: Arc<dyn AgentClient>) -> Self {
        Self {
            domain,
            agent,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn analyze(&self, table: &ExtractionTable) -> Vec<DeviationRow> {
        self.analyze_with_check(table).await.rows
    }

    /// Run the agent over the per-system summary, batch by batch, then
    /// compare its verdicts with the local coverage check. The agent's rows
    /// are returned unchanged; disagreements are only logged and counted.
    pub async fn analyze_with_check(&self, table: &ExtractionTable) -> DeviationAnalysis {
        let coverage = summarize(table);
        if coverage.is_empty() {
            info!(domain = %self.domain, "Nothing to analyze");
            return DeviationAnalysis::default();
        }

        let mut rows = Vec::new();
        for (index, batch) in coverage.chunks(self.batch_size).enumerate() {
            rows.extend(self.analyze_batch(index, batch).await);
        }

        let disagreements = cross_check(&coverage, &rows);
        for d in &disagreements {
            warn!(
                domain = %self.domain,
                system = %d.system_name,
                locally_missing = %schema::format_environments(&d.locally_missing),
                agent_status = d.agent_verdict.as_ref().map(|r| r.status.as_str()).unwrap_or("missing"),
                "Agent verdict differs from local environment check"
            );
        }

        info!(
            domain = %self.domain,
            systems = coverage.len(),
            results = rows.len(),
            disagreements = disagreements.len(),
            "Deviation analysis finished"
        );

        DeviationAnalysis {
            rows,
            systems_analyzed: coverage.len(),
            disagreements,
        }
    }

    async fn analyze_batch(&self, index: usize, batch: &[SystemCoverage]) -> Vec<DeviationRow> {
        let systems_json = match serde_json::to_string(batch) {
            Ok(json) => json,
            Err(e) => {
                warn!(domain = %self.domain, batch = index + 1, error = %e, "Failed to serialize batch");
                return Vec::new();
            }
        };

        let instructions = prompt::analysis_instructions(self.domain);
        let prompt = prompt::build_analysis_prompt(self.domain, &systems_json);

        let reply = match self.agent.complete(&instructions, &prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(domain = %self.domain, batch = index + 1, error = %e, "Analysis call failed");
                return Vec::new();
            }
        };

        match parse_table(&reply) {
            ParseOutcome::Rows(rows) => rows
                .iter()
                .filter_map(|row| {
                    let mapped = DeviationRow::from_reply(self.domain, row);
                    if mapped.is_none() {
                        warn!(domain = %self.domain, batch = index + 1, "Skipping analysis row without System_Name");
                    }
                    mapped
                })
                .collect(),
            ParseOutcome::Failure(reason) => {
                warn!(domain = %self.domain, batch = index + 1, reason = %reason, "Unparsable analysis reply");
                Vec::new()
            }
        }
    }
}
