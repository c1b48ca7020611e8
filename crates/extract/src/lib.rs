pub mod llm;
pub mod mock;
pub mod parser;
pub mod prompt;
pub mod retry;
pub mod schema;

pub use llm::{AgentClient, AgentError, FoundryAgentClient, FoundryConfig};
pub use mock::MockAgentClient;
pub use parser::{ParseOutcome, parse_table};
pub use retry::RetryPolicy;
pub use schema::{ExtractedRow, ExtractionTable};

use ingest::{Domain, ExtractionParameter, Sheet};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::schema::{CLIENT_COLUMN, SYSTEM_COLUMN};

/// Runs the domain's extraction prompt for each (client, system) pair
pub struct Extractor {
    domain: Domain,
    agent: Arc<dyn AgentClient>,
    context: Option<Sheet>,
}

impl Extractor {
    pub fn new(domain: Domain, agent: Arc<dyn AgentClient>) -> Self {
        Self {
            domain,
            agent,
            context: None,
        }
    }

    /// Input data rows handed to the agent alongside each pair
    pub fn with_context(mut self, context: Option<Sheet>) -> Self {
        self.context = context;
        self
    }

    /// Extract rows for every pair, in order. A pair whose agent call or
    /// reply fails contributes no rows; it never aborts the others.
    pub async fn extract(&self, parameters: &[ExtractionParameter]) -> ExtractionTable {
        let mut table = ExtractionTable::new(self.domain);
        let mut failed = 0usize;

        for param in parameters {
            match self.extract_pair(param).await {
                Some(rows) => table.extend(rows),
                None => failed += 1,
            }
        }

        info!(
            domain = %self.domain,
            pairs = parameters.len(),
            failed_pairs = failed,
            rows = table.len(),
            "Extraction finished"
        );
        table
    }

    /// A pair whose context spans several pages gets one call per page.
    /// Returns `None` only when every call for the pair failed.
    async fn extract_pair(&self, param: &ExtractionParameter) -> Option<Vec<ExtractedRow>> {
        let instructions = prompt::extraction_instructions(self.domain);
        let prompts = prompt::build_extraction_prompts(self.domain, param, self.context.as_ref());

        let mut rows = Vec::new();
        let mut answered = 0usize;
        for (page, prompt) in prompts.iter().enumerate() {
            let reply = match self.agent.complete(&instructions, prompt).await {
                Ok(reply) => reply,
                Err(e) => {
                    error!(
                        domain = %self.domain,
                        client = %param.client_name,
                        system = %param.system_name,
                        page = page + 1,
                        agent = self.agent.name(),
                        error = %e,
                        "Agent call failed, skipping"
                    );
                    continue;
                }
            };

            match parse_table(&reply) {
                ParseOutcome::Rows(parsed) => {
                    answered += 1;
                    rows.extend(parsed);
                }
                ParseOutcome::Failure(reason) => warn!(
                    domain = %self.domain,
                    client = %param.client_name,
                    system = %param.system_name,
                    page = page + 1,
                    reason = %reason,
                    "Unparsable extraction reply, skipping"
                ),
            }
        }

        if answered == 0 {
            return None;
        }

        for row in &mut rows {
            if row.value(SYSTEM_COLUMN).is_none() && !param.is_all_systems() {
                row.set(SYSTEM_COLUMN, param.system_name.clone());
            }
            row.set(CLIENT_COLUMN, param.client_name.clone());
        }

        Some(rows)
    }
}
