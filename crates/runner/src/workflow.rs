use analyze::DeviationAnalyzer;
use clap::ValueEnum;
use extract::{AgentClient, Extractor};
use ingest::{Domain, ExtractionParameter, Sheet};
use report::{OutputPaths, RunMetadata};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::AppConfig;

/// Which domain(s) a run covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Process {
    Env,
    Db,
    Server,
    Url,
    Cloud,
    All,
}

impl Process {
    pub fn domains(self) -> Vec<Domain> {
        match self {
            Process::Env => vec![Domain::Environment],
            Process::Db => vec![Domain::Database],
            Process::Server => vec![Domain::Server],
            Process::Url => vec![Domain::UrlEndpoint],
            Process::Cloud => vec![Domain::CloudResource],
            Process::All => Domain::ALL.to_vec(),
        }
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Process::All => f.write_str("all"),
            other => f.write_str(other.domains()[0].key()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DomainOutcome {
    Completed { files: Vec<PathBuf> },
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowSummary {
    pub outcomes: Vec<(Domain, DomainOutcome)>,
}

impl WorkflowSummary {
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, DomainOutcome::Completed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, DomainOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DomainOutcome::Failed { .. }))
    }

    /// Every requested domain completed or was skipped
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&DomainOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Runs extraction then analysis for each requested domain, one at a time
pub struct WorkflowManager {
    config: AppConfig,
    agent: Arc<dyn AgentClient>,
}

impl WorkflowManager {
    pub fn new(config: AppConfig, agent: Arc<dyn AgentClient>) -> Self {
        Self { config, agent }
    }

    pub async fn run(&self, process: Process) -> WorkflowSummary {
        let mut summary = WorkflowSummary::default();

        for domain in process.domains() {
            info!(domain = %domain, "Starting domain workflow");
            let outcome = self.run_domain(domain).await;
            match &outcome {
                DomainOutcome::Completed { files } => {
                    info!(domain = %domain, files = files.len(), "Domain workflow completed")
                }
                DomainOutcome::Skipped { reason } => {
                    error!(domain = %domain, reason = %reason, "Domain skipped")
                }
                DomainOutcome::Failed { error } => {
                    error!(domain = %domain, error = %error, "Domain workflow failed")
                }
            }
            summary.outcomes.push((domain, outcome));
        }

        info!(
            process = %process,
            completed = summary.completed(),
            skipped = summary.skipped(),
            failed = summary.failed(),
            "Workflow finished"
        );
        summary
    }

    async fn run_domain(&self, domain: Domain) -> DomainOutcome {
        let Some(param_file) = ingest::resolve_parameter_file(self.config.data_dir(), domain) else {
            return DomainOutcome::Skipped {
                reason: format!("no parameters file in {}", self.config.data_dir().display()),
            };
        };

        let parameters = match ingest::load_parameters(&param_file) {
            Ok(parameters) if parameters.is_empty() => {
                return DomainOutcome::Skipped {
                    reason: format!("{} has no usable parameters", param_file.display()),
                };
            }
            Ok(parameters) => parameters,
            Err(e) => return DomainOutcome::Skipped { reason: e.to_string() },
        };

        info!(
            domain = %domain,
            file = %param_file.display(),
            parameters = parameters.len(),
            "Loaded extraction parameters"
        );

        let context = ingest::load_domain_context(&self.config.input_data_path(), domain);
        let mut files = Vec::new();
        let mut failures = Vec::new();

        for (client, client_params) in group_by_output_name(&parameters) {
            match self
                .run_client(domain, &client, &client_params, context.clone(), &param_file)
                .await
            {
                Ok(written) => files.extend(written),
                Err(e) => {
                    error!(domain = %domain, client = %client, error = %e, "Client output failed");
                    failures.push(format!("client {}: {}", client, e));
                }
            }
        }

        if failures.is_empty() {
            DomainOutcome::Completed { files }
        } else {
            DomainOutcome::Failed {
                error: failures.join("; "),
            }
        }
    }

    async fn run_client(
        &self,
        domain: Domain,
        client: &str,
        parameters: &[ExtractionParameter],
        context: Option<Sheet>,
        param_file: &Path,
    ) -> Result<Vec<PathBuf>, report::OutputError> {
        info!(domain = %domain, client = %client, pairs = parameters.len(), "Processing client");

        let paths = OutputPaths::new(self.config.output_dir(), client, domain);

        let extractor = Extractor::new(domain, self.agent.clone()).with_context(context);
        let table = extractor.extract(parameters).await;
        let metadata = RunMetadata::new(client, parameters, &table, param_file);
        report::write_extracted(&paths.extracted, &table, &metadata)?;

        let analyzer = DeviationAnalyzer::new(domain, self.agent.clone())
            .with_batch_size(self.config.analysis_batch_size);
        let analysis = analyzer.analyze_with_check(&table).await;
        report::write_analysis(&paths.analysis, &table, &analysis, &metadata.with_analysis(&analysis))?;

        Ok(vec![paths.extracted, paths.analysis])
    }
}

/// Group parameters by client, merging clients whose names sanitize to the
/// same output file name. The first raw name seen labels the group.
fn group_by_output_name(parameters: &[ExtractionParameter]) -> Vec<(String, Vec<ExtractionParameter>)> {
    let mut groups: Vec<(String, String, Vec<ExtractionParameter>)> = Vec::new();

    for (client, client_params) in ingest::group_by_client(parameters) {
        let file_name = report::sanitize_client_name(&client);
        match groups.iter_mut().find(|(_, existing, _)| *existing == file_name) {
            Some((first, _, group)) => {
                warn!(
                    client = %client,
                    merged_into = %first,
                    "Client names map to the same output files, processing together"
                );
                group.extend(client_params);
            }
            None => groups.push((client, file_name, client_params)),
        }
    }

    groups
        .into_iter()
        .map(|(client, _, params)| (client, params))
        .collect()
}
