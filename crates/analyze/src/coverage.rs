use extract::ExtractionTable;
use extract::schema::{ENVIRONMENT_COLUMN, SYSTEM_COLUMN};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::schema::{DeviationRow, DeviationStatus, Environment};

/// Which environments a system has in the extracted table. Serialized with
/// the field names the analysis prompt refers to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemCoverage {
    #[serde(rename = "System Name")]
    pub system_name: String,
    #[serde(rename = "Environment Types")]
    pub environment_types: Vec<String>,
    #[serde(rename = "Has DEV")]
    pub has_dev: bool,
    #[serde(rename = "Has TEST")]
    pub has_test: bool,
    #[serde(rename = "Has PROD")]
    pub has_prod: bool,
}

impl SystemCoverage {
    fn new(system_name: &str) -> Self {
        Self {
            system_name: system_name.to_string(),
            environment_types: Vec::new(),
            has_dev: false,
            has_test: false,
            has_prod: false,
        }
    }

    fn record(&mut self, environment_type: &str) {
        let value = environment_type.trim().to_uppercase();
        if value.is_empty() || self.environment_types.contains(&value) {
            return;
        }
        match value.parse::<Environment>() {
            Ok(Environment::Dev) => self.has_dev = true,
            Ok(Environment::Test) => self.has_test = true,
            Ok(Environment::Prod) => self.has_prod = true,
            Err(()) => {}
        }
        self.environment_types.push(value);
    }

    /// Set difference against {DEV, TEST, PROD}
    pub fn missing(&self) -> BTreeSet<Environment> {
        Environment::REQUIRED
            .into_iter()
            .filter(|env| match env {
                Environment::Dev => !self.has_dev,
                Environment::Test => !self.has_test,
                Environment::Prod => !self.has_prod,
            })
            .collect()
    }
}

/// One entry per system, first-seen order. Rows without a system name are
/// ignored.
pub fn summarize(table: &ExtractionTable) -> Vec<SystemCoverage> {
    let mut systems: Vec<SystemCoverage> = Vec::new();

    for row in table.rows() {
        let Some(name) = row.value(SYSTEM_COLUMN) else {
            continue;
        };

        let index = match systems
            .iter()
            .position(|s| s.system_name.eq_ignore_ascii_case(name))
        {
            Some(index) => index,
            None => {
                systems.push(SystemCoverage::new(name));
                systems.len() - 1
            }
        };

        if let Some(env) = row.value(ENVIRONMENT_COLUMN) {
            systems[index].record(env);
        }
    }

    systems
}

/// A system where the agent's verdict and the local check disagree
#[derive(Debug, Clone, PartialEq)]
pub struct Disagreement {
    pub system_name: String,
    pub locally_missing: BTreeSet<Environment>,
    pub agent_verdict: Option<DeviationRow>,
}

/// Compare the agent's rows against the local coverage. A system the agent
/// did not report at all counts as a disagreement.
pub fn cross_check(coverage: &[SystemCoverage], rows: &[DeviationRow]) -> Vec<Disagreement> {
    coverage
        .iter()
        .filter_map(|system| {
            let locally_missing = system.missing();
            let verdict = rows
                .iter()
                .find(|r| r.system_name.trim().eq_ignore_ascii_case(&system.system_name));

            let agrees = match verdict {
                None => false,
                Some(row) => match row.status {
                    DeviationStatus::Ok => locally_missing.is_empty(),
                    DeviationStatus::Deviation => {
                        !locally_missing.is_empty()
                            && (row.missing_environments.is_empty()
                                || row.missing_environments == locally_missing)
                    }
                    DeviationStatus::Unknown => false,
                },
            };

            (!agrees).then(|| Disagreement {
                system_name: system.system_name.clone(),
                locally_missing,
                agent_verdict: verdict.cloned(),
            })
        })
        .collect()
}
