use extract::ExtractedRow;
use ingest::Domain;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

const ENV_WORD: &str = "development|dev|testing|test|tst|production|prod|prd";

static ENV_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b({ENV_WORD})\b")).expect("environment pattern is valid")
});

/// "No DEV and TEST ...", "missing PROD", "without DEV/TEST"
static NEGATED_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:no|missing|lacks?|lacking|without)\s+((?:{ENV_WORD})(?:(?:\s*[,/&]\s*|\s+(?:and|or)\s+)(?:{ENV_WORD}))*)\b"
    ))
    .expect("negated environment pattern is valid")
});

/// Phrasing that lists the environments a system has
static PRESENT_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(only|present|found|exists?|has|have)\b").expect("present pattern is valid")
});

/// The three environments every system is required to have
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Environment {
    Dev,
    Test,
    Prod,
}

impl Environment {
    pub const REQUIRED: [Environment; 3] = [Environment::Dev, Environment::Test, Environment::Prod];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "DEV",
            Environment::Test => "TEST",
            Environment::Prod => "PROD",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEV" | "DEVELOPMENT" => Ok(Environment::Dev),
            "TEST" | "TST" | "TESTING" => Ok(Environment::Test),
            "PROD" | "PRD" | "PRODUCTION" => Ok(Environment::Prod),
            _ => Err(()),
        }
    }
}

/// Every required environment named in free text
pub fn environments_in(text: &str) -> BTreeSet<Environment> {
    ENV_TOKEN
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

/// Recover the missing set from a free-text reason. Environments named after
/// a negation are missing; a reason that only lists what is present yields
/// the complement. Anything else gives an empty set, which the local
/// coverage check then reports as a disagreement.
pub fn missing_from_reason(reason: &str) -> BTreeSet<Environment> {
    let negated: BTreeSet<Environment> = NEGATED_LIST
        .captures_iter(reason)
        .flat_map(|c| environments_in(&c[1]))
        .collect();
    if !negated.is_empty() {
        return negated;
    }

    if PRESENT_HINT.is_match(reason) {
        let present = environments_in(reason);
        if !present.is_empty() {
            return Environment::REQUIRED
                .into_iter()
                .filter(|env| !present.contains(env))
                .collect();
        }
    }

    BTreeSet::new()
}

pub fn format_environments(envs: &BTreeSet<Environment>) -> String {
    envs.iter().map(Environment::as_str).collect::<Vec<_>>().join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviationStatus {
    Deviation,
    #[serde(rename = "OK")]
    Ok,
    Unknown,
}

impl DeviationStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "deviation" | "exception" => DeviationStatus::Deviation,
            "ok" | "compliant" => DeviationStatus::Ok,
            _ => DeviationStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviationStatus::Deviation => "Deviation",
            DeviationStatus::Ok => "OK",
            DeviationStatus::Unknown => "Unknown",
        }
    }
}

/// The agent's verdict for one system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationRow {
    pub system_name: String,
    pub status: DeviationStatus,
    pub missing_environments: BTreeSet<Environment>,
    pub explanation: String,
}

pub const SYSTEM_FIELD: &str = "System_Name";
pub const REASON_FIELD: &str = "Reason";
pub const MISSING_FIELD: &str = "Missing_Environments";

impl DeviationRow {
    /// Map one parsed reply row. Returns `None` when the row names no system.
    ///
    /// The missing set comes from an explicit `Missing_Environments` field
    /// when present, otherwise from the reason's wording.
    pub fn from_reply(domain: Domain, row: &ExtractedRow) -> Option<Self> {
        let system_name = row.value(SYSTEM_FIELD)?.to_string();
        let explanation = row.value(REASON_FIELD).unwrap_or_default().to_string();

        let mut status = row
            .value(domain.status_column())
            .or_else(|| row.value("Status"))
            .map(DeviationStatus::parse)
            .unwrap_or(DeviationStatus::Unknown);

        let missing_environments = match status {
            DeviationStatus::Ok => BTreeSet::new(),
            _ => match row.value(MISSING_FIELD) {
                Some(explicit) => environments_in(explicit),
                None => missing_from_reason(&explanation),
            },
        };

        if status == DeviationStatus::Unknown && !missing_environments.is_empty() {
            status = DeviationStatus::Deviation;
        }

        Some(Self {
            system_name,
            status,
            missing_environments,
            explanation,
        })
    }

    pub fn is_deviation(&self) -> bool {
        self.status == DeviationStatus::Deviation
    }
}
