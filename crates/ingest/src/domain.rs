use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the five analysis dimensions of the environment segregation review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Environment,
    Database,
    Server,
    UrlEndpoint,
    CloudResource,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Domain::Environment,
        Domain::Database,
        Domain::Server,
        Domain::UrlEndpoint,
        Domain::CloudResource,
    ];

    /// Short key used on the command line and in parameter file names
    pub fn key(&self) -> &'static str {
        match self {
            Domain::Environment => "env",
            Domain::Database => "db",
            Domain::Server => "server",
            Domain::UrlEndpoint => "url",
            Domain::CloudResource => "cloud",
        }
    }

    /// Label embedded in output file names, e.g. `Acme_Environment_Data.xlsx`
    pub fn label(&self) -> &'static str {
        match self {
            Domain::Environment => "Environment",
            Domain::Database => "Database",
            Domain::Server => "Server",
            Domain::UrlEndpoint => "URL_Endpoint",
            Domain::CloudResource => "Cloud_Resource",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Domain::Environment => "Environment Register",
            Domain::Database => "Database",
            Domain::Server => "Server",
            Domain::UrlEndpoint => "URL Endpoint",
            Domain::CloudResource => "Cloud Resource",
        }
    }

    /// Sheet holding this domain's rows, both in the input data workbook and
    /// in the extracted-data workbook.
    pub fn data_sheet(&self) -> &'static str {
        match self {
            Domain::Environment => "Environment_Register",
            Domain::Database => "Database_Instance_Mapping",
            Domain::Server => "Server_Instance_Mapping",
            Domain::UrlEndpoint => "URL_Endpoint_Mapping",
            Domain::CloudResource => "Cloud_Resource_Inventory",
        }
    }

    pub fn expected_columns(&self) -> &'static [&'static str] {
        match self {
            Domain::Environment => &["Env-ID", "System Name", "Environment Type"],
            Domain::Database => &[
                "System Name",
                "Environment Type",
                "Database Name",
                "Database Instance",
            ],
            Domain::Server => &[
                "System Name",
                "Environment Type",
                "Server/Instance ID",
                "Hostname",
            ],
            Domain::UrlEndpoint => &["System Name", "Environment Type", "URL"],
            Domain::CloudResource => &[
                "System Name",
                "Environment Type",
                "Cloud Provider",
                "Resource ID",
            ],
        }
    }

    /// Verdict column the deviation analysis reports per system
    pub fn status_column(&self) -> &'static str {
        match self {
            Domain::Environment => "Environment_DTAP",
            Domain::Database => "Database_Config",
            Domain::Server => "Server_Config",
            Domain::UrlEndpoint => "URL_Config",
            Domain::CloudResource => "Cloud_Config",
        }
    }

    pub fn extractor_name(&self) -> String {
        format!("{}DataExtractor", self.label().replace('_', ""))
    }

    pub fn analyzer_name(&self) -> String {
        format!("{}DeviationAnalyzer", self.label().replace('_', ""))
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
