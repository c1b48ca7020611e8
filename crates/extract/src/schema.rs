use ingest::Domain;
use serde::{Deserialize, Serialize};

pub const CLIENT_COLUMN: &str = "Client Name";
pub const SYSTEM_COLUMN: &str = "System Name";
pub const ENVIRONMENT_COLUMN: &str = "Environment Type";

/// Column names compare equal ignoring case, surrounding whitespace and
/// `_` vs space, so `System_Name` and `system name` hit the same column.
pub fn same_column(a: &str, b: &str) -> bool {
    normalize_column(a) == normalize_column(b)
}

fn normalize_column(name: &str) -> String {
    name.trim().replace('_', " ").to_lowercase()
}

/// One row the agent returned, as ordered column -> value cells
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRow {
    cells: Vec<(String, String)>,
}

impl ExtractedRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut row = Self::new();
        for (k, v) in pairs {
            row.set(k, v);
        }
        row
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(k, _)| same_column(k, column))
            .map(|(_, v)| v.as_str())
    }

    /// Value of a column, treating blank cells as absent
    pub fn value(&self, column: &str) -> Option<&str> {
        self.get(column).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.cells.iter_mut().find(|(k, _)| same_column(k, &column)) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Rows extracted for one domain in one run, in pair-processing order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionTable {
    pub domain: Domain,
    columns: Vec<String>,
    rows: Vec<ExtractedRow>,
}

impl ExtractionTable {
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            columns: domain.expected_columns().iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row. Cell names are mapped onto existing columns; unknown
    /// columns are added in first-seen order.
    pub fn push(&mut self, row: ExtractedRow) {
        let mut canonical = ExtractedRow::new();
        for (column, value) in row.cells {
            let name = match self.columns.iter().find(|c| same_column(c, &column)) {
                Some(existing) => existing.clone(),
                None => {
                    self.columns.push(column.clone());
                    column
                }
            };
            canonical.set(name, value);
        }
        self.rows.push(canonical);
    }

    pub fn extend(&mut self, rows: impl IntoIterator<Item = ExtractedRow>) {
        for row in rows {
            self.push(row);
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[ExtractedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct system names, first-seen order
    pub fn system_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for row in &self.rows {
            if let Some(name) = row.value(SYSTEM_COLUMN) {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        names
    }

    /// Tab-separated dump of the table, header first. Stable across runs for
    /// the same rows, used for the metadata hash total.
    pub fn to_text(&self) -> String {
        let mut text = self.columns.join("\t");
        for row in &self.rows {
            text.push('\n');
            let cells: Vec<&str> = self
                .columns
                .iter()
                .map(|c| row.get(c).unwrap_or(""))
                .collect();
            text.push_str(&cells.join("\t"));
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_lookup_ignores_spelling() {
        let mut row = ExtractedRow::from_pairs([("System_Name", "Billing"), ("environment type", "DEV")]);
        assert_eq!(row.get("System Name"), Some("Billing"));
        assert_eq!(row.value("Environment Type"), Some("DEV"));

        row.set("SYSTEM NAME", "Payroll");
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("system_name"), Some("Payroll"));
    }

    #[test]
    fn test_table_canonicalizes_columns() {
        let mut table = ExtractionTable::new(Domain::Server);
        table.push(ExtractedRow::from_pairs([
            ("System_Name", "Billing"),
            ("Environment_Type", "DEV"),
            ("Owner", "ops"),
        ]));
        table.push(ExtractedRow::from_pairs([("system name", "Billing"), ("Region", "eu")]));

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.columns(),
            &["System Name", "Environment Type", "Server/Instance ID", "Hostname", "Owner", "Region"]
        );
        assert_eq!(table.rows()[0].columns().next(), Some("System Name"));
        assert_eq!(table.system_names(), vec!["Billing".to_string()]);
    }

    #[test]
    fn test_text_dump_is_column_aligned() {
        let mut table = ExtractionTable::new(Domain::UrlEndpoint);
        table.push(ExtractedRow::from_pairs([("URL", "https://x"), ("System Name", "CRM")]));
        let text = table.to_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "System Name\tEnvironment Type\tURL");
        assert_eq!(lines[1], "CRM\t\thttps://x");
    }
}
