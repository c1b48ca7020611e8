use ingest::{Domain, ExtractionParameter, Sheet};

use tracing::info;

use crate::schema::SYSTEM_COLUMN;

/// Context rows sent per request. Larger contexts are split across several
/// requests for the same pair.
pub const MAX_CONTEXT_ROWS: usize = 200;

pub fn extraction_instructions(domain: Domain) -> String {
    format!(
        "You are an expert in IT {} environment analysis. You extract inventory records \
         exactly as they appear in the source data and never invent values.",
        domain.display_name().to_lowercase()
    )
}

/// One prompt per page of context rows; a single prompt when the context is
/// missing, empty or fits in one page.
pub fn build_extraction_prompts(domain: Domain, param: &ExtractionParameter, context: Option<&Sheet>) -> Vec<String> {
    let Some(sheet) = context else {
        return vec![render(
            domain,
            param,
            "SOURCE DATA: not provided. Use the inventory available to you.",
        )];
    };

    let rows = context_rows(sheet, param);
    if rows.is_empty() {
        let source = format!(
            "SOURCE DATA: the {} sheet has no records for this system.",
            domain.data_sheet()
        );
        return vec![render(domain, param, &source)];
    }

    let total = rows.len();
    let pages = rows.chunks(MAX_CONTEXT_ROWS).count();
    if pages > 1 {
        info!(
            domain = %domain,
            client = %param.client_name,
            system = %param.system_name,
            records = total,
            requests = pages,
            "Context split across several requests"
        );
    }

    rows.chunks(MAX_CONTEXT_ROWS)
        .enumerate()
        .map(|(page, chunk)| {
            let records = Sheet {
                name: sheet.name.clone(),
                headers: sheet.headers.clone(),
                rows: chunk.to_vec(),
            }
            .to_json_records();

            let header = if pages == 1 {
                format!("SOURCE DATA (sheet {}, {} records):", domain.data_sheet(), total)
            } else {
                let first = page * MAX_CONTEXT_ROWS + 1;
                format!(
                    "SOURCE DATA (sheet {}, records {}-{} of {}; the other records are sent in separate requests, extract only the records below):",
                    domain.data_sheet(),
                    first,
                    first + chunk.len() - 1,
                    total
                )
            };
            render(domain, param, &format!("{}\n{}", header, records))
        })
        .collect()
}

fn render(domain: Domain, param: &ExtractionParameter, source: &str) -> String {
    let columns = domain
        .expected_columns()
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ");

    let scope = if param.is_all_systems() {
        format!("every system that belongs to client \"{}\"", param.client_name)
    } else {
        format!("the system \"{}\" of client \"{}\"", param.system_name, param.client_name)
    };

    format!(
        r#"Extract the {domain} inventory for {scope}.

INSTRUCTIONS:
1. Return one record per {domain} entry and environment (DEV, TEST, PROD, ...)
2. Use the Environment Type values exactly as found, in upper case
3. Keep any additional columns present in the source data
4. If nothing is found, return an empty array []

REQUIRED OUTPUT FORMAT:
A JSON array of objects with at least these fields: {columns}
Output ONLY the JSON array, no markdown, no explanations.

{source}

JSON OUTPUT:"#,
        domain = domain.display_name(),
    )
}

/// Rows of the source sheet relevant to the parameter
fn context_rows(sheet: &Sheet, param: &ExtractionParameter) -> Vec<Vec<String>> {
    match (param.is_all_systems(), sheet.column_index(SYSTEM_COLUMN)) {
        (false, Some(col)) => sheet
            .rows
            .iter()
            .filter(|row| {
                row.get(col)
                    .is_some_and(|name| name.trim().eq_ignore_ascii_case(param.system_name.trim()))
            })
            .cloned()
            .collect(),
        _ => sheet.rows.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory() -> Sheet {
        Sheet {
            name: "Server_Instance_Mapping".to_string(),
            headers: vec!["System Name".into(), "Environment Type".into(), "Hostname".into()],
            rows: vec![
                vec!["Billing".into(), "DEV".into(), "bill-d1".into()],
                vec!["Payroll".into(), "PROD".into(), "pay-p1".into()],
            ],
        }
    }

    #[test]
    fn test_prompt_filters_context_to_system() {
        let sheet = inventory();
        let param = ExtractionParameter::new("Acme", "billing");
        let prompts = build_extraction_prompts(Domain::Server, &param, Some(&sheet));
        assert_eq!(prompts.len(), 1);
        let prompt = &prompts[0];

        assert!(prompt.contains("the system \"billing\" of client \"Acme\""));
        assert!(prompt.contains("bill-d1"));
        assert!(!prompt.contains("pay-p1"));
        assert!(prompt.contains("\"Server/Instance ID\""));
    }

    #[test]
    fn test_prompt_for_all_systems_keeps_every_row() {
        let sheet = inventory();
        let param = ExtractionParameter::new("Acme", "All");
        let prompts = build_extraction_prompts(Domain::Server, &param, Some(&sheet));
        assert_eq!(prompts.len(), 1);
        let prompt = &prompts[0];

        assert!(prompt.contains("every system that belongs to client \"Acme\""));
        assert!(prompt.contains("bill-d1") && prompt.contains("pay-p1"));
    }

    #[test]
    fn test_prompt_without_context() {
        let param = ExtractionParameter::new("Acme", "CRM");
        let prompts = build_extraction_prompts(Domain::UrlEndpoint, &param, None);
        assert!(prompts[0].contains("not provided"));

        let prompts = build_extraction_prompts(Domain::Server, &param, Some(&inventory()));
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("has no records for this system"));
    }

    #[test]
    fn test_large_context_is_split_not_cut() {
        let sheet = Sheet {
            name: "Server_Instance_Mapping".to_string(),
            headers: vec!["System Name".into(), "Hostname".into()],
            rows: (0..250)
                .map(|i| vec![format!("sys-{}", i), format!("host-{}", i)])
                .collect(),
        };
        let param = ExtractionParameter::new("Acme", "All");
        let prompts = build_extraction_prompts(Domain::Server, &param, Some(&sheet));

        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("records 1-200 of 250"));
        assert!(prompts[0].contains("\"host-199\""));
        assert!(!prompts[0].contains("\"host-200\""));
        assert!(prompts[1].contains("records 201-250 of 250"));
        assert!(prompts[1].contains("\"host-249\""));
    }
}
