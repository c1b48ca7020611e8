use ingest::Domain;

pub fn analysis_instructions(domain: Domain) -> String {
    format!(
        "You are an expert IT {} analyst specializing in compliance and environment segregation.",
        domain.display_name().to_lowercase()
    )
}

pub fn build_analysis_prompt(domain: Domain, systems_json: &str) -> String {
    let status = domain.status_column();
    format!(
        r#"Analyze the following system {area} environment data:

{systems_json}

TASK:
For each System Name, check ONLY if it has all three required environments: DEV, TEST, and PROD.

INSTRUCTIONS:
1. For each system, look at the boolean fields 'Has DEV', 'Has TEST', and 'Has PROD'.
2. If all three are True, mark the system as "OK" with reason "DEV, TEST, PROD environments are present".
3. If any are False, mark it as "Deviation" with the reason "No [ENVIRONMENT] environment available".
4. If multiple environments are missing, list all missing environments in the reason.

REQUIRED OUTPUT FORMAT:
A JSON array containing one object for each System Name, with these exact fields:
- System_Name: The system name
- {status}: Either "Deviation" or "OK"
- Missing_Environments: Array of the missing environments, empty if OK
- Reason: The reason for deviation, or "DEV, TEST, PROD environments are present" if OK

EXAMPLES:
{{"System_Name": "Workday Payroll", "{status}": "OK", "Missing_Environments": [], "Reason": "DEV, TEST, PROD environments are present"}}
{{"System_Name": "SAP FI", "{status}": "Deviation", "Missing_Environments": ["TEST"], "Reason": "No TEST environment available"}}
{{"System_Name": "Oracle EBS AP", "{status}": "Deviation", "Missing_Environments": ["DEV", "TEST"], "Reason": "No DEV and TEST environments available"}}

CRITICAL:
- Focus ONLY on the presence of environment types (DEV, TEST, PROD)
- Analyze EVERY System Name in the input data
- Return ONLY the JSON array with no additional text"#,
        area = domain.display_name().to_lowercase(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_names_domain_status_column() {
        let prompt = build_analysis_prompt(Domain::Server, r#"[{"System Name": "Billing"}]"#);
        assert!(prompt.contains("- Server_Config: Either"));
        assert!(prompt.contains(r#"[{"System Name": "Billing"}]"#));
        assert!(prompt.contains(r#"{"System_Name": "SAP FI", "Server_Config": "Deviation""#));
    }
}
