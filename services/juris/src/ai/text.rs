//! services/juris/src/ai/text.rs
//!
//! Post-processing for raw provider output.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::warn;

static FENCED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z]*[ \t]*\r?\n?(.*?)\s*```\s*$").expect("valid fence pattern")
});

/// Removes the markdown code fence the provider sometimes wraps around HTML
/// or JSON.
pub fn strip_code_fences(text: &str) -> String {
    if let Some(captures) = FENCED.captures(text) {
        return captures[1].trim().to_string();
    }
    text.replace("```html", "")
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Parses provider JSON, falling back to `T::default()` when the text is not
/// the expected document. Prose around a single object is tolerated.
pub fn parse_json_or_default<T>(text: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let cleaned = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str::<T>(&cleaned) {
        return value;
    }

    let embedded = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(&cleaned[start..=end]),
        _ => None,
    };
    match embedded.map(serde_json::from_str::<T>) {
        Some(Ok(value)) => value,
        Some(Err(error)) => {
            warn!(error = %error, "AI returned malformed JSON; using defaults.");
            T::default()
        }
        None => {
            warn!("AI returned no JSON object; using defaults.");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use juris_core::domain::{ExtractedCaseData, FilingMetadata};

    #[test]
    fn strips_html_fence() {
        let raw = "```html\n<h1>PETIÇÃO INICIAL</h1>\n<p>Texto</p>\n```";
        assert_eq!(strip_code_fences(raw), "<h1>PETIÇÃO INICIAL</h1>\n<p>Texto</p>");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        assert_eq!(strip_code_fences("  <p>ok</p>\n"), "<p>ok</p>");
    }

    #[test]
    fn removes_stray_fences() {
        assert_eq!(strip_code_fences("Segue:\n```html\n<p>x</p>"), "Segue:\n\n<p>x</p>");
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n{\"plaintiffName\": \"Ana Souza\", \"relevantDates\": [\"01/02/2024\"]}\n```";
        let data: ExtractedCaseData = parse_json_or_default(raw);
        assert_eq!(data.plaintiff_name, "Ana Souza");
        assert_eq!(data.relevant_dates, vec!["01/02/2024".to_string()]);
        assert_eq!(data.defendant_name, "");
    }

    #[test]
    fn tolerates_prose_around_the_object() {
        let raw = "Aqui estão os dados: {\"competence\": \"Vara Cível de Campinas\"} Espero ter ajudado.";
        let data: FilingMetadata = parse_json_or_default(raw);
        assert_eq!(data.competence, "Vara Cível de Campinas");
    }

    #[test]
    fn null_fields_keep_the_rest_of_the_extraction() {
        let raw = r#"{"plaintiffName":"Ana Souza","defendantName":"Banco X","factsSummary":"Cobrança indevida.","plaintiffAddress":null,"claimedValue":null,"relevantDates":null}"#;
        let data: ExtractedCaseData = parse_json_or_default(raw);
        assert_eq!(data.plaintiff_name, "Ana Souza");
        assert_eq!(data.defendant_name, "Banco X");
        assert_eq!(data.facts_summary, "Cobrança indevida.");
        assert_eq!(data.plaintiff_address, "");
        assert_eq!(data.claimed_value, None);
        assert!(data.relevant_dates.is_empty());
        assert!(!data.is_empty());
    }

    #[test]
    fn numeric_claim_values_are_accepted() {
        let raw = r#"{"competence":"Vara Cível","claimValue":5000.0,"mainSubject":null,"freeJusticeRequested":"sim"}"#;
        let data: FilingMetadata = parse_json_or_default(raw);
        assert_eq!(data.competence, "Vara Cível");
        assert_eq!(data.claim_value.as_deref(), Some("5000.0"));
        assert_eq!(data.main_subject, "");
        assert!(data.free_justice_requested);

        let data: ExtractedCaseData = parse_json_or_default(r#"{"defendantName":"Loja","claimedValue":1200}"#);
        assert_eq!(data.claimed_value.as_deref(), Some("1200"));
    }

    #[test]
    fn malformed_json_yields_defaults() {
        let data: ExtractedCaseData = parse_json_or_default("Não consegui ler o documento.");
        assert_eq!(data, ExtractedCaseData::default());

        let data: FilingMetadata = parse_json_or_default("{\"competence\": ");
        assert_eq!(data, FilingMetadata::default());
    }
}
