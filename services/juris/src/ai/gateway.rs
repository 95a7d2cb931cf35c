//! services/juris/src/ai/gateway.rs
//!
//! Task-level entry points for the drafting AI. Every task builds its prompt,
//! goes through the retry loop and cleans the provider output; callers never
//! talk to the `AiProvider` port directly.

use std::sync::Arc;

use juris_core::domain::{
    Attachment, DefenseRequest, ExtractedCaseData, FilingMetadata, PetitionRequest,
};
use juris_core::ports::{AiProvider, GenerateRequest, PortError, PortResult, PromptPart};
use tracing::{debug, error, info, instrument};

use super::audio::prepare_audio;
use super::prompts;
use super::retry::{with_retry, RetryPolicy};
use super::text::{parse_json_or_default, strip_code_fences};
use crate::config::Config;

const MIN_KEY_LEN: usize = 10;

/// Whether `key` looks like a real credential rather than an empty or
/// truncated placeholder.
pub fn is_usable_key(key: Option<&str>) -> bool {
    key.map(|key| key.trim().len() > MIN_KEY_LEN).unwrap_or(false)
}

/// Rate-limit and quota failures are the only ones worth retrying.
pub fn is_quota_error(error: &PortError) -> bool {
    if matches!(error, PortError::RateLimited(_)) {
        return true;
    }
    let message = error.to_string().to_lowercase();
    message.contains("429") || message.contains("resource_exhausted") || message.contains("quota")
}

#[derive(Clone)]
pub struct AiGateway {
    provider: Arc<dyn AiProvider>,
    model: String,
    has_key: bool,
    policy: RetryPolicy,
}

impl AiGateway {
    pub fn new(
        provider: Arc<dyn AiProvider>,
        model: impl Into<String>,
        api_key: Option<&str>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            has_key: is_usable_key(api_key),
            policy,
        }
    }

    pub fn from_config(provider: Arc<dyn AiProvider>, config: &Config) -> Self {
        Self::new(
            provider,
            config.gemini_model.clone(),
            config.gemini_api_key.as_deref(),
            RetryPolicy::linear(config.ai_retry_attempts, config.ai_retry_base),
        )
    }

    pub fn has_key(&self) -> bool {
        self.has_key
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, parts: Vec<PromptPart>, json_output: bool) -> GenerateRequest {
        GenerateRequest {
            model: self.model.clone(),
            parts,
            system_instruction: Some(prompts::SYSTEM_INSTRUCTION.to_string()),
            json_output,
        }
    }

    /// Sends one task to the provider and returns the fence-stripped text.
    async fn call(&self, task: &'static str, parts: Vec<PromptPart>, json_output: bool) -> PortResult<String> {
        if !self.has_key {
            error!(task, "AI call refused: no usable API key configured.");
            return Err(PortError::MissingCredential);
        }

        let request = self.request(parts, json_output);
        let policy = &self.policy;
        let result = with_retry(
            |attempt| {
                debug!(task, attempt, "Dispatching AI request.");
                self.provider.generate(request.clone())
            },
            is_quota_error,
            policy.max_attempts,
            |attempt| policy.delay_for(attempt),
        )
        .await;

        match result {
            Ok(raw) => {
                info!(task, chars = raw.len(), "AI task completed.");
                Ok(strip_code_fences(&raw))
            }
            Err(failure) => {
                error!(task, attempts = failure.attempts(), "AI task failed: {}", failure);
                Err(failure.into_inner())
            }
        }
    }

    /// Reads case facts out of uploaded documents (PDFs or images).
    #[instrument(skip_all, fields(files = documents.len()))]
    pub async fn extract_data_from_document(
        &self,
        documents: &[Attachment],
    ) -> PortResult<ExtractedCaseData> {
        if documents.is_empty() {
            return Err(PortError::Validation(
                "Envie ao menos um documento para análise.".to_string(),
            ));
        }

        let mut parts: Vec<PromptPart> = documents
            .iter()
            .map(|doc| PromptPart::Inline {
                mime_type: doc.mime_type.clone(),
                data: doc.data.clone(),
            })
            .collect();
        parts.push(PromptPart::Text(prompts::extraction_prompt()));

        let text = self.call("extract_data", parts, true).await?;
        Ok(parse_json_or_default(&text))
    }

    pub async fn generate_legal_petition(&self, request: &PetitionRequest) -> PortResult<String> {
        let prompt = prompts::petition_prompt(request);
        self.call("generate_petition", vec![PromptPart::Text(prompt)], false)
            .await
    }

    pub async fn generate_legal_defense(&self, request: &DefenseRequest) -> PortResult<String> {
        let prompt = prompts::defense_prompt(request);
        self.call("generate_defense", vec![PromptPart::Text(prompt)], false)
            .await
    }

    /// Suggests the electronic filing form fields for a drafted document.
    pub async fn suggest_filing_metadata(&self, content: &str) -> PortResult<FilingMetadata> {
        let prompt = prompts::filing_metadata_prompt(content);
        let text = self
            .call("filing_metadata", vec![PromptPart::Text(prompt)], true)
            .await?;
        Ok(parse_json_or_default(&text))
    }

    pub async fn search_jurisprudence(&self, query: &str, area: Option<&str>) -> PortResult<String> {
        if query.trim().is_empty() {
            return Err(PortError::Validation("Informe o tema da pesquisa.".to_string()));
        }
        let prompt = prompts::jurisprudence_prompt(query, area);
        self.call("search_jurisprudence", vec![PromptPart::Text(prompt)], false)
            .await
    }

    /// Rewrites `content` following the lawyer's instructions.
    pub async fn refine_legal_petition(&self, content: &str, instructions: &str) -> PortResult<String> {
        if instructions.trim().is_empty() {
            return Err(PortError::Validation(
                "Descreva as alterações desejadas.".to_string(),
            ));
        }
        let prompt = prompts::refine_prompt(content, instructions);
        self.call("refine_petition", vec![PromptPart::Text(prompt)], false)
            .await
    }

    pub async fn transcribe_audio(&self, audio: Attachment) -> PortResult<String> {
        let audio = prepare_audio(audio)?;
        let parts = vec![
            PromptPart::Inline {
                mime_type: audio.mime_type,
                data: audio.data,
            },
            PromptPart::Text(prompts::TRANSCRIPTION_PROMPT.to_string()),
        ];
        self.call("transcribe_audio", parts, false).await
    }

    /// Counts the tokens `text` would consume as a prompt. Not retried.
    pub async fn count_tokens(&self, text: &str) -> PortResult<u32> {
        if !self.has_key {
            return Err(PortError::MissingCredential);
        }
        let request = self.request(vec![PromptPart::Text(text.to_string())], false);
        self.provider.count_tokens(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{gateway, ScriptedProvider, TEST_KEY as KEY};

    #[test]
    fn key_check_requires_a_plausible_credential() {
        assert!(!is_usable_key(None));
        assert!(!is_usable_key(Some("   ")));
        assert!(!is_usable_key(Some("short-key")));
        assert!(is_usable_key(Some(KEY)));
    }

    #[test]
    fn quota_classifier_matches_rate_limit_signatures() {
        assert!(is_quota_error(&PortError::RateLimited("slow down".into())));
        assert!(is_quota_error(&PortError::Unexpected("HTTP 429 Too Many Requests".into())));
        assert!(is_quota_error(&PortError::Unexpected("RESOURCE_EXHAUSTED".into())));
        assert!(is_quota_error(&PortError::Unexpected("Quota exceeded for metric".into())));
        assert!(!is_quota_error(&PortError::MissingCredential));
        assert!(!is_quota_error(&PortError::Unexpected("HTTP 500".into())));
    }

    #[tokio::test]
    async fn rate_limited_calls_use_exactly_the_configured_attempts() {
        let provider = ScriptedProvider::with(vec![
            Err(PortError::RateLimited("1".into())),
            Err(PortError::RateLimited("2".into())),
            Err(PortError::RateLimited("3".into())),
            Ok("<p>never reached</p>".into()),
        ]);

        let result = gateway(provider.clone())
            .generate_legal_petition(&PetitionRequest::default())
            .await;

        assert!(matches!(result, Err(PortError::RateLimited(_))));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn non_quota_errors_propagate_on_the_first_attempt() {
        let provider = ScriptedProvider::with(vec![
            Err(PortError::Unexpected("HTTP 500".into())),
            Ok("<p>never reached</p>".into()),
        ]);

        let result = gateway(provider.clone())
            .generate_legal_defense(&DefenseRequest::default())
            .await;

        assert!(matches!(result, Err(PortError::Unexpected(_))));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn drafting_returns_html_without_fences() {
        let provider = ScriptedProvider::with(vec![
            Err(PortError::RateLimited("busy".into())),
            Ok("```html\n<h1>PETIÇÃO INICIAL</h1>\n```".into()),
        ]);

        let html = gateway(provider.clone())
            .generate_legal_petition(&PetitionRequest::default())
            .await
            .unwrap();

        assert_eq!(html, "<h1>PETIÇÃO INICIAL</h1>");
        assert_eq!(provider.calls(), 2);
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests[0], requests[1]);
        assert_eq!(requests[0].model, "gemini-test");
        assert!(!requests[0].json_output);
        assert!(requests[0].system_instruction.is_some());
    }

    #[tokio::test]
    async fn malformed_json_resolves_to_defaults() {
        let provider = ScriptedProvider::with(vec![
            Ok("Desculpe, não consegui ler o documento.".into()),
            Ok("```json\n{ \"competence\": \n```".into()),
        ]);
        let gateway = gateway(provider.clone());
        let pdf = Attachment::new("inicial.pdf", "application/pdf", b"%PDF-1.4".to_vec());

        let extracted = gateway.extract_data_from_document(&[pdf]).await.unwrap();
        let metadata = gateway.suggest_filing_metadata("<p>peça</p>").await.unwrap();

        assert_eq!(extracted, ExtractedCaseData::default());
        assert_eq!(metadata, FilingMetadata::default());
        let requests = provider.requests.lock().unwrap();
        assert!(requests[0].json_output);
        assert!(matches!(requests[0].parts[0], PromptPart::Inline { .. }));
    }

    #[tokio::test]
    async fn missing_key_fails_fast_without_calling_the_provider() {
        let provider = ScriptedProvider::with(vec![Ok("<p>x</p>".into())]);
        let gateway = AiGateway::new(provider.clone(), "gemini-test", None, RetryPolicy::default());

        assert!(!gateway.has_key());
        let result = gateway.search_jurisprudence("dano moral bancário", None).await;
        assert!(matches!(result, Err(PortError::MissingCredential)));
        assert!(matches!(gateway.count_tokens("x").await, Err(PortError::MissingCredential)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn extraction_requires_documents() {
        let provider = ScriptedProvider::with(vec![]);
        let result = gateway(provider.clone()).extract_data_from_document(&[]).await;
        assert!(matches!(result, Err(PortError::Validation(_))));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn counts_tokens_through_the_provider() {
        let provider = ScriptedProvider::with(vec![]);
        assert_eq!(gateway(provider).count_tokens("texto longo").await.unwrap(), 42);
    }
}
