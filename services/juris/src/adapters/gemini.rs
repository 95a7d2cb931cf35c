//! services/juris/src/adapters/gemini.rs
//!
//! This module contains the adapter for the Gemini generative-AI REST API.
//! It implements the `AiProvider` port from the `core` crate.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use juris_core::ports::{AiProvider, GenerateRequest, PortError, PortResult, PromptPart};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

//=========================================================================================
// Wire types
//=========================================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum WirePart {
    Text(String),
    InlineData(InlineData),
}

#[derive(Serialize)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<WirePart>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct Candidate {
    content: ResponseContent,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct GenerateResponse {
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountTokensResponse {
    total_tokens: u32,
}

fn wire_parts(parts: &[PromptPart]) -> Vec<WirePart> {
    parts
        .iter()
        .map(|part| match part {
            PromptPart::Text(text) => WirePart::Text(text.clone()),
            PromptPart::Inline { mime_type, data } => WirePart::InlineData(InlineData {
                mime_type: mime_type.clone(),
                data: STANDARD.encode(data),
            }),
        })
        .collect()
}

fn generate_body(request: &GenerateRequest) -> GenerateBody {
    GenerateBody {
        contents: vec![WireContent {
            role: Some("user"),
            parts: wire_parts(&request.parts),
        }],
        system_instruction: request.system_instruction.as_ref().map(|text| WireContent {
            role: None,
            parts: vec![WirePart::Text(text.clone())],
        }),
        generation_config: request.json_output.then_some(GenerationConfig {
            response_mime_type: "application/json",
        }),
    }
}

/// Concatenates the text parts of the first candidate.
fn response_text(response: GenerateResponse) -> PortResult<String> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(PortError::Validation(format!(
            "O provedor de IA bloqueou a solicitação ({})",
            reason
        )));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| PortError::Unexpected("Gemini returned no candidates.".to_string()))?;

    let text: String = candidate
        .content
        .parts
        .into_iter()
        .filter_map(|part| part.text)
        .collect();

    if text.trim().is_empty() {
        return Err(PortError::Unexpected(format!(
            "Gemini response contained no text (finish reason: {}).",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(text)
}

/// Maps a failed response to a port error. Quota failures stay
/// distinguishable so the gateway can retry them.
fn map_error(status: StatusCode, body: &str) -> PortError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(300).collect());

    if status == StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED") {
        return PortError::RateLimited(message);
    }
    if body.contains("API_KEY_INVALID") || body.contains("API key not valid") {
        return PortError::MissingCredential;
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized(message),
        StatusCode::BAD_REQUEST => PortError::Validation(message),
        _ => PortError::Unexpected(format!("HTTP {}: {}", status, message)),
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `AiProvider` against the Gemini REST API.
#[derive(Clone)]
pub struct GeminiAdapter {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

impl GeminiAdapter {
    /// Creates a new `GeminiAdapter`.
    pub fn new(http: reqwest::Client, api_base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        model: &str,
        action: &str,
        body: &T,
    ) -> PortResult<reqwest::Response> {
        let api_key = self.api_key.as_deref().ok_or(PortError::MissingCredential)?;
        let url = format!("{}/models/{}:{}", self.api_base, model, action);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini request failed: {}", e);
                PortError::Unexpected(e.to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(map_error(status, &body))
    }
}

//=========================================================================================
// `AiProvider` Trait Implementation
//=========================================================================================

#[async_trait]
impl AiProvider for GeminiAdapter {
    async fn generate(&self, request: GenerateRequest) -> PortResult<String> {
        debug!(model = %request.model, parts = request.parts.len(), json = request.json_output, "Calling Gemini.");
        let response: GenerateResponse = self
            .post(&request.model, "generateContent", &generate_body(&request))
            .await?
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("malformed Gemini response: {}", e)))?;
        response_text(response)
    }

    async fn count_tokens(&self, request: GenerateRequest) -> PortResult<u32> {
        let body = serde_json::json!({ "contents": generate_body(&request).contents });
        let response: CountTokensResponse = self
            .post(&request.model, "countTokens", &body)
            .await?
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("malformed countTokens response: {}", e)))?;
        Ok(response.total_tokens)
    }
}
