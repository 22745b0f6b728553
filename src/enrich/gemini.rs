//! Gemini `generateContent` client for transcription and image description.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EnrichmentConfig;
use crate::error::{ArchiveError, Result};

use super::timeouts::enrichment_timeout;
use super::{decode_plain_text, is_plain_text, Enricher};

const TRANSCRIBE_PROMPT: &str = "Please extract and transcribe all text content from this document. \
Maintain the structure and formatting as much as possible. If this is a handwritten document, \
transcribe the handwriting. Provide only the transcribed text without any additional commentary.";

const DESCRIBE_PROMPT: &str = "Analyze this image and provide a detailed description. Include: \
1) What is visible in the image, 2) Any text or writing visible, 3) The approximate time period \
or era (if determinable), 4) Any notable people, places, or objects. Be thorough but concise.";

/// Sampling parameters for one kind of request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

/// Extraction: near-deterministic, long output.
pub const TRANSCRIBE_GENERATION: GenerationConfig = GenerationConfig {
    temperature: 0.1,
    top_k: 32,
    top_p: 1.0,
    max_output_tokens: 8192,
};

/// Description: a little more varied, shorter output.
pub const DESCRIBE_GENERATION: GenerationConfig = GenerationConfig {
    temperature: 0.4,
    top_k: 32,
    top_p: 1.0,
    max_output_tokens: 2048,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// `{base}/models/{model}:generateContent?key={key}`
pub fn generate_content_url(base_url: &str, model: &str, api_key: &str) -> String {
    format!(
        "{}/models/{}:generateContent?key={}",
        base_url.trim_end_matches('/'),
        model,
        api_key
    )
}

fn build_request(
    prompt: &str,
    mime_type: &str,
    bytes: &[u8],
    generation_config: GenerationConfig,
) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![RequestContent {
            parts: vec![
                RequestPart::Text {
                    text: prompt.to_string(),
                },
                RequestPart::InlineData {
                    inline_data: InlineData {
                        mime_type: mime_type.to_string(),
                        data: STANDARD.encode(bytes),
                    },
                },
            ],
        }],
        generation_config,
    }
}

/// Extract the first candidate's text from a successful response body.
pub fn parse_generate_content_response(body: &str) -> Result<String> {
    let parsed: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| ArchiveError::enrichment(format!("invalid generateContent json: {e}")))?;

    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ArchiveError::enrichment("no candidates in response"))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ArchiveError::enrichment("candidate contained no text"));
    }
    Ok(text)
}

/// Turn a non-success response into a readable failure.
fn error_from_status(status: reqwest::StatusCode, body: &str) -> ArchiveError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error.message)
        .unwrap_or_else(|| format!("HTTP {status}"));
    ArchiveError::EnrichmentFailure {
        reason: message,
        retryable: status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS,
    }
}

fn error_from_transport(e: reqwest::Error) -> ArchiveError {
    ArchiveError::EnrichmentFailure {
        retryable: e.is_timeout() || e.is_connect(),
        reason: if e.is_timeout() {
            "request timed out".to_string()
        } else {
            e.to_string()
        },
    }
}

/// HTTP client for the Gemini `generateContent` endpoint.
pub struct GeminiEnricher {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    base_timeout: Duration,
}

impl GeminiEnricher {
    pub fn new(base_url: String, model: String, api_key: String, base_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url,
            model,
            api_key,
            base_timeout,
        }
    }

    /// Build a client from configuration. Returns `None` without an API key.
    pub fn from_config(config: &EnrichmentConfig) -> Option<Self> {
        let api_key = config.resolved_api_key()?;
        Some(Self::new(
            config.api_url.clone(),
            config.model.clone(),
            api_key,
            Duration::from_secs(config.timeout_secs),
        ))
    }

    fn generate(
        &self,
        prompt: &str,
        mime_type: &str,
        bytes: &[u8],
        generation_config: GenerationConfig,
    ) -> Result<String> {
        let url = generate_content_url(&self.base_url, &self.model, &self.api_key);
        let request = build_request(prompt, mime_type, bytes, generation_config);
        let timeout = enrichment_timeout(self.base_timeout, bytes.len());

        debug!(
            model = %self.model,
            mime_type,
            bytes = bytes.len(),
            timeout_secs = timeout.as_secs(),
            "Calling generateContent"
        );

        let resp = self
            .client
            .post(url)
            .json(&request)
            .timeout(timeout)
            .send()
            .map_err(error_from_transport)?;

        let status = resp.status();
        let body = resp.text().map_err(error_from_transport)?;
        if !status.is_success() {
            return Err(error_from_status(status, &body));
        }
        parse_generate_content_response(&body)
    }
}

impl Enricher for GeminiEnricher {
    fn transcribe(&self, bytes: &[u8], mime_type: &str) -> Result<String> {
        if is_plain_text(mime_type) {
            return Ok(decode_plain_text(bytes));
        }
        self.generate(TRANSCRIBE_PROMPT, mime_type, bytes, TRANSCRIBE_GENERATION)
    }

    fn describe_image(&self, bytes: &[u8], mime_type: &str) -> Result<String> {
        self.generate(DESCRIBE_PROMPT, mime_type, bytes, DESCRIBE_GENERATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_content_url() {
        assert_eq!(
            generate_content_url("https://example.test/v1beta/", "gemini-x", "k"),
            "https://example.test/v1beta/models/gemini-x:generateContent?key=k"
        );
    }

    #[test]
    fn test_request_shape() {
        let req = build_request("Do it", "application/pdf", b"hi", TRANSCRIBE_GENERATION);
        let json = serde_json::to_value(&req).unwrap();
        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "Do it");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "application/pdf");
        assert_eq!(parts[1]["inline_data"]["data"], "aGk=");
        let cfg = &json["generationConfig"];
        assert_eq!(cfg["maxOutputTokens"], 8192);
        assert_eq!(cfg["topK"], 32);
    }

    #[test]
    fn test_describe_is_less_deterministic_and_shorter() {
        assert!(DESCRIBE_GENERATION.temperature > TRANSCRIBE_GENERATION.temperature);
        assert!(DESCRIBE_GENERATION.max_output_tokens < TRANSCRIBE_GENERATION.max_output_tokens);
    }

    #[test]
    fn test_parse_first_candidate() {
        let body = r#"{"candidates":[
            {"content":{"role":"model","parts":[{"text":"Dear "},{"text":"Mary"}]}},
            {"content":{"parts":[{"text":"ignored"}]}}
        ]}"#;
        assert_eq!(parse_generate_content_response(body).unwrap(), "Dear Mary");
    }

    #[test]
    fn test_parse_without_candidates_fails() {
        let err = parse_generate_content_response(r#"{"candidates":[]}"#).unwrap_err();
        assert!(matches!(err, ArchiveError::EnrichmentFailure { .. }));
        assert!(err.to_string().contains("no candidates"));
        assert!(parse_generate_content_response("{}").is_err());
        assert!(parse_generate_content_response("not json").is_err());
    }

    #[test]
    fn test_error_status_uses_service_message() {
        let err = error_from_status(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"error":{"code":400,"message":"API key not valid"}}"#,
        );
        assert!(err.to_string().contains("API key not valid"));
        assert!(!err.is_retryable());

        let err = error_from_status(reqwest::StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(err.to_string().contains("503"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_plain_text_skips_network() {
        // Unroutable endpoint: any network call would fail.
        let enricher = GeminiEnricher::new(
            "http://127.0.0.1:9".into(),
            "m".into(),
            "k".into(),
            Duration::from_millis(50),
        );
        let text = enricher.transcribe(b"Dear Mary,", "text/plain").unwrap();
        assert_eq!(text, "Dear Mary,");
    }
}
