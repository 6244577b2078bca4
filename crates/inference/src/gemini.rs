//! Gemini Inference Client
//!
//! Implements `InferenceProvider` against the generative-language HTTP API
//! using reqwest transport. One request carries the prompt, the base64 image
//! and the response-schema contract; the service replies with a JSON string
//! at `candidates[0].content.parts[0].text`.
//!
//! ## Retry policy
//!
//! Up to `max_attempts` total attempts (default 3). A non-success status, an
//! unparseable body, a missing content path and a schema-violating payload
//! all consume one attempt from the same budget. The delay before attempt
//! *k* is `backoff_base × 2^(k-2)` — none before the first attempt, 1× before
//! the second, 2× before the third. All transport failures are treated as
//! retryable; only the final attempt's error is surfaced.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use faunalens_core::config::InferenceSettings;

use crate::http_client::build_http_client;
use crate::provider::InferenceProvider;
use crate::schema::SchemaDescriptor;
use crate::types::{AnalysisPayload, InferenceError, InferenceResult};

/// Media types the service accepts for inline image data.
pub const ACCEPTED_MIME_TYPES: &[&str] = &["image/png", "image/jpeg"];

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    text: Option<String>,
}

// ---------------------------------------------------------------------------
// Client implementation
// ---------------------------------------------------------------------------

/// Inference client for the generative-language `generateContent` endpoint.
///
/// # Thread Safety
///
/// `Send + Sync` — the reqwest `Client` is internally arc'd and clone-safe,
/// and all fields are immutable after construction.
pub struct GeminiClient {
    /// The reqwest HTTP client.
    client: reqwest::Client,
    /// API key for authentication (sent as the `key` query parameter).
    api_key: String,
    /// Model name (e.g., "gemini-2.5-flash").
    model: String,
    /// API base URL.
    base_url: String,
    /// Total attempts per analyze call, including the first.
    max_attempts: u32,
    /// Base delay for the exponential backoff between attempts.
    backoff_base: Duration,
    /// Upper bound on accepted image payloads.
    max_image_bytes: usize,
}

impl GeminiClient {
    /// Create a new client from the resolved inference settings.
    pub fn new(settings: &InferenceSettings) -> Self {
        Self {
            client: build_http_client(),
            api_key: settings.api_key.clone().unwrap_or_default(),
            model: settings.model.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            max_attempts: settings.max_attempts.max(1),
            backoff_base: Duration::from_millis(settings.backoff_base_ms),
            max_image_bytes: settings.max_image_bytes,
        }
    }

    /// Full URL of the `generateContent` endpoint for the configured model.
    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Check the image preconditions before any network activity.
    fn validate_image(&self, image: &[u8], mime_type: &str) -> InferenceResult<()> {
        if image.is_empty() {
            return Err(InferenceError::EmptyImage);
        }
        if image.len() > self.max_image_bytes {
            return Err(InferenceError::ImageTooLarge {
                size_bytes: image.len(),
                max_bytes: self.max_image_bytes,
            });
        }
        if !ACCEPTED_MIME_TYPES.contains(&mime_type) {
            return Err(InferenceError::UnsupportedMediaType {
                mime_type: mime_type.to_string(),
            });
        }
        Ok(())
    }

    /// Build the JSON request body: prompt text, inline image data, and the
    /// schema contract in the generation config.
    fn build_request_body(
        &self,
        image: &[u8],
        mime_type: &str,
        schema: &SchemaDescriptor,
        prompt: &str,
    ) -> Value {
        serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {"text": prompt},
                    {"inlineData": {"mimeType": mime_type, "data": BASE64.encode(image)}},
                ],
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema.root(),
            },
        })
    }

    /// Delay applied before attempt `next_attempt` (1-based). No delay before
    /// the first attempt; doubles per subsequent attempt.
    pub fn backoff_delay(&self, next_attempt: u32) -> Duration {
        if next_attempt <= 1 {
            return Duration::ZERO;
        }
        self.backoff_base * 2u32.saturating_pow(next_attempt - 2)
    }

    /// Send one request and parse the response envelope.
    async fn post_generate(&self, body: &Value) -> InferenceResult<GenerateContentResponse> {
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status().as_u16();
        let body_text = response
            .text()
            .await
            .map_err(|e| InferenceError::NetworkError {
                message: format!("failed to read response body: {}", e),
            })?;

        if !(200..300).contains(&status) {
            return Err(InferenceError::ServerError {
                message: body_text,
                status: Some(status),
            });
        }

        serde_json::from_str::<GenerateContentResponse>(&body_text).map_err(|e| {
            InferenceError::ParseError {
                message: format!("failed to parse inference response: {}", e),
            }
        })
    }

    /// Map a reqwest transport error to `InferenceError`.
    fn map_reqwest_error(&self, err: reqwest::Error) -> InferenceError {
        let msg = err.to_string();
        if err.is_connect() {
            InferenceError::NetworkError {
                message: format!("cannot connect to {}: {}", self.base_url, msg),
            }
        } else if err.is_timeout() {
            InferenceError::NetworkError {
                message: format!("request timed out: {}", msg),
            }
        } else {
            InferenceError::NetworkError { message: msg }
        }
    }

    /// Pull the payload text out of the response envelope.
    fn extract_text(response: GenerateContentResponse) -> InferenceResult<String> {
        response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .ok_or_else(|| InferenceError::MissingContent {
                message: "response has no candidates[0].content.parts[0].text".to_string(),
            })
    }

    /// Parse the payload text and validate it against the schema.
    fn parse_payload(
        schema: &SchemaDescriptor,
        text: &str,
    ) -> InferenceResult<AnalysisPayload> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| InferenceError::ParseError {
                message: format!("payload is not valid JSON: {}", e),
            })?;

        schema
            .validate(&value)
            .map_err(|missing| InferenceError::SchemaViolation { missing })?;

        serde_json::from_value(value).map_err(|e| InferenceError::ParseError {
            message: format!("payload does not deserialize: {}", e),
        })
    }

    /// One full attempt: request, envelope extraction, payload validation.
    async fn attempt(
        &self,
        body: &Value,
        schema: &SchemaDescriptor,
    ) -> InferenceResult<AnalysisPayload> {
        let response = self.post_generate(body).await?;
        let text = Self::extract_text(response)?;
        Self::parse_payload(schema, &text)
    }
}

#[async_trait]
impl InferenceProvider for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn analyze(
        &self,
        image: &[u8],
        mime_type: &str,
        schema: &SchemaDescriptor,
        prompt: &str,
    ) -> InferenceResult<AnalysisPayload> {
        self.validate_image(image, mime_type)?;

        if self.api_key.is_empty() {
            return Err(InferenceError::AuthenticationFailed {
                message: "inference API key is not configured".to_string(),
            });
        }

        let body = self.build_request_body(image, mime_type, schema, prompt);
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            let delay = self.backoff_delay(attempt);
            if !delay.is_zero() {
                debug!(attempt, delay_ms = delay.as_millis() as u64, "backing off before retry");
                tokio::time::sleep(delay).await;
            }

            match self.attempt(&body, schema).await {
                Ok(payload) => {
                    debug!(attempt, model = %self.model, "inference succeeded");
                    return Ok(payload);
                }
                Err(err) => {
                    warn!(attempt, max_attempts = self.max_attempts, %err, "inference attempt failed");
                    if !err.is_retryable() {
                        return Err(err);
                    }
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or(InferenceError::Other {
            message: "inference failed without an attempt".to_string(),
        }))
    }

    async fn health_check(&self) -> InferenceResult<()> {
        if self.api_key.is_empty() {
            return Err(InferenceError::AuthenticationFailed {
                message: "inference API key is not configured".to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
