//! Gemini-backed implementation of the generation service contract.
//!
//! Talks to the `generateContent` REST endpoint. Drafts come from the
//! fast image model with a die-cut sticker prompt template; upscaling
//! and background swaps above the elevated threshold use the
//! high-fidelity model at 4K. Prompt splitting runs on a lite text
//! model with a JSON-array response schema.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::future::try_join_all;
use serde_json::{Value, json};

use crate::{DRAFT_VARIANTS, GenerationService, ServiceError};

const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Instruction for the prompt splitter. The model returns a JSON array
/// of self-contained sticker descriptions, with request phrasing
/// ("generate a", "I want") stripped.
const SPLIT_INSTRUCTION: &str = "You are a helper for a sticker generation app. \
    Analyze the user's input and break it down into a list of distinct, \
    self-contained sticker descriptions. If the user describes multiple items, \
    split them into separate strings. Clean up the prompts by removing request \
    phrases like 'generate a', 'I want', 'make me'. Return a JSON array of strings.";

/// Configuration for [`GeminiClient`].
///
/// Model names and the elevated-tier threshold are overridable; the
/// defaults match the service's current tiers.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API credential. An empty key makes every call fail with
    /// [`ServiceError::ServiceUnavailable`].
    pub api_key: String,

    /// Endpoint base, without a trailing slash.
    pub base_url: String,

    /// Lite text model used for prompt splitting.
    pub split_model: String,

    /// Fast image model used for drafts and baseline re-rendering.
    pub draft_model: String,

    /// High-fidelity image model used at or above
    /// `elevated_threshold`.
    pub detail_model: String,

    /// Target sizes at or above this (in pixels) select the
    /// high-fidelity model and 4K output.
    pub elevated_threshold: u32,

    /// Whether the high-fidelity tier is enabled for this credential.
    pub allow_elevated: bool,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_owned(),
            split_model: "gemini-flash-lite-latest".to_owned(),
            draft_model: "gemini-2.5-flash-image".to_owned(),
            detail_model: "gemini-3-pro-image-preview".to_owned(),
            elevated_threshold: 2048,
            allow_elevated: true,
        }
    }
}

impl GeminiConfig {
    /// Default configuration with the API key taken from
    /// `GEMINI_API_KEY`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            ..Self::default()
        }
    }
}

/// HTTP client for the Gemini `generateContent` API.
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    /// Create a client with connect/request timeouts applied.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::ServiceUnavailable`] if the underlying
    /// HTTP client cannot be constructed.
    pub fn new(config: GeminiConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .timeout(HTTP_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                ServiceError::ServiceUnavailable(format!("failed to create HTTP client: {e}"))
            })?;
        Ok(Self { http, config })
    }

    fn api_key(&self) -> Result<&str, ServiceError> {
        if self.config.api_key.is_empty() {
            return Err(ServiceError::ServiceUnavailable(
                "missing API key (set GEMINI_API_KEY)".to_owned(),
            ));
        }
        Ok(&self.config.api_key)
    }

    /// Model and tier for a requested output size.
    fn model_for_size(&self, target_size: u32) -> (&str, bool) {
        if target_size >= self.config.elevated_threshold {
            (&self.config.detail_model, true)
        } else {
            (&self.config.draft_model, false)
        }
    }

    /// POST one `generateContent` request and return the parsed JSON
    /// response body.
    async fn generate_content(&self, model: &str, body: Value) -> Result<Value, ServiceError> {
        let key = self.api_key()?;
        let url = format!("{}/models/{model}:generateContent", self.config.base_url);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_owned());
            return Err(match status.as_u16() {
                401 | 403 => {
                    ServiceError::ServiceUnavailable(format!("authentication failed: {text}"))
                }
                _ => ServiceError::GenerationFailure(format!(
                    "request failed with status {status}: {text}"
                )),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::GenerationFailure(format!("failed to parse response: {e}")))
    }

    /// Request a single draft variant.
    async fn request_draft(
        &self,
        full_prompt: &str,
        reference: Option<&[u8]>,
    ) -> Result<Vec<u8>, ServiceError> {
        let mut parts = vec![json!({ "text": full_prompt })];
        if let Some(bytes) = reference {
            parts.push(inline_data_part(bytes));
        }
        let body = json!({
            "contents": [{ "parts": parts }],
            "generationConfig": { "imageConfig": { "aspectRatio": "1:1" } },
        });

        let response = self
            .generate_content(&self.config.draft_model, body)
            .await?;
        first_inline_image(&response)
            .ok_or_else(|| ServiceError::GenerationFailure("no image returned".to_owned()))
    }
}

#[async_trait(?Send)]
impl GenerationService for GeminiClient {
    async fn split_prompts(&self, raw: &str) -> Result<Vec<String>, ServiceError> {
        let body = json!({
            "contents": [{
                "parts": [
                    { "text": SPLIT_INSTRUCTION },
                    { "text": format!("Input: {raw:?}") },
                ],
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": { "type": "ARRAY", "items": { "type": "STRING" } },
            },
        });

        let response = self
            .generate_content(&self.config.split_model, body)
            .await?;
        let text = first_text(&response).ok_or_else(|| {
            ServiceError::GenerationFailure("splitter returned no text".to_owned())
        })?;

        let prompts = parse_prompt_list(&text);
        if prompts.is_empty() {
            return Err(ServiceError::GenerationFailure(
                "splitter returned no prompts".to_owned(),
            ));
        }
        Ok(prompts)
    }

    async fn generate_drafts(
        &self,
        prompt: &str,
        reference: Option<&[u8]>,
    ) -> Result<[Vec<u8>; DRAFT_VARIANTS], ServiceError> {
        let full_prompt = draft_prompt(prompt);
        tracing::debug!(prompt, "requesting {DRAFT_VARIANTS} draft variants");

        let requests = (0..DRAFT_VARIANTS).map(|_| self.request_draft(&full_prompt, reference));
        let variants = try_join_all(requests).await?;
        let count = variants.len();
        variants.try_into().map_err(|_| {
            ServiceError::GenerationFailure(format!(
                "expected {DRAFT_VARIANTS} draft variants, got {count}"
            ))
        })
    }

    async fn regenerate(
        &self,
        image: &[u8],
        instruction: &str,
        target_size: u32,
    ) -> Result<Vec<u8>, ServiceError> {
        let (model, elevated) = self.model_for_size(target_size);
        let image_config = if elevated {
            json!({ "imageSize": "4K", "aspectRatio": "1:1" })
        } else {
            json!({ "aspectRatio": "1:1" })
        };
        let body = json!({
            "contents": [{
                "parts": [
                    inline_data_part(image),
                    { "text": instruction },
                ],
            }],
            "generationConfig": { "imageConfig": image_config },
        });

        tracing::debug!(model, target_size, "re-rendering image");
        let response = self.generate_content(model, body).await?;
        first_inline_image(&response)
            .ok_or_else(|| ServiceError::GenerationFailure("no image returned".to_owned()))
    }

    async fn ensure_elevated_access(&self) -> Result<(), ServiceError> {
        self.api_key()?;
        if self.config.allow_elevated {
            Ok(())
        } else {
            Err(ServiceError::ServiceUnavailable(
                "high-fidelity image generation is not enabled for this credential".to_owned(),
            ))
        }
    }
}

/// Wrap a subject into the full draft prompt.
fn draft_prompt(subject: &str) -> String {
    format!(
        "A high quality, isolated die-cut sticker of {subject}. Flat vector style, \
         white border, centered on a solid white background (#FFFFFF). \
         Ensure the background is pure white."
    )
}

/// An `inlineData` request part holding base64-encoded PNG bytes.
fn inline_data_part(bytes: &[u8]) -> Value {
    json!({
        "inlineData": {
            "mimeType": "image/png",
            "data": BASE64.encode(bytes),
        },
    })
}

fn map_transport_error(error: reqwest::Error) -> ServiceError {
    if error.is_connect() || error.is_timeout() {
        ServiceError::ServiceUnavailable(format!("transport error: {error}"))
    } else {
        ServiceError::GenerationFailure(format!("HTTP error: {error}"))
    }
}

/// Candidate parts of a `generateContent` response.
fn response_parts(response: &Value) -> Option<&Vec<Value>> {
    response
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()
}

/// First inline image in the response, base64-decoded.
fn first_inline_image(response: &Value) -> Option<Vec<u8>> {
    for part in response_parts(response)? {
        if let Some(data) = part
            .get("inlineData")
            .and_then(|d| d.get("data"))
            .and_then(Value::as_str)
        {
            if let Ok(bytes) = BASE64.decode(data) {
                return Some(bytes);
            }
        }
    }
    None
}

/// First text part in the response.
fn first_text(response: &Value) -> Option<String> {
    for part in response_parts(response)? {
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            return Some(text.to_owned());
        }
    }
    None
}

/// Parse the splitter's JSON-array answer into trimmed non-empty
/// prompts. Anything unparsable yields an empty list.
fn parse_prompt_list(text: &str) -> Vec<String> {
    let Ok(values) = serde_json::from_str::<Vec<String>>(text) else {
        return Vec::new();
    };
    values
        .into_iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}
