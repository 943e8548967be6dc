//! Minimal Cloudflare Workers AI client.
//!
//! This crate provides a focused client for the Workers AI `run` endpoint with:
//! - Chat-style text generation (system + user messages)
//! - Text-to-image generation returning raw image bytes
//! - Tolerant extraction of the generated text from the response envelope

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "https://api.cloudflare.com/client/v4";
pub const DEFAULT_TEXT_MODEL: &str = "@cf/meta/llama-3-8b-instruct";
pub const DEFAULT_IMAGE_MODEL: &str = "@cf/bytedance/stable-diffusion-xl-lightning";

/// Errors that can occur when using the Workers AI client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Account id not configured")]
    NoAccount,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Workers AI client.
#[derive(Clone)]
pub struct WorkersAi {
    client: reqwest::Client,
    api_key: String,
    account_id: String,
    api_base: String,
    text_model: String,
    image_model: String,
}

impl std::fmt::Debug for WorkersAi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkersAi")
            .field("account_id", &self.account_id)
            .field("api_base", &self.api_base)
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .finish_non_exhaustive()
    }
}

impl WorkersAi {
    /// Create a new client for the given API token and account.
    pub fn new(api_key: impl Into<String>, account_id: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key: api_key.into(),
            account_id: account_id.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
        }
    }

    /// Create a client from `CLOUDFLARE_API_KEY` and `CLOUDFLARE_ACCOUNT_ID`.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("CLOUDFLARE_API_KEY").map_err(|_| Error::NoApiKey)?;
        let account_id = std::env::var("CLOUDFLARE_ACCOUNT_ID").map_err(|_| Error::NoAccount)?;
        Ok(Self::new(api_key, account_id))
    }

    /// Route requests through a different base URL (e.g. a local proxy).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model used for text generation.
    pub fn with_text_model(mut self, model: impl Into<String>) -> Self {
        self.text_model = model.into();
        self
    }

    /// Set the model used for image generation.
    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    pub fn text_model(&self) -> &str {
        &self.text_model
    }

    pub fn image_model(&self) -> &str {
        &self.image_model
    }

    /// Run a text model and return the generated text.
    pub async fn run_text(&self, request: &TextRequest) -> Result<TextResponse, Error> {
        let model = request.model.as_deref().unwrap_or(&self.text_model);
        let body = ApiTextRequest {
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        tracing::debug!(model, messages = request.messages.len(), "workers ai text request");

        let response = self
            .client
            .post(self.run_url(model))
            .headers(self.build_headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        let envelope: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        let text = extract_text(&envelope)
            .ok_or_else(|| Error::Parse("response envelope carries no text".to_string()))?;

        Ok(TextResponse {
            model: model.to_string(),
            text,
        })
    }

    /// Run an image model and return the raw image bytes.
    pub async fn run_image(&self, prompt: &str) -> Result<ImageResponse, Error> {
        let model = self.image_model.as_str();
        tracing::debug!(model, "workers ai image request");

        let response = self
            .client
            .post(self.run_url(model))
            .headers(self.build_headers()?)
            .json(&ApiImageRequest { prompt })
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        let media_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if bytes.is_empty() {
            return Err(Error::Parse("empty image body".to_string()));
        }

        Ok(ImageResponse {
            media_type,
            bytes: bytes.to_vec(),
        })
    }

    fn run_url(&self, model: &str) -> String {
        format!(
            "{}/accounts/{}/ai/run/{}",
            self.api_base, self.account_id, model
        )
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        if self.api_key.is_empty() {
            return Err(Error::NoApiKey);
        }
        if self.account_id.is_empty() {
            return Err(Error::NoAccount);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
        Ok(headers)
    }
}

// ============================================================================
// Public types
// ============================================================================

/// A chat-style text generation request.
#[derive(Debug, Clone)]
pub struct TextRequest {
    pub model: Option<String>,
    pub messages: Vec<Message>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

impl TextRequest {
    /// Create a new request with the given messages.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: None,
            messages,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Generated text from a text model.
#[derive(Debug, Clone)]
pub struct TextResponse {
    pub model: String,
    pub text: String,
}

/// Generated image from an image model.
#[derive(Debug, Clone)]
pub struct ImageResponse {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiTextRequest<'a> {
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiImageRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiTextResult {
    response: Option<String>,
}

/// Pull the generated text out of a `run` response envelope.
///
/// Text models answer with `{"result": {"response": "..."}}`, but some
/// deployments and proxies flatten it to `{"result": "..."}`.
fn extract_text(envelope: &serde_json::Value) -> Option<String> {
    let result = envelope.get("result")?;

    if let Some(text) = result.as_str() {
        return Some(text.to_string());
    }

    serde_json::from_value::<ApiTextResult>(result.clone())
        .ok()
        .and_then(|r| r.response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let client = WorkersAi::new("test-key", "acct");
        assert_eq!(client.text_model, DEFAULT_TEXT_MODEL);
        assert_eq!(client.image_model, DEFAULT_IMAGE_MODEL);
        assert_eq!(client.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn test_client_builders() {
        let client = WorkersAi::new("test-key", "acct")
            .with_api_base("http://localhost:5173/api/cloudflare/")
            .with_text_model("@cf/meta/llama-3.1-8b-instruct")
            .with_image_model("@cf/black-forest-labs/flux-1-schnell");

        assert_eq!(client.text_model(), "@cf/meta/llama-3.1-8b-instruct");
        assert_eq!(client.image_model(), "@cf/black-forest-labs/flux-1-schnell");
        assert_eq!(
            client.run_url(client.text_model()),
            "http://localhost:5173/api/cloudflare/accounts/acct/ai/run/@cf/meta/llama-3.1-8b-instruct"
        );
    }

    #[test]
    fn test_missing_credentials_rejected_before_sending() {
        let no_key = WorkersAi::new("", "acct");
        assert!(matches!(no_key.build_headers(), Err(Error::NoApiKey)));

        let no_account = WorkersAi::new("key", "");
        assert!(matches!(no_account.build_headers(), Err(Error::NoAccount)));
    }

    #[tokio::test]
    async fn test_run_without_credentials_fails_fast() {
        let client = WorkersAi::new("", "acct").with_api_base("http://127.0.0.1:9");
        let request = TextRequest::new(vec![Message::user("Combine Air and Water")]);

        assert!(matches!(client.run_text(&request).await, Err(Error::NoApiKey)));

        let client = WorkersAi::new("key", "").with_api_base("http://127.0.0.1:9");
        assert!(matches!(client.run_image("planet").await, Err(Error::NoAccount)));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = WorkersAi::new("super-secret", "acct");
        assert!(!format!("{client:?}").contains("super-secret"));
    }

    #[test]
    fn test_request_builder() {
        let request = TextRequest::new(vec![Message::system("rules"), Message::user("Hello")])
            .with_max_tokens(256)
            .with_temperature(0.7);

        assert_eq!(request.max_tokens, Some(256));
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.messages[0].role, Role::System);
    }

    #[test]
    fn test_message_serialization() {
        let body = ApiTextRequest {
            messages: &[Message::system("be brief"), Message::user("Combine Air and Water")],
            max_tokens: None,
            temperature: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "Combine Air and Water");
        assert!(value.get("max_tokens").is_none());
    }

    #[test]
    fn test_extract_text_nested_response() {
        let envelope = json!({
            "result": { "response": "{\"name\":\"Mist\"}" },
            "success": true,
            "errors": []
        });
        assert_eq!(extract_text(&envelope).as_deref(), Some("{\"name\":\"Mist\"}"));
    }

    #[test]
    fn test_extract_text_flat_result() {
        let envelope = json!({ "result": "plain text" });
        assert_eq!(extract_text(&envelope).as_deref(), Some("plain text"));
    }

    #[test]
    fn test_extract_text_missing() {
        assert!(extract_text(&json!({ "success": false })).is_none());
        assert!(extract_text(&json!({ "result": { "other": 1 } })).is_none());
    }
}
