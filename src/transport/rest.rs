//! Pass-through wrappers for the hosted one-shot endpoints.
//!
//! These are simple request/response calls with no retry policy; failures
//! surface directly to the caller.

use crate::error::Result;
use crate::protocol::items::Role;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    pub id: String,
    pub model: String,
    pub created: u64,
    pub choices: Vec<CompletionChoice>,
    /// Token accounting; schema left open-ended upstream.
    pub usage: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ImageRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageData {
    pub url: Option<String>,
    pub b64_json: Option<String>,
    pub revised_prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageResponse {
    pub created: u64,
    pub data: Vec<ImageData>,
}

/// Adapter for the one-shot text-completion and image-generation endpoints.
#[derive(Debug, Clone)]
pub struct OneShotAdapter {
    client: Client,
    auth: HeaderValue,
    base_url: String,
}

impl OneShotAdapter {
    /// Create an adapter against the default API host.
    ///
    /// # Errors
    /// Returns an error if the credential is not a valid header value or the
    /// client cannot be built.
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, BASE_URL)
    }

    /// Create an adapter against a custom host.
    ///
    /// # Errors
    /// Returns an error if the credential is not a valid header value or the
    /// client cannot be built.
    pub fn with_base_url(api_key: &str, base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        let auth = HeaderValue::from_str(&format!("Bearer {api_key}"))?;
        Ok(Self {
            client,
            auth,
            base_url: base_url.into(),
        })
    }

    /// One text completion round trip.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or the server reports a
    /// non-success status.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(AUTHORIZATION, &self.auth)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// One image generation round trip.
    ///
    /// # Errors
    /// Returns an error if the HTTP request fails or the server reports a
    /// non-success status.
    pub async fn generate_images(&self, request: &ImageRequest) -> Result<ImageResponse> {
        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url))
            .header(AUTHORIZATION, &self.auth)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}
