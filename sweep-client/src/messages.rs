//! HTTP backend speaking the Messages API

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use sweep_core::Usage;
use tracing::debug;

use crate::error::{GenerateError, Result};
use crate::{Generation, GenerationClient, GenerationRequest, with_timeout};

const API_VERSION: &str = "2023-06-01";

/// HTTP client for a Messages-API compatible backend
#[derive(Debug, Clone)]
pub struct MessagesClient {
    /// Base URL of the backend (e.g., "https://api.anthropic.com")
    base_url: String,
    api_key: String,
    /// HTTP client instance
    client: Client,
}

#[derive(Debug, Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "is_blank")]
    system: &'a str,
    messages: [Message<'a>; 1],
}

fn is_blank(value: &&str) -> bool {
    value.is_empty()
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl MessagesClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the backend API
    /// * `api_key` - Credential sent in the `x-api-key` header
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_client(base_url, api_key, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure proxies, TLS settings, etc. The
    /// per-attempt timeout is still applied on every call.
    pub fn with_client(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Get the base URL of the backend
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: &GenerationRequest, timeout: Duration) -> Result<Generation> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = MessagesBody {
            model: &request.model_id,
            max_tokens: request.max_tokens,
            system: &request.system,
            messages: [Message {
                role: "user",
                content: &request.user,
            }],
        };

        debug!(model = %request.model_id, "Sending generation request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport_error(e, timeout))?;

        self.handle_response(response, timeout).await
    }

    /// Check the status code and extract text and usage from the body
    async fn handle_response(
        &self,
        response: reqwest::Response,
        timeout: Duration,
    ) -> Result<Generation> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GenerateError::from_status(
                status.as_u16(),
                error_message(&error_text),
            ));
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| match classify_transport_error(e, timeout) {
                GenerateError::Backend { message, .. } => {
                    GenerateError::backend(format!("Failed to parse response: {message}"))
                }
                other => other,
            })?;

        Ok(parse_generation(body))
    }
}

#[async_trait]
impl GenerationClient for MessagesClient {
    async fn generate(&self, request: &GenerationRequest, timeout: Duration) -> Result<Generation> {
        with_timeout(timeout, self.send(request, timeout)).await
    }
}

fn parse_generation(body: MessagesResponse) -> Generation {
    let text = body
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("");

    Generation {
        text,
        usage: body.usage.map(|u| Usage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        }),
    }
}

/// Pull the human-readable message out of an error body, if it has one
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.to_string())
}

fn classify_transport_error(error: reqwest::Error, timeout: Duration) -> GenerateError {
    if error.is_timeout() {
        GenerateError::Timeout(timeout)
    } else if error.is_connect() || error.is_request() || error.is_body() {
        GenerateError::Transient(error.to_string())
    } else if let Some(status) = error.status() {
        GenerateError::from_status(status.as_u16(), error.to_string())
    } else {
        GenerateError::backend(error.to_string())
    }
}
