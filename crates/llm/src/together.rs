//! Together API client.
//!
//! Speaks the OpenAI-compatible `chat/completions` endpoint with a single user
//! message per call, and lists the models the key can use.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use pipeline::{GatewayError, GenerationOptions, ModelGateway, ModelId};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ClientError;

/// Public Together endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.together.xyz/v1";

/// Client-side deadline for one HTTP exchange.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(180);

/// Longest error body kept in error messages.
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for [`TogetherClient`].
#[derive(Clone)]
pub struct TogetherConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl TogetherConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for TogetherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TogetherConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    repetition_penalty: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// One entry of the model catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// `chat`, `language`, `embedding`, ...
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub context_length: Option<u64>,
    #[serde(default)]
    pub pricing: Option<ModelPricing>,
}

/// Price per million tokens, in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    #[serde(default)]
    pub input: f64,
    #[serde(default)]
    pub output: f64,
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for the Together API.
#[derive(Debug, Clone)]
pub struct TogetherClient {
    client: Client,
    config: TogetherConfig,
}

impl TogetherClient {
    pub fn new(config: TogetherConfig) -> Result<Self, ClientError> {
        if config.api_key.trim().is_empty() {
            return Err(ClientError::MissingApiKey);
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ClientError::Build)?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Lists the models available to the configured key.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, ClientError> {
        let resp = self
            .client
            .get(self.url("models"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ClientError::Unauthorized);
        }
        if !status.is_success() {
            let body = error_body(resp).await;
            return Err(ClientError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let models: Vec<ModelInfo> = resp.json().await?;
        debug!(count = models.len(), "listed models");
        Ok(models)
    }

    /// Checks that the endpoint is reachable and accepts the key.
    pub async fn test_connection(&self) -> Result<usize, ClientError> {
        let count = self.list_models().await?.len();
        info!(models = count, "model endpoint reachable");
        Ok(count)
    }

    fn map_transport(&self, err: reqwest::Error, model: &ModelId) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout {
                after: self.config.timeout,
            }
        } else if err.is_decode() {
            GatewayError::MalformedResponse {
                reason: err.to_string(),
            }
        } else {
            GatewayError::ModelUnavailable {
                model: model.clone(),
                reason: err.to_string(),
                retry_after: None,
            }
        }
    }
}

#[async_trait]
impl ModelGateway for TogetherClient {
    async fn generate(
        &self,
        prompt: &str,
        model: &ModelId,
        options: &GenerationOptions,
    ) -> Result<String, GatewayError> {
        let body = ChatRequest {
            model: model.as_str(),
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
            top_k: options.top_k,
            repetition_penalty: options.repetition_penalty,
        };

        debug!(model = %model, prompt_len = prompt.len(), "sending chat completion");
        let start = Instant::now();

        let resp = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport(e, model))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(model = %model, status = status.as_u16(), "model endpoint rejected credentials");
            return Err(GatewayError::Unauthorized);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            warn!(model = %model, ?retry_after, "rate limited");
            return Err(GatewayError::ModelUnavailable {
                model: model.clone(),
                reason: "rate limited".into(),
                retry_after,
            });
        }
        if !status.is_success() {
            let body = error_body(resp).await;
            warn!(model = %model, status = status.as_u16(), %body, "chat completion failed");
            return Err(GatewayError::ModelUnavailable {
                model: model.clone(),
                reason: format!("HTTP {}: {body}", status.as_u16()),
                retry_after: None,
            });
        }

        let parsed: ChatResponse = resp.json().await.map_err(|e| self.map_transport(e, model))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or_else(|| GatewayError::MalformedResponse {
                reason: "response has no choices[0].message.content".into(),
            })?;

        info!(
            model = %model,
            latency_ms = start.elapsed().as_millis() as u64,
            prompt_tokens = parsed.usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens = parsed.usage.as_ref().map(|u| u.completion_tokens),
            "chat completion received"
        );
        Ok(content)
    }
}

async fn error_body(resp: reqwest::Response) -> String {
    let mut body = resp.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
