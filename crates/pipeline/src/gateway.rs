//! Model gateway port: the only way the pipeline reaches a language model.
//!
//! Implementations perform exactly one call per invocation. Retry decisions
//! are never made here; the error's [`RetryPolicy`] is surfaced to the caller.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ModelId, RetryPolicy};

/// Sampling parameters sent with every generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub repetition_penalty: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 2000,
            temperature: 0.7,
            top_p: 0.7,
            top_k: 50,
            repetition_penalty: 1.0,
        }
    }
}

/// Failures of a single model call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// The credential was missing, wrong or lacks access.
    #[error("model endpoint rejected the credentials")]
    Unauthorized,

    /// The model could not serve the request (unknown model, overload, outage).
    #[error("model '{model}' unavailable: {reason}")]
    ModelUnavailable {
        model: ModelId,
        reason: String,
        /// Server-advised back-off (e.g. from `Retry-After`).
        retry_after: Option<Duration>,
    },

    /// No response within the allotted time.
    #[error("model call timed out after {after:?}")]
    Timeout { after: Duration },

    /// A response arrived but did not have the expected shape.
    #[error("malformed model response: {reason}")]
    MalformedResponse { reason: String },
}

impl GatewayError {
    /// Resubmission advice for this failure.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Unauthorized => RetryPolicy::NonRetryable,
            Self::ModelUnavailable { retry_after, .. } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            Self::Timeout { .. } | Self::MalformedResponse { .. } => {
                RetryPolicy::Retryable { after: None }
            }
        }
    }
}

/// Sends one prompt to an external text-generation endpoint.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Generates a completion for `prompt` with `model`.
    ///
    /// Returns the raw text. An empty string is a valid gateway result; the
    /// pipeline decides whether it is acceptable.
    async fn generate(
        &self,
        prompt: &str,
        model: &ModelId,
        options: &GenerationOptions,
    ) -> Result<String, GatewayError>;
}
