//! Bounded model calls.
//!
//! [`StageGateway`] wraps the [`ModelGateway`] port with the rules every stage
//! shares: one call per stage, a per-stage deadline, cooperative cancellation,
//! and rejection of blank output. No retries happen here.

use std::sync::Arc;
use std::time::Duration;

use pipeline::{GatewayError, GenerationOptions, ModelGateway, ModelId, StageFailure};
use tokio_util::sync::CancellationToken;

/// Default deadline for a single stage's model call.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(120);

/// The model gateway as seen by pipeline stages.
#[derive(Clone)]
pub struct StageGateway {
    inner: Arc<dyn ModelGateway>,
    options: GenerationOptions,
    timeout: Duration,
}

impl StageGateway {
    pub fn new(
        inner: Arc<dyn ModelGateway>,
        options: GenerationOptions,
        timeout: Duration,
    ) -> Self {
        Self {
            inner,
            options,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends `prompt` to `model` once.
    ///
    /// Cancellation wins over a call that completes in the same poll, so a
    /// cancelled run never records a stage as successful.
    pub async fn call(
        &self,
        prompt: &str,
        model: &ModelId,
        cancel: &CancellationToken,
    ) -> Result<String, StageFailure> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StageFailure::Cancelled),
            response = tokio::time::timeout(
                self.timeout,
                self.inner.generate(prompt, model, &self.options),
            ) => response,
        };

        let text = match response {
            Err(_elapsed) => {
                return Err(GatewayError::Timeout {
                    after: self.timeout,
                }
                .into())
            }
            Ok(result) => result?,
        };

        if text.trim().is_empty() {
            return Err(StageFailure::EmptyOutput);
        }
        Ok(text)
    }
}

impl std::fmt::Debug for StageGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageGateway")
            .field("options", &self.options)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
