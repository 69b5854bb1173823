//! What one stage execution produced, before it becomes a record.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pipeline::{Agent, StageFailure, StageKind};
use tokio_util::sync::CancellationToken;

use crate::gateway::StageGateway;

/// Result of running one stage's model call.
///
/// The executor turns this into a [`pipeline::GenerationRecord`] once it has
/// assigned the sequence number and timestamp.
#[derive(Debug)]
pub struct StageOutcome {
    pub stage: StageKind,
    pub agent: Arc<Agent>,
    /// The rendered prompt.
    pub input: String,
    pub result: Result<String, StageFailure>,
    pub duration: Duration,
}

impl StageOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Sends an already rendered prompt through the gateway on behalf of `agent`.
pub(crate) async fn execute(
    gateway: &StageGateway,
    stage: StageKind,
    agent: Arc<Agent>,
    input: String,
    cancel: &CancellationToken,
) -> StageOutcome {
    let started = Instant::now();
    let result = gateway.call(&input, &agent.model_id, cancel).await;
    let duration = started.elapsed();

    match &result {
        Ok(text) => tracing::info!(
            stage = %stage,
            agent_id = %agent.id,
            model = %agent.model_id,
            duration_ms = duration.as_millis() as u64,
            output_len = text.len(),
            "stage completed"
        ),
        Err(cause) => tracing::warn!(
            stage = %stage,
            agent_id = %agent.id,
            model = %agent.model_id,
            duration_ms = duration.as_millis() as u64,
            error = %cause,
            "stage failed"
        ),
    }

    StageOutcome {
        stage,
        agent,
        input,
        result,
        duration,
    }
}
