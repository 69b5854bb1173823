//! Review stages: each reviewer revises the draft left by the previous stage.

use std::sync::Arc;

use pipeline::{Agent, PetitionRequest, RenderContext, ReviewStage};
use tokio_util::sync::CancellationToken;

use crate::gateway::StageGateway;
use crate::stage::{self, StageOutcome};

/// Renders `reviewer`'s template with the request fields and `draft`, then
/// calls the model. On success the outcome's text replaces the draft.
pub async fn review(
    gateway: &StageGateway,
    stage: ReviewStage,
    request: &PetitionRequest,
    draft: &str,
    reviewer: Arc<Agent>,
    cancel: &CancellationToken,
) -> StageOutcome {
    let prompt = reviewer
        .prompt_template
        .render(&RenderContext::for_review(request, draft));
    stage::execute(gateway, stage.into(), reviewer, prompt, cancel).await
}
