//! Generation stage: drafts the petition from the client's request.

use std::sync::Arc;

use pipeline::{Agent, PetitionRequest, RenderContext, StageKind};
use tokio_util::sync::CancellationToken;

use crate::gateway::StageGateway;
use crate::stage::{self, StageOutcome};

/// Renders the generator's template with the request fields and calls the model.
pub async fn generate(
    gateway: &StageGateway,
    request: &PetitionRequest,
    generator: Arc<Agent>,
    cancel: &CancellationToken,
) -> StageOutcome {
    let prompt = generator
        .prompt_template
        .render(&RenderContext::for_generation(request));
    stage::execute(gateway, StageKind::Generation, generator, prompt, cancel).await
}
