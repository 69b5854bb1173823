//! Petition executor: drives one petition through generation and the review
//! chain.
//!
//! ```text
//! resolve agents ──► save pending ──► Generating ──► Reviewing[legal]
//!   ──► Reviewing[formatting] ──► Reviewing[language] ──► save completed
//!                  any stage failure ──► save failed
//!      store failure after save pending ──► save failed (one attempt)
//! ```
//!
//! Each stage is gated by [`PipelineStateMachine::advance`], so a stage only
//! runs after its predecessor succeeded. Every stage appends exactly one
//! [`GenerationRecord`] as soon as it finishes, successful or not.

use std::sync::Arc;
use std::time::Duration;

use pipeline::{
    AgentRepository, GenerationOptions, GenerationRecord, ModelGateway, Petition, PetitionId,
    PetitionRequest, PetitionStore, PipelineError, PipelineState, PipelineStateMachine, RecordId,
    ReviewChainConfig, StageFailure, StageKind, StoreError, Timestamp,
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::gateway::{StageGateway, DEFAULT_STAGE_TIMEOUT};
use crate::plan::StagePlan;
use crate::stage::StageOutcome;
use crate::{generation, review};

/// Tunables for [`PetitionExecutor`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    /// Deadline for each stage's model call.
    pub stage_timeout: Duration,
    /// Sampling parameters sent with every call.
    pub options: GenerationOptions,
    pub review: ReviewChainConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            options: GenerationOptions::default(),
            review: ReviewChainConfig::default(),
        }
    }
}

/// Runs petitions end to end and persists their audit trail.
///
/// Cheap to share: all state lives behind the injected ports, so concurrent
/// runs only contend inside the store.
#[derive(Clone)]
pub struct PetitionExecutor {
    agents: Arc<dyn AgentRepository>,
    store: Arc<dyn PetitionStore>,
    gateway: StageGateway,
    review: ReviewChainConfig,
}

impl PetitionExecutor {
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        store: Arc<dyn PetitionStore>,
        gateway: Arc<dyn ModelGateway>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            agents,
            store,
            gateway: StageGateway::new(gateway, config.options, config.stage_timeout),
            review: config.review,
        }
    }

    /// Generates and reviews one petition.
    ///
    /// Returns the stored, completed petition. Agents are resolved before the
    /// petition is created, so [`PipelineError::NoAgentForType`] leaves no
    /// trace in the store. Stage failures and cancellation return an error
    /// carrying the id of the petition stored as failed.
    pub async fn run(
        &self,
        request: PetitionRequest,
        output_template: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<Petition, PipelineError> {
        let plan =
            StagePlan::resolve(self.agents.as_ref(), &request.petition_type, &self.review).await?;
        let petition = Petition::pending(PetitionId::new_random(), request, output_template);

        let span = tracing::info_span!(
            "petition",
            petition_id = %petition.id,
            petition_type = %petition.petition_type,
        );
        self.drive(petition, plan, cancel).instrument(span).await
    }

    async fn drive(
        &self,
        mut petition: Petition,
        plan: StagePlan,
        cancel: &CancellationToken,
    ) -> Result<Petition, PipelineError> {
        self.store.save(&petition).await?;
        tracing::info!(generator = %plan.generator.id, "petition accepted");

        let mut machine = PipelineStateMachine::new();

        machine.advance(PipelineState::Generating, None)?;
        let outcome =
            generation::generate(&self.gateway, &petition.request, plan.generator, cancel).await;
        let mut draft = match self.record(&mut petition, outcome).await {
            Ok(Ok(text)) => text,
            Ok(Err(cause)) => {
                return Err(self
                    .abort(petition, &mut machine, StageKind::Generation, cause)
                    .await)
            }
            Err(err) => {
                return Err(self
                    .abandon(petition, &mut machine, StageKind::Generation, err)
                    .await)
            }
        };

        for (stage, reviewer) in plan.reviewers {
            machine.advance(PipelineState::Reviewing(stage), None)?;
            let outcome = review::review(
                &self.gateway,
                stage,
                &petition.request,
                &draft,
                reviewer,
                cancel,
            )
            .await;
            draft = match self.record(&mut petition, outcome).await {
                Ok(Ok(text)) => text,
                Ok(Err(cause)) => {
                    return Err(self
                        .abort(petition, &mut machine, stage.into(), cause)
                        .await)
                }
                Err(err) => {
                    return Err(self
                        .abandon(petition, &mut machine, stage.into(), err)
                        .await)
                }
            };
        }

        let id = petition.id;
        let mut completed = petition.clone();
        completed
            .complete(draft)
            .map_err(|e| StoreError::TerminalState { id, status: e.from })?;
        // Completed is only reported once the store holds it.
        if let Err(err) = self.store.save(&completed).await {
            let stage = petition
                .records
                .last()
                .map_or(StageKind::Generation, |r| r.stage);
            return Err(self.abandon(petition, &mut machine, stage, err).await);
        }
        machine.advance(PipelineState::Completed, None)?;

        tracing::info!(history = %machine.summary(), "petition completed");
        Ok(completed)
    }

    /// Appends the stage's record to the store and the in-memory petition.
    async fn record(
        &self,
        petition: &mut Petition,
        outcome: StageOutcome,
    ) -> Result<Result<String, StageFailure>, StoreError> {
        let previous = petition
            .records
            .last()
            .map_or(petition.created_at, |r| r.created_at);

        let (output, error) = match &outcome.result {
            Ok(text) => (Some(text.clone()), None),
            Err(cause) => (None, Some(cause.to_string())),
        };

        let record = GenerationRecord {
            id: RecordId::new_random(),
            petition_id: petition.id,
            sequence: petition.records.len() as u32,
            stage: outcome.stage,
            agent_id: Some(outcome.agent.id),
            model_id: Some(outcome.agent.model_id.clone()),
            input: outcome.input,
            output,
            error,
            succeeded: outcome.result.is_ok(),
            duration_ms: outcome.duration.as_millis() as u64,
            // Wall clocks can step backwards; the trail must not.
            created_at: Timestamp::now().max(previous),
        };

        // Kept in memory even when the append fails, so a later save of the
        // failed petition still carries it.
        let appended = self.store.append_record(&record).await;
        petition.records.push(record);
        appended.map(|()| outcome.result)
    }

    /// Marks the petition failed at `stage` and returns the error to report.
    async fn abort(
        &self,
        mut petition: Petition,
        machine: &mut PipelineStateMachine,
        stage: StageKind,
        cause: StageFailure,
    ) -> PipelineError {
        let message = cause.to_string();
        if let Err(e) = machine.fail(&message) {
            return e.into();
        }
        if let Err(e) = petition.fail(stage, message) {
            return StoreError::TerminalState {
                id: petition.id,
                status: e.from,
            }
            .into();
        }
        if let Err(e) = self.store.save(&petition).await {
            tracing::error!(error = %e, "failed to store failed petition");
            return e.into();
        }

        tracing::warn!(stage = %stage, history = %machine.summary(), "petition failed");

        let petition_id = petition.id;
        match (cause, stage.review_stage()) {
            (StageFailure::Cancelled, _) => PipelineError::Cancelled { petition_id },
            (cause, None) => PipelineError::GenerationFailed { petition_id, cause },
            (cause, Some(stage)) => PipelineError::ReviewFailed {
                petition_id,
                stage,
                cause,
            },
        }
    }

    /// Handles a store failure once the pending petition exists.
    ///
    /// The run cannot continue, but the petition must not stay pending with no
    /// run owning it, so one attempt is made to store it as failed at `stage`.
    /// The original store error is returned either way.
    async fn abandon(
        &self,
        mut petition: Petition,
        machine: &mut PipelineStateMachine,
        stage: StageKind,
        err: StoreError,
    ) -> PipelineError {
        let message = format!("persistence error: {err}");
        tracing::error!(stage = %stage, error = %err, "petition store failed mid-run");
        if machine.fail(&message).is_ok() && petition.fail(stage, message).is_ok() {
            match self.store.save(&petition).await {
                Ok(()) => {
                    tracing::warn!(history = %machine.summary(), "petition failed");
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to store failed petition");
                }
            }
        }
        PipelineError::PersistenceError(err)
    }
}

impl std::fmt::Debug for PetitionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PetitionExecutor")
            .field("gateway", &self.gateway)
            .field("review", &self.review)
            .finish_non_exhaustive()
    }
}
