//! Agent resolution for one petition run.
//!
//! Every agent a run needs is looked up before the first model call. A missing
//! generator or reviewer is therefore reported as a configuration gap without
//! leaving a half-processed petition behind.

use std::sync::Arc;

use pipeline::{
    Agent, AgentRepository, AgentRole, PetitionType, PipelineError, ReviewChainConfig,
    ReviewStage, Specialty,
};

/// The agents bound to each stage of one run.
#[derive(Debug, Clone)]
pub struct StagePlan {
    pub generator: Arc<Agent>,
    /// Reviewers in chain order.
    pub reviewers: Vec<(ReviewStage, Arc<Agent>)>,
}

impl StagePlan {
    /// Resolves the generator for `petition_type` and one reviewer per stage.
    pub async fn resolve(
        agents: &dyn AgentRepository,
        petition_type: &PetitionType,
        review: &ReviewChainConfig,
    ) -> Result<Self, PipelineError> {
        let specialty = Specialty::from(petition_type);
        let found = agents.find(AgentRole::Generator, &specialty).await?;
        let generator = found.ok_or(PipelineError::NoAgentForType {
            role: AgentRole::Generator,
            specialty,
        })?;

        let mut reviewers = Vec::with_capacity(ReviewStage::ORDER.len());
        for stage in ReviewStage::ORDER {
            let reviewer = resolve_reviewer(agents, stage, review).await?;
            reviewers.push((stage, reviewer));
        }

        Ok(Self {
            generator,
            reviewers,
        })
    }
}

async fn resolve_reviewer(
    agents: &dyn AgentRepository,
    stage: ReviewStage,
    review: &ReviewChainConfig,
) -> Result<Arc<Agent>, PipelineError> {
    let specialty = review.specialty_for(stage);
    if let Some(agent) = agents.find(AgentRole::Reviewer, specialty).await? {
        return Ok(agent);
    }

    if let Some(fallback) = &review.fallback_specialty {
        if let Some(agent) = agents.find(AgentRole::Reviewer, fallback).await? {
            tracing::warn!(
                stage = %stage,
                specialty = %specialty,
                fallback = %fallback,
                agent_id = %agent.id,
                "no specialised reviewer; using fallback reviewer"
            );
            return Ok(agent);
        }
    }

    Err(PipelineError::NoAgentForType {
        role: AgentRole::Reviewer,
        specialty: specialty.clone(),
    })
}
