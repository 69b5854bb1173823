//! The pipeline boundary: every operation the HTTP listener and the CLI expose.

use std::sync::Arc;

use pipeline::{
    Agent, AgentFilter, AgentId, AgentRepository, GenerationRecord, ModelId, NewAgent, Petition,
    PetitionFilter, PetitionId, PetitionRequest, PetitionStore, PetitionSummary,
    PetitionTypeDefinition, PipelineError, TemplateStore,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::executor::PetitionExecutor;

/// One entry of a petition's generation history, with the agent that ran it.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub record: GenerationRecord,
    /// `None` if the agent was never bound or is no longer registered.
    pub agent: Option<Arc<Agent>>,
}

/// Boundary service over the executor, the stores and the catalog.
#[derive(Clone)]
pub struct PetitionService {
    executor: PetitionExecutor,
    agents: Arc<dyn AgentRepository>,
    petitions: Arc<dyn PetitionStore>,
    catalog: Arc<TemplateStore>,
}

impl PetitionService {
    pub fn new(
        executor: PetitionExecutor,
        agents: Arc<dyn AgentRepository>,
        petitions: Arc<dyn PetitionStore>,
        catalog: Arc<TemplateStore>,
    ) -> Self {
        Self {
            executor,
            agents,
            petitions,
            catalog,
        }
    }

    /// Runs the full pipeline for `request` and returns the completed
    /// petition's id.
    pub async fn submit(
        &self,
        request: PetitionRequest,
        cancel: &CancellationToken,
    ) -> Result<PetitionId, PipelineError> {
        self.submit_and_fetch(request, cancel).await.map(|p| p.id)
    }

    /// Like [`submit`](Self::submit) but returns the whole completed petition.
    pub async fn submit_and_fetch(
        &self,
        request: PetitionRequest,
        cancel: &CancellationToken,
    ) -> Result<Petition, PipelineError> {
        let output_template = self
            .catalog
            .petition_type(&request.petition_type)
            .and_then(|def| def.output_template.clone());
        self.executor.run(request, output_template, cancel).await
    }

    /// Fetches a stored petition with its records.
    pub async fn get_petition(&self, id: PetitionId) -> Result<Petition, PipelineError> {
        self.petitions
            .get(id)
            .await?
            .ok_or_else(|| PipelineError::NotFound {
                what: format!("petition {id}"),
            })
    }

    pub async fn list_petitions(
        &self,
        filter: &PetitionFilter,
    ) -> Result<Vec<PetitionSummary>, PipelineError> {
        Ok(self.petitions.list(filter).await?)
    }

    /// The petition's records joined with the agents that produced them.
    pub async fn get_history(&self, id: PetitionId) -> Result<Vec<HistoryEntry>, PipelineError> {
        let petition = self.get_petition(id).await?;
        let mut history = Vec::with_capacity(petition.records.len());
        for record in petition.records {
            let agent = match record.agent_id {
                Some(agent_id) => self.agents.get(agent_id).await?,
                None => None,
            };
            history.push(HistoryEntry { record, agent });
        }
        Ok(history)
    }

    pub async fn get_agents(&self, filter: &AgentFilter) -> Result<Vec<Arc<Agent>>, PipelineError> {
        Ok(self.agents.list(filter).await?)
    }

    /// Validates and registers an agent.
    pub async fn add_agent(&self, agent: NewAgent) -> Result<AgentId, PipelineError> {
        let agent = agent.into_agent()?;
        let id = self.agents.add(agent).await?;
        tracing::info!(agent_id = %id, "agent registered");
        Ok(id)
    }

    pub fn list_petition_types(&self) -> Vec<PetitionTypeDefinition> {
        self.catalog.petition_types().cloned().collect()
    }

    /// Registers the catalog's stock agents with `model`, unless any agent
    /// is already registered. Returns how many were added.
    pub async fn seed_agents(&self, model: &ModelId) -> Result<usize, PipelineError> {
        if !self.agents.list(&AgentFilter::default()).await?.is_empty() {
            tracing::info!("agents already registered; skipping seed");
            return Ok(0);
        }

        let seeds = self.catalog.seed_agents(model);
        let count = seeds.len();
        for seed in seeds {
            self.add_agent(seed).await?;
        }
        tracing::info!(count, model = %model, "seeded stock agents");
        Ok(count)
    }
}

impl std::fmt::Debug for PetitionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PetitionService")
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}
