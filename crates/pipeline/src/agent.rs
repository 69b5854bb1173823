//! Agents and the agent repository port.
//!
//! An [`Agent`] is a configured (model, prompt template, specialty) triple used
//! for one pipeline stage. Agents are registered through the management
//! boundary and handed to stages as shared references (`Arc<Agent>`); a run
//! never copies or mutates them.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::template::{Placeholder, PromptTemplate, TemplateError};
use crate::{AgentId, AgentRole, ModelId, PipelineError, Specialty, StoreError, Timestamp};

/// A registered generator or reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    /// Display name (e.g. `"Gerador de Recurso Administrativo"`).
    pub name: String,
    pub description: String,
    pub model_id: ModelId,
    pub role: AgentRole,
    /// Petition type for generators, review axis for reviewers.
    pub specialty: Specialty,
    pub prompt_template: PromptTemplate,
    pub created_at: Timestamp,
}

/// Input for registering an agent; validated by [`NewAgent::into_agent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAgent {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub model_id: ModelId,
    pub role: AgentRole,
    pub specialty: Specialty,
    /// Raw template text; parsed and checked on registration.
    pub prompt_template: String,
}

impl NewAgent {
    /// Validates the input and assigns identity.
    ///
    /// Rejects blank names, unparsable templates, and reviewer templates that
    /// never show the draft under review.
    pub fn into_agent(self) -> Result<Agent, PipelineError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(PipelineError::InvalidRequest {
                message: "agent name must not be empty".into(),
            });
        }
        let prompt_template = PromptTemplate::parse(self.prompt_template)?;
        if self.role == AgentRole::Reviewer && !prompt_template.uses(Placeholder::Draft) {
            return Err(TemplateError::MissingDraftPlaceholder.into());
        }

        Ok(Agent {
            id: AgentId::new_random(),
            name,
            description: self.description,
            model_id: self.model_id,
            role: self.role,
            specialty: self.specialty,
            prompt_template,
            created_at: Timestamp::now(),
        })
    }
}

/// Optional role / specialty constraints for agent listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentFilter {
    #[serde(default)]
    pub role: Option<AgentRole>,
    #[serde(default)]
    pub specialty: Option<Specialty>,
}

impl AgentFilter {
    /// Filter matching exactly one role and specialty.
    pub fn exact(role: AgentRole, specialty: Specialty) -> Self {
        Self {
            role: Some(role),
            specialty: Some(specialty),
        }
    }

    /// Returns `true` if `agent` satisfies every set constraint.
    pub fn matches(&self, agent: &Agent) -> bool {
        self.role.map_or(true, |r| r == agent.role)
            && self.specialty.as_ref().map_or(true, |s| *s == agent.specialty)
    }
}

// ---------------------------------------------------------------------------

/// Storage for registered agents.
///
/// Passed explicitly (as `Arc<dyn AgentRepository>`) to everything that
/// selects agents; there is no process-wide registry.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Stores a validated agent and returns its id.
    async fn add(&self, agent: Agent) -> Result<AgentId, StoreError>;

    /// Fetches one agent.
    async fn get(&self, id: AgentId) -> Result<Option<Arc<Agent>>, StoreError>;

    /// Lists agents matching `filter`, oldest registration first.
    async fn list(&self, filter: &AgentFilter) -> Result<Vec<Arc<Agent>>, StoreError>;

    /// Finds the agent serving `role` for `specialty`.
    ///
    /// When several match, the most recently registered one wins, so an
    /// operator can supersede an agent by registering a new one.
    async fn find(
        &self,
        role: AgentRole,
        specialty: &Specialty,
    ) -> Result<Option<Arc<Agent>>, StoreError> {
        let mut matches = self
            .list(&AgentFilter::exact(role, specialty.clone()))
            .await?;
        Ok(matches.pop())
    }
}
