//! Database row records and their conversion into domain values.
//!
//! Identifiers and timestamps are stored as TEXT (UUID and fixed-width
//! RFC 3339 strings), so lexical order on `created_at` is chronological order.

use std::str::FromStr;

use pipeline::{
    Agent, AgentId, AgentRole, ClientId, FailureSummary, GenerationRecord, ModelId, Petition,
    PetitionId, PetitionStatus, PetitionSummary, PetitionType, PromptTemplate, RecordId,
    Specialty, StageKind, StoreError, Timestamp,
};
use sqlx::FromRow;

fn corrupt(what: &str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt {
        message: format!("{what}: {detail}"),
    }
}

fn parse<T>(what: &str, value: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e| corrupt(what, e))
}

fn timestamp(what: &str, value: &str) -> Result<Timestamp, StoreError> {
    Timestamp::parse_rfc3339(value).map_err(|e| corrupt(what, e))
}

fn non_blank<T>(what: &str, value: Option<T>) -> Result<T, StoreError> {
    value.ok_or_else(|| corrupt(what, "blank value"))
}

// ============================================================================
// Agents
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub(crate) struct AgentRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub model_id: String,
    pub role: String,
    pub specialty: String,
    pub prompt_template: String,
    pub created_at: String,
}

impl AgentRow {
    pub fn from_agent(agent: &Agent) -> Self {
        Self {
            id: agent.id.to_string(),
            name: agent.name.clone(),
            description: agent.description.clone(),
            model_id: agent.model_id.to_string(),
            role: agent.role.as_str().to_string(),
            specialty: agent.specialty.to_string(),
            prompt_template: agent.prompt_template.as_str().to_string(),
            created_at: agent.created_at.to_rfc3339(),
        }
    }

    pub fn into_agent(self) -> Result<Agent, StoreError> {
        Ok(Agent {
            id: parse::<AgentId>("agent id", &self.id)?,
            name: self.name,
            description: self.description,
            model_id: non_blank("agent model", ModelId::new(self.model_id))?,
            role: parse::<AgentRole>("agent role", &self.role)?,
            specialty: non_blank("agent specialty", Specialty::new(self.specialty))?,
            prompt_template: PromptTemplate::parse(self.prompt_template)
                .map_err(|e| corrupt("agent prompt template", e))?,
            created_at: timestamp("agent created_at", &self.created_at)?,
        })
    }
}

// ============================================================================
// Petitions
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub(crate) struct PetitionRow {
    pub id: String,
    pub petition_type: String,
    pub client_id: Option<String>,
    pub client_name: Option<String>,
    /// The originating request as JSON.
    pub request: String,
    pub status: String,
    pub final_text: Option<String>,
    pub failure_stage: Option<String>,
    pub failure_message: Option<String>,
    pub output_template: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PetitionRow {
    pub fn from_petition(petition: &Petition) -> Result<Self, StoreError> {
        let request = serde_json::to_string(&petition.request).map_err(|e| StoreError::Backend {
            message: format!("cannot encode petition request: {e}"),
        })?;
        Ok(Self {
            id: petition.id.to_string(),
            petition_type: petition.petition_type.to_string(),
            client_id: petition.request.client_id.as_ref().map(ToString::to_string),
            client_name: petition.request.client_name.clone(),
            request,
            status: petition.status.as_str().to_string(),
            final_text: petition.final_text.clone(),
            failure_stage: petition.failure.as_ref().map(|f| f.stage.as_str().to_string()),
            failure_message: petition.failure.as_ref().map(|f| f.message.clone()),
            output_template: petition.output_template.clone(),
            created_at: petition.created_at.to_rfc3339(),
            updated_at: petition.updated_at.to_rfc3339(),
        })
    }

    pub fn into_petition(self, records: Vec<GenerationRecord>) -> Result<Petition, StoreError> {
        let failure = match (self.failure_stage, self.failure_message) {
            (Some(stage), message) => Some(FailureSummary {
                stage: parse::<StageKind>("failure stage", &stage)?,
                message: message.unwrap_or_default(),
            }),
            (None, _) => None,
        };
        Ok(Petition {
            id: parse::<PetitionId>("petition id", &self.id)?,
            petition_type: non_blank("petition type", PetitionType::new(self.petition_type))?,
            request: serde_json::from_str(&self.request)
                .map_err(|e| corrupt("petition request", e))?,
            status: parse::<PetitionStatus>("petition status", &self.status)?,
            records,
            final_text: self.final_text,
            failure,
            output_template: self.output_template,
            created_at: timestamp("petition created_at", &self.created_at)?,
            updated_at: timestamp("petition updated_at", &self.updated_at)?,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct SummaryRow {
    pub id: String,
    pub petition_type: String,
    pub client_id: Option<String>,
    pub client_name: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl SummaryRow {
    pub fn into_summary(self) -> Result<PetitionSummary, StoreError> {
        Ok(PetitionSummary {
            id: parse::<PetitionId>("petition id", &self.id)?,
            petition_type: non_blank("petition type", PetitionType::new(self.petition_type))?,
            client_id: self.client_id.and_then(ClientId::new),
            client_name: self.client_name,
            status: parse::<PetitionStatus>("petition status", &self.status)?,
            created_at: timestamp("petition created_at", &self.created_at)?,
            updated_at: timestamp("petition updated_at", &self.updated_at)?,
        })
    }
}

// ============================================================================
// Generation records
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub(crate) struct RecordRow {
    pub id: String,
    pub petition_id: String,
    pub sequence: i64,
    pub stage: String,
    pub agent_id: Option<String>,
    pub model_id: Option<String>,
    pub input: String,
    pub output: Option<String>,
    pub error: Option<String>,
    pub succeeded: bool,
    pub duration_ms: i64,
    pub created_at: String,
}

impl RecordRow {
    pub fn from_record(record: &GenerationRecord) -> Self {
        Self {
            id: record.id.to_string(),
            petition_id: record.petition_id.to_string(),
            sequence: i64::from(record.sequence),
            stage: record.stage.as_str().to_string(),
            agent_id: record.agent_id.map(|id| id.to_string()),
            model_id: record.model_id.as_ref().map(ToString::to_string),
            input: record.input.clone(),
            output: record.output.clone(),
            error: record.error.clone(),
            succeeded: record.succeeded,
            duration_ms: i64::try_from(record.duration_ms).unwrap_or(i64::MAX),
            created_at: record.created_at.to_rfc3339(),
        }
    }

    pub fn into_record(self) -> Result<GenerationRecord, StoreError> {
        Ok(GenerationRecord {
            id: parse::<RecordId>("record id", &self.id)?,
            petition_id: parse::<PetitionId>("record petition id", &self.petition_id)?,
            sequence: u32::try_from(self.sequence).map_err(|e| corrupt("record sequence", e))?,
            stage: parse::<StageKind>("record stage", &self.stage)?,
            agent_id: self
                .agent_id
                .as_deref()
                .map(|id| parse::<AgentId>("record agent id", id))
                .transpose()?,
            model_id: self.model_id.and_then(ModelId::new),
            input: self.input,
            output: self.output,
            error: self.error,
            succeeded: self.succeeded,
            duration_ms: u64::try_from(self.duration_ms).unwrap_or(0),
            created_at: timestamp("record created_at", &self.created_at)?,
        })
    }
}
