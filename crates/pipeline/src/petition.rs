//! Petitions, their append-only audit trail, and the petition store port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    AgentId, ClientId, ModelId, PetitionId, PetitionRequest, PetitionStatus, PetitionType,
    RecordId, StageKind, StoreError, Timestamp,
};

// ---------------------------------------------------------------------------
// Generation records
// ---------------------------------------------------------------------------

/// Immutable audit entry for one stage execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: RecordId,
    pub petition_id: PetitionId,
    /// Position in the petition's trail, starting at 0.
    pub sequence: u32,
    pub stage: StageKind,
    /// Agent that ran the stage.
    pub agent_id: Option<AgentId>,
    pub model_id: Option<ModelId>,
    /// The rendered prompt sent to the model.
    pub input: String,
    /// Model output; present only when the stage succeeded.
    pub output: Option<String>,
    /// Failure description; present only when the stage failed.
    pub error: Option<String>,
    pub succeeded: bool,
    pub duration_ms: u64,
    pub created_at: Timestamp,
}

impl GenerationRecord {
    /// Whether this record documents a failed stage.
    pub fn failed(&self) -> bool {
        !self.succeeded
    }
}

// ---------------------------------------------------------------------------
// Petition
// ---------------------------------------------------------------------------

/// Which stage made a petition fail, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSummary {
    pub stage: StageKind,
    pub message: String,
}

/// Attempt to move a petition out of a terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("petition status cannot change from {from} to {to}")]
pub struct StatusChangeError {
    pub from: PetitionStatus,
    pub to: PetitionStatus,
}

/// A generated legal document plus its processing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Petition {
    pub id: PetitionId,
    pub petition_type: PetitionType,
    pub request: PetitionRequest,
    pub status: PetitionStatus,
    /// Stage records in execution order.
    pub records: Vec<GenerationRecord>,
    /// Output of the last review stage; set only when `status` is `Completed`.
    pub final_text: Option<String>,
    pub failure: Option<FailureSummary>,
    /// Reference to the document template for rendering, from the catalog.
    pub output_template: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Petition {
    /// Creates a pending petition for `request`.
    pub fn pending(
        id: PetitionId,
        request: PetitionRequest,
        output_template: Option<String>,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            petition_type: request.petition_type.clone(),
            request,
            status: PetitionStatus::Pending,
            records: Vec::new(),
            final_text: None,
            failure: None,
            output_template,
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks the petition completed with its final text.
    pub fn complete(&mut self, final_text: String) -> Result<(), StatusChangeError> {
        self.transition(PetitionStatus::Completed)?;
        self.final_text = Some(final_text);
        Ok(())
    }

    /// Marks the petition failed at `stage`. Any final text is withheld.
    pub fn fail(
        &mut self,
        stage: StageKind,
        message: impl Into<String>,
    ) -> Result<(), StatusChangeError> {
        self.transition(PetitionStatus::Failed)?;
        self.final_text = None;
        self.failure = Some(FailureSummary {
            stage,
            message: message.into(),
        });
        Ok(())
    }

    fn transition(&mut self, to: PetitionStatus) -> Result<(), StatusChangeError> {
        if self.status.is_terminal() {
            return Err(StatusChangeError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Timestamp::now().max(self.updated_at);
        Ok(())
    }

    /// The list-view projection of this petition.
    pub fn summary(&self) -> PetitionSummary {
        PetitionSummary {
            id: self.id,
            petition_type: self.petition_type.clone(),
            client_id: self.request.client_id.clone(),
            client_name: self.request.client_name.clone(),
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A petition without its request body and trail, for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetitionSummary {
    pub id: PetitionId,
    pub petition_type: PetitionType,
    pub client_id: Option<ClientId>,
    pub client_name: Option<String>,
    pub status: PetitionStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Optional constraints for petition listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetitionFilter {
    #[serde(default, alias = "client")]
    pub client_id: Option<ClientId>,
    #[serde(default, alias = "type")]
    pub petition_type: Option<PetitionType>,
    #[serde(default)]
    pub status: Option<PetitionStatus>,
}

impl PetitionFilter {
    /// Returns `true` if `petition` satisfies every set constraint.
    pub fn matches(&self, petition: &Petition) -> bool {
        self.client_id
            .as_ref()
            .map_or(true, |c| petition.request.client_id.as_ref() == Some(c))
            && self
                .petition_type
                .as_ref()
                .map_or(true, |t| *t == petition.petition_type)
            && self.status.map_or(true, |s| s == petition.status)
    }
}

// ---------------------------------------------------------------------------
// Store port
// ---------------------------------------------------------------------------

/// Persistence for petitions and their generation records.
///
/// Implementations must serialise writes per petition id and must refuse to
/// modify a petition whose stored status is terminal.
#[async_trait]
pub trait PetitionStore: Send + Sync {
    /// Inserts or updates the petition row and any of its records not yet stored.
    ///
    /// Fails with [`StoreError::TerminalState`] if the stored petition is
    /// already completed or failed.
    async fn save(&self, petition: &Petition) -> Result<(), StoreError>;

    /// Appends one record to an existing, non-terminal petition's trail.
    async fn append_record(&self, record: &GenerationRecord) -> Result<(), StoreError>;

    /// Fetches a petition with its records in sequence order.
    async fn get(&self, id: PetitionId) -> Result<Option<Petition>, StoreError>;

    /// Lists petitions matching `filter`, newest first.
    async fn list(&self, filter: &PetitionFilter) -> Result<Vec<PetitionSummary>, StoreError>;
}
