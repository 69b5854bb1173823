//! Top-level error and retry-policy types for the petition pipeline domain.
//!
//! [`PipelineError`] covers every way a petition run, or a management
//! operation at the pipeline boundary, can end without the requested result.
//! Component-level errors (model gateway failures, template parse failures)
//! are defined in their respective modules; [`StoreError`] is shared by both
//! persistence ports.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in resubmission decisions must be able to produce a [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::state::IllegalTransition;
use crate::template::TemplateError;
use crate::{AgentRole, PetitionId, PetitionStatus, ReviewStage, Specialty};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is worth resubmitting and, if so, after what delay.
///
/// The pipeline never retries on its own. This value is surfaced to callers so
/// that they can decide whether submitting the same request again makes sense.
///
/// - `Retryable` errors: gateway timeouts, rate limits, model temporarily unavailable.
/// - `NonRetryable` errors: missing agents, bad credentials, invalid input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be resubmitted.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means resubmit
        /// immediately or apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// Resubmitting will fail the same way until something is reconfigured.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Stage failure causes
// ---------------------------------------------------------------------------

/// Why a single generation or review stage failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageFailure {
    /// The model gateway returned an error (including a timeout).
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The model answered with nothing but whitespace.
    #[error("model returned an empty response")]
    EmptyOutput,

    /// The run was cancelled while the stage was in flight.
    #[error("stage cancelled before completion")]
    Cancelled,
}

impl StageFailure {
    /// Whether the failure was a gateway timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Gateway(GatewayError::Timeout { .. }))
    }

    /// Resubmission advice for this failure.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Gateway(e) => e.retry_policy(),
            Self::EmptyOutput | Self::Cancelled => RetryPolicy::Retryable { after: None },
        }
    }
}

// ---------------------------------------------------------------------------
// Persistence errors
// ---------------------------------------------------------------------------

/// Errors produced by the agent repository and petition store ports.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The backing store rejected or failed the operation.
    #[error("storage backend error: {message}")]
    Backend {
        /// Description of the backend failure.
        message: String,
    },

    /// A stored row could not be decoded into a domain value.
    #[error("corrupt stored value: {message}")]
    Corrupt {
        /// What failed to decode.
        message: String,
    },

    /// An attempt to change a petition that already reached a terminal status.
    #[error("petition {id} is already {status}")]
    TerminalState {
        /// The petition concerned.
        id: PetitionId,
        /// Its stored terminal status.
        status: PetitionStatus,
    },

    /// A record was appended for a petition that was never saved.
    #[error("petition {id} does not exist")]
    UnknownPetition {
        /// The missing petition.
        id: PetitionId,
    },
}

// ---------------------------------------------------------------------------
// Pipeline-level errors
// ---------------------------------------------------------------------------

/// Errors returned by the pipeline boundary operations.
///
/// Stage failures carry the [`PetitionId`] of the failed petition so the
/// caller can fetch its audit trail.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// No agent is registered for a role/specialty the run needs.
    ///
    /// A configuration gap: reported before any model call, never retried.
    #[error("no {role} agent registered for '{specialty}'")]
    NoAgentForType {
        /// Role that was looked up.
        role: AgentRole,
        /// Petition type (generators) or review specialty (reviewers).
        specialty: Specialty,
    },

    /// The generation stage failed; the petition is stored as failed.
    #[error("generation failed for petition {petition_id}: {cause}")]
    GenerationFailed {
        petition_id: PetitionId,
        cause: StageFailure,
    },

    /// A review stage failed; the chain halted and the petition is stored as failed.
    #[error("{stage} review failed for petition {petition_id}: {cause}")]
    ReviewFailed {
        petition_id: PetitionId,
        stage: ReviewStage,
        cause: StageFailure,
    },

    /// The caller cancelled the run before it completed.
    #[error("petition {petition_id} was cancelled")]
    Cancelled { petition_id: PetitionId },

    /// Recording pipeline state failed. Fatal to the request.
    #[error("persistence error: {0}")]
    PersistenceError(#[from] StoreError),

    /// A prompt template failed validation.
    #[error("invalid prompt template: {0}")]
    InvalidTemplate(#[from] TemplateError),

    /// The request or management input is malformed.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// The requested petition or agent does not exist.
    #[error("{what} not found")]
    NotFound { what: String },

    /// The runtime configuration is invalid.
    ///
    /// Produced at load time; the service never starts with an invalid config.
    #[error("configuration error: {message}")]
    ConfigurationError { message: String },

    /// The orchestrator attempted a stage out of order.
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
}

impl PipelineError {
    /// The petition this error concerns, when a petition was created.
    pub fn petition_id(&self) -> Option<PetitionId> {
        match self {
            Self::GenerationFailed { petition_id, .. }
            | Self::ReviewFailed { petition_id, .. }
            | Self::Cancelled { petition_id } => Some(*petition_id),
            _ => None,
        }
    }

    /// Resubmission advice for this error.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::GenerationFailed { cause, .. } | Self::ReviewFailed { cause, .. } => {
                cause.retry_policy()
            }
            Self::Cancelled { .. } | Self::PersistenceError(_) => {
                RetryPolicy::Retryable { after: None }
            }
            Self::NoAgentForType { .. }
            | Self::InvalidTemplate(_)
            | Self::InvalidRequest { .. }
            | Self::NotFound { .. }
            | Self::ConfigurationError { .. }
            | Self::IllegalTransition(_) => RetryPolicy::NonRetryable,
        }
    }
}
