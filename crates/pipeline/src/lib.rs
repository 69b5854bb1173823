//! Core domain for the petition generation and review pipeline.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, and error type used throughout the workspace. Infrastructure crates
//! implement the port traits defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`PetitionId`, `AgentId`, `PetitionType`, etc.) |
//! | [`types`] | Shared value types (`AgentRole`, `PetitionStatus`, `StageKind`, `Timestamp`) |
//! | [`errors`] | `PipelineError`, `StageFailure`, `StoreError`, `RetryPolicy` |
//! | [`request`] | The client-submitted `PetitionRequest` |
//! | [`template`] | Prompt templates with typed placeholders |
//! | [`review`] | Review stage order and reviewer specialty configuration |
//! | [`state`] | Per-petition pipeline state machine |
//! | [`gateway`] | `ModelGateway` port |
//! | [`agent`] | `Agent` and the `AgentRepository` port |
//! | [`petition`] | `Petition`, `GenerationRecord` and the `PetitionStore` port |
//! | [`catalog`] | Petition-type catalog (`TemplateStore`) |

pub mod agent;
pub mod catalog;
pub mod errors;
pub mod gateway;
pub mod identifiers;
pub mod petition;
pub mod request;
pub mod review;
pub mod state;
pub mod template;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use agent::{Agent, AgentFilter, AgentRepository, NewAgent};
pub use catalog::{
    CatalogDocument, CatalogError, PetitionTypeDefinition, PetitionTypeEntry, ReviewerEntry,
    ReviewerTemplate, TemplateStore,
};
pub use errors::{PipelineError, RetryPolicy, StageFailure, StoreError};
pub use gateway::{GatewayError, GenerationOptions, ModelGateway};
pub use identifiers::{
    AgentId, BlankIdentifier, ClientId, ModelId, PetitionId, PetitionType, RecordId, Specialty,
};
pub use petition::{
    FailureSummary, GenerationRecord, Petition, PetitionFilter, PetitionStore, PetitionSummary,
    StatusChangeError,
};
pub use request::PetitionRequest;
pub use review::{ReviewChainConfig, ReviewStage};
pub use state::{IllegalTransition, PipelineState, PipelineStateMachine, TransitionRecord};
pub use template::{Placeholder, PromptTemplate, RenderContext, TemplateError};
pub use types::{AgentRole, PetitionStatus, StageKind, Timestamp, UnknownVariant};
