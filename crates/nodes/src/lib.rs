//! Petition pipeline orchestration.
//!
//! This crate provides the generation stage, the three-stage review chain,
//! the [`PetitionExecutor`] that drives a petition through them, and the
//! [`PetitionService`] boundary used by the HTTP listener and the CLI.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Nodes sequence calls between business logic in the
//! [`pipeline`] crate and the infrastructure ports (model gateway, agent
//! repository, petition store). They contain no domain rules of their own.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`gateway`] | `StageGateway`: timeout, cancellation and empty-output checks |
//! | [`plan`] | Up-front agent resolution for a run |
//! | [`generation`] | Generation stage |
//! | [`review`] | Review stages |
//! | [`stage`] | `StageOutcome` shared by both stage kinds |
//! | [`executor`] | `PetitionExecutor` |
//! | [`service`] | `PetitionService` boundary operations |

pub mod executor;
pub mod gateway;
pub mod generation;
pub mod plan;
pub mod review;
pub mod service;
pub mod stage;

pub use executor::{ExecutorConfig, PetitionExecutor};
pub use gateway::{StageGateway, DEFAULT_STAGE_TIMEOUT};
pub use plan::StagePlan;
pub use service::{HistoryEntry, PetitionService};
pub use stage::StageOutcome;
