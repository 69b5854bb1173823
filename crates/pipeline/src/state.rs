//! Per-petition pipeline state machine.
//!
//! Every run starts at `Received` and ends at `Completed` or `Failed`:
//!
//! ```text
//! Received → Generating → Reviewing(legal) → Reviewing(formatting)
//!          → Reviewing(language) → Completed
//! any non-terminal state → Failed
//! ```
//!
//! The executor calls [`PipelineStateMachine::advance`] before each stage, so
//! a stage can only run if the one before it finished, and the transition log
//! documents exactly how far a failed run got.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ReviewStage, StageKind};

/// The set of pipeline states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "stage")]
pub enum PipelineState {
    /// Request accepted; agents being resolved.
    Received,
    /// Generator agent drafting.
    Generating,
    /// One reviewer revising the current draft.
    Reviewing(ReviewStage),
    /// Terminal: final text stored.
    Completed,
    /// Terminal: a stage failed or the run was cancelled.
    Failed,
}

impl PipelineState {
    /// Whether this is a terminal state (no further transitions allowed).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// The stage executing in this state, if any.
    pub fn stage(self) -> Option<StageKind> {
        match self {
            Self::Generating => Some(StageKind::Generation),
            Self::Reviewing(stage) => Some(stage.into()),
            Self::Received | Self::Completed | Self::Failed => None,
        }
    }

    /// The state that follows this one on the success path.
    pub fn next(self) -> Option<PipelineState> {
        use PipelineState::*;
        match self {
            Received => Some(Generating),
            Generating => Some(Reviewing(ReviewStage::Legal)),
            Reviewing(ReviewStage::Legal) => Some(Reviewing(ReviewStage::Formatting)),
            Reviewing(ReviewStage::Formatting) => Some(Reviewing(ReviewStage::Language)),
            Reviewing(ReviewStage::Language) => Some(Completed),
            Completed | Failed => None,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Received => write!(f, "Received"),
            Self::Generating => write!(f, "Generating"),
            Self::Reviewing(stage) => write!(f, "Reviewing[{stage}]"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

fn is_legal_transition(from: PipelineState, to: PipelineState) -> bool {
    // Any non-terminal state can transition to Failed.
    if to == PipelineState::Failed && !from.is_terminal() {
        return true;
    }
    from.next() == Some(to)
}

/// A single recorded state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: PipelineState,
    pub to: PipelineState,
    /// Milliseconds since the state machine was created.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error returned when an illegal transition is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal pipeline transition: {from} → {to}")]
pub struct IllegalTransition {
    pub from: PipelineState,
    pub to: PipelineState,
}

/// Tracks the current state of one petition run and its transition log.
#[derive(Debug)]
pub struct PipelineStateMachine {
    current: PipelineState,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl PipelineStateMachine {
    /// Creates a state machine at `Received`.
    pub fn new() -> Self {
        Self {
            current: PipelineState::Received,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> PipelineState {
        self.current
    }

    /// Attempts to move to `to`.
    pub fn advance(
        &mut self,
        to: PipelineState,
        reason: Option<&str>,
    ) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        tracing::debug!(from = %self.current, to = %to, "pipeline state transition");

        self.transitions.push(TransitionRecord {
            from: self.current,
            to,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        });
        self.current = to;
        Ok(())
    }

    /// Moves to `Failed` from any non-terminal state.
    pub fn fail(&mut self, reason: &str) -> Result<(), IllegalTransition> {
        self.advance(PipelineState::Failed, Some(reason))
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// One-line history, e.g. `Received → Generating → Failed (12ms)`.
    pub fn summary(&self) -> String {
        let mut states = vec![PipelineState::Received.to_string()];
        states.extend(self.transitions.iter().map(|t| t.to.to_string()));
        format!(
            "{} ({}ms)",
            states.join(" → "),
            self.created_at.elapsed().as_millis()
        )
    }
}

impl Default for PipelineStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_to(sm: &mut PipelineStateMachine, target: PipelineState) {
        while sm.current() != target {
            let next = sm.current().next().unwrap();
            sm.advance(next, None).unwrap();
        }
    }

    #[test]
    fn happy_path_visits_every_stage_in_order() {
        let mut sm = PipelineStateMachine::new();
        run_to(&mut sm, PipelineState::Completed);

        let visited: Vec<_> = sm.transitions().iter().map(|t| t.to).collect();
        assert_eq!(
            visited,
            vec![
                PipelineState::Generating,
                PipelineState::Reviewing(ReviewStage::Legal),
                PipelineState::Reviewing(ReviewStage::Formatting),
                PipelineState::Reviewing(ReviewStage::Language),
                PipelineState::Completed,
            ]
        );
        assert!(sm.is_terminal());
    }

    #[test]
    fn stages_cannot_be_skipped() {
        let mut sm = PipelineStateMachine::new();
        sm.advance(PipelineState::Generating, None).unwrap();
        let err = sm
            .advance(PipelineState::Reviewing(ReviewStage::Formatting), None)
            .unwrap_err();
        assert_eq!(err.from, PipelineState::Generating);
        assert_eq!(sm.current(), PipelineState::Generating);
    }

    #[test]
    fn failure_is_reachable_from_every_non_terminal_state() {
        for target in [
            PipelineState::Received,
            PipelineState::Generating,
            PipelineState::Reviewing(ReviewStage::Legal),
            PipelineState::Reviewing(ReviewStage::Formatting),
            PipelineState::Reviewing(ReviewStage::Language),
        ] {
            let mut sm = PipelineStateMachine::new();
            run_to(&mut sm, target);
            sm.fail("boom").unwrap();
            assert_eq!(sm.current(), PipelineState::Failed);
            assert_eq!(sm.transitions().last().unwrap().reason.as_deref(), Some("boom"));
        }
    }

    #[test]
    fn terminal_states_are_final() {
        let mut sm = PipelineStateMachine::new();
        run_to(&mut sm, PipelineState::Completed);
        assert!(sm.fail("late").is_err());

        let mut sm = PipelineStateMachine::new();
        sm.fail("early").unwrap();
        assert!(sm.advance(PipelineState::Generating, None).is_err());
        assert!(sm.fail("again").is_err());
    }

    #[test]
    fn states_name_their_stage() {
        assert_eq!(PipelineState::Generating.stage(), Some(StageKind::Generation));
        assert_eq!(
            PipelineState::Reviewing(ReviewStage::Language).stage(),
            Some(StageKind::LanguageReview)
        );
        assert_eq!(PipelineState::Completed.stage(), None);
        assert_eq!(
            PipelineState::Reviewing(ReviewStage::Legal).to_string(),
            "Reviewing[legal]"
        );
    }
}
