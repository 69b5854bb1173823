//! Shared value types for the petition pipeline domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (e.g. a petition status only moves forward,
//! timestamps are UTC) and participate in domain computations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::review::ReviewStage;

// ---------------------------------------------------------------------------
// Agent role
// ---------------------------------------------------------------------------

/// The part an agent plays in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Produces the initial draft from a petition request.
    Generator,
    /// Revises an existing draft along one axis.
    Reviewer,
}

impl AgentRole {
    /// Returns the stable storage / wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generator => "generator",
            Self::Reviewer => "reviewer",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentRole {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generator" => Ok(Self::Generator),
            "reviewer" => Ok(Self::Reviewer),
            other => Err(UnknownVariant::new("agent role", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Petition status
// ---------------------------------------------------------------------------

/// Overall processing status of a petition.
///
/// Transitions are monotonic: `Pending → Completed` or `Pending → Failed`.
/// Terminal statuses never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetitionStatus {
    /// The pipeline has not finished yet.
    Pending,
    /// Every stage succeeded and the final text is available.
    Completed,
    /// A stage failed or the run was cancelled; no final text is exposed.
    Failed,
}

impl PetitionStatus {
    /// Returns the stable storage / wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transition is allowed.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving from `self` to `next` respects the monotonic order.
    ///
    /// Re-asserting the current status is allowed so that saves are idempotent.
    pub fn can_transition_to(self, next: PetitionStatus) -> bool {
        self == next || (self == Self::Pending && next.is_terminal())
    }
}

impl std::fmt::Display for PetitionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PetitionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownVariant::new("petition status", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage kind
// ---------------------------------------------------------------------------

/// Which pipeline stage produced a [`crate::GenerationRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Generation,
    LegalReview,
    FormattingReview,
    LanguageReview,
}

impl StageKind {
    /// Returns the stable storage / wire name of the stage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::LegalReview => "legal_review",
            Self::FormattingReview => "formatting_review",
            Self::LanguageReview => "language_review",
        }
    }

    /// Returns the review stage this kind corresponds to, if any.
    pub fn review_stage(self) -> Option<ReviewStage> {
        match self {
            Self::Generation => None,
            Self::LegalReview => Some(ReviewStage::Legal),
            Self::FormattingReview => Some(ReviewStage::Formatting),
            Self::LanguageReview => Some(ReviewStage::Language),
        }
    }
}

impl From<ReviewStage> for StageKind {
    fn from(stage: ReviewStage) -> Self {
        match stage {
            ReviewStage::Legal => Self::LegalReview,
            ReviewStage::Formatting => Self::FormattingReview,
            ReviewStage::Language => Self::LanguageReview,
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StageKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generation" => Ok(Self::Generation),
            "legal_review" => Ok(Self::LegalReview),
            "formatting_review" => Ok(Self::FormattingReview),
            "language_review" => Ok(Self::LanguageReview),
            other => Err(UnknownVariant::new("stage kind", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// Returned when a stored or client-supplied name does not match any variant
/// of one of the closed enums above.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The offending value.
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Parses an RFC 3339 string (the storage representation).
    pub fn parse_rfc3339(value: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(value).map(|dt| Self(dt.with_timezone(&Utc)))
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }

    /// Returns the RFC 3339 representation with nanosecond precision.
    ///
    /// Fixed-width output keeps lexical and chronological order identical.
    pub fn to_rfc3339(self) -> String {
        self.0.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_only_moves_forward() {
        use PetitionStatus::*;
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Failed));
        assert!(Completed.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
    }

    #[test]
    fn enum_names_round_trip_through_storage_form() {
        for kind in [
            StageKind::Generation,
            StageKind::LegalReview,
            StageKind::FormattingReview,
            StageKind::LanguageReview,
        ] {
            assert_eq!(kind.as_str().parse::<StageKind>().unwrap(), kind);
        }
        assert_eq!("reviewer".parse::<AgentRole>().unwrap(), AgentRole::Reviewer);
        let err = "archived".parse::<PetitionStatus>().unwrap_err();
        assert_eq!(err.to_string(), "unknown petition status: 'archived'");
    }

    #[test]
    fn timestamp_storage_form_preserves_order() {
        let earlier = Timestamp::now();
        let later = Timestamp::from_utc(earlier.as_datetime() + chrono::Duration::nanoseconds(1));
        let (a, b) = (earlier.to_rfc3339(), later.to_rfc3339());
        assert!(a < b);
        assert_eq!(Timestamp::parse_rfc3339(&a).unwrap(), earlier);
    }
}
