//! Review chain definition: the fixed stage order and the mapping from each
//! stage to the reviewer specialty that serves it.

use serde::{Deserialize, Serialize};

use crate::Specialty;

/// One axis of review applied to a draft.
///
/// The chain always runs [`ReviewStage::ORDER`]; each stage consumes the
/// previous stage's output, never the original draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStage {
    Legal,
    Formatting,
    Language,
}

impl ReviewStage {
    /// The fixed execution order of the review chain.
    pub const ORDER: [ReviewStage; 3] = [Self::Legal, Self::Formatting, Self::Language];

    /// Returns the stable wire name of the stage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Legal => "legal",
            Self::Formatting => "formatting",
            Self::Language => "language",
        }
    }

    /// The reviewer specialty used when configuration does not override it.
    pub fn default_specialty(self) -> &'static str {
        match self {
            Self::Legal => "juridico",
            Self::Formatting => "formatacao",
            Self::Language => "linguagem",
        }
    }
}

impl std::fmt::Display for ReviewStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------

/// Which reviewer specialty serves each review stage, and whether a generic
/// reviewer may stand in when no specialty-matched reviewer is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewChainConfig {
    /// Specialty of the reviewer for [`ReviewStage::Legal`].
    pub legal: Specialty,
    /// Specialty of the reviewer for [`ReviewStage::Formatting`].
    pub formatting: Specialty,
    /// Specialty of the reviewer for [`ReviewStage::Language`].
    pub language: Specialty,
    /// Specialty of a generic reviewer used when a stage has no match.
    ///
    /// `None` (the default) makes a missing reviewer a hard configuration
    /// error.
    pub fallback_specialty: Option<Specialty>,
}

impl ReviewChainConfig {
    /// Returns the configured specialty for `stage`.
    pub fn specialty_for(&self, stage: ReviewStage) -> &Specialty {
        match stage {
            ReviewStage::Legal => &self.legal,
            ReviewStage::Formatting => &self.formatting,
            ReviewStage::Language => &self.language,
        }
    }
}

impl Default for ReviewChainConfig {
    fn default() -> Self {
        let specialty = |stage: ReviewStage| Specialty::from_static(stage.default_specialty());
        Self {
            legal: specialty(ReviewStage::Legal),
            formatting: specialty(ReviewStage::Formatting),
            language: specialty(ReviewStage::Language),
            fallback_specialty: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_is_legal_formatting_language() {
        assert_eq!(
            ReviewStage::ORDER,
            [ReviewStage::Legal, ReviewStage::Formatting, ReviewStage::Language]
        );
    }

    #[test]
    fn default_config_uses_portuguese_specialties_without_fallback() {
        let config = ReviewChainConfig::default();
        assert_eq!(config.specialty_for(ReviewStage::Legal).as_str(), "juridico");
        assert_eq!(config.specialty_for(ReviewStage::Formatting).as_str(), "formatacao");
        assert_eq!(config.specialty_for(ReviewStage::Language).as_str(), "linguagem");
        assert!(config.fallback_specialty.is_none());
    }
}
