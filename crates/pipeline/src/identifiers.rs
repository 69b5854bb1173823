//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging (for example)
//! a [`PetitionId`] with an [`AgentId`] even though both are UUIDs under the hood,
//! or a [`PetitionType`] with a [`Specialty`] even though both are strings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display, and
// String conversions. Deserialization goes through new(), so blank values are
// rejected and surrounding whitespace is trimmed on every input path.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is blank.
            ///
            /// Surrounding whitespace is trimmed.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    None
                } else if trimmed.len() == v.len() {
                    Some(Self(v))
                } else {
                    Some(Self(trimmed.to_string()))
                }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

        }

        impl TryFrom<String> for $name {
            type Error = BlankIdentifier;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value).ok_or(BlankIdentifier {
                    kind: stringify!($name),
                })
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

/// Returned when a string identifier is empty or only whitespace.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} must not be blank")]
pub struct BlankIdentifier {
    /// Which identifier type was being built.
    pub kind: &'static str,
}

// ---------------------------------------------------------------------------
// Macro for UUID-wrapped newtypes (internally generated identities).
// Generates: struct (Copy), new_random(), from_uuid(), as_uuid(), Display, FromStr.
// ---------------------------------------------------------------------------
macro_rules! uuid_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a new random identifier.
            pub fn new_random() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID (e.g. read back from storage).
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the underlying [`Uuid`].
            pub fn as_uuid(self) -> Uuid {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

uuid_id! {
    /// Identifies a petition and its whole processing run.
    ///
    /// Generated when a request is accepted for generation; propagated through
    /// spans and every [`crate::GenerationRecord`] so all activity for one
    /// petition can be correlated.
    PetitionId
}

uuid_id! {
    /// Identifies a configured generator or reviewer agent.
    AgentId
}

uuid_id! {
    /// Identifies a single [`crate::GenerationRecord`] in a petition's audit trail.
    RecordId
}

// ---------------------------------------------------------------------------
// Identifiers: string-backed (configuration / client-supplied names)
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a kind of petition (e.g. `"recurso_administrativo"`).
    ///
    /// Petition types are declared in the petition-type catalog and matched
    /// against generator agent specialties.
    PetitionType
}

string_id! {
    /// The specialty an agent applies to.
    ///
    /// For generators this is a [`PetitionType`] code; for reviewers it names a
    /// review axis (e.g. `"juridico"`, `"formatacao"`, `"linguagem"`).
    Specialty
}

string_id! {
    /// Identifies a model on the external text-generation endpoint
    /// (e.g. `"meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo"`).
    ModelId
}

string_id! {
    /// Identifies the client a petition is filed for.
    ClientId
}

impl Specialty {
    /// Creates a specialty from a non-blank compile-time constant.
    pub(crate) fn from_static(value: &'static str) -> Self {
        Self(value.to_string())
    }
}

impl From<&PetitionType> for Specialty {
    fn from(value: &PetitionType) -> Self {
        Self(value.as_str().to_string())
    }
}
