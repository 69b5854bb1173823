//! Petition-type catalog (the template store).
//!
//! The catalog is read once at start-up from a [`CatalogDocument`] and never
//! changes afterwards. It answers two questions: which petition types exist
//! (with their default generator prompt and output-template reference), and
//! which stock reviewer prompt belongs to each review specialty.
//!
//! Every template is parsed while the catalog is built, so a bad placeholder
//! stops the service from starting rather than failing a petition later.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::NewAgent;
use crate::template::{Placeholder, PromptTemplate, TemplateError};
use crate::{AgentRole, ModelId, PetitionType, PipelineError, Specialty};

// ---------------------------------------------------------------------------
// Source document
// ---------------------------------------------------------------------------

/// The serialised form of a catalog, as written in configuration files.
///
/// ```toml
/// [[petition_type]]
/// code = "recurso_administrativo"
/// name = "Recurso Administrativo"
/// prompt_template = "Redija um recurso... {fatos}"
/// output_template = "recurso_administrativo.docx"
/// required_fields = ["fatos", "argumentos", "pedidos"]
///
/// [[reviewer]]
/// specialty = "juridico"
/// name = "Revisor Jurídico"
/// prompt_template = "Revise juridicamente:\n{texto}"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default, rename = "petition_type")]
    pub petition_types: Vec<PetitionTypeEntry>,
    #[serde(default, rename = "reviewer")]
    pub reviewers: Vec<ReviewerEntry>,
}

/// One `[[petition_type]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetitionTypeEntry {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub prompt_template: String,
    #[serde(default)]
    pub output_template: Option<String>,
    /// Request fields a client is expected to fill, by placeholder name.
    #[serde(default)]
    pub required_fields: Vec<String>,
}

/// One `[[reviewer]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerEntry {
    pub specialty: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub prompt_template: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a catalog document was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("catalog entry has a blank {field}")]
    BlankField { field: &'static str },

    #[error("petition type '{code}' is declared more than once")]
    DuplicatePetitionType { code: String },

    #[error("reviewer specialty '{specialty}' is declared more than once")]
    DuplicateReviewer { specialty: String },

    #[error("petition type '{code}' lists unknown required field '{field}'")]
    UnknownRequiredField { code: String, field: String },

    #[error("template of '{owner}' is invalid: {source}")]
    InvalidTemplate {
        owner: String,
        #[source]
        source: TemplateError,
    },
}

impl From<CatalogError> for PipelineError {
    fn from(err: CatalogError) -> Self {
        PipelineError::ConfigurationError {
            message: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validated catalog
// ---------------------------------------------------------------------------

/// A petition type offered by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetitionTypeDefinition {
    pub code: PetitionType,
    pub name: String,
    pub description: String,
    /// Default prompt for the generator agent of this type.
    pub prompt_template: PromptTemplate,
    /// Reference to the document template used to render the final text.
    pub output_template: Option<String>,
    /// Fields shown to clients as expected for this type, by canonical
    /// placeholder name. Informational: a missing field still renders empty.
    pub required_fields: Vec<String>,
}

/// Stock prompt for one review specialty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerTemplate {
    pub specialty: Specialty,
    pub name: String,
    pub description: String,
    pub prompt_template: PromptTemplate,
}

/// Immutable, validated petition-type catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateStore {
    petition_types: BTreeMap<PetitionType, PetitionTypeDefinition>,
    reviewers: BTreeMap<Specialty, ReviewerTemplate>,
}

impl TemplateStore {
    /// Validates `document` and builds the catalog.
    pub fn from_document(document: CatalogDocument) -> Result<Self, CatalogError> {
        let mut petition_types = BTreeMap::new();
        for entry in document.petition_types {
            let code = PetitionType::new(entry.code)
                .ok_or(CatalogError::BlankField { field: "petition type code" })?;
            let prompt_template = parse_template(code.as_str(), entry.prompt_template)?;
            let required_fields = entry
                .required_fields
                .iter()
                .map(|field| match Placeholder::from_name(field.trim()) {
                    Some(p) if p != Placeholder::Draft => Ok(p.name().to_string()),
                    _ => Err(CatalogError::UnknownRequiredField {
                        code: code.to_string(),
                        field: field.clone(),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?;
            let definition = PetitionTypeDefinition {
                code: code.clone(),
                name: non_blank(entry.name, "petition type name")?,
                description: entry.description,
                prompt_template,
                output_template: entry.output_template.filter(|t| !t.trim().is_empty()),
                required_fields,
            };
            if petition_types.insert(code.clone(), definition).is_some() {
                return Err(CatalogError::DuplicatePetitionType {
                    code: code.to_string(),
                });
            }
        }

        let mut reviewers = BTreeMap::new();
        for entry in document.reviewers {
            let specialty = Specialty::new(entry.specialty)
                .ok_or(CatalogError::BlankField { field: "reviewer specialty" })?;
            let prompt_template = parse_template(specialty.as_str(), entry.prompt_template)?;
            if !prompt_template.uses(Placeholder::Draft) {
                return Err(CatalogError::InvalidTemplate {
                    owner: specialty.to_string(),
                    source: TemplateError::MissingDraftPlaceholder,
                });
            }
            let template = ReviewerTemplate {
                specialty: specialty.clone(),
                name: non_blank(entry.name, "reviewer name")?,
                description: entry.description,
                prompt_template,
            };
            if reviewers.insert(specialty.clone(), template).is_some() {
                return Err(CatalogError::DuplicateReviewer {
                    specialty: specialty.to_string(),
                });
            }
        }

        tracing::debug!(
            petition_types = petition_types.len(),
            reviewers = reviewers.len(),
            "petition catalog loaded"
        );

        Ok(Self {
            petition_types,
            reviewers,
        })
    }

    /// Looks up a petition type.
    pub fn petition_type(&self, code: &PetitionType) -> Option<&PetitionTypeDefinition> {
        self.petition_types.get(code)
    }

    /// All petition types, ordered by code.
    pub fn petition_types(&self) -> impl Iterator<Item = &PetitionTypeDefinition> {
        self.petition_types.values()
    }

    pub fn reviewer(&self, specialty: &Specialty) -> Option<&ReviewerTemplate> {
        self.reviewers.get(specialty)
    }

    pub fn reviewers(&self) -> impl Iterator<Item = &ReviewerTemplate> {
        self.reviewers.values()
    }

    pub fn is_empty(&self) -> bool {
        self.petition_types.is_empty() && self.reviewers.is_empty()
    }

    /// Agent registrations covering every catalog entry with `model`.
    ///
    /// One generator per petition type and one reviewer per review specialty.
    pub fn seed_agents(&self, model: &ModelId) -> Vec<NewAgent> {
        let generators = self.petition_types().map(|def| NewAgent {
            name: format!("Gerador de {}", def.name),
            description: def.description.clone(),
            model_id: model.clone(),
            role: AgentRole::Generator,
            specialty: Specialty::from(&def.code),
            prompt_template: def.prompt_template.as_str().to_string(),
        });
        let reviewers = self.reviewers().map(|rev| NewAgent {
            name: rev.name.clone(),
            description: rev.description.clone(),
            model_id: model.clone(),
            role: AgentRole::Reviewer,
            specialty: rev.specialty.clone(),
            prompt_template: rev.prompt_template.as_str().to_string(),
        });
        generators.chain(reviewers).collect()
    }
}

fn parse_template(owner: &str, source: String) -> Result<PromptTemplate, CatalogError> {
    PromptTemplate::parse(source).map_err(|source| CatalogError::InvalidTemplate {
        owner: owner.to_string(),
        source,
    })
}

fn non_blank(value: String, field: &'static str) -> Result<String, CatalogError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::BlankField { field });
    }
    Ok(trimmed.to_string())
}
