//! Prompt templates with a closed, typed placeholder set.
//!
//! A template is parsed once, when an agent is registered or the catalog is
//! loaded, into literal segments and [`Placeholder`] slots. Rendering can then
//! never fail: every slot maps to a request field (or the current draft), and a
//! field the client left out renders as an empty string.
//!
//! Syntax: `{name}` inserts a placeholder, `{{` and `}}` produce literal braces.
//! Both the Portuguese names used by the stock templates and English aliases
//! are accepted (see [`Placeholder::from_name`]).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::PetitionRequest;

/// A value that can be substituted into a prompt template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    PetitionType,
    Facts,
    Arguments,
    RequestedRelief,
    ClientId,
    ClientName,
    TaxId,
    ProcessReference,
    Authority,
    City,
    /// The draft produced by the previous stage. Empty for the generator.
    Draft,
}

impl Placeholder {
    /// Every placeholder, in documentation order.
    pub const ALL: [Placeholder; 11] = [
        Self::PetitionType,
        Self::Facts,
        Self::Arguments,
        Self::RequestedRelief,
        Self::ClientId,
        Self::ClientName,
        Self::TaxId,
        Self::ProcessReference,
        Self::Authority,
        Self::City,
        Self::Draft,
    ];

    /// Canonical name written in templates.
    pub fn name(self) -> &'static str {
        match self {
            Self::PetitionType => "tipo",
            Self::Facts => "fatos",
            Self::Arguments => "argumentos",
            Self::RequestedRelief => "pedidos",
            Self::ClientId => "cliente_id",
            Self::ClientName => "cliente_nome",
            Self::TaxId => "cliente_cnpj",
            Self::ProcessReference => "referencia_processo",
            Self::Authority => "autoridade",
            Self::City => "cidade",
            Self::Draft => "texto",
        }
    }

    fn alias(self) -> &'static str {
        match self {
            Self::PetitionType => "petition_type",
            Self::Facts => "facts",
            Self::Arguments => "arguments",
            Self::RequestedRelief => "requested_relief",
            Self::ClientId => "client_id",
            Self::ClientName => "client_name",
            Self::TaxId => "tax_id",
            Self::ProcessReference => "process_reference",
            Self::Authority => "authority",
            Self::City => "city",
            Self::Draft => "draft",
        }
    }

    /// Resolves a placeholder by canonical name or English alias.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == name || p.alias() == name)
    }
}

impl std::fmt::Display for Placeholder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.name())
    }
}

// ---------------------------------------------------------------------------

/// Why a template source string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template is empty")]
    Empty,

    #[error("unknown placeholder '{{{name}}}' at byte {offset}")]
    UnknownPlaceholder { name: String, offset: usize },

    #[error("empty placeholder '{{}}' at byte {offset}")]
    EmptyPlaceholder { offset: usize },

    #[error("unclosed '{{' at byte {offset}")]
    UnclosedBrace { offset: usize },

    #[error("unmatched '}}' at byte {offset}; write '}}}}' for a literal brace")]
    UnmatchedClosingBrace { offset: usize },

    /// A reviewer template must show the reviewer the draft it revises.
    #[error("reviewer template does not contain the draft placeholder {{texto}}")]
    MissingDraftPlaceholder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(Placeholder),
}

/// A parsed, validated prompt template.
///
/// Serialises as its source text; deserialising re-validates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parses `source`, rejecting unknown placeholders and unbalanced braces.
    pub fn parse(source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        if source.trim().is_empty() {
            return Err(TemplateError::Empty);
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, n) in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        name.push(n);
                    }
                    if !closed {
                        return Err(TemplateError::UnclosedBrace { offset });
                    }
                    if name.is_empty() {
                        return Err(TemplateError::EmptyPlaceholder { offset });
                    }
                    let placeholder = Placeholder::from_name(&name)
                        .ok_or(TemplateError::UnknownPlaceholder { name, offset })?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Slot(placeholder));
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(TemplateError::UnmatchedClosingBrace { offset }),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { source, segments })
    }

    /// Returns the original template text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns `true` if the template references `placeholder`.
    pub fn uses(&self, placeholder: Placeholder) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Slot(p) if *p == placeholder))
    }

    /// Substitutes every placeholder from `context`.
    pub fn render(&self, context: &RenderContext<'_>) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(placeholder) => out.push_str(context.value(*placeholder)),
            }
        }
        out
    }
}

impl TryFrom<String> for PromptTemplate {
    type Error = TemplateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<PromptTemplate> for String {
    fn from(value: PromptTemplate) -> Self {
        value.source
    }
}

// ---------------------------------------------------------------------------

/// The values available to a template while one stage runs.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    request: &'a PetitionRequest,
    draft: Option<&'a str>,
}

impl<'a> RenderContext<'a> {
    /// Context for the generator: request fields only.
    pub fn for_generation(request: &'a PetitionRequest) -> Self {
        Self {
            request,
            draft: None,
        }
    }

    /// Context for a reviewer: request fields plus the draft under review.
    pub fn for_review(request: &'a PetitionRequest, draft: &'a str) -> Self {
        Self {
            request,
            draft: Some(draft),
        }
    }

    /// Returns the substitution for `placeholder`; missing fields are empty.
    pub fn value(&self, placeholder: Placeholder) -> &'a str {
        let r = self.request;
        match placeholder {
            Placeholder::PetitionType => r.petition_type.as_str(),
            Placeholder::Facts => &r.facts,
            Placeholder::Arguments => &r.arguments,
            Placeholder::RequestedRelief => &r.requested_relief,
            Placeholder::ClientId => r.client_id.as_ref().map_or("", |c| c.as_str()),
            Placeholder::ClientName => r.client_name.as_deref().unwrap_or(""),
            Placeholder::TaxId => r.tax_id.as_deref().unwrap_or(""),
            Placeholder::ProcessReference => r.process_reference.as_deref().unwrap_or(""),
            Placeholder::Authority => r.authority.as_deref().unwrap_or(""),
            Placeholder::City => r.city.as_deref().unwrap_or(""),
            Placeholder::Draft => self.draft.unwrap_or(""),
        }
    }
}
