//! Loading of the petition-type catalog.

use std::path::Path;

use anyhow::Context;
use pipeline::{CatalogDocument, TemplateStore};

/// Catalog compiled into the binary, used unless `catalog.path` is set.
pub const BUILTIN_CATALOG: &str = include_str!("../defaults/catalog.toml");

pub fn load(path: Option<&Path>) -> anyhow::Result<TemplateStore> {
    let (text, origin) = match path {
        Some(path) => (
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read catalog {}", path.display()))?,
            path.display().to_string(),
        ),
        None => (BUILTIN_CATALOG.to_string(), "built-in".to_string()),
    };
    let store = parse(&text).with_context(|| format!("invalid catalog ({origin})"))?;
    tracing::debug!(
        origin,
        petition_types = store.petition_types().count(),
        reviewers = store.reviewers().count(),
        "catalog loaded"
    );
    Ok(store)
}

pub fn parse(text: &str) -> anyhow::Result<TemplateStore> {
    let document: CatalogDocument = toml::from_str(text)?;
    if document.petition_types.is_empty() {
        anyhow::bail!("catalog defines no petition types");
    }
    Ok(TemplateStore::from_document(document)?)
}

#[cfg(test)]
mod tests {
    use pipeline::{
        AgentRole, ModelId, PetitionRequest, PetitionType, RenderContext, Specialty,
    };

    use super::*;

    #[test]
    fn builtin_catalog_has_the_four_petition_types() {
        let store = parse(BUILTIN_CATALOG).unwrap();
        let codes: Vec<String> = store.petition_types().map(|t| t.code.to_string()).collect();
        assert_eq!(codes.len(), 4);
        for code in [
            "recurso_administrativo",
            "impugnacao_edital",
            "mandado_seguranca",
            "contrarrazoes_recurso",
        ] {
            assert!(codes.iter().any(|c| c == code), "missing {code}");
        }
        for def in store.petition_types() {
            assert_eq!(def.required_fields, ["fatos", "argumentos", "pedidos"]);
        }
        for specialty in ["juridico", "formatacao", "linguagem"] {
            assert!(store.reviewer(&Specialty::new(specialty).unwrap()).is_some());
        }
    }

    #[test]
    fn builtin_catalog_seeds_one_agent_per_entry() {
        let store = parse(BUILTIN_CATALOG).unwrap();
        let seeds = store.seed_agents(&ModelId::new("m").unwrap());
        assert_eq!(seeds.len(), 7);
        assert_eq!(
            seeds.iter().filter(|a| a.role == AgentRole::Reviewer).count(),
            3
        );
        for seed in seeds {
            seed.into_agent().unwrap();
        }
    }

    #[test]
    fn builtin_generator_prompt_renders_the_request() {
        let store = parse(BUILTIN_CATALOG).unwrap();
        let appeal = store
            .petition_type(&PetitionType::new("recurso_administrativo").unwrap())
            .unwrap();
        let mut request = PetitionRequest::new(appeal.code.clone());
        request.facts = "Fomos inabilitados por falta de atestado.".into();
        request.client_name = Some("Empresa ABC Ltda.".into());

        let prompt = appeal
            .prompt_template
            .render(&RenderContext::for_generation(&request));
        assert!(prompt.contains("Fomos inabilitados por falta de atestado."));
        assert!(prompt.contains("Nome: Empresa ABC Ltda."));
        assert!(!prompt.contains("{fatos}"));
    }

    #[test]
    fn catalog_without_petition_types_is_rejected() {
        let text = "[[reviewer]]\nspecialty = \"juridico\"\nname = \"R\"\n\
                    description = \"\"\nprompt_template = \"{texto}\"\n";
        let err = parse(text).unwrap_err();
        assert!(err.to_string().contains("no petition types"));
    }

    #[test]
    fn unknown_placeholders_are_rejected() {
        let text = "[[petition_type]]\ncode = \"x\"\nname = \"X\"\n\
                    prompt_template = \"{desconhecido}\"\n";
        assert!(parse(text).is_err());
    }
}
