//! Management operations of the pipeline boundary.

mod common;

use common::{agent, harness, register_full_chain, request, Step};
use nodes::ExecutorConfig;
use pipeline::{
    AgentFilter, AgentRole, ModelId, PetitionFilter, PetitionId, PetitionStatus, PetitionType,
    PipelineError, Specialty, TemplateError,
};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn add_agent_validates_the_template() {
    let h = harness(vec![], ExecutorConfig::default());

    let err = h
        .service
        .add_agent(agent(AgentRole::Reviewer, "juridico", "Revise a peticao."))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PipelineError::InvalidTemplate(TemplateError::MissingDraftPlaceholder)
    );

    let err = h
        .service
        .add_agent(agent(AgentRole::Generator, "recurso_administrativo", "{nome}"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::InvalidTemplate(TemplateError::UnknownPlaceholder { .. })
    ));

    let id = h
        .service
        .add_agent(agent(AgentRole::Reviewer, "juridico", "Revise:\n{texto}"))
        .await
        .unwrap();
    let agents = h.service.get_agents(&AgentFilter::default()).await.unwrap();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].id, id);
}

#[tokio::test]
async fn get_agents_filters_by_role_and_specialty() {
    let h = harness(vec![], ExecutorConfig::default());
    register_full_chain(h.store.as_ref()).await;

    let reviewers = h
        .service
        .get_agents(&AgentFilter {
            role: Some(AgentRole::Reviewer),
            specialty: None,
        })
        .await
        .unwrap();
    assert_eq!(reviewers.len(), 3);

    let legal = h
        .service
        .get_agents(&AgentFilter::exact(
            AgentRole::Reviewer,
            Specialty::new("juridico").unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(legal.len(), 1);
}

#[tokio::test]
async fn unknown_petition_is_not_found() {
    let h = harness(vec![], ExecutorConfig::default());
    let err = h
        .service
        .get_petition(PetitionId::new_random())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NotFound { .. }));
}

#[tokio::test]
async fn seeding_registers_the_catalog_once() {
    let h = harness(vec![], ExecutorConfig::default());
    let model = ModelId::new(common::MODEL).unwrap();

    assert_eq!(h.service.seed_agents(&model).await.unwrap(), 4);
    assert_eq!(h.service.seed_agents(&model).await.unwrap(), 0);

    let generators = h
        .service
        .get_agents(&AgentFilter {
            role: Some(AgentRole::Generator),
            specialty: None,
        })
        .await
        .unwrap();
    assert_eq!(generators.len(), 1);
    assert_eq!(generators[0].specialty.as_str(), "recurso_administrativo");
    assert_eq!(generators[0].model_id, model);
}

#[tokio::test]
async fn seeded_agents_can_run_a_petition() {
    let h = harness(
        vec![
            Step::Reply("minuta"),
            Step::Reply("minuta revisada"),
            Step::Reply("minuta formatada"),
            Step::Reply("minuta final"),
        ],
        ExecutorConfig::default(),
    );
    h.service
        .seed_agents(&ModelId::new(common::MODEL).unwrap())
        .await
        .unwrap();

    let petition = h
        .service
        .submit_and_fetch(request(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(petition.final_text.as_deref(), Some("minuta final"));
    assert_eq!(h.gateway.prompts()[1], "Revise (juridico):\nminuta");
}

#[tokio::test]
async fn petition_types_come_from_the_catalog() {
    let h = harness(vec![], ExecutorConfig::default());
    let types = h.service.list_petition_types();
    assert_eq!(types.len(), 1);
    assert_eq!(types[0].code, PetitionType::new("recurso_administrativo").unwrap());
    assert_eq!(
        types[0].output_template.as_deref(),
        Some("recurso_administrativo.docx")
    );
}

#[tokio::test]
async fn history_names_the_agent_of_each_stage() {
    let h = harness(
        vec![
            Step::Reply("draft"),
            Step::Reply("draft+legal"),
            Step::Reply("draft+legal+fmt"),
            Step::Reply("draft+legal+fmt+lang"),
        ],
        ExecutorConfig::default(),
    );
    register_full_chain(h.store.as_ref()).await;

    let id = h
        .service
        .submit(request(), &CancellationToken::new())
        .await
        .unwrap();
    let history = h.service.get_history(id).await.unwrap();

    let specialties: Vec<_> = history
        .iter()
        .map(|entry| entry.agent.as_ref().unwrap().specialty.to_string())
        .collect();
    assert_eq!(
        specialties,
        vec!["recurso_administrativo", "juridico", "formatacao", "linguagem"]
    );
}

#[tokio::test]
async fn listing_filters_by_status() {
    let h = harness(
        vec![
            Step::Reply("draft"),
            Step::Reply("draft+legal"),
            Step::Reply("draft+legal+fmt"),
            Step::Reply("draft+legal+fmt+lang"),
            Step::Reply(""),
        ],
        ExecutorConfig::default(),
    );
    register_full_chain(h.store.as_ref()).await;

    let cancel = CancellationToken::new();
    let completed = h.service.submit(request(), &cancel).await.unwrap();
    let failed = h
        .service
        .submit(request(), &cancel)
        .await
        .unwrap_err()
        .petition_id()
        .unwrap();

    let only_completed = h
        .service
        .list_petitions(&PetitionFilter {
            status: Some(PetitionStatus::Completed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(only_completed.len(), 1);
    assert_eq!(only_completed[0].id, completed);

    let all = h
        .service
        .list_petitions(&PetitionFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().any(|s| s.id == failed && s.status == PetitionStatus::Failed));
}
