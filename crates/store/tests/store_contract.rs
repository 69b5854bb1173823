//! Behaviour shared by every persistence adapter, checked against both.

use pipeline::{
    AgentFilter, AgentRepository, AgentRole, ClientId, GenerationRecord, ModelId, NewAgent,
    Petition, PetitionFilter, PetitionId, PetitionRequest, PetitionStatus, PetitionStore,
    PetitionType, RecordId, Specialty, StageKind, StoreError, Timestamp,
};
use store::{MemoryStore, SqliteStore};

// ── Helpers ──────────────────────────────────────────────────────────────────

async fn sqlite() -> SqliteStore {
    SqliteStore::connect("sqlite::memory:").await.unwrap()
}

fn new_agent(role: AgentRole, specialty: &str, name: &str) -> pipeline::Agent {
    NewAgent {
        name: name.into(),
        description: String::new(),
        model_id: ModelId::new("meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo").unwrap(),
        role,
        specialty: Specialty::new(specialty).unwrap(),
        prompt_template: "Revise:\n{texto}".into(),
    }
    .into_agent()
    .unwrap()
}

fn petition(kind: &str, client: &str) -> Petition {
    let mut request = PetitionRequest::new(PetitionType::new(kind).unwrap());
    request.client_id = ClientId::new(client);
    request.client_name = Some("Empresa ABC Ltda.".into());
    request.facts = "Fomos inabilitados.".into();
    Petition::pending(PetitionId::new_random(), request, Some("recurso.docx".into()))
}

fn record(
    petition: &Petition,
    sequence: u32,
    stage: StageKind,
    output: Option<&str>,
) -> GenerationRecord {
    GenerationRecord {
        id: RecordId::new_random(),
        petition_id: petition.id,
        sequence,
        stage,
        agent_id: None,
        model_id: ModelId::new("m"),
        input: format!("prompt {sequence}"),
        output: output.map(String::from),
        error: output.is_none().then(|| "timeout".to_string()),
        succeeded: output.is_some(),
        duration_ms: 12,
        created_at: Timestamp::now(),
    }
}

// ── Contract ─────────────────────────────────────────────────────────────────

async fn latest_registered_agent_wins<S: AgentRepository>(store: S) {
    let first = new_agent(AgentRole::Reviewer, "juridico", "Revisor A");
    let second = new_agent(AgentRole::Reviewer, "juridico", "Revisor B");
    let other = new_agent(AgentRole::Reviewer, "linguagem", "Revisor C");
    let second_id = second.id;
    store.add(first).await.unwrap();
    store.add(second).await.unwrap();
    store.add(other).await.unwrap();

    let found = store
        .find(AgentRole::Reviewer, &Specialty::new("juridico").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, second_id);

    let reviewers = store
        .list(&AgentFilter {
            role: Some(AgentRole::Reviewer),
            specialty: None,
        })
        .await
        .unwrap();
    assert_eq!(reviewers.len(), 3);
    assert_eq!(reviewers[0].name, "Revisor A");

    assert!(store
        .find(AgentRole::Generator, &Specialty::new("juridico").unwrap())
        .await
        .unwrap()
        .is_none());
    assert_eq!(store.get(second_id).await.unwrap().unwrap().name, "Revisor B");
}

async fn trail_survives_a_round_trip<S: PetitionStore>(store: S) {
    let mut p = petition("recurso_administrativo", "c1");
    store.save(&p).await.unwrap();

    let generation = record(&p, 0, StageKind::Generation, Some("draft"));
    let legal = record(&p, 1, StageKind::LegalReview, Some("draft+legal"));
    store.append_record(&generation).await.unwrap();
    store.append_record(&legal).await.unwrap();
    p.records = vec![generation, legal];
    p.complete("draft+legal".into()).unwrap();
    store.save(&p).await.unwrap();

    let stored = store.get(p.id).await.unwrap().unwrap();
    assert_eq!(stored, p);
    assert_eq!(stored.records.len(), 2, "records must not be duplicated on save");
    assert_eq!(stored.records[1].output.as_deref(), Some("draft+legal"));
}

async fn terminal_petitions_are_frozen<S: PetitionStore>(store: S) {
    let mut p = petition("mandado_seguranca", "c1");
    store.save(&p).await.unwrap();
    p.fail(StageKind::Generation, "timeout").unwrap();
    store.save(&p).await.unwrap();

    let err = store.save(&p).await.unwrap_err();
    assert_eq!(
        err,
        StoreError::TerminalState {
            id: p.id,
            status: PetitionStatus::Failed
        }
    );
    let late = record(&p, 0, StageKind::Generation, Some("late"));
    assert!(matches!(
        store.append_record(&late).await,
        Err(StoreError::TerminalState { .. })
    ));
}

async fn records_need_a_petition<S: PetitionStore>(store: S) {
    let p = petition("recurso_administrativo", "c1");
    let err = store
        .append_record(&record(&p, 0, StageKind::Generation, Some("x")))
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::UnknownPetition { id: p.id });
    assert!(store.get(p.id).await.unwrap().is_none());
}

async fn listing_filters_and_orders_newest_first<S: PetitionStore>(store: S) {
    let older = petition("recurso_administrativo", "c1");
    let newer = petition("impugnacao_edital", "c1");
    let other_client = petition("recurso_administrativo", "c2");
    for p in [&older, &newer, &other_client] {
        store.save(p).await.unwrap();
    }

    let all = store.list(&PetitionFilter::default()).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));

    let c1 = store
        .list(&PetitionFilter {
            client_id: ClientId::new("c1"),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(c1.iter().map(|s| s.id).collect::<Vec<_>>(), vec![newer.id, older.id]);

    let appeals_c1 = store
        .list(&PetitionFilter {
            client_id: ClientId::new("c1"),
            petition_type: PetitionType::new("recurso_administrativo"),
            status: Some(PetitionStatus::Pending),
        })
        .await
        .unwrap();
    assert_eq!(appeals_c1.len(), 1);
    assert_eq!(appeals_c1[0].id, older.id);
    assert_eq!(appeals_c1[0].client_name.as_deref(), Some("Empresa ABC Ltda."));

    let completed = store
        .list(&PetitionFilter {
            status: Some(PetitionStatus::Completed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(completed.is_empty());
}

// ── Memory ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn memory_latest_registered_agent_wins() {
    latest_registered_agent_wins(MemoryStore::new()).await;
}

#[tokio::test]
async fn memory_trail_survives_a_round_trip() {
    trail_survives_a_round_trip(MemoryStore::new()).await;
}

#[tokio::test]
async fn memory_terminal_petitions_are_frozen() {
    terminal_petitions_are_frozen(MemoryStore::new()).await;
}

#[tokio::test]
async fn memory_records_need_a_petition() {
    records_need_a_petition(MemoryStore::new()).await;
}

#[tokio::test]
async fn memory_listing_filters_and_orders_newest_first() {
    listing_filters_and_orders_newest_first(MemoryStore::new()).await;
}

// ── SQLite ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sqlite_latest_registered_agent_wins() {
    latest_registered_agent_wins(sqlite().await).await;
}

#[tokio::test]
async fn sqlite_trail_survives_a_round_trip() {
    trail_survives_a_round_trip(sqlite().await).await;
}

#[tokio::test]
async fn sqlite_terminal_petitions_are_frozen() {
    terminal_petitions_are_frozen(sqlite().await).await;
}

#[tokio::test]
async fn sqlite_records_need_a_petition() {
    records_need_a_petition(sqlite().await).await;
}

#[tokio::test]
async fn sqlite_listing_filters_and_orders_newest_first() {
    listing_filters_and_orders_newest_first(sqlite().await).await;
}
