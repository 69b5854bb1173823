//! Shared fixtures for the orchestration tests: a scripted model gateway and
//! a pre-populated agent registry.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nodes::{ExecutorConfig, PetitionExecutor, PetitionService};
use pipeline::{
    AgentId, AgentRepository, AgentRole, CatalogDocument, ClientId, GatewayError,
    GenerationOptions, ModelGateway, ModelId, NewAgent, PetitionRequest, PetitionStore,
    PetitionType, PetitionTypeEntry, ReviewerEntry, Specialty, TemplateStore,
};
use store::MemoryStore;
use tokio_util::sync::CancellationToken;

pub const MODEL: &str = "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo";

// ── Scripted gateway ─────────────────────────────────────────────────────────

/// What the gateway does on its next call.
pub enum Step {
    Reply(&'static str),
    Fail(GatewayError),
    /// Never answers.
    Hang,
    /// Cancels the token, then never answers.
    CancelAndHang(CancellationToken),
}

/// Answers calls from a fixed script and remembers every prompt it saw.
#[derive(Default)]
pub struct ScriptedGateway {
    steps: Mutex<VecDeque<Step>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn generate(
        &self,
        prompt: &str,
        _model: &ModelId,
        _options: &GenerationOptions,
    ) -> Result<String, GatewayError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(text)) => Ok(text.to_string()),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::CancelAndHang(token)) => {
                token.cancel();
                std::future::pending().await
            }
            Some(Step::Hang) | None => std::future::pending().await,
        }
    }
}

// ── Agents ───────────────────────────────────────────────────────────────────

pub fn agent(role: AgentRole, specialty: &str, template: &str) -> NewAgent {
    NewAgent {
        name: format!("{role} {specialty}"),
        description: String::new(),
        model_id: ModelId::new(MODEL).unwrap(),
        role,
        specialty: Specialty::new(specialty).unwrap(),
        prompt_template: template.into(),
    }
}

pub async fn register(repo: &dyn AgentRepository, agent: NewAgent) -> AgentId {
    repo.add(agent.into_agent().unwrap()).await.unwrap()
}

/// Generator for `recurso_administrativo` plus the three stock reviewers.
pub async fn register_full_chain(repo: &dyn AgentRepository) {
    register(
        repo,
        agent(
            AgentRole::Generator,
            "recurso_administrativo",
            "Redija um recurso administrativo.\nCliente: {cliente_nome}\nFatos: {fatos}",
        ),
    )
    .await;
    register(repo, agent(AgentRole::Reviewer, "juridico", "Revisao juridica:\n{texto}")).await;
    register(
        repo,
        agent(AgentRole::Reviewer, "formatacao", "Revisao de formatacao:\n{texto}"),
    )
    .await;
    register(repo, agent(AgentRole::Reviewer, "linguagem", "Revisao de linguagem:\n{texto}")).await;
}

pub fn request() -> PetitionRequest {
    let mut request = PetitionRequest::new(PetitionType::new("recurso_administrativo").unwrap());
    request.facts = "X".into();
    request.arguments = "Y".into();
    request.requested_relief = "Z".into();
    request.client_id = ClientId::new("c1");
    request.client_name = Some("Empresa ABC Ltda.".into());
    request
}

pub fn catalog() -> TemplateStore {
    TemplateStore::from_document(CatalogDocument {
        petition_types: vec![PetitionTypeEntry {
            code: "recurso_administrativo".into(),
            name: "Recurso Administrativo".into(),
            description: "Recurso contra decisao administrativa".into(),
            prompt_template: "Fatos: {fatos}".into(),
            output_template: Some("recurso_administrativo.docx".into()),
            required_fields: vec!["fatos".into()],
        }],
        reviewers: ["juridico", "formatacao", "linguagem"]
            .into_iter()
            .map(|specialty| ReviewerEntry {
                specialty: specialty.into(),
                name: format!("Revisor {specialty}"),
                description: String::new(),
                prompt_template: format!("Revise ({specialty}):\n{{texto}}"),
            })
            .collect(),
    })
    .unwrap()
}

// ── Harness ──────────────────────────────────────────────────────────────────

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub service: PetitionService,
}

pub fn harness(steps: Vec<Step>, config: ExecutorConfig) -> Harness {
    let store = Arc::new(MemoryStore::new());
    harness_with_store(store.clone(), store, steps, config)
}

pub fn harness_with_store(
    store: Arc<MemoryStore>,
    petitions: Arc<dyn PetitionStore>,
    steps: Vec<Step>,
    config: ExecutorConfig,
) -> Harness {
    let gateway = Arc::new(ScriptedGateway::new(steps));
    let executor = PetitionExecutor::new(store.clone(), petitions.clone(), gateway.clone(), config);
    let service = PetitionService::new(executor, store.clone(), petitions, Arc::new(catalog()));
    Harness {
        store,
        gateway,
        service,
    }
}
