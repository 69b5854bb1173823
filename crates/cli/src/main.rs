//! Petition pipeline entry point.
//!
//! This binary is the composition root for the whole system:
//!
//! 1. **Parse configuration**: `petitions.toml` (or `--config`) plus
//!    environment overrides, validated before anything starts.
//! 2. **Wire observability**: `tracing-subscriber` with an `EnvFilter`, pretty
//!    or JSON output, and an optional OpenTelemetry OTLP exporter.
//! 3. **Construct infrastructure**: the SQLite (or in-memory) store, the
//!    Together model gateway and the petition catalog, injected into
//!    [`nodes::PetitionService`].
//! 4. **Dispatch the command**: serve the HTTP API, initialise the database,
//!    submit a request, or inspect petitions, agents and models.

mod catalog;
mod config;
mod observability;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use llm::{TogetherClient, TogetherConfig};
use nodes::{PetitionExecutor, PetitionService};
use pipeline::{
    AgentFilter, AgentRepository, AgentRole, ClientId, GatewayError, GenerationOptions,
    ModelGateway, ModelId, NewAgent, PetitionFilter, PetitionId, PetitionRequest, PetitionStatus,
    PetitionStore, PetitionType, Specialty,
};
use serde::Serialize;
use store::{MemoryStore, SqliteStore};
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;

#[derive(Debug, Parser)]
#[command(
    name = "petitions",
    version,
    about = "Drafts and reviews legal petitions with language models"
)]
struct Cli {
    /// Configuration file (defaults to ./petitions.toml when present).
    #[arg(long, short, global = true, env = "PETITIONS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve {
        /// Keep everything in memory and seed the stock agents.
        #[arg(long)]
        in_memory: bool,
        /// Overrides `server.bind`.
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Create the database and register the stock agents.
    Init {
        /// Model for the seeded agents (defaults to `gateway.default_model`).
        #[arg(long)]
        model: Option<String>,
    },
    /// Run one petition request (JSON file) through the pipeline.
    Submit {
        #[arg(long, short)]
        file: PathBuf,
        /// Print the whole petition with its trail instead of the final text.
        #[arg(long)]
        json: bool,
    },
    /// Inspect stored petitions.
    #[command(subcommand)]
    Petitions(PetitionsCommand),
    /// Inspect or register agents.
    #[command(subcommand)]
    Agents(AgentsCommand),
    /// List the models available to the API key.
    Models {
        /// Only models of this type (e.g. `chat`).
        #[arg(long = "type")]
        kind: Option<String>,
    },
    /// Check that the model endpoint accepts the API key.
    Check,
}

#[derive(Debug, Subcommand)]
enum PetitionsCommand {
    List(ListPetitions),
    Show {
        id: PetitionId,
        /// Show the generation history with agent details.
        #[arg(long)]
        history: bool,
    },
}

#[derive(Debug, Args)]
struct ListPetitions {
    #[arg(long)]
    client: Option<String>,
    #[arg(long = "type")]
    petition_type: Option<String>,
    #[arg(long)]
    status: Option<PetitionStatus>,
}

#[derive(Debug, Subcommand)]
enum AgentsCommand {
    List {
        #[arg(long)]
        role: Option<AgentRole>,
        #[arg(long)]
        specialty: Option<String>,
    },
    /// Register an agent described by a JSON file.
    Add {
        #[arg(long, short)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let telemetry = observability::init(&config.logging)?;
    let result = dispatch(cli.command, config).await;
    telemetry.shutdown();
    result
}

async fn dispatch(command: Command, config: AppConfig) -> anyhow::Result<()> {
    match command {
        Command::Serve { in_memory, bind } => serve(&config, in_memory, bind).await,
        Command::Init { model } => init(&config, model).await,
        Command::Submit { file, json } => submit(&config, &file, json).await,
        Command::Petitions(cmd) => petitions(&config, cmd).await,
        Command::Agents(cmd) => agents(&config, cmd).await,
        Command::Models { kind } => models(&config, kind).await,
        Command::Check => check(&config).await,
    }
}

// ── Wiring ───────────────────────────────────────────────────────────────────

fn together(config: &AppConfig) -> anyhow::Result<TogetherClient> {
    let client = TogetherClient::new(
        TogetherConfig::new(config.api_key()?)
            .with_base_url(config.gateway.base_url.clone())
            .with_timeout(Duration::from_secs(config.gateway.timeout_secs)),
    )?;
    Ok(client)
}

/// Stands in for the model when no API key is configured.
struct NoCredentials;

#[async_trait]
impl ModelGateway for NoCredentials {
    async fn generate(
        &self,
        _prompt: &str,
        _model: &ModelId,
        _options: &GenerationOptions,
    ) -> Result<String, GatewayError> {
        Err(GatewayError::Unauthorized)
    }
}

/// The model gateway, or a placeholder that refuses every call when the
/// command does not need the model and no key is configured.
fn gateway(config: &AppConfig, required: bool) -> anyhow::Result<Arc<dyn ModelGateway>> {
    if required || config.gateway.api_key.is_some() {
        Ok(Arc::new(together(config)?))
    } else {
        Ok(Arc::new(NoCredentials))
    }
}

async fn stores(
    config: &AppConfig,
    in_memory: bool,
) -> anyhow::Result<(Arc<dyn AgentRepository>, Arc<dyn PetitionStore>)> {
    if in_memory {
        let store = Arc::new(MemoryStore::new());
        let agents: Arc<dyn AgentRepository> = store.clone();
        let petitions: Arc<dyn PetitionStore> = store;
        return Ok((agents, petitions));
    }
    let store = SqliteStore::connect(&config.database.url)
        .await
        .with_context(|| format!("failed to open database {}", config.database.url))?;
    let store = Arc::new(store);
    let agents: Arc<dyn AgentRepository> = store.clone();
    let petitions: Arc<dyn PetitionStore> = store;
    Ok((agents, petitions))
}

async fn service(
    config: &AppConfig,
    in_memory: bool,
    model_required: bool,
) -> anyhow::Result<PetitionService> {
    let catalog = Arc::new(catalog::load(config.catalog.path.as_deref())?);
    let (agents, petitions) = stores(config, in_memory).await?;
    let executor = PetitionExecutor::new(
        agents.clone(),
        petitions.clone(),
        gateway(config, model_required)?,
        config.executor_config(),
    );
    Ok(PetitionService::new(executor, agents, petitions, catalog))
}

// ── Commands ─────────────────────────────────────────────────────────────────

async fn serve(
    config: &AppConfig,
    in_memory: bool,
    bind: Option<SocketAddr>,
) -> anyhow::Result<()> {
    let service = service(config, in_memory, true).await?;
    if in_memory {
        service.seed_agents(&config.default_model()?).await?;
    }

    let addr = bind.unwrap_or(config.server.bind);
    let tcp = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("shutdown requested");
                signal.cancel();
            }
            Err(err) => tracing::warn!(error = %err, "cannot listen for ctrl-c"),
        }
    });

    listener::serve(tcp, listener::router(service), async move {
        shutdown.cancelled().await;
    })
    .await
    .context("HTTP server failed")
}

async fn init(config: &AppConfig, model: Option<String>) -> anyhow::Result<()> {
    let model = match model {
        Some(model) => ModelId::new(model).context("--model must not be blank")?,
        None => config.default_model()?,
    };
    let service = service(config, false, false).await?;
    let added = service.seed_agents(&model).await?;
    if added == 0 {
        println!("Agents already registered; nothing seeded.");
    } else {
        println!("Registered {added} agents using {model}.");
    }
    print_agents(&service.get_agents(&AgentFilter::default()).await?);
    Ok(())
}

async fn submit(config: &AppConfig, file: &Path, json: bool) -> anyhow::Result<()> {
    let request: PetitionRequest = read_json(file)?;
    let service = service(config, false, true).await?;

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };
    let result = service.submit_and_fetch(request, &cancel).await;
    interrupt.abort();

    let petition = match result {
        Ok(petition) => petition,
        Err(err) => {
            if let Some(id) = err.petition_id() {
                eprintln!(
                    "petition {id} failed; inspect it with `petitions petitions show {id} --history`"
                );
            }
            return Err(err.into());
        }
    };

    if json {
        print_json(&petition)
    } else {
        eprintln!("petition {} completed", petition.id);
        println!("{}", petition.final_text.unwrap_or_default());
        Ok(())
    }
}

async fn petitions(config: &AppConfig, command: PetitionsCommand) -> anyhow::Result<()> {
    let service = service(config, false, false).await?;
    match command {
        PetitionsCommand::List(args) => {
            let filter = PetitionFilter {
                client_id: args.client.and_then(ClientId::new),
                petition_type: args.petition_type.and_then(PetitionType::new),
                status: args.status,
            };
            let summaries = service.list_petitions(&filter).await?;
            println!("{:<36}  {:<24}  {:<9}  {:<32}  CLIENT", "ID", "TYPE", "STATUS", "CREATED");
            for s in summaries {
                println!(
                    "{:<36}  {:<24}  {:<9}  {:<32}  {}",
                    s.id.to_string(),
                    s.petition_type.to_string(),
                    s.status.to_string(),
                    s.created_at.to_string(),
                    s.client_name.as_deref().unwrap_or("-"),
                );
            }
            Ok(())
        }
        PetitionsCommand::Show { id, history } => {
            if history {
                print_json(&service.get_history(id).await?)
            } else {
                print_json(&service.get_petition(id).await?)
            }
        }
    }
}

async fn agents(config: &AppConfig, command: AgentsCommand) -> anyhow::Result<()> {
    let service = service(config, false, false).await?;
    match command {
        AgentsCommand::List { role, specialty } => {
            let filter = AgentFilter {
                role,
                specialty: specialty.and_then(Specialty::new),
            };
            print_agents(&service.get_agents(&filter).await?);
            Ok(())
        }
        AgentsCommand::Add { file } => {
            let agent: NewAgent = read_json(&file)?;
            let id = service.add_agent(agent).await?;
            println!("{id}");
            Ok(())
        }
    }
}

async fn models(config: &AppConfig, kind: Option<String>) -> anyhow::Result<()> {
    let client = together(config)?;
    let mut models = client.list_models().await.context("failed to list models")?;
    if let Some(kind) = kind {
        models.retain(|m| m.kind.as_deref() == Some(kind.as_str()));
    }
    models.sort_by(|a, b| a.id.cmp(&b.id));

    println!("{:<60}  {:>9}  {:>8}  {:>8}", "MODEL", "CONTEXT", "IN $/M", "OUT $/M");
    for m in models {
        let context = m.context_length.map(|c| c.to_string()).unwrap_or_default();
        let (input, output) = m
            .pricing
            .map(|p| (format!("{:.2}", p.input), format!("{:.2}", p.output)))
            .unwrap_or_default();
        println!("{:<60}  {context:>9}  {input:>8}  {output:>8}", m.id);
    }
    Ok(())
}

async fn check(config: &AppConfig) -> anyhow::Result<()> {
    let client = together(config)?;
    let count = client
        .test_connection()
        .await
        .context("model endpoint check failed")?;
    println!("Connected to {}: {count} models available.", config.gateway.base_url);
    Ok(())
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_agents(agents: &[Arc<pipeline::Agent>]) {
    println!("{:<36}  {:<9}  {:<24}  {:<40}  MODEL", "ID", "ROLE", "SPECIALTY", "NAME");
    for a in agents {
        println!(
            "{:<36}  {:<9}  {:<24}  {:<40}  {}",
            a.id.to_string(),
            a.role.to_string(),
            a.specialty.to_string(),
            a.name,
            a.model_id
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_line_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_listing_filters() {
        let cli = Cli::try_parse_from([
            "petitions", "petitions", "list", "--client", "c1", "--type",
            "recurso_administrativo", "--status", "failed",
        ])
        .unwrap();
        match cli.command {
            Command::Petitions(PetitionsCommand::List(args)) => {
                assert_eq!(args.client.as_deref(), Some("c1"));
                assert_eq!(args.status, Some(PetitionStatus::Failed));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_petition_ids() {
        assert!(Cli::try_parse_from(["petitions", "petitions", "show", "42"]).is_err());
    }

    #[test]
    fn serve_accepts_in_memory_and_bind() {
        let cli =
            Cli::try_parse_from(["petitions", "serve", "--in-memory", "--bind", "0.0.0.0:9000"])
                .unwrap();
        match cli.command {
            Command::Serve { in_memory, bind } => {
                assert!(in_memory);
                assert_eq!(bind.map(|b| b.port()), Some(9000));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
