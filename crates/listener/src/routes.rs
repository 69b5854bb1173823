//! Router and request handlers.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use nodes::{HistoryEntry, PetitionService};
use pipeline::{
    Agent, AgentFilter, AgentId, NewAgent, Petition, PetitionFilter, PetitionId, PetitionRequest,
    PetitionStatus, PetitionSummary, PetitionTypeDefinition,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    service: PetitionService,
}

impl AppState {
    pub fn new(service: PetitionService) -> Self {
        Self { service }
    }
}

/// Body of a successful `POST /petitions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub petition_id: PetitionId,
    pub status: PetitionStatus,
    pub final_text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Created<T> {
    id: T,
}

/// Builds the API router over `service`.
pub fn router(service: PetitionService) -> Router {
    Router::new()
        .route("/petitions", get(list_petitions).post(submit_petition))
        .route("/petitions/:id", get(get_petition))
        .route("/petitions/:id/history", get(get_history))
        .route("/agents", get(list_agents).post(add_agent))
        .route("/petition-types", get(list_petition_types))
        .route("/health", get(health))
        .with_state(AppState::new(service))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn submit_petition(
    State(state): State<AppState>,
    payload: Result<Json<PetitionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    // Blank identifiers are already rejected while the body is decoded.
    let Json(request) = payload?;

    // Dropping the handler future (client disconnect) cancels the run.
    let cancel = CancellationToken::new();
    let _disconnect = cancel.clone().drop_guard();

    let service = state.service.clone();
    let run = tokio::spawn(async move { service.submit_and_fetch(request, &cancel).await });
    let petition = run
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    tracing::info!(petition_id = %petition.id, "petition submitted");
    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            petition_id: petition.id,
            status: petition.status,
            final_text: petition.final_text,
        }),
    ))
}

async fn list_petitions(
    State(state): State<AppState>,
    filter: Result<Query<PetitionFilter>, QueryRejection>,
) -> Result<Json<Vec<PetitionSummary>>, ApiError> {
    let Query(filter) = filter?;
    Ok(Json(state.service.list_petitions(&filter).await?))
}

async fn get_petition(
    State(state): State<AppState>,
    id: Result<Path<PetitionId>, PathRejection>,
) -> Result<Json<Petition>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.service.get_petition(id).await?))
}

async fn get_history(
    State(state): State<AppState>,
    id: Result<Path<PetitionId>, PathRejection>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.service.get_history(id).await?))
}

async fn list_agents(
    State(state): State<AppState>,
    filter: Result<Query<AgentFilter>, QueryRejection>,
) -> Result<Json<Vec<Arc<Agent>>>, ApiError> {
    let Query(filter) = filter?;
    Ok(Json(state.service.get_agents(&filter).await?))
}

async fn add_agent(
    State(state): State<AppState>,
    payload: Result<Json<NewAgent>, JsonRejection>,
) -> Result<(StatusCode, Json<Created<AgentId>>), ApiError> {
    let Json(agent) = payload?;
    let id = state.service.add_agent(agent).await?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

async fn list_petition_types(State(state): State<AppState>) -> Json<Vec<PetitionTypeDefinition>> {
    Json(state.service.list_petition_types())
}
