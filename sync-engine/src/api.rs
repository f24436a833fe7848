//! Manual trigger API.
//!
//! Thin axum surface over the orchestrator: fire a full sweep, fire one
//! provider, or list the providers the engine knows. Sync runs execute
//! inline in the request, so the response carries the finished report.

use crate::error::SyncError;
use crate::orchestrator::{Orchestrator, RunOptions};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use merchsync::provider::ProviderKind;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/sync/run", post(run_all))
        .route("/api/sync/run/:provider", post(run_provider))
        .route("/api/sync/providers", get(list_providers))
        .with_state(state)
}

#[derive(Debug, Deserialize, Default)]
pub struct RunQuery {
    /// `?force=true` bypasses the recent-sync skip window.
    #[serde(default)]
    pub force: bool,
}

async fn run_all(
    State(state): State<ApiState>,
    Query(query): Query<RunQuery>,
) -> Result<Response, ApiError> {
    info!(force = query.force, "Manual sync run requested");
    let report = state
        .orchestrator
        .run(RunOptions {
            provider: None,
            force: query.force,
        })
        .await?;
    Ok(Json(report).into_response())
}

async fn run_provider(
    State(state): State<ApiState>,
    Path(provider): Path<String>,
    Query(query): Query<RunQuery>,
) -> Result<Response, ApiError> {
    let kind: ProviderKind = provider
        .parse()
        .map_err(|_| ApiError::UnknownProvider(provider))?;

    info!(provider = %kind, force = query.force, "Manual provider sync requested");
    let report = state
        .orchestrator
        .run(RunOptions {
            provider: Some(kind),
            force: query.force,
        })
        .await?;
    Ok(Json(report.for_provider(kind)).into_response())
}

async fn list_providers() -> Response {
    let names: Vec<&str> = ProviderKind::ALL.iter().map(|k| k.as_str()).collect();
    Json(json!({ "providers": names })).into_response()
}

#[derive(Debug)]
pub enum ApiError {
    UnknownProvider(String),
    Sync(SyncError),
}

impl From<SyncError> for ApiError {
    fn from(e: SyncError) -> Self {
        Self::Sync(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::UnknownProvider(name) => (
                StatusCode::BAD_REQUEST,
                format!("Unknown provider '{}'", name),
            ),
            ApiError::Sync(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
