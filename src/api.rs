//! HTTP surface over the grade engine.
//!
//! - `GET /learner/{id}/avg-class` - weighted average per class for one learner
//! - `GET /stats` - pass rate over all learners
//! - `GET /stats/{id}` - pass rate within one class (`/stats/` without an id is 400)
//! - `GET /health` - liveness check

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::aggregate::GradeEngine;
use crate::error::{parse_id, StatsError};

#[derive(Clone)]
pub struct AppState {
    pub engine: GradeEngine,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl IntoResponse for StatsError {
    fn into_response(self) -> Response {
        let status = match &self {
            StatsError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            StatsError::EmptyPopulation { .. } => StatusCode::NOT_FOUND,
            StatsError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("{self}");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/learner/{id}/avg-class", get(learner_class_averages_handler))
        .route("/stats", get(population_stats_handler))
        .route("/stats/", get(missing_class_id_handler))
        .route("/stats/{id}", get(class_stats_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(addr: &str, engine: GradeEngine) -> anyhow::Result<()> {
    let router = create_router(AppState { engine });
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("grade stats server listening on {}", addr);

    axum::serve(listener, router).await?;
    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

async fn learner_class_averages_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, StatsError> {
    let learner_id = parse_id(&id, "learner id")?;
    let averages = state.engine.class_averages(Some(learner_id)).await?;
    Ok((StatusCode::OK, Json(averages)))
}

async fn population_stats_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, StatsError> {
    let report = state.engine.population_stats().await?;
    Ok((StatusCode::OK, Json(report)))
}

async fn missing_class_id_handler() -> StatsError {
    StatsError::InvalidArgument("class id is required".to_string())
}

async fn class_stats_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, StatsError> {
    let class_id = parse_id(&id, "class id")?;
    let report = state.engine.class_stats(class_id).await?;
    Ok((StatusCode::OK, Json(report)))
}
