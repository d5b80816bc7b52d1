//! HTTP routes
//!
//! `POST /query` and `POST /query/explain` take an NDC query request;
//! `GET /schema` returns the schema object the compiler works against.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ndc_duck_exec::{QueryEngine, QueryError};
use ndc_duck_ir::{DuckDbConfig, QueryRequest, QueryResponse};
use ndc_duck_sql::CompiledPlan;
use serde::Serialize;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use crate::log_event;

#[derive(Clone)]
pub struct AppState {
    pub engine: QueryEngine,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/schema", get(schema))
        .route("/query", post(query))
        .route("/query/explain", post(explain))
        .with_state(state)
}

/// [`QueryError`] as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub QueryError);

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            QueryError::UnsupportedFeature(_) => StatusCode::NOT_IMPLEMENTED,
            QueryError::Configuration(_) => StatusCode::BAD_REQUEST,
            QueryError::TypeMismatch(_) | QueryError::Execution(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.0.to_response())).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ExplainResponse {
    pub fingerprint: String,
    pub plans: Vec<CompiledPlan>,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn schema(State(state): State<AppState>) -> Json<DuckDbConfig> {
    Json(state.engine.config().clone())
}

async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let fingerprint = request.fingerprint();
    let span = info_span!(
        "query",
        request_id = %Uuid::new_v4(),
        fingerprint = %fingerprint,
        collection = %request.collection
    );

    async move {
        let started = Instant::now();
        match state.engine.query(&request).await {
            Ok(response) => {
                log_event!(
                    level: tracing::Level::INFO,
                    event: "query_executed",
                    row_sets: response.len(),
                    duration_ms: started.elapsed().as_millis()
                );
                Ok(Json(response))
            }
            Err(err) => {
                warn!(reason = err.reason(), error = %err, "Query failed");
                Err(err.into())
            }
        }
    }
    .instrument(span)
    .await
}

async fn explain(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<ExplainResponse>, ApiError> {
    let fingerprint = request.fingerprint();
    let span = info_span!("explain", request_id = %Uuid::new_v4(), fingerprint = %fingerprint);

    let plans = span.in_scope(|| {
        state.engine.explain(&request).map_err(|err| {
            warn!(reason = err.reason(), error = %err, "Explain failed");
            ApiError::from(err)
        })
    })?;
    Ok(Json(ExplainResponse { fingerprint, plans }))
}
