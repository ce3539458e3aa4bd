/// HTTP transport.
///
/// - `GET /health`: 200 when the recommender loaded, 503 otherwise
/// - `POST /recommend`: `{"query": "...", "max_results": 10}` → `{"recommended_assessments": [...]}`
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::{info, warn};

use crate::error::AppError;
use crate::model::{RecommendParams, RecommendResponse};
use crate::recommender::{Readiness, MAX_RESULTS_CAP};

const NOT_LOADED: &str = "Recommender model is not loaded";

type ApiError = (StatusCode, Json<serde_json::Value>);

pub fn router(readiness: Arc<Readiness>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/recommend", post(recommend))
        .with_state(readiness)
}

pub async fn serve(bind_addr: &str, readiness: Arc<Readiness>) -> Result<(), AppError> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");
    axum::serve(listener, router(readiness)).await?;
    Ok(())
}

fn error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (status, Json(json!({ "detail": detail.into() })))
}

async fn health(State(readiness): State<Arc<Readiness>>) -> Result<Json<serde_json::Value>, ApiError> {
    match readiness.as_ref() {
        Readiness::Ready(_) => Ok(Json(json!({ "status": "healthy" }))),
        Readiness::NotReady(reason) => {
            warn!(reason = %reason, "health check while not ready");
            Err(error(StatusCode::SERVICE_UNAVAILABLE, NOT_LOADED))
        }
    }
}

async fn recommend(
    State(readiness): State<Arc<Readiness>>,
    body: Result<Json<RecommendParams>, JsonRejection>,
) -> Result<Json<RecommendResponse>, ApiError> {
    let Some(ctx) = readiness.context() else {
        return Err(error(StatusCode::SERVICE_UNAVAILABLE, NOT_LOADED));
    };
    let Json(params) =
        body.map_err(|rejection| error(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text()))?;

    let query = params.query.trim();
    if query.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "query must not be empty"));
    }
    let max_results = params
        .max_results
        .map(|n| (n as usize).clamp(1, MAX_RESULTS_CAP));

    let recommended_assessments = ctx.get_recommendations(query, max_results).await;
    if recommended_assessments.is_empty() {
        info!(query, "no assessments matched");
    }

    Ok(Json(RecommendResponse {
        recommended_assessments,
    }))
}
