use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::api::AppState;
use crate::config::MemoryConfig;
use crate::error::CrossmemError;
use crate::memory::similarity::ContextSimilarity;
use crate::memory::types::{ContextSummary, MemoryEntry, MemoryStats, NewMemoryEntry};
use crate::storage::gc::GcReport;
use crate::transfer::{ContextTransferResult, TransferPreview};

/// Engine error rendered as a JSON response
#[derive(Debug)]
pub struct ApiError(pub CrossmemError);

impl From<CrossmemError> for ApiError {
    fn from(e: CrossmemError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            CrossmemError::NotFound(_) => StatusCode::NOT_FOUND,
            CrossmemError::InvalidInput(_) | CrossmemError::Config(_) => StatusCode::BAD_REQUEST,
            CrossmemError::BudgetExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            CrossmemError::ConcurrentModification(_) | CrossmemError::Cancelled(_) => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        } else {
            tracing::debug!("Request rejected: {}", self.0);
        }

        let body = serde_json::json!({
            "error": {
                "type": self.0.kind(),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Health check endpoint - returns JSON status
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<MemoryStats> {
    Json(state.engine.get_memory_stats().await)
}

pub async fn get_config_handler(State(state): State<Arc<AppState>>) -> Json<MemoryConfig> {
    Json(state.engine.get_memory_config().await)
}

pub async fn update_config_handler(
    State(state): State<Arc<AppState>>,
    Json(config): Json<MemoryConfig>,
) -> ApiResult<MemoryConfig> {
    state.engine.update_memory_config(config).await?;
    Ok(Json(state.engine.get_memory_config().await))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GcResponse {
    pub deleted: usize,
    pub report: GcReport,
}

pub async fn gc_handler(State(state): State<Arc<AppState>>) -> Json<GcResponse> {
    let report = state.engine.run_gc().await;
    Json(GcResponse {
        deleted: report.total_evicted(),
        report,
    })
}

pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.engine.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => {
                let json = serde_json::to_string(&event).ok()?;
                Some(Ok(Event::default().data(json)))
            }
            Err(_) => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
pub struct SimilarityQuery {
    pub a: String,
    pub b: String,
}

pub async fn similarity_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SimilarityQuery>,
) -> Json<ContextSimilarity> {
    Json(
        state
            .engine
            .calculate_context_similarity(&query.a, &query.b)
            .await,
    )
}

pub async fn store_memory_handler(
    State(state): State<Arc<AppState>>,
    Json(fields): Json<NewMemoryEntry>,
) -> Result<(StatusCode, Json<MemoryEntry>), ApiError> {
    let entry = state.engine.store_memory_entry(fields).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub session_id: Option<String>,
    pub limit: Option<usize>,
}

pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchParams>,
) -> Json<Vec<MemoryEntry>> {
    Json(
        state
            .engine
            .search_memories(&query.q, query.session_id.as_deref(), query.limit)
            .await,
    )
}

pub async fn get_memory_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<MemoryEntry> {
    Ok(Json(state.engine.get_memory(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct RelevanceRequest {
    pub relevance_score: f32,
}

pub async fn update_relevance_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(request): Json<RelevanceRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .engine
        .update_memory_relevance(id, request.relevance_score)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub session_ids: Vec<String>,
    pub target_session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: usize,
}

pub async fn merge_sessions_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MergeRequest>,
) -> ApiResult<CountResponse> {
    let count = state
        .engine
        .merge_session_memories(&request.session_ids, &request.target_session_id)
        .await?;
    Ok(Json(CountResponse { count }))
}

pub async fn clear_session_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Json<CountResponse> {
    let count = state.engine.clear_session_memory(&session_id).await;
    Json(CountResponse { count })
}

pub async fn session_memories_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Json<Vec<MemoryEntry>> {
    Json(state.engine.get_session_memories(&session_id).await)
}

#[derive(Debug, Deserialize)]
pub struct ContextQuery {
    pub model: String,
    pub max_tokens: Option<usize>,
}

pub async fn retrieve_context_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<ContextQuery>,
) -> Json<Vec<MemoryEntry>> {
    Json(
        state
            .engine
            .retrieve_memory_for_model(&session_id, &query.model, query.max_tokens)
            .await,
    )
}

#[derive(Debug, Deserialize)]
pub struct SummaryRequest {
    pub model: String,
}

pub async fn create_summary_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<SummaryRequest>,
) -> Json<ContextSummary> {
    Json(
        state
            .engine
            .create_context_summary(&session_id, &request.model)
            .await,
    )
}

pub async fn list_summaries_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Json<Vec<ContextSummary>> {
    Json(state.engine.get_context_summaries(&session_id).await)
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub source_model: String,
    pub target_model: String,
}

pub async fn transfer_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<TransferRequest>,
) -> ApiResult<ContextTransferResult> {
    let result = state
        .engine
        .transfer_context_to_model(&session_id, &request.source_model, &request.target_model)
        .await?;
    Ok(Json(result))
}

pub async fn preview_transfer_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(request): Json<TransferRequest>,
) -> ApiResult<TransferPreview> {
    let preview = state
        .engine
        .preview_context_transfer(&session_id, &request.source_model, &request.target_model)
        .await?;
    Ok(Json(preview))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub session_id: String,
    pub model: String,
}

pub async fn recommend_handler(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> ApiResult<RecommendationResponse> {
    let model = state.engine.recommend_model_for_context(&session_id).await?;
    Ok(Json(RecommendationResponse { session_id, model }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CrossmemError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (CrossmemError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (
                CrossmemError::BudgetExceeded {
                    required: 1,
                    available: 0,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                CrossmemError::ConcurrentModification("x".into()),
                StatusCode::CONFLICT,
            ),
            (
                CrossmemError::InvariantViolation("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }
}
