use axum::extract::State;
use axum::Json;
use uuid::Uuid;

use crate::api::extract::{ApiJson, ApiPath};
use crate::error::RetrievalError;
use crate::models::{
    ChunkView, HybridQuery, HybridSearchRequest, HybridSearchResponse, SearchSummary,
};
use crate::state::AppState;

/// POST /api/projects/{project_id}/test-hybrid-search - Hybrid query for inspection:
///   1. BM25 and semantic lookups against the same index snapshot, concurrently
///   2. Min-max normalization of each list, then weighted fusion
///   3. Lexical-only results if the semantic side fails or times out
pub async fn test_hybrid_search(
    State(state): State<AppState>,
    ApiPath(project_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<HybridSearchRequest>,
) -> Result<Json<HybridSearchResponse>, RetrievalError> {
    let query = req.query.trim().to_string();
    if query.is_empty() {
        return Err(RetrievalError::Input("Query is required".to_string()));
    }
    if state.projects.get(project_id).is_none() {
        return Err(RetrievalError::ProjectNotFound(project_id));
    }

    let retrieval = &state.config.retrieval;
    let search = state
        .retriever
        .search(&HybridQuery {
            project_id,
            query_text: query.clone(),
            k: req.k.unwrap_or(retrieval.default_k),
            weights: req.weights.unwrap_or_default(),
        })
        .await?;

    tracing::info!(
        %project_id,
        hybrid = search.results.len(),
        lexical = search.lexical.len(),
        semantic = search.semantic.len(),
        degraded = search.degraded.is_some(),
        "Hybrid search complete"
    );

    let preview_chars = retrieval.preview_chars;
    let hybrid_results = search
        .results
        .iter()
        .map(|hit| ChunkView::scored(hit, preview_chars))
        .collect();
    let semantic_results = search
        .semantic
        .iter()
        .enumerate()
        .map(|(i, hit)| ChunkView::ranked(hit, i + 1, preview_chars))
        .collect();

    Ok(Json(HybridSearchResponse {
        query,
        hybrid_results,
        semantic_results,
        summary: SearchSummary {
            hybrid_count: search.results.len(),
            semantic_count: search.semantic.len(),
            lexical_count: search.lexical.len(),
            index_available: search.index_available,
            degraded: search.degraded.is_some(),
        },
    }))
}
