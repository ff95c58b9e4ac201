//! Integration tests for the page-search service.
//!
//! Handlers are called directly with in-memory state, so no embedding
//! server or network listener is needed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::body::Body;
use axum::Json;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use page_search::api;
use page_search::api::extract::{ApiJson, ApiPath};
use page_search::config::Config;
use page_search::error::RetrievalError;
use page_search::models::{Chunk, HybridSearchRequest, Project, ScoredChunk, UpsertPageRequest};
use page_search::search::registry::IndexStatus;
use page_search::search::semantic::{DisabledSemanticIndex, SemanticHandle, SemanticIndex};
use page_search::state::AppState;
use page_search::store::ProjectStore;

/// Builds fine but cannot answer queries.
struct UnreachableSemantic;

#[async_trait]
impl SemanticIndex for UnreachableSemantic {
    async fn rebuild(&self, project_id: Uuid, chunks: &[Chunk]) -> anyhow::Result<SemanticHandle> {
        Ok(SemanticHandle {
            project_id,
            generation: 1,
            entries: chunks.len(),
        })
    }

    async fn search(
        &self,
        _handle: &SemanticHandle,
        _query: &str,
        _k: usize,
    ) -> anyhow::Result<Vec<ScoredChunk>> {
        anyhow::bail!("connection refused")
    }

    async fn clear(&self, _project_id: Uuid) -> anyhow::Result<()> {
        Ok(())
    }
}

fn state_with(semantic: Arc<dyn SemanticIndex>) -> AppState {
    AppState::with_parts(
        Config::default(),
        Arc::new(ProjectStore::in_memory()),
        semantic,
    )
}

async fn create_project(state: &AppState, title: &str) -> Project {
    let req = serde_json::from_value(json!({ "title": title })).unwrap();
    let (status, Json(project)) = api::projects::create_project(State(state.clone()), ApiJson(req))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    project
}

async fn put_page(state: &AppState, project_id: Uuid, page_id: Uuid, title: &str, content: &str) {
    let req = UpsertPageRequest {
        title: title.to_string(),
        content: content.to_string(),
    };
    api::projects::upsert_page(State(state.clone()), ApiPath((project_id, page_id)), ApiJson(req))
        .await
        .unwrap();
}

/// Wait for the background rebuild to settle on `chunks` ready chunks.
async fn wait_for_ready(state: &AppState, project_id: Uuid, chunks: usize) {
    for _ in 0..200 {
        let stats = state.registry.stats(project_id);
        if stats.status == IndexStatus::Ready && stats.chunk_count == chunks {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "index for {project_id} never became ready: {:?}",
        state.registry.stats(project_id)
    );
}

async fn search(state: &AppState, project_id: Uuid, body: Value) -> Result<Value, RetrievalError> {
    let req: HybridSearchRequest = serde_json::from_value(body).unwrap();
    let Json(resp) =
        api::search::test_hybrid_search(State(state.clone()), ApiPath(project_id), ApiJson(req)).await?;
    Ok(serde_json::to_value(resp).unwrap())
}

#[tokio::test]
async fn test_page_upsert_rebuilds_and_search_finds_it() {
    let state = state_with(Arc::new(DisabledSemanticIndex));
    let project = create_project(&state, "Work").await;

    put_page(
        &state,
        project.id,
        Uuid::new_v4(),
        "Budget",
        "Q3 revenue targets and budget allocation",
    )
    .await;
    put_page(
        &state,
        project.id,
        Uuid::new_v4(),
        "Recipes",
        "pasta and tomato sauce recipe",
    )
    .await;
    wait_for_ready(&state, project.id, 2).await;

    let body = search(&state, project.id, json!({ "query": "budget" })).await.unwrap();
    assert_eq!(body["query"], "budget");
    assert_eq!(body["summary"]["indexAvailable"], true);
    assert_eq!(body["summary"]["degraded"], false);
    assert_eq!(body["summary"]["lexicalCount"], 1);
    assert_eq!(body["summary"]["semanticCount"], 0);

    let hits = body["hybridResults"].as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["pageTitle"], "Budget");
    assert_eq!(hits[0]["source"], "hybrid");
    assert!(hits[0]["score"].as_f64().unwrap() > 0.0);
    assert_eq!(hits[0]["preview"], "Q3 revenue targets and budget allocation");
}

#[tokio::test]
async fn test_search_before_any_build_reports_unavailable() {
    let state = state_with(Arc::new(DisabledSemanticIndex));
    let project = create_project(&state, "Fresh").await;

    let body = search(&state, project.id, json!({ "query": "anything" })).await.unwrap();
    assert_eq!(body["summary"]["indexAvailable"], false);
    assert!(body["hybridResults"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_search_rejects_bad_input() {
    let state = state_with(Arc::new(DisabledSemanticIndex));
    let project = create_project(&state, "Work").await;

    let err = search(&state, project.id, json!({ "query": "   " })).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    let err = search(
        &state,
        project.id,
        json!({ "query": "budget", "weights": { "semantic": 2.0, "keyword": 0.3 } }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    let err = search(&state, Uuid::new_v4(), json!({ "query": "budget" })).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_semantic_outage_degrades_to_lexical() {
    let state = state_with(Arc::new(UnreachableSemantic));
    let project = create_project(&state, "Work").await;
    put_page(&state, project.id, Uuid::new_v4(), "Budget", "budget allocation").await;
    wait_for_ready(&state, project.id, 1).await;

    let body = search(&state, project.id, json!({ "query": "budget", "k": 3 })).await.unwrap();
    assert_eq!(body["summary"]["degraded"], true);
    assert_eq!(body["summary"]["semanticCount"], 0);
    let hits = body["hybridResults"].as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["source"], "lexical");
}

#[tokio::test]
async fn test_vectors_endpoints() {
    let state = state_with(Arc::new(DisabledSemanticIndex));
    let project = create_project(&state, "Docs").await;
    state
        .projects
        .upsert_page(project.id, Uuid::new_v4(), "Intro", "getting started guide")
        .unwrap();

    let (status, Json(body)) =
        api::vectors::create_or_update(State(state.clone()), ApiPath(project.id))
            .await
            .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["rebuilt"], true);

    let (_, Json(body)) = api::vectors::create_or_update(State(state.clone()), ApiPath(project.id))
        .await
        .unwrap();
    assert_eq!(body["rebuilt"], false);

    let Json(body) = api::vectors::stats(State(state.clone()), ApiPath(project.id))
        .await
        .unwrap();
    assert_eq!(body["projectId"], project.id.to_string());
    assert_eq!(body["projectTitle"], "Docs");
    assert_eq!(body["hybridRetriever"]["status"], "ready");
    assert_eq!(body["hybridRetriever"]["chunkCount"], 1);
    assert_eq!(body["hybridRetriever"]["uniqueTerms"], 3);

    let req = serde_json::from_value(json!({ "action": "reinitialize-hybrid" })).unwrap();
    let Json(body) = api::vectors::action(State(state.clone()), ApiPath(project.id), ApiJson(req))
        .await
        .unwrap();
    assert_eq!(body["success"], true);

    let req = serde_json::from_value(json!({ "action": "explode" })).unwrap();
    let err = api::vectors::action(State(state.clone()), ApiPath(project.id), ApiJson(req))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    let err = api::vectors::create_or_update(State(state.clone()), ApiPath(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_pages_and_projects_clears_index() {
    let state = state_with(Arc::new(DisabledSemanticIndex));
    let project = create_project(&state, "Work").await;
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    state
        .projects
        .upsert_page(project.id, first, "One", "first page text")
        .unwrap();
    state
        .projects
        .upsert_page(project.id, second, "Two", "second page text")
        .unwrap();
    state.registry.create_or_update_index(project.id).await.unwrap();
    assert_eq!(state.registry.stats(project.id).chunk_count, 2);

    let status = api::projects::delete_page(State(state.clone()), ApiPath((project.id, first)))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
    wait_for_ready(&state, project.id, 1).await;

    api::projects::delete_page(State(state.clone()), ApiPath((project.id, second)))
        .await
        .unwrap();
    assert_eq!(state.registry.stats(project.id).status, IndexStatus::Absent);

    let err = api::projects::delete_page(State(state.clone()), ApiPath((project.id, second)))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);

    put_page(&state, project.id, first, "One", "back again").await;
    wait_for_ready(&state, project.id, 1).await;
    let status = api::projects::delete_project(State(state.clone()), ApiPath(project.id))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(state.registry.snapshot(project.id).is_none());
    assert!(state.projects.get(project.id).is_none());
}

#[tokio::test]
async fn test_projects_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        data_dir: dir.path().to_path_buf(),
        embedding: page_search::config::EmbeddingConfig {
            provider: "none".to_string(),
            ..Default::default()
        },
        ..Default::default()
    };

    let project_id = {
        let state = AppState::new(config.clone()).unwrap();
        let project = create_project(&state, "Persistent").await;
        put_page(&state, project.id, Uuid::new_v4(), "Notes", "saved to disk").await;
        project.id
    };

    let state = AppState::new(config).unwrap();
    let Json(projects) = api::projects::list_projects(State(state.clone())).await;
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].id, project_id);

    // The index is rebuilt on demand, not persisted
    assert_eq!(state.registry.stats(project_id).status, IndexStatus::Absent);
    let (_, Json(body)) = api::vectors::create_or_update(State(state.clone()), ApiPath(project_id))
        .await
        .unwrap();
    assert_eq!(body["success"], true);
}

async fn send(state: &AppState, request: axum::http::Request<Body>) -> (StatusCode, Value) {
    let response = api::router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_extractor_rejections_use_error_shape() {
    let state = state_with(Arc::new(DisabledSemanticIndex));
    let project = create_project(&state, "Work").await;

    let request = axum::http::Request::builder()
        .method("POST")
        .uri(format!("/api/projects/{}/test-hybrid-search", project.id))
        .header("content-type", "application/json")
        .body(Body::from("{\"query\": "))
        .unwrap();
    let (status, body) = send(&state, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request");
    assert!(body["details"].is_string());

    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/api/projects/not-a-uuid/vectors")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&state, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request");

    let request = axum::http::Request::builder()
        .method("PUT")
        .uri(format!("/api/projects/{}/vectors", project.id))
        .header("content-type", "application/json")
        .body(Body::from("{\"verb\": \"reinitialize-hybrid\"}"))
        .unwrap();
    let (status, body) = send(&state, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].as_str().unwrap().contains("action"));
}

#[tokio::test]
async fn test_upsert_then_delete_leaves_no_index() {
    for _ in 0..20 {
        let state = state_with(Arc::new(DisabledSemanticIndex));
        let project = create_project(&state, "Churn").await;
        let page_id = Uuid::new_v4();
        put_page(&state, project.id, page_id, "Short", "lived page").await;
        api::projects::delete_page(State(state.clone()), ApiPath((project.id, page_id)))
            .await
            .unwrap();

        // Let any queued background rebuild run to completion
        state.registry.create_or_update_index(project.id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(state.registry.stats(project.id).status, IndexStatus::Absent);
    }
}
