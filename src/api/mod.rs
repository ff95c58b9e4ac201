pub mod extract;
pub mod projects;
pub mod search;
pub mod vectors;

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::AppState;

/// All API routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/api/projects/{project_id}",
            delete(projects::delete_project),
        )
        .route(
            "/api/projects/{project_id}/pages/{page_id}",
            put(projects::upsert_page).delete(projects::delete_page),
        )
        .route(
            "/api/projects/{project_id}/vectors",
            post(vectors::create_or_update)
                .get(vectors::stats)
                .put(vectors::action),
        )
        .route(
            "/api/projects/{project_id}/test-hybrid-search",
            post(search::test_hybrid_search),
        )
        .with_state(state)
}
