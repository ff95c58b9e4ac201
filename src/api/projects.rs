use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::api::extract::{ApiJson, ApiPath};
use crate::error::RetrievalError;
use crate::models::{CreateProjectRequest, Page, Project, UpsertPageRequest};
use crate::state::AppState;
use crate::store::PageRemoval;

/// GET /api/projects - List all projects
pub async fn list_projects(State(state): State<AppState>) -> Json<Vec<Project>> {
    Json(state.projects.list())
}

/// POST /api/projects - Create an empty project
pub async fn create_project(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), RetrievalError> {
    if req.title.trim().is_empty() {
        return Err(RetrievalError::Input("Title is required".to_string()));
    }
    let project = state.projects.create(&req.title)?;
    tracing::info!(project_id = %project.id, "Project created");
    Ok((StatusCode::CREATED, Json(project)))
}

/// DELETE /api/projects/{id} - Remove a project and its index
pub async fn delete_project(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<StatusCode, RetrievalError> {
    if !state.projects.delete(id)? {
        return Err(RetrievalError::ProjectNotFound(id));
    }

    if let Err(e) = state.registry.clear_index(id).await {
        tracing::warn!(project_id = %id, "Failed to clear index: {e}");
    }

    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/projects/{id}/pages/{page_id} - Create or replace a page, then reindex
pub async fn upsert_page(
    State(state): State<AppState>,
    ApiPath((id, page_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(req): ApiJson<UpsertPageRequest>,
) -> Result<Json<Page>, RetrievalError> {
    if req.title.trim().is_empty() {
        return Err(RetrievalError::Input("Title is required".to_string()));
    }

    let page = state
        .projects
        .upsert_page(id, page_id, req.title.trim(), &req.content)?
        .ok_or(RetrievalError::ProjectNotFound(id))?;

    state.registry.mark_stale(id);
    state.schedule_rebuild(id);

    Ok(Json(page))
}

/// DELETE /api/projects/{id}/pages/{page_id} - Remove a page, then reindex
pub async fn delete_page(
    State(state): State<AppState>,
    ApiPath((id, page_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<StatusCode, RetrievalError> {
    let removal = state
        .projects
        .delete_page(id, page_id)?
        .ok_or(RetrievalError::PageNotFound {
            project_id: id,
            page_id,
        })?;

    match removal {
        PageRemoval::Remaining(_) => {
            state.registry.mark_stale(id);
            state.schedule_rebuild(id);
        }
        PageRemoval::Emptied => {
            if let Err(e) = state.registry.clear_index(id).await {
                tracing::warn!(project_id = %id, "Failed to clear index: {e}");
            }
        }
    }

    Ok(StatusCode::NO_CONTENT)
}
