use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::extract::{ApiJson, ApiPath};
use crate::error::RetrievalError;
use crate::models::VectorActionRequest;
use crate::search::registry::BuildOutcome;
use crate::state::AppState;

const REINITIALIZE_HYBRID: &str = "reinitialize-hybrid";

/// POST /api/projects/{project_id}/vectors - Build or refresh the project's index
pub async fn create_or_update(
    State(state): State<AppState>,
    ApiPath(project_id): ApiPath<Uuid>,
) -> Result<(StatusCode, Json<Value>), RetrievalError> {
    let outcome = state.registry.create_or_update_index(project_id).await?;

    Ok(match outcome {
        BuildOutcome::Ready { rebuilt, .. } => {
            let message = if rebuilt {
                "Hybrid index rebuilt"
            } else {
                "Hybrid index already up to date"
            };
            (
                StatusCode::OK,
                Json(json!({ "success": true, "rebuilt": rebuilt, "message": message })),
            )
        }
        BuildOutcome::Failed { reason, .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "rebuilt": false, "message": reason })),
        ),
        BuildOutcome::Cleared => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "rebuilt": false,
                "message": "Project has no pages, index cleared",
            })),
        ),
    })
}

/// GET /api/projects/{project_id}/vectors - Index health
pub async fn stats(
    State(state): State<AppState>,
    ApiPath(project_id): ApiPath<Uuid>,
) -> Result<Json<Value>, RetrievalError> {
    let project = state
        .projects
        .get(project_id)
        .ok_or(RetrievalError::ProjectNotFound(project_id))?;

    Ok(Json(json!({
        "projectId": project.id,
        "projectTitle": project.title,
        "hybridRetriever": state.registry.stats(project_id),
    })))
}

/// PUT /api/projects/{project_id}/vectors - Administrative actions
pub async fn action(
    State(state): State<AppState>,
    ApiPath(project_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<VectorActionRequest>,
) -> Result<Json<Value>, RetrievalError> {
    if req.action != REINITIALIZE_HYBRID {
        return Err(RetrievalError::Input(format!(
            "Unknown action '{}', expected '{REINITIALIZE_HYBRID}'",
            req.action
        )));
    }

    match state.registry.force_reinitialize(project_id).await? {
        BuildOutcome::Ready { state: index, .. } => {
            let chunks = index.lexical.as_ref().map(|l| l.len()).unwrap_or(0);
            Ok(Json(json!({
                "success": true,
                "message": format!("Hybrid retriever reinitialized with {chunks} chunks"),
            })))
        }
        BuildOutcome::Failed { reason, .. } => Err(RetrievalError::Build(reason)),
        BuildOutcome::Cleared => Ok(Json(json!({
            "success": true,
            "message": "Project has no pages, index cleared",
        }))),
    }
}
