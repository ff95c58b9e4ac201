use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

/// Errors that cross from the retrieval engine into request handlers.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// Rejected before any index state is touched.
    #[error("{0}")]
    Input(String),

    #[error("project {0} not found")]
    ProjectNotFound(Uuid),

    #[error("page {page_id} not found in project {project_id}")]
    PageNotFound { project_id: Uuid, page_id: Uuid },

    /// A build failed; the previous ready index, if any, is still served.
    #[error("index build failed: {0}")]
    Build(String),

    /// The semantic index could not answer.
    #[error("semantic index error: {0}")]
    Adapter(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl RetrievalError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Input(_) => StatusCode::BAD_REQUEST,
            Self::ProjectNotFound(_) | Self::PageNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Adapter(_) => StatusCode::BAD_GATEWAY,
            Self::Build(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Input(_) => "Invalid request",
            Self::ProjectNotFound(_) => "Project not found",
            Self::PageNotFound { .. } => "Page not found",
            Self::Build(_) => "Index build failed",
            Self::Adapter(_) => "Semantic index unavailable",
            Self::Internal(_) => "Internal error",
        }
    }
}

impl IntoResponse for RetrievalError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{self:#}");
        }
        let body = serde_json::json!({
            "error": self.label(),
            "details": format!("{self:#}"),
        });
        (status, Json(body)).into_response()
    }
}
