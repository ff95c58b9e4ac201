use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;
use crate::search::registry::{BuildOutcome, ProjectIndexRegistry};
use crate::search::retriever::HybridRetriever;
use crate::search::semantic::{DisabledSemanticIndex, EmbeddingIndex, SemanticIndex};
use crate::store::ProjectStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub projects: Arc<ProjectStore>,
    pub registry: Arc<ProjectIndexRegistry>,
    pub retriever: Arc<HybridRetriever>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let projects = Arc::new(ProjectStore::open(&config.db_path())?);
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;

        let semantic: Arc<dyn SemanticIndex> = if config.semantic_enabled() {
            Arc::new(EmbeddingIndex::new(
                http_client.clone(),
                config.embedding.clone(),
            ))
        } else {
            tracing::info!("Embedding provider disabled, retrieval is lexical only");
            Arc::new(DisabledSemanticIndex)
        };

        Ok(Self::with_parts(config, projects, semantic))
    }

    /// Assemble state around an existing store and semantic index.
    pub fn with_parts(
        config: Config,
        projects: Arc<ProjectStore>,
        semantic: Arc<dyn SemanticIndex>,
    ) -> Self {
        let retrieval = &config.retrieval;
        let registry = Arc::new(ProjectIndexRegistry::new(
            projects.clone(),
            semantic,
            retrieval.bm25,
            retrieval.chunk_budget,
        ));
        let retriever = Arc::new(HybridRetriever::new(
            registry.clone(),
            retrieval.fetch_factor,
            retrieval.max_k,
            Duration::from_secs(retrieval.semantic_timeout_secs),
        ));

        Self {
            config,
            projects,
            registry,
            retriever,
        }
    }

    /// Rebuild a project's index in the background after a page mutation.
    pub fn schedule_rebuild(&self, project_id: Uuid) -> tokio::task::JoinHandle<()> {
        let registry = self.registry.clone();
        tokio::spawn(async move {
            match registry.create_or_update_index(project_id).await {
                Ok(BuildOutcome::Ready { rebuilt, .. }) => {
                    tracing::debug!(%project_id, rebuilt, "Background rebuild finished");
                }
                Ok(BuildOutcome::Cleared) => {
                    tracing::debug!(%project_id, "Background rebuild found no pages");
                }
                Ok(BuildOutcome::Failed { reason, .. }) => {
                    tracing::warn!(%project_id, "Background rebuild failed: {reason}");
                }
                Err(e) => {
                    tracing::warn!(%project_id, "Background rebuild skipped: {e}");
                }
            }
        })
    }
}
