//! Boundary to the embedding-similarity side of retrieval.
//!
//! The registry only talks to [`SemanticIndex`]. Every rebuild yields a
//! [`SemanticHandle`] naming one generation of vectors, and searches go
//! through the handle captured in the index snapshot, so a query never mixes
//! the lexical index of one build with the vectors of another.

use anyhow::{Context, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::config::EmbeddingConfig;
use crate::llm::embeddings;
use crate::models::{Chunk, ScoredChunk};
use crate::search::vector::VectorStore;

/// Opaque reference to one build of a project's semantic index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticHandle {
    pub project_id: Uuid,
    pub generation: u64,
    pub entries: usize,
}

#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Build a fresh generation of vectors for the project.
    async fn rebuild(&self, project_id: Uuid, chunks: &[Chunk]) -> Result<SemanticHandle>;

    /// Top `k` chunks by similarity, descending.
    async fn search(
        &self,
        handle: &SemanticHandle,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>>;

    /// Drop every generation held for the project.
    async fn clear(&self, project_id: Uuid) -> Result<()>;
}

/// Embeds chunks through the configured embedding API and searches them in
/// an in-memory cosine store.
pub struct EmbeddingIndex {
    client: reqwest::Client,
    config: EmbeddingConfig,
    store: VectorStore,
}

impl EmbeddingIndex {
    pub fn new(client: reqwest::Client, config: EmbeddingConfig) -> Self {
        Self {
            client,
            config,
            store: VectorStore::new(),
        }
    }

    fn document_text(chunk: &Chunk) -> String {
        format!("Page: {}\n{}", chunk.metadata.page_title, chunk.text)
    }

    fn check_dimensions(&self, embeddings: &[Vec<f32>]) -> Result<()> {
        if self.config.dim == 0 {
            return Ok(());
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.config.dim) {
            anyhow::bail!(
                "Embedding dimension {} does not match configured {}",
                bad.len(),
                self.config.dim
            );
        }
        Ok(())
    }
}

#[async_trait]
impl SemanticIndex for EmbeddingIndex {
    async fn rebuild(&self, project_id: Uuid, chunks: &[Chunk]) -> Result<SemanticHandle> {
        let texts: Vec<String> = chunks.iter().map(Self::document_text).collect();
        let embeddings = embeddings::embed_batch(&self.client, &self.config, &texts)
            .await
            .context("Failed to embed project chunks")?;
        self.check_dimensions(&embeddings)?;

        let generation = self.store.replace_project(project_id, chunks, embeddings)?;
        tracing::debug!(%project_id, generation, entries = chunks.len(), "Semantic generation installed");

        Ok(SemanticHandle {
            project_id,
            generation,
            entries: chunks.len(),
        })
    }

    async fn search(
        &self,
        handle: &SemanticHandle,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if handle.entries == 0 || k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = embeddings::embed_single(&self.client, &self.config, query)
            .await
            .context("Failed to embed query")?;

        self.store
            .search(&handle.project_id, handle.generation, &query_embedding, k)
            .with_context(|| {
                format!(
                    "Semantic generation {} for project {} is no longer available",
                    handle.generation, handle.project_id
                )
            })
    }

    async fn clear(&self, project_id: Uuid) -> Result<()> {
        self.store.delete_project(&project_id);
        Ok(())
    }
}

/// Stand-in used when no embedding provider is configured: builds succeed
/// and searches return nothing, leaving retrieval purely lexical.
#[derive(Debug, Default)]
pub struct DisabledSemanticIndex;

#[async_trait]
impl SemanticIndex for DisabledSemanticIndex {
    async fn rebuild(&self, project_id: Uuid, _chunks: &[Chunk]) -> Result<SemanticHandle> {
        Ok(SemanticHandle {
            project_id,
            generation: 0,
            entries: 0,
        })
    }

    async fn search(
        &self,
        _handle: &SemanticHandle,
        _query: &str,
        _k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        Ok(Vec::new())
    }

    async fn clear(&self, _project_id: Uuid) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Page;
    use chrono::Utc;

    fn unreachable_config() -> EmbeddingConfig {
        EmbeddingConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            ..EmbeddingConfig::default()
        }
    }

    #[tokio::test]
    async fn test_disabled_index_is_empty_but_healthy() {
        let index = DisabledSemanticIndex;
        let project = Uuid::new_v4();
        let handle = index.rebuild(project, &[]).await.unwrap();
        assert_eq!(handle.entries, 0);
        assert!(index.search(&handle, "anything", 5).await.unwrap().is_empty());
        index.clear(project).await.unwrap();
    }

    #[tokio::test]
    async fn test_embedding_index_with_no_chunks_needs_no_network() {
        let index = EmbeddingIndex::new(reqwest::Client::new(), unreachable_config());
        let project = Uuid::new_v4();
        let handle = index.rebuild(project, &[]).await.unwrap();
        assert_eq!(handle.entries, 0);
        assert!(index.search(&handle, "budget", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_index_rebuild_fails_when_api_unreachable() {
        let index = EmbeddingIndex::new(reqwest::Client::new(), unreachable_config());
        let project = Uuid::new_v4();
        let page = Page {
            id: Uuid::new_v4(),
            title: "Budget".to_string(),
            content: "budget".to_string(),
            updated_at: Utc::now(),
        };
        let chunks = vec![Chunk::new(project, &page, 0, "budget".to_string())];
        assert!(index.rebuild(project, &chunks).await.is_err());
    }

    #[test]
    fn test_dimension_check() {
        let mut config = unreachable_config();
        config.dim = 3;
        let index = EmbeddingIndex::new(reqwest::Client::new(), config);
        assert!(index.check_dimensions(&[vec![0.0; 3]]).is_ok());
        assert!(index.check_dimensions(&[vec![0.0; 2]]).is_err());
    }
}
