use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Chunk, ScoreSource, ScoredChunk};

/// A stored vector entry
#[derive(Debug, Clone)]
struct VectorEntry {
    chunk: Chunk,
    embedding: Vec<f32>,
}

/// One immutable build of a project's vectors.
#[derive(Debug)]
struct Generation {
    id: u64,
    entries: Vec<VectorEntry>,
}

/// A project keeps its current generation plus the one it replaced, so
/// queries holding the older handle can finish against it.
#[derive(Debug, Default)]
struct ProjectVectors {
    current: Option<Arc<Generation>>,
    previous: Option<Arc<Generation>>,
}

/// In-memory vector store with cosine similarity search, partitioned by
/// project and versioned by generation.
#[derive(Debug, Default)]
pub struct VectorStore {
    projects: RwLock<HashMap<Uuid, ProjectVectors>>,
    next_generation: parking_lot::Mutex<u64>,
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new generation for `project_id`. `embeddings` must be parallel with `chunks`.
    /// Returns the generation id.
    pub fn replace_project(
        &self,
        project_id: Uuid,
        chunks: &[Chunk],
        embeddings: Vec<Vec<f32>>,
    ) -> anyhow::Result<u64> {
        if chunks.len() != embeddings.len() {
            anyhow::bail!(
                "Embedding count mismatch: {} chunks, {} embeddings",
                chunks.len(),
                embeddings.len()
            );
        }

        let entries = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| VectorEntry {
                chunk: chunk.clone(),
                embedding,
            })
            .collect();

        let id = {
            let mut next = self.next_generation.lock();
            *next += 1;
            *next
        };

        let generation = Arc::new(Generation { id, entries });
        let mut projects = self.projects.write();
        let slot = projects.entry(project_id).or_default();
        slot.previous = slot.current.replace(generation);
        Ok(id)
    }

    /// Delete all vectors for a project.
    pub fn delete_project(&self, project_id: &Uuid) {
        self.projects.write().remove(project_id);
    }

    /// Search one generation by cosine similarity. `None` when that
    /// generation is no longer retained.
    pub fn search(
        &self,
        project_id: &Uuid,
        generation: u64,
        query_embedding: &[f32],
        limit: usize,
    ) -> Option<Vec<ScoredChunk>> {
        let generation = {
            let projects = self.projects.read();
            let slot = projects.get(project_id)?;
            let found = [slot.current.as_ref(), slot.previous.as_ref()]
                .into_iter()
                .flatten()
                .find(|g| g.id == generation)
                .cloned();
            found?
        };

        let mut scored: Vec<(f32, &VectorEntry)> = generation
            .entries
            .iter()
            .map(|e| (cosine_similarity(query_embedding, &e.embedding), e))
            .collect();

        // Sort descending by score
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Some(
            scored
                .into_iter()
                .map(|(score, e)| ScoredChunk {
                    chunk: e.chunk.clone(),
                    score,
                    source: ScoreSource::Semantic,
                })
                .collect(),
        )
    }

    /// Entries in the current generation of a project.
    pub fn entry_count(&self, project_id: &Uuid) -> usize {
        self.projects
            .read()
            .get(project_id)
            .and_then(|slot| slot.current.as_ref())
            .map(|g| g.entries.len())
            .unwrap_or(0)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
