use std::sync::Arc;
use std::time::Duration;

use crate::error::RetrievalError;
use crate::models::{HybridQuery, HybridWeights, ScoredChunk};
use crate::search::bm25::LexicalResults;
use crate::search::hybrid::fuse;
use crate::search::registry::ProjectIndexRegistry;

/// Everything one hybrid query produced.
#[derive(Debug, Clone, Default)]
pub struct HybridSearch {
    /// Final ranking, tagged `hybrid`, or `lexical` when the semantic side
    /// was unavailable
    pub results: Vec<ScoredChunk>,
    pub lexical: Vec<ScoredChunk>,
    pub semantic: Vec<ScoredChunk>,
    /// False until the project has a successfully built index
    pub index_available: bool,
    /// The query had no usable terms, so lexical hits are unranked
    pub lexical_fallback: bool,
    /// Why the semantic side was skipped, if it was
    pub degraded: Option<String>,
}

/// Validate weights and scale them to sum to 1.
pub fn normalize_weights(weights: HybridWeights) -> Result<HybridWeights, RetrievalError> {
    let HybridWeights { semantic, keyword } = weights;
    for (name, value) in [("semantic", semantic), ("keyword", keyword)] {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(RetrievalError::Input(format!(
                "weights.{name} must be a number between 0 and 1, got {value}"
            )));
        }
    }

    let total = semantic + keyword;
    if total <= 0.0 {
        return Err(RetrievalError::Input(
            "weights.semantic and weights.keyword cannot both be 0".to_string(),
        ));
    }
    if (total - 1.0).abs() > f32::EPSILON {
        tracing::debug!(semantic, keyword, "Re-normalizing hybrid weights");
    }
    Ok(HybridWeights {
        semantic: semantic / total,
        keyword: keyword / total,
    })
}

/// Runs hybrid queries against registry snapshots.
pub struct HybridRetriever {
    registry: Arc<ProjectIndexRegistry>,
    fetch_factor: usize,
    max_k: usize,
    semantic_timeout: Duration,
}

impl HybridRetriever {
    pub fn new(
        registry: Arc<ProjectIndexRegistry>,
        fetch_factor: usize,
        max_k: usize,
        semantic_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            fetch_factor: fetch_factor.max(1),
            max_k: max_k.max(1),
            semantic_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ProjectIndexRegistry> {
        &self.registry
    }

    /// Query both indices of one snapshot concurrently and fuse the results.
    pub async fn search(&self, query: &HybridQuery) -> Result<HybridSearch, RetrievalError> {
        if query.k == 0 || query.k > self.max_k {
            return Err(RetrievalError::Input(format!(
                "k must be between 1 and {}",
                self.max_k
            )));
        }
        let weights = normalize_weights(query.weights)?;

        let Some(snapshot) = self
            .registry
            .snapshot(query.project_id)
            .filter(|s| s.is_available())
        else {
            tracing::debug!(project_id = %query.project_id, "Query before any successful build");
            return Ok(HybridSearch::default());
        };
        let Some(lexical_index) = snapshot.lexical.clone() else {
            return Ok(HybridSearch::default());
        };

        let fetch = query.k.saturating_mul(self.fetch_factor);
        let text = query.query_text.clone();
        let lexical_task =
            tokio::task::spawn_blocking(move || lexical_index.query(&text, fetch));

        let semantic_index = self.registry.semantic();
        let semantic_task = async {
            let Some(handle) = snapshot.semantic.as_ref() else {
                return Err("no semantic index for this build".to_string());
            };
            match tokio::time::timeout(
                self.semantic_timeout,
                semantic_index.search(handle, &query.query_text, fetch),
            )
            .await
            {
                Ok(Ok(hits)) => Ok(hits),
                Ok(Err(e)) => Err(format!("{e:#}")),
                Err(_) => Err(format!(
                    "semantic search timed out after {}s",
                    self.semantic_timeout.as_secs_f32()
                )),
            }
        };

        let (lexical, semantic) = tokio::join!(lexical_task, semantic_task);
        let lexical: LexicalResults =
            lexical.map_err(|e| anyhow::anyhow!("Lexical query task failed: {e}"))?;

        let (semantic, degraded) = match semantic {
            Ok(hits) => (hits, None),
            Err(reason) => {
                tracing::warn!(
                    project_id = %query.project_id,
                    "Semantic search unavailable, serving lexical results: {reason}"
                );
                (Vec::new(), Some(reason))
            }
        };

        let results = if degraded.is_some() || (lexical.fallback && semantic.is_empty()) {
            lexical.hits.iter().take(query.k).cloned().collect()
        } else {
            let ranked_lexical: &[ScoredChunk] = if lexical.fallback { &[] } else { &lexical.hits };
            fuse(ranked_lexical, &semantic, weights, query.k)
        };

        Ok(HybridSearch {
            results,
            lexical: lexical.hits,
            semantic: semantic.into_iter().take(query.k).collect(),
            index_available: true,
            lexical_fallback: lexical.fallback,
            degraded,
        })
    }
}
