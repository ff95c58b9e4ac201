use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{Chunk, HybridWeights, ScoreSource, ScoredChunk};

/// Per-chunk accumulator while merging the two lists.
struct Fused {
    chunk: Chunk,
    score: f32,
    lexical_rank: Option<usize>,
    semantic_rank: Option<usize>,
}

impl Fused {
    fn in_both(&self) -> bool {
        self.lexical_rank.is_some() && self.semantic_rank.is_some()
    }
}

/// Min-max scale scores to `[0, 1]`. A list with no spread maps every entry to 1.0.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    let Some(min) = scores.iter().copied().reduce(f32::min) else {
        return Vec::new();
    };
    let max = scores.iter().copied().fold(min, f32::max);
    let range = max - min;
    scores
        .iter()
        .map(|s| if range > 0.0 { (s - min) / range } else { 1.0 })
        .collect()
}

/// Weighted fusion of independently normalized lexical and semantic lists.
///
/// 1. Each list is min-max normalized on its own.
/// 2. `hybrid = keyword * lexical + semantic * semantic`, a missing side adds 0.
/// 3. Ordered by hybrid score, then presence in both lists, then lexical rank,
///    then semantic rank, then chunk id.
/// 4. One entry per chunk id, truncated to `k`.
pub fn fuse(
    lexical: &[ScoredChunk],
    semantic: &[ScoredChunk],
    weights: HybridWeights,
    k: usize,
) -> Vec<ScoredChunk> {
    let mut merged: HashMap<&str, Fused> = HashMap::new();

    let lexical_norm = min_max_normalize(&lexical.iter().map(|h| h.score).collect::<Vec<_>>());
    for (rank, (hit, norm)) in lexical.iter().zip(lexical_norm).enumerate() {
        let entry = merged.entry(hit.chunk.id.as_str()).or_insert_with(|| Fused {
            chunk: hit.chunk.clone(),
            score: 0.0,
            lexical_rank: None,
            semantic_rank: None,
        });
        // A duplicate id within one list keeps its best rank only
        if entry.lexical_rank.is_none() {
            entry.lexical_rank = Some(rank);
            entry.score += weights.keyword * norm;
        }
    }

    let semantic_norm = min_max_normalize(&semantic.iter().map(|h| h.score).collect::<Vec<_>>());
    for (rank, (hit, norm)) in semantic.iter().zip(semantic_norm).enumerate() {
        let entry = merged.entry(hit.chunk.id.as_str()).or_insert_with(|| Fused {
            chunk: hit.chunk.clone(),
            score: 0.0,
            lexical_rank: None,
            semantic_rank: None,
        });
        if entry.semantic_rank.is_none() {
            entry.semantic_rank = Some(rank);
            entry.score += weights.semantic * norm;
        }
    }

    let mut results: Vec<Fused> = merged.into_values().collect();
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.in_both().cmp(&a.in_both()))
            .then_with(|| rank_order(a.lexical_rank, b.lexical_rank))
            .then_with(|| rank_order(a.semantic_rank, b.semantic_rank))
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });
    results.truncate(k);

    results
        .into_iter()
        .map(|f| ScoredChunk {
            chunk: f.chunk,
            score: f.score,
            source: ScoreSource::Hybrid,
        })
        .collect()
}

/// Lower rank first; absent ranks last.
fn rank_order(a: Option<usize>, b: Option<usize>) -> Ordering {
    a.unwrap_or(usize::MAX).cmp(&b.unwrap_or(usize::MAX))
}
