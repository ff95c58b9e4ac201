use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{Chunk, ScoreSource, ScoredChunk};
use crate::search::tokenizer::tokenize;

/// BM25 constants and the dynamic-threshold knobs applied after scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term frequency saturation
    pub k1: f32,
    /// Length normalization
    pub b: f32,
    /// Use `ln(1 + x)` instead of `ln(x)` for IDF so terms present in half
    /// or more of the corpus still contribute a positive weight.
    pub smooth_idf: bool,
    /// Absolute lower bound on the threshold
    pub threshold_floor: f32,
    /// Fraction of the best score a hit must reach
    pub max_score_ratio: f32,
    /// Fraction of the mean positive score a hit must reach
    pub avg_score_ratio: f32,
    /// Hits kept by raw score when the threshold removes everything
    pub fallback_count: usize,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            smooth_idf: true,
            threshold_floor: 0.1,
            max_score_ratio: 0.2,
            avg_score_ratio: 0.5,
            fallback_count: 2,
        }
    }
}

/// In-memory BM25 index over one project's chunks.
///
/// Built in one pass and never mutated afterwards; a rebuild produces a new
/// index, so document frequencies and per-document term counts always
/// describe the same corpus.
#[derive(Debug, Clone)]
pub struct LexicalIndex {
    params: Bm25Params,
    documents: Vec<Chunk>,
    /// term -> number of chunks containing it
    term_doc_frequency: HashMap<String, usize>,
    /// chunk position -> term -> count
    doc_term_frequency: Vec<HashMap<String, usize>>,
    /// chunk position -> token count
    doc_lengths: Vec<usize>,
    avg_doc_length: f32,
}

/// Output of [`LexicalIndex::query`].
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalResults {
    pub hits: Vec<ScoredChunk>,
    /// The query had no usable terms and `hits` are simply the first chunks
    /// in index order, not a relevance ranking.
    pub fallback: bool,
}

impl LexicalIndex {
    pub fn build(chunks: Vec<Chunk>, params: Bm25Params) -> Self {
        let mut term_doc_frequency: HashMap<String, usize> = HashMap::new();
        let mut doc_term_frequency = Vec::with_capacity(chunks.len());
        let mut doc_lengths = Vec::with_capacity(chunks.len());

        for chunk in &chunks {
            let tokens = tokenize(&chunk.text);
            doc_lengths.push(tokens.len());

            let mut counts: HashMap<String, usize> = HashMap::new();
            for token in tokens {
                *counts.entry(token).or_insert(0) += 1;
            }
            for term in counts.keys() {
                *term_doc_frequency.entry(term.clone()).or_insert(0) += 1;
            }
            doc_term_frequency.push(counts);
        }

        let total_tokens: usize = doc_lengths.iter().sum();
        let avg_doc_length = if chunks.is_empty() {
            0.0
        } else {
            total_tokens as f32 / chunks.len() as f32
        };

        Self {
            params,
            documents: chunks,
            term_doc_frequency,
            doc_term_frequency,
            doc_lengths,
            avg_doc_length,
        }
    }

    pub fn empty(params: Bm25Params) -> Self {
        Self::build(Vec::new(), params)
    }

    pub fn params(&self) -> &Bm25Params {
        &self.params
    }

    pub fn documents(&self) -> &[Chunk] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn unique_terms(&self) -> usize {
        self.term_doc_frequency.len()
    }

    /// Mean chunk length in tokens.
    pub fn avg_doc_length(&self) -> f32 {
        self.avg_doc_length
    }

    pub fn doc_frequency(&self, term: &str) -> usize {
        self.term_doc_frequency.get(term).copied().unwrap_or(0)
    }

    pub fn idf(&self, term: &str) -> f32 {
        let df = self.doc_frequency(term);
        if df == 0 {
            return 0.0;
        }
        let n = self.documents.len() as f32;
        let df = df as f32;
        let ratio = (n - df + 0.5) / (df + 0.5);
        if self.params.smooth_idf {
            ratio.ln_1p()
        } else {
            ratio.ln()
        }
    }

    /// BM25 score of the chunk at `position` for already-tokenized query terms.
    pub fn score(&self, query_terms: &[String], position: usize) -> f32 {
        let Some(term_counts) = self.doc_term_frequency.get(position) else {
            return 0.0;
        };
        let Bm25Params { k1, b, .. } = self.params;
        let doc_len = self.doc_lengths[position] as f32;
        let length_ratio = if self.avg_doc_length > 0.0 {
            doc_len / self.avg_doc_length
        } else {
            1.0
        };

        query_terms
            .iter()
            .map(|term| {
                let tf = term_counts.get(term).copied().unwrap_or(0) as f32;
                if tf == 0.0 {
                    return 0.0;
                }
                self.idf(term) * tf * (k1 + 1.0) / (tf + k1 * (1.0 - b + b * length_ratio))
            })
            .sum()
    }

    /// Rank chunks for `text`, applying the dynamic relevance threshold.
    pub fn query(&self, text: &str, k: usize) -> LexicalResults {
        let terms = tokenize(text);
        if terms.is_empty() {
            let hits = self
                .documents
                .iter()
                .take(k)
                .map(|chunk| ScoredChunk {
                    chunk: chunk.clone(),
                    score: 0.0,
                    source: ScoreSource::Lexical,
                })
                .collect();
            return LexicalResults {
                hits,
                fallback: true,
            };
        }

        let mut scored: Vec<(usize, f32)> = (0..self.documents.len())
            .map(|position| (position, self.score(&terms, position)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        if scored.is_empty() {
            return LexicalResults {
                hits: Vec::new(),
                fallback: false,
            };
        }

        // Stable sort keeps index order among equal scores
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let threshold = self.threshold(&scored);
        let above: Vec<(usize, f32)> = scored
            .iter()
            .copied()
            .filter(|(_, score)| *score >= threshold)
            .collect();

        let mut kept = if above.is_empty() {
            tracing::debug!(
                threshold,
                fallback = self.params.fallback_count,
                "Threshold removed every hit, keeping top raw scores"
            );
            scored.truncate(self.params.fallback_count);
            scored
        } else {
            above
        };
        kept.truncate(k);

        LexicalResults {
            hits: kept
                .into_iter()
                .map(|(position, score)| ScoredChunk {
                    chunk: self.documents[position].clone(),
                    score,
                    source: ScoreSource::Lexical,
                })
                .collect(),
            fallback: false,
        }
    }

    /// `max(floor, max_ratio * max, avg_ratio * mean)` over positive scores.
    fn threshold(&self, positive: &[(usize, f32)]) -> f32 {
        let max_score = positive.iter().map(|(_, s)| *s).fold(f32::MIN, f32::max);
        let avg_score = positive.iter().map(|(_, s)| *s).sum::<f32>() / positive.len() as f32;
        self.params
            .threshold_floor
            .max(self.params.max_score_ratio * max_score)
            .max(self.params.avg_score_ratio * avg_score)
    }
}
