use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A project and the pages it owns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub pages: Vec<Page>,
}

/// A free-form content page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

/// Fixed metadata carried by every chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub project_id: Uuid,
    pub page_id: Uuid,
    pub page_title: String,
    pub chunk_index: usize,
    /// Deployment-specific metadata that has no dedicated field.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

/// A unit of retrievable page text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{page_id}:{chunk_index}`, unique within a project
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(project_id: Uuid, page: &Page, chunk_index: usize, text: String) -> Self {
        Self {
            id: format!("{}:{chunk_index}", page.id),
            text,
            metadata: ChunkMetadata {
                project_id,
                page_id: page.id,
                page_title: page.title.clone(),
                chunk_index,
                extensions: BTreeMap::new(),
            },
        }
    }
}

/// Which ranker produced a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    Lexical,
    Semantic,
    Hybrid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
    pub source: ScoreSource,
}

/// Relative weight of each ranker in a hybrid query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridWeights {
    pub semantic: f32,
    pub keyword: f32,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            semantic: 0.7,
            keyword: 0.3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HybridQuery {
    pub project_id: Uuid,
    pub query_text: String,
    pub k: usize,
    pub weights: HybridWeights,
}

/// Create-project request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProjectRequest {
    pub title: String,
}

/// Upsert-page request
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertPageRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// `PUT /vectors` body
#[derive(Debug, Clone, Deserialize)]
pub struct VectorActionRequest {
    pub action: String,
}

/// `POST /test-hybrid-search` body
#[derive(Debug, Clone, Deserialize)]
pub struct HybridSearchRequest {
    pub query: String,
    #[serde(default)]
    pub weights: Option<HybridWeights>,
    pub k: Option<usize>,
}

/// A chunk as rendered in search responses
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkView {
    pub chunk_id: String,
    pub page_id: Uuid,
    pub page_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
    pub source: ScoreSource,
    pub preview: String,
}

impl ChunkView {
    pub fn scored(hit: &ScoredChunk, preview_chars: usize) -> Self {
        Self {
            chunk_id: hit.chunk.id.clone(),
            page_id: hit.chunk.metadata.page_id,
            page_title: hit.chunk.metadata.page_title.clone(),
            score: Some(hit.score),
            rank: None,
            source: hit.source,
            preview: preview(&hit.chunk.text, preview_chars),
        }
    }

    /// Semantic listings report 1-based rank alongside the similarity.
    pub fn ranked(hit: &ScoredChunk, rank: usize, preview_chars: usize) -> Self {
        Self {
            rank: Some(rank),
            ..Self::scored(hit, preview_chars)
        }
    }
}

/// Truncate `text` to at most `max_chars` characters, marking the cut with an ellipsis.
pub fn preview(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &trimmed[..end]),
        None => trimmed.to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSummary {
    pub hybrid_count: usize,
    pub semantic_count: usize,
    pub lexical_count: usize,
    pub index_available: bool,
    pub degraded: bool,
}

/// `POST /test-hybrid-search` response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridSearchResponse {
    pub query: String,
    pub hybrid_results: Vec<ChunkView>,
    pub semantic_results: Vec<ChunkView>,
    pub summary: SearchSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_source_serializes_to_snake_case() {
        let json = serde_json::to_value(ScoreSource::Hybrid).unwrap();
        assert_eq!(json, "hybrid");
    }

    #[test]
    fn test_chunk_id_combines_page_and_index() {
        let page = Page {
            id: Uuid::new_v4(),
            title: "Budget".to_string(),
            content: String::new(),
            updated_at: Utc::now(),
        };
        let chunk = Chunk::new(Uuid::new_v4(), &page, 3, "text".to_string());
        assert_eq!(chunk.id, format!("{}:3", page.id));
        assert_eq!(chunk.metadata.page_title, "Budget");
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("  short  ", 10), "short");
        assert_eq!(preview("héllo wörld", 5), "héllo...");
    }

    #[test]
    fn test_chunk_metadata_uses_camel_case_and_hides_empty_extensions() {
        let page = Page {
            id: Uuid::new_v4(),
            title: "Notes".to_string(),
            content: String::new(),
            updated_at: Utc::now(),
        };
        let chunk = Chunk::new(Uuid::new_v4(), &page, 0, "x".to_string());
        let json = serde_json::to_value(&chunk.metadata).unwrap();
        assert_eq!(json["pageTitle"], "Notes");
        assert!(json.get("extensions").is_none());
    }
}
