use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::search::bm25::Bm25Params;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the project store is persisted
    pub data_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,
    /// Ranking and query knobs
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "ollama", "openai", or "none" to disable the semantic side
    pub provider: String,
    /// Base URL for the embedding API
    pub base_url: String,
    /// Model name for embeddings
    pub model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Embedding vector dimension
    pub dim: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub bm25: Bm25Params,
    /// Result count when a request does not specify `k`
    pub default_k: usize,
    /// Upper bound on `k` accepted from callers
    pub max_k: usize,
    /// Each side fetches `k * fetch_factor` candidates before fusion
    pub fetch_factor: usize,
    /// Semantic lookup timeout in seconds
    pub semantic_timeout_secs: u64,
    /// Characters of chunk text included in result previews
    pub preview_chars: usize,
    /// Non-whitespace character budget per chunk
    pub chunk_budget: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:9100".to_string(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            api_key: None,
            dim: 768,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            bm25: Bm25Params::default(),
            default_k: 8,
            max_k: 100,
            fetch_factor: 3,
            semantic_timeout_secs: 10,
            preview_chars: 200,
            chunk_budget: 1000,
        }
    }
}

impl RetrievalConfig {
    /// Keep `default_k` within `1..=max_k`.
    pub fn clamp_default_k(&mut self) {
        let max_k = self.max_k.max(1);
        self.default_k = self.default_k.clamp(1, max_k);
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("PAGE_SEARCH_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("PAGE_SEARCH_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(provider) = std::env::var("EMBEDDING_PROVIDER") {
            config.embedding.provider = provider;
        }
        if let Ok(url) = std::env::var("EMBEDDING_BASE_URL") {
            config.embedding.base_url = url;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Ok(key) = std::env::var("EMBEDDING_API_KEY") {
            config.embedding.api_key = Some(key);
        }
        if let Ok(dim) = std::env::var("EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.embedding.dim = d;
            }
        }

        let retrieval = &mut config.retrieval;
        if let Ok(val) = std::env::var("PAGE_SEARCH_DEFAULT_K") {
            if let Ok(v) = val.parse() {
                retrieval.default_k = v;
            }
        }
        if let Ok(val) = std::env::var("PAGE_SEARCH_SEMANTIC_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                retrieval.semantic_timeout_secs = v;
            }
        }
        if let Ok(val) = std::env::var("PAGE_SEARCH_PREVIEW_CHARS") {
            if let Ok(v) = val.parse() {
                retrieval.preview_chars = v;
            }
        }
        if let Ok(val) = std::env::var("PAGE_SEARCH_THRESHOLD_FALLBACK") {
            if let Ok(v) = val.parse() {
                retrieval.bm25.fallback_count = v;
            }
        }
        if let Ok(val) = std::env::var("PAGE_SEARCH_CHUNK_BUDGET") {
            if let Ok(v) = val.parse::<usize>() {
                retrieval.chunk_budget = v.max(1);
            }
        }
        retrieval.clamp_default_k();

        config
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("projects.json")
    }

    /// Whether a real embedding backend is configured.
    pub fn semantic_enabled(&self) -> bool {
        !self.embedding.provider.eq_ignore_ascii_case("none")
    }
}
