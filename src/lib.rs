//! # page-search
//!
//! A Rust web service that keeps a hybrid retrieval index per project and
//! answers queries over project pages by combining BM25 keyword ranking with
//! embedding similarity.
//!
//! ## Architecture
//!
//! ```text
//!        page mutation                         query
//!              │                                 │
//!              ▼                                 ▼
//!   ┌─────────────────────┐           ┌──────────────────────┐
//!   │  ProjectStore       │           │  HybridRetriever     │
//!   │  projects.json      │           │  one Arc snapshot    │
//!   └──────────┬──────────┘           └──────────┬───────────┘
//!              │ mark stale + rebuild            │
//!              ▼                        ┌────────┴────────┐
//!   ┌─────────────────────┐             ▼                 ▼
//!   │ ProjectIndexRegistry│      ┌─────────────┐   ┌──────────────┐
//!   │ per-project lock    │      │ BM25 lexical│   │ Semantic     │
//!   │ chunk → fingerprint │      │ + threshold │   │ (timeout)    │
//!   │ → lexical + vectors │      └──────┬──────┘   └──────┬───────┘
//!   │ → publish snapshot  │             └────────┬────────┘
//!   └─────────────────────┘                      ▼
//!                                    ┌───────────────────────┐
//!                                    │ Min-max + weighted    │
//!                                    │ fusion (0.7 / 0.3)    │
//!                                    │ lexical-only fallback │
//!                                    └───────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, storage, embeddings and ranking
//! - [`models`] - Shared data types: `Project`, `Page`, `Chunk`, request/response types
//! - [`error`] - `RetrievalError` and its HTTP mapping
//! - [`store`] - Project and page storage persisted as JSON
//! - [`chunking`] - Paragraph-aware page chunking
//! - [`search::tokenizer`] - Lowercasing, stop-word filtering tokenizer
//! - [`search::bm25`] - In-memory BM25 index with a dynamic relevance threshold
//! - [`search::vector`] - Generational in-memory vector store with cosine similarity
//! - [`search::semantic`] - Semantic index boundary and its embedding-backed implementation
//! - [`search::hybrid`] - Min-max normalization and weighted score fusion
//! - [`search::registry`] - Per-project index lifecycle with atomic snapshot swaps
//! - [`search::retriever`] - Concurrent hybrid queries with graceful degradation
//! - [`llm::embeddings`] - Batch embedding generation via Ollama or OpenAI-compatible APIs
//! - [`api`] - Axum HTTP handlers for projects, pages, index management and search
//! - [`state`] - Shared application state

pub mod api;
pub mod chunking;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod search;
pub mod state;
pub mod store;
