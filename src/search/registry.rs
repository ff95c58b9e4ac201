use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::chunking::chunk_project;
use crate::error::RetrievalError;
use crate::models::{Chunk, Project};
use crate::search::bm25::{Bm25Params, LexicalIndex};
use crate::search::semantic::{SemanticHandle, SemanticIndex};

/// Supplies the current page set of a project at build time.
pub trait PageSource: Send + Sync {
    fn project(&self, id: Uuid) -> Option<Project>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    Absent,
    Building,
    Ready,
    Stale,
    Failed,
}

/// One complete, immutable view of a project's indexes.
#[derive(Debug, Clone)]
pub struct ProjectIndexState {
    pub project_id: Uuid,
    pub lexical: Option<Arc<LexicalIndex>>,
    pub semantic: Option<SemanticHandle>,
    pub status: IndexStatus,
    pub last_built_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Content hash of the chunk set the indexes were built from
    pub fingerprint: Option<String>,
}

impl ProjectIndexState {
    fn empty(project_id: Uuid, status: IndexStatus) -> Self {
        Self {
            project_id,
            lexical: None,
            semantic: None,
            status,
            last_built_at: None,
            last_error: None,
            fingerprint: None,
        }
    }

    fn with_status(&self, status: IndexStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    /// At least one build has produced a lexical index that can be served.
    pub fn is_available(&self) -> bool {
        self.lexical.is_some()
    }
}

/// Result of a build request.
#[derive(Debug, Clone)]
pub enum BuildOutcome {
    /// `rebuilt` is false when the content was unchanged and the existing
    /// index was kept.
    Ready {
        state: Arc<ProjectIndexState>,
        rebuilt: bool,
    },
    /// `previous` is the state that was live before the build, still served
    /// when it held an index.
    Failed {
        reason: String,
        previous: Option<Arc<ProjectIndexState>>,
    },
    /// The project has no pages, so it has no index.
    Cleared,
}

impl BuildOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Health report for `GET /vectors`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub status: IndexStatus,
    pub chunk_count: usize,
    pub unique_terms: usize,
    /// Mean chunk length in tokens
    pub avg_chunk_length: f32,
    pub semantic_entries: usize,
    pub last_built_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

struct ProjectSlot {
    state: RwLock<Option<Arc<ProjectIndexState>>>,
    /// Serializes builds for this project; queued builds wait here.
    build_lock: Arc<tokio::sync::Mutex<()>>,
}

impl ProjectSlot {
    fn new() -> Self {
        Self {
            state: RwLock::new(None),
            build_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    fn current(&self) -> Option<Arc<ProjectIndexState>> {
        self.state.read().clone()
    }

    fn publish(&self, state: ProjectIndexState) -> Arc<ProjectIndexState> {
        let state = Arc::new(state);
        *self.state.write() = Some(state.clone());
        state
    }
}

/// Owns the lexical index and semantic handle of every project.
///
/// Readers take an `Arc` snapshot of a project's state; builds assemble a
/// fresh state off to the side and swap it in only after both sides
/// succeed. The map lock is only held to find or insert a project slot, so
/// projects never wait on each other.
pub struct ProjectIndexRegistry {
    slots: RwLock<HashMap<Uuid, Arc<ProjectSlot>>>,
    pages: Arc<dyn PageSource>,
    semantic: Arc<dyn SemanticIndex>,
    params: Bm25Params,
    chunk_budget: usize,
}

impl ProjectIndexRegistry {
    pub fn new(
        pages: Arc<dyn PageSource>,
        semantic: Arc<dyn SemanticIndex>,
        params: Bm25Params,
        chunk_budget: usize,
    ) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            pages,
            semantic,
            params,
            chunk_budget,
        }
    }

    pub fn semantic(&self) -> Arc<dyn SemanticIndex> {
        self.semantic.clone()
    }

    fn slot(&self, project_id: Uuid) -> Arc<ProjectSlot> {
        if let Some(slot) = self.slots.read().get(&project_id) {
            return slot.clone();
        }
        self.slots
            .write()
            .entry(project_id)
            .or_insert_with(|| Arc::new(ProjectSlot::new()))
            .clone()
    }

    fn existing_project_slot(&self, project_id: Uuid) -> Result<Arc<ProjectSlot>, RetrievalError> {
        if self.pages.project(project_id).is_none() {
            return Err(RetrievalError::ProjectNotFound(project_id));
        }
        Ok(self.slot(project_id))
    }

    /// Lock the project's live slot. A slot retired by `clear_index` while we
    /// waited is skipped so a queued build cannot publish into it.
    async fn lock_slot(
        &self,
        project_id: Uuid,
    ) -> Result<(Arc<ProjectSlot>, OwnedMutexGuard<()>), RetrievalError> {
        loop {
            let slot = self.existing_project_slot(project_id)?;
            let guard = slot.build_lock.clone().lock_owned().await;
            if self.is_registered(project_id, &slot) {
                return Ok((slot, guard));
            }
        }
    }

    fn is_registered(&self, project_id: Uuid, slot: &Arc<ProjectSlot>) -> bool {
        self.slots
            .read()
            .get(&project_id)
            .is_some_and(|live| Arc::ptr_eq(live, slot))
    }

    /// Caller must hold `slot.build_lock`.
    async fn discard_locked(
        &self,
        project_id: Uuid,
        slot: &Arc<ProjectSlot>,
    ) -> Result<(), RetrievalError> {
        *slot.state.write() = None;
        {
            let mut slots = self.slots.write();
            if slots.get(&project_id).is_some_and(|live| Arc::ptr_eq(live, slot)) {
                slots.remove(&project_id);
            }
        }

        self.semantic
            .clear(project_id)
            .await
            .map_err(|e| RetrievalError::Adapter(format!("{e:#}")))?;
        tracing::info!(%project_id, "Hybrid index cleared");
        Ok(())
    }

    /// A project without pages keeps no index.
    async fn discard_empty(&self, project_id: Uuid, slot: &Arc<ProjectSlot>) -> BuildOutcome {
        tracing::info!(%project_id, "Project has no pages, dropping its index");
        if let Err(e) = self.discard_locked(project_id, slot).await {
            tracing::warn!(%project_id, "Failed to clear semantic index: {e}");
        }
        BuildOutcome::Cleared
    }

    /// Current state of a project, if it has ever been indexed.
    pub fn snapshot(&self, project_id: Uuid) -> Option<Arc<ProjectIndexState>> {
        let slot = self.slots.read().get(&project_id).cloned()?;
        slot.current()
    }

    /// Rebuild both sides from the project's current pages. Skips the
    /// rebuild when the content matches the ready index.
    pub async fn create_or_update_index(
        &self,
        project_id: Uuid,
    ) -> Result<BuildOutcome, RetrievalError> {
        let (slot, _guard) = self.lock_slot(project_id).await?;

        let project = self
            .pages
            .project(project_id)
            .ok_or(RetrievalError::ProjectNotFound(project_id))?;
        if project.pages.is_empty() {
            return Ok(self.discard_empty(project_id, &slot).await);
        }
        let previous = slot.current();
        Ok(self.build_locked(&slot, project, previous, false).await)
    }

    /// Discard both sides and rebuild without the unchanged-content shortcut.
    pub async fn force_reinitialize(
        &self,
        project_id: Uuid,
    ) -> Result<BuildOutcome, RetrievalError> {
        let (slot, _guard) = self.lock_slot(project_id).await?;

        let project = self
            .pages
            .project(project_id)
            .ok_or(RetrievalError::ProjectNotFound(project_id))?;
        if project.pages.is_empty() {
            return Ok(self.discard_empty(project_id, &slot).await);
        }

        tracing::info!(%project_id, "Reinitializing hybrid index");
        slot.publish(ProjectIndexState::empty(project_id, IndexStatus::Building));
        if let Err(e) = self.semantic.clear(project_id).await {
            tracing::warn!(%project_id, "Failed to clear semantic index: {e:#}");
        }

        Ok(self.build_locked(&slot, project, None, true).await)
    }

    /// Caller must hold `slot.build_lock`.
    async fn build_locked(
        &self,
        slot: &ProjectSlot,
        project: Project,
        previous: Option<Arc<ProjectIndexState>>,
        force: bool,
    ) -> BuildOutcome {
        let project_id = project.id;
        let budget = self.chunk_budget;
        let params = self.params;

        let prepared = tokio::task::spawn_blocking(move || {
            let chunks = chunk_project(&project, budget);
            let fingerprint = fingerprint(&chunks);
            (chunks, fingerprint)
        })
        .await;
        let (chunks, fingerprint) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                let reason = format!("Chunking task failed: {e}");
                return self.fail(slot, project_id, previous, reason);
            }
        };

        if !force {
            if let Some(prev) = previous.as_ref().filter(|p| {
                matches!(p.status, IndexStatus::Ready | IndexStatus::Stale)
                    && p.fingerprint.as_deref() == Some(fingerprint.as_str())
            }) {
                tracing::info!(%project_id, "Page content unchanged, keeping current index");
                let state = match prev.status {
                    IndexStatus::Ready => prev.clone(),
                    _ => slot.publish(prev.with_status(IndexStatus::Ready)),
                };
                return BuildOutcome::Ready {
                    state,
                    rebuilt: false,
                };
            }
        }

        let building = match previous.as_deref() {
            Some(prev) => prev.with_status(IndexStatus::Building),
            None => ProjectIndexState::empty(project_id, IndexStatus::Building),
        };
        slot.publish(building);
        tracing::info!(%project_id, chunks = chunks.len(), "Building hybrid index");

        let built = tokio::task::spawn_blocking(move || LexicalIndex::build(chunks, params)).await;
        let lexical = match built {
            Ok(index) => Arc::new(index),
            Err(e) => {
                let reason = format!("Lexical build task failed: {e}");
                return self.fail(slot, project_id, previous, reason);
            }
        };

        let semantic = match self.semantic.rebuild(project_id, lexical.documents()).await {
            Ok(handle) => handle,
            Err(e) => {
                let reason = format!("Semantic rebuild failed: {e:#}");
                return self.fail(slot, project_id, previous, reason);
            }
        };

        let state = slot.publish(ProjectIndexState {
            project_id,
            lexical: Some(lexical.clone()),
            semantic: Some(semantic),
            status: IndexStatus::Ready,
            last_built_at: Some(Utc::now()),
            last_error: None,
            fingerprint: Some(fingerprint),
        });
        tracing::info!(
            %project_id,
            chunks = lexical.len(),
            terms = lexical.unique_terms(),
            "Hybrid index ready"
        );

        BuildOutcome::Ready {
            state,
            rebuilt: true,
        }
    }

    /// Publish a failed state that keeps serving whatever `previous` held.
    fn fail(
        &self,
        slot: &ProjectSlot,
        project_id: Uuid,
        previous: Option<Arc<ProjectIndexState>>,
        reason: String,
    ) -> BuildOutcome {
        tracing::error!(%project_id, "Index build failed: {reason}");
        let mut failed = match previous.as_deref() {
            Some(prev) => prev.with_status(IndexStatus::Failed),
            None => ProjectIndexState::empty(project_id, IndexStatus::Failed),
        };
        failed.last_error = Some(reason.clone());
        slot.publish(failed);

        BuildOutcome::Failed { reason, previous }
    }

    /// Flag a ready index as out of date after a page mutation.
    pub fn mark_stale(&self, project_id: Uuid) {
        let Some(slot) = self.slots.read().get(&project_id).cloned() else {
            return;
        };
        let mut state = slot.state.write();
        let stale = state
            .as_deref()
            .filter(|s| s.status == IndexStatus::Ready)
            .map(|s| Arc::new(s.with_status(IndexStatus::Stale)));
        if stale.is_some() {
            *state = stale;
        }
    }

    /// Drop both sides of a project's index.
    pub async fn clear_index(&self, project_id: Uuid) -> Result<(), RetrievalError> {
        let slot = self.slots.read().get(&project_id).cloned();
        let Some(slot) = slot else {
            return self
                .semantic
                .clear(project_id)
                .await
                .map_err(|e| RetrievalError::Adapter(format!("{e:#}")));
        };

        // Wait out an in-flight build so it cannot republish afterwards
        let _guard = slot.build_lock.clone().lock_owned().await;
        self.discard_locked(project_id, &slot).await
    }

    pub fn stats(&self, project_id: Uuid) -> IndexStats {
        let Some(state) = self.snapshot(project_id) else {
            return IndexStats {
                status: IndexStatus::Absent,
                chunk_count: 0,
                unique_terms: 0,
                avg_chunk_length: 0.0,
                semantic_entries: 0,
                last_built_at: None,
                last_error: None,
            };
        };

        let lexical = state.lexical.as_deref();
        IndexStats {
            status: state.status,
            chunk_count: lexical.map(LexicalIndex::len).unwrap_or(0),
            unique_terms: lexical.map(LexicalIndex::unique_terms).unwrap_or(0),
            avg_chunk_length: lexical.map(LexicalIndex::avg_doc_length).unwrap_or(0.0),
            semantic_entries: state.semantic.as_ref().map(|h| h.entries).unwrap_or(0),
            last_built_at: state.last_built_at,
            last_error: state.last_error.clone(),
        }
    }
}

/// Hash of chunk ids, titles and text.
pub fn fingerprint(chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk.id.as_bytes());
        hasher.update([0x1f]);
        hasher.update(chunk.metadata.page_title.as_bytes());
        hasher.update([0x1f]);
        hasher.update(chunk.text.as_bytes());
        hasher.update([0x1e]);
    }
    format!("{:x}", hasher.finalize())
}
