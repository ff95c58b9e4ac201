use anyhow::Context;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::{Page, Project};
use crate::search::registry::PageSource;

/// Result of removing a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRemoval {
    /// The project still has pages left to index
    Remaining(usize),
    /// The removed page was the last one
    Emptied,
}

/// Projects and their pages, optionally persisted to a JSON file.
#[derive(Debug, Default)]
pub struct ProjectStore {
    projects: RwLock<Vec<Project>>,
    path: Option<PathBuf>,
    /// Serializes snapshot + temp write + rename across writers
    persist_lock: Mutex<()>,
}

impl ProjectStore {
    /// Load the store from `path`, starting empty if the file does not exist.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let projects = if path.exists() {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            match serde_json::from_str(&data) {
                Ok(projects) => projects,
                Err(e) => {
                    tracing::warn!("Ignoring unreadable project store {}: {e}", path.display());
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Ok(Self {
            projects: RwLock::new(projects),
            path: Some(path.to_path_buf()),
            persist_lock: Mutex::new(()),
        })
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn list(&self) -> Vec<Project> {
        self.projects.read().clone()
    }

    pub fn get(&self, id: Uuid) -> Option<Project> {
        self.projects.read().iter().find(|p| p.id == id).cloned()
    }

    pub fn create(&self, title: &str) -> anyhow::Result<Project> {
        let project = Project {
            id: Uuid::new_v4(),
            title: title.trim().to_string(),
            created_at: Utc::now(),
            pages: Vec::new(),
        };
        self.projects.write().push(project.clone());
        self.persist()?;
        Ok(project)
    }

    /// Returns false if no such project existed.
    pub fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let removed = {
            let mut projects = self.projects.write();
            let before = projects.len();
            projects.retain(|p| p.id != id);
            projects.len() != before
        };
        if removed {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Insert or replace a page. Returns `None` if the project does not exist.
    pub fn upsert_page(
        &self,
        project_id: Uuid,
        page_id: Uuid,
        title: &str,
        content: &str,
    ) -> anyhow::Result<Option<Page>> {
        let page = {
            let mut projects = self.projects.write();
            let Some(project) = projects.iter_mut().find(|p| p.id == project_id) else {
                return Ok(None);
            };
            let page = Page {
                id: page_id,
                title: title.to_string(),
                content: content.to_string(),
                updated_at: Utc::now(),
            };
            match project.pages.iter_mut().find(|p| p.id == page_id) {
                Some(existing) => *existing = page.clone(),
                None => project.pages.push(page.clone()),
            }
            page
        };
        self.persist()?;
        Ok(Some(page))
    }

    /// Remove a page. Returns `None` if the project or page does not exist.
    pub fn delete_page(
        &self,
        project_id: Uuid,
        page_id: Uuid,
    ) -> anyhow::Result<Option<PageRemoval>> {
        let removal = {
            let mut projects = self.projects.write();
            let Some(project) = projects.iter_mut().find(|p| p.id == project_id) else {
                return Ok(None);
            };
            let before = project.pages.len();
            project.pages.retain(|p| p.id != page_id);
            if project.pages.len() == before {
                return Ok(None);
            }
            match project.pages.len() {
                0 => PageRemoval::Emptied,
                n => PageRemoval::Remaining(n),
            }
        };
        self.persist()?;
        Ok(Some(removal))
    }

    /// Persist projects to disk (atomic write via temp file + rename).
    fn persist(&self) -> anyhow::Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let _guard = self.persist_lock.lock();
        let data = serde_json::to_string_pretty(&*self.projects.read())?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &data)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

impl PageSource for ProjectStore {
    fn project(&self, id: Uuid) -> Option<Project> {
        self.get(id)
    }
}
