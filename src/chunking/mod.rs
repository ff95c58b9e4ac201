//! Turns project pages into indexable chunks.

pub mod paragraph;

use uuid::Uuid;

use crate::models::{Chunk, Page, Project};

/// Chunk a single page. Chunk ids depend only on the page id and the chunk
/// position, so unchanged content keeps its ids across rebuilds.
pub fn chunk_page(project_id: Uuid, page: &Page, budget: usize) -> Vec<Chunk> {
    if page.content.trim().is_empty() {
        return Vec::new();
    }

    paragraph::split_paragraphs(&page.content, budget)
        .into_iter()
        .enumerate()
        .map(|(i, text)| Chunk::new(project_id, page, i, text))
        .collect()
}

/// Chunk every page of a project, in page order.
pub fn chunk_project(project: &Project, budget: usize) -> Vec<Chunk> {
    project
        .pages
        .iter()
        .flat_map(|page| chunk_page(project.id, page, budget))
        .collect()
}
