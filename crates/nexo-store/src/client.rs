//! The knowledge-base contract.

use async_trait::async_trait;
use nexo_core::types::{
    DashboardSummary, NewNote, NewProject, NewTask, Note, Period, ProductivityStats, Project,
    Task, TaskFilter, TaskUpdate,
};

use crate::error::StoreError;

/// Async client for the system of record holding tasks, notes and projects.
///
/// Implementations report failures as [`StoreError`], never as partial or
/// malformed success values. Search operations return items in the store's
/// native order.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError>;

    async fn update_task(&self, id: &str, update: TaskUpdate) -> Result<Task, StoreError>;

    async fn complete_task(&self, id: &str) -> Result<Task, StoreError>;

    async fn search_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, StoreError>;

    async fn create_note(&self, note: NewNote) -> Result<Note, StoreError>;

    async fn search_notes(&self, query: &str, limit: usize) -> Result<Vec<Note>, StoreError>;

    async fn create_project(&self, project: NewProject) -> Result<Project, StoreError>;

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError>;

    /// Live task/note/project counts.
    async fn dashboard_summary(&self) -> Result<DashboardSummary, StoreError>;

    /// Productivity metrics for the window ending now.
    async fn productivity_stats(&self, period: Period) -> Result<ProductivityStats, StoreError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}
