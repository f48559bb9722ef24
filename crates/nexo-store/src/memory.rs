//! Process-local knowledge base.
//!
//! Keeps tasks, notes and projects in insertion order behind a mutex.
//! Aggregates are computed by counting on every call. Nothing survives a
//! restart.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, Local, Utc};
use nexo_core::types::{
    DashboardSummary, NewNote, NewProject, NewTask, Note, Period, ProductivityStats, Project,
    Task, TaskFilter, TaskStatus, TaskUpdate,
};
use uuid::Uuid;

use crate::client::KnowledgeBase;
use crate::error::StoreError;

#[derive(Default)]
struct Records {
    tasks: Vec<Task>,
    notes: Vec<Note>,
    projects: Vec<Project>,
}

/// In-memory [`KnowledgeBase`] used for offline runs and tests.
#[derive(Default)]
pub struct InMemoryKnowledgeBase {
    records: Mutex<Records>,
}

impl InMemoryKnowledgeBase {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all tasks in insertion order.
    pub fn tasks(&self) -> Vec<Task> {
        self.lock().map(|r| r.tasks.clone()).unwrap_or_default()
    }

    /// Snapshot of all notes in insertion order.
    pub fn notes(&self) -> Vec<Note> {
        self.lock().map(|r| r.notes.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Records>, StoreError> {
        self.records
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("Lock poisoned: {}", e)))
    }
}

fn require_text(value: &str, field: &str) -> Result<String, StoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

#[async_trait]
impl KnowledgeBase for InMemoryKnowledgeBase {
    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError> {
        let title = require_text(&task.title, "title")?;
        let created = Task {
            id: Uuid::new_v4().to_string(),
            title,
            description: task.description,
            status: TaskStatus::Todo,
            priority: task.priority.unwrap_or_default(),
            due_date: task.due_date,
            tags: task.tags,
            project: task.project,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.lock()?.tasks.push(created.clone());
        tracing::debug!(task_id = %created.id, "Task created");
        Ok(created)
    }

    async fn update_task(&self, id: &str, update: TaskUpdate) -> Result<Task, StoreError> {
        if update.is_empty() {
            return Err(StoreError::Validation("update has no fields".to_string()));
        }
        let mut records = self.lock()?;
        let task = records
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("task {}", id)))?;

        if let Some(title) = update.title {
            task.title = require_text(&title, "title")?;
        }
        if let Some(description) = update.description {
            task.description = Some(description);
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        if let Some(due_date) = update.due_date {
            task.due_date = Some(due_date);
        }
        if let Some(tags) = update.tags {
            task.tags = tags;
        }
        if let Some(status) = update.status {
            task.completed_at = match status {
                TaskStatus::Done => task.completed_at.or_else(|| Some(Utc::now())),
                _ => None,
            };
            task.status = status;
        }
        Ok(task.clone())
    }

    async fn complete_task(&self, id: &str) -> Result<Task, StoreError> {
        let mut records = self.lock()?;
        let task = records
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("task {}", id)))?;
        if task.status != TaskStatus::Done {
            task.status = TaskStatus::Done;
            task.completed_at = Some(Utc::now());
        }
        Ok(task.clone())
    }

    async fn search_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, StoreError> {
        let records = self.lock()?;
        let title = filter.title.as_deref().map(str::to_lowercase);
        let project = filter.project.as_deref().map(str::to_lowercase);

        let matches = records.tasks.iter().filter(|t| {
            if let Some(ref needle) = title {
                if !contains_ci(&t.title, needle) {
                    return false;
                }
            }
            if let Some(status) = filter.status {
                if t.status != status {
                    return false;
                }
            }
            if let Some(priority) = filter.priority {
                if t.priority != priority {
                    return false;
                }
            }
            if let Some(ref needle) = project {
                if !t.project.as_deref().is_some_and(|p| contains_ci(p, needle)) {
                    return false;
                }
            }
            true
        });

        Ok(match filter.limit {
            Some(limit) => matches.take(limit).cloned().collect(),
            None => matches.cloned().collect(),
        })
    }

    async fn create_note(&self, note: NewNote) -> Result<Note, StoreError> {
        let title = require_text(&note.title, "title")?;
        let created = Note {
            id: Uuid::new_v4().to_string(),
            title,
            content: note.content,
            tags: note.tags,
            created_at: Utc::now(),
        };
        self.lock()?.notes.push(created.clone());
        tracing::debug!(note_id = %created.id, "Note created");
        Ok(created)
    }

    async fn search_notes(&self, query: &str, limit: usize) -> Result<Vec<Note>, StoreError> {
        let needle = require_text(query, "query")?.to_lowercase();
        let records = self.lock()?;
        Ok(records
            .notes
            .iter()
            .filter(|n| {
                contains_ci(&n.title, &needle)
                    || contains_ci(&n.content, &needle)
                    || n.tags.iter().any(|t| contains_ci(t, &needle))
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn create_project(&self, project: NewProject) -> Result<Project, StoreError> {
        let name = require_text(&project.name, "name")?;
        let mut records = self.lock()?;
        if records
            .projects
            .iter()
            .any(|p| p.name.eq_ignore_ascii_case(&name))
        {
            return Err(StoreError::Validation(format!(
                "project '{}' already exists",
                name
            )));
        }
        let created = Project {
            id: Uuid::new_v4().to_string(),
            name,
            description: project.description,
            created_at: Utc::now(),
        };
        records.projects.push(created.clone());
        Ok(created)
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        Ok(self.lock()?.projects.clone())
    }

    async fn dashboard_summary(&self) -> Result<DashboardSummary, StoreError> {
        let records = self.lock()?;
        let today = Local::now().date_naive();
        let count =
            |status: TaskStatus| records.tasks.iter().filter(|t| t.status == status).count();

        Ok(DashboardSummary {
            todo_tasks: count(TaskStatus::Todo),
            in_progress_tasks: count(TaskStatus::InProgress),
            completed_tasks: count(TaskStatus::Done),
            overdue_tasks: records.tasks.iter().filter(|t| t.is_overdue(today)).count(),
            total_notes: records.notes.len(),
            total_projects: records.projects.len(),
        })
    }

    async fn productivity_stats(&self, period: Period) -> Result<ProductivityStats, StoreError> {
        let records = self.lock()?;
        let since = Utc::now() - Duration::days(period.days());

        let tasks_created = records
            .tasks
            .iter()
            .filter(|t| t.created_at >= since)
            .count();
        let tasks_completed = records
            .tasks
            .iter()
            .filter(|t| t.completed_at.is_some_and(|c| c >= since))
            .count();
        let notes_created = records
            .notes
            .iter()
            .filter(|n| n.created_at >= since)
            .count();

        Ok(ProductivityStats::from_counts(
            period,
            tasks_created,
            tasks_completed,
            notes_created,
        ))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use nexo_core::types::Priority;

    fn new_task(title: &str) -> NewTask {
        NewTask {
            title: title.to_string(),
            ..NewTask::default()
        }
    }

    // ---- Tasks ----

    #[tokio::test]
    async fn test_create_task_defaults() {
        let kb = InMemoryKnowledgeBase::new();
        let task = kb.create_task(new_task("  Revisar relatório  ")).await.unwrap();
        assert_eq!(task.title, "Revisar relatório");
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, Priority::Medium);
        assert!(!task.id.is_empty());
        assert_eq!(kb.tasks().len(), 1);
    }

    #[tokio::test]
    async fn test_create_task_empty_title_rejected() {
        let kb = InMemoryKnowledgeBase::new();
        let err = kb.create_task(new_task("   ")).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(kb.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_update_task_fields() {
        let kb = InMemoryKnowledgeBase::new();
        let task = kb.create_task(new_task("Ligar para cliente")).await.unwrap();
        let due = NaiveDate::from_ymd_opt(2030, 1, 15).unwrap();
        let updated = kb
            .update_task(
                &task.id,
                TaskUpdate {
                    priority: Some(Priority::High),
                    due_date: Some(due),
                    status: Some(TaskStatus::InProgress),
                    ..TaskUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.priority, Priority::High);
        assert_eq!(updated.due_date, Some(due));
        assert_eq!(updated.status, TaskStatus::InProgress);
        assert!(updated.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_update_task_empty_update_rejected() {
        let kb = InMemoryKnowledgeBase::new();
        let task = kb.create_task(new_task("x")).await.unwrap();
        let err = kb.update_task(&task.id, TaskUpdate::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_missing_task() {
        let kb = InMemoryKnowledgeBase::new();
        let update = TaskUpdate {
            priority: Some(Priority::Low),
            ..TaskUpdate::default()
        };
        let err = kb.update_task("nope", update).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_complete_task_sets_completed_at() {
        let kb = InMemoryKnowledgeBase::new();
        let task = kb.create_task(new_task("Enviar proposta")).await.unwrap();
        let done = kb.complete_task(&task.id).await.unwrap();
        assert_eq!(done.status, TaskStatus::Done);
        assert!(done.completed_at.is_some());

        // Completing again keeps the original timestamp
        let again = kb.complete_task(&task.id).await.unwrap();
        assert_eq!(again.completed_at, done.completed_at);
    }

    #[tokio::test]
    async fn test_search_tasks_by_title_case_insensitive() {
        let kb = InMemoryKnowledgeBase::new();
        kb.create_task(new_task("Reunião de equipe")).await.unwrap();
        kb.create_task(new_task("Comprar café")).await.unwrap();
        let found = kb
            .search_tasks(TaskFilter {
                title: Some("REUNIÃO".to_string()),
                ..TaskFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Reunião de equipe");
    }

    #[tokio::test]
    async fn test_search_tasks_preserves_insertion_order_and_limit() {
        let kb = InMemoryKnowledgeBase::new();
        for i in 0..5 {
            kb.create_task(new_task(&format!("tarefa {}", i))).await.unwrap();
        }
        let found = kb
            .search_tasks(TaskFilter {
                limit: Some(3),
                ..TaskFilter::default()
            })
            .await
            .unwrap();
        let titles: Vec<_> = found.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["tarefa 0", "tarefa 1", "tarefa 2"]);
    }

    #[tokio::test]
    async fn test_search_tasks_by_status() {
        let kb = InMemoryKnowledgeBase::new();
        let a = kb.create_task(new_task("a")).await.unwrap();
        kb.create_task(new_task("b")).await.unwrap();
        kb.complete_task(&a.id).await.unwrap();
        let done = kb
            .search_tasks(TaskFilter {
                status: Some(TaskStatus::Done),
                ..TaskFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, a.id);
    }

    // ---- Notes ----

    #[tokio::test]
    async fn test_search_notes_matches_content_and_tags() {
        let kb = InMemoryKnowledgeBase::new();
        kb.create_note(NewNote {
            title: "Ideias".to_string(),
            content: "migrar o banco para postgres".to_string(),
            tags: vec![],
        })
        .await
        .unwrap();
        kb.create_note(NewNote {
            title: "Receita".to_string(),
            content: "bolo".to_string(),
            tags: vec!["cozinha".to_string()],
        })
        .await
        .unwrap();

        assert_eq!(kb.search_notes("Postgres", 10).await.unwrap().len(), 1);
        assert_eq!(kb.search_notes("cozinha", 10).await.unwrap().len(), 1);
        assert!(kb.search_notes("rust", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_notes_empty_query_rejected() {
        let kb = InMemoryKnowledgeBase::new();
        assert!(matches!(
            kb.search_notes("  ", 10).await,
            Err(StoreError::Validation(_))
        ));
    }

    // ---- Projects ----

    #[tokio::test]
    async fn test_create_project_duplicate_rejected() {
        let kb = InMemoryKnowledgeBase::new();
        kb.create_project(NewProject {
            name: "Site novo".to_string(),
            description: None,
        })
        .await
        .unwrap();
        let err = kb
            .create_project(NewProject {
                name: "site novo".to_string(),
                description: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(kb.list_projects().await.unwrap().len(), 1);
    }

    // ---- Aggregates ----

    #[tokio::test]
    async fn test_dashboard_summary_counts() {
        let kb = InMemoryKnowledgeBase::new();
        let a = kb.create_task(new_task("a")).await.unwrap();
        let b = kb.create_task(new_task("b")).await.unwrap();
        kb.create_task(NewTask {
            title: "atrasada".to_string(),
            due_date: NaiveDate::from_ymd_opt(2000, 1, 1),
            ..NewTask::default()
        })
        .await
        .unwrap();
        kb.complete_task(&a.id).await.unwrap();
        kb.update_task(
            &b.id,
            TaskUpdate {
                status: Some(TaskStatus::InProgress),
                ..TaskUpdate::default()
            },
        )
        .await
        .unwrap();
        kb.create_note(NewNote {
            title: "n".to_string(),
            ..NewNote::default()
        })
        .await
        .unwrap();

        let summary = kb.dashboard_summary().await.unwrap();
        assert_eq!(summary.todo_tasks, 1);
        assert_eq!(summary.in_progress_tasks, 1);
        assert_eq!(summary.completed_tasks, 1);
        assert_eq!(summary.overdue_tasks, 1);
        assert_eq!(summary.total_notes, 1);
        assert_eq!(summary.total_projects, 0);
    }

    #[tokio::test]
    async fn test_productivity_stats_live() {
        let kb = InMemoryKnowledgeBase::new();
        let a = kb.create_task(new_task("a")).await.unwrap();
        kb.create_task(new_task("b")).await.unwrap();
        kb.complete_task(&a.id).await.unwrap();

        let stats = kb.productivity_stats(Period::Week).await.unwrap();
        assert_eq!(stats.period, Period::Week);
        assert_eq!(stats.tasks_created, 2);
        assert_eq!(stats.tasks_completed, 1);
        assert!((stats.completion_rate - 0.5).abs() < f32::EPSILON);

        // Not cached: a new completion shows up immediately
        let b = kb.tasks()[1].id.clone();
        kb.complete_task(&b).await.unwrap();
        let stats = kb.productivity_stats(Period::Week).await.unwrap();
        assert_eq!(stats.tasks_completed, 2);
    }
}
