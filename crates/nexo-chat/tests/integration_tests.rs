//! End-to-end tests for the chat pipeline.
//!
//! Each test builds its own orchestrator over an in-memory knowledge base,
//! wrapped to record which store operations were called.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Days, Local};
use nexo_chat::{
    ChatError, ContextStore, LanguageModel, Message, Orchestrator, PatternModel,
    ResponseFormatter,
};
use nexo_core::config::ChatConfig;
use nexo_core::types::{
    DashboardSummary, NewNote, NewProject, NewTask, Note, Period, Priority, ProductivityStats,
    Project, Task, TaskFilter, TaskStatus, TaskUpdate,
};
use nexo_store::{InMemoryKnowledgeBase, KnowledgeBase, StoreError};

// =============================================================================
// Helpers
// =============================================================================

/// Pattern model that counts how often it is asked.
#[derive(Default)]
struct CountingModel {
    inner: PatternModel,
    calls: AtomicUsize,
}

#[async_trait]
impl LanguageModel for CountingModel {
    async fn complete(&self, messages: &[Message]) -> Result<String, ChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.complete(messages).await
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Model whose transport always fails.
struct UnreachableModel;

#[async_trait]
impl LanguageModel for UnreachableModel {
    async fn complete(&self, _messages: &[Message]) -> Result<String, ChatError> {
        Err(ChatError::Classifier("connection reset by peer".to_string()))
    }

    fn name(&self) -> &str {
        "unreachable"
    }
}

/// In-memory store that logs every operation name.
#[derive(Default)]
struct RecordingStore {
    inner: InMemoryKnowledgeBase,
    calls: Mutex<Vec<&'static str>>,
}

impl RecordingStore {
    fn record(&self, op: &'static str) {
        self.calls.lock().unwrap().push(op);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl KnowledgeBase for RecordingStore {
    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError> {
        self.record("create_task");
        self.inner.create_task(task).await
    }

    async fn update_task(&self, id: &str, update: TaskUpdate) -> Result<Task, StoreError> {
        self.record("update_task");
        self.inner.update_task(id, update).await
    }

    async fn complete_task(&self, id: &str) -> Result<Task, StoreError> {
        self.record("complete_task");
        self.inner.complete_task(id).await
    }

    async fn search_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, StoreError> {
        self.record("search_tasks");
        self.inner.search_tasks(filter).await
    }

    async fn create_note(&self, note: NewNote) -> Result<Note, StoreError> {
        self.record("create_note");
        self.inner.create_note(note).await
    }

    async fn search_notes(&self, query: &str, limit: usize) -> Result<Vec<Note>, StoreError> {
        self.record("search_notes");
        self.inner.search_notes(query, limit).await
    }

    async fn create_project(&self, project: NewProject) -> Result<Project, StoreError> {
        self.record("create_project");
        self.inner.create_project(project).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        self.record("list_projects");
        self.inner.list_projects().await
    }

    async fn dashboard_summary(&self) -> Result<DashboardSummary, StoreError> {
        self.record("dashboard_summary");
        self.inner.dashboard_summary().await
    }

    async fn productivity_stats(&self, period: Period) -> Result<ProductivityStats, StoreError> {
        self.record("productivity_stats");
        self.inner.productivity_stats(period).await
    }

    fn name(&self) -> &str {
        "recording"
    }
}

struct Harness {
    orchestrator: Orchestrator,
    model: Arc<CountingModel>,
    store: Arc<RecordingStore>,
}

fn harness() -> Harness {
    let model = Arc::new(CountingModel::default());
    let store = Arc::new(RecordingStore::default());
    let orchestrator = Orchestrator::new(model.clone(), store.clone(), ChatConfig::default());
    Harness {
        orchestrator,
        model,
        store,
    }
}

// =============================================================================
// Input validation
// =============================================================================

#[tokio::test]
async fn test_empty_input_skips_classifier() {
    let h = harness();
    for input in ["", "   ", "\n\t"] {
        let reply = h.orchestrator.handle(input, Some("s")).await;
        assert_eq!(reply.text, ResponseFormatter::new().empty_input());
    }
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
    assert!(h.store.calls().is_empty());
}

#[tokio::test]
async fn test_oversized_input_skips_classifier() {
    let h = harness();
    let input = "a".repeat(1001);
    let reply = h.orchestrator.handle(&input, Some("s")).await;
    assert_eq!(reply.text, ResponseFormatter::new().too_long(1000));
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_padded_oversized_input_skips_classifier() {
    let h = harness();
    // 1050 characters in total, 950 once trimmed
    let input = format!("{}{}", " ".repeat(100), "a".repeat(950));
    let reply = h.orchestrator.handle(&input, Some("s")).await;
    assert_eq!(reply.text, ResponseFormatter::new().too_long(1000));
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
    assert!(h.store.calls().is_empty());
}

#[tokio::test]
async fn test_input_at_limit_is_accepted() {
    let h = harness();
    // 1000 multi-byte characters: the limit counts characters, not bytes.
    let input = "ã".repeat(1000);
    h.orchestrator.handle(&input, Some("s")).await;
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_create_task_with_relative_due_date() {
    let h = harness();
    let reply = h
        .orchestrator
        .handle("criar tarefa: revisar relatório até amanhã", Some("s"))
        .await;

    assert_eq!(h.store.calls(), vec!["create_task"]);
    assert!(reply.text.contains("revisar relatório"), "{}", reply.text);

    let tasks = h.store.inner.tasks();
    assert_eq!(tasks.len(), 1);
    assert!(tasks[0].title.contains("revisar relatório"));
    let tomorrow = Local::now()
        .date_naive()
        .checked_add_days(Days::new(1))
        .unwrap();
    assert_eq!(tasks[0].due_date, Some(tomorrow));
}

#[tokio::test]
async fn test_complete_missing_task_only_searches() {
    let h = harness();
    let reply = h
        .orchestrator
        .handle("marcar como concluída: Reunião X", Some("s"))
        .await;

    assert!(reply.text.contains("Não encontrei"), "{}", reply.text);
    assert!(reply.text.contains("Reunião X"));
    assert_eq!(h.store.calls(), vec!["search_tasks"]);
}

#[tokio::test]
async fn test_complete_existing_task() {
    let h = harness();
    h.orchestrator
        .handle("criar tarefa: Reunião X", Some("s"))
        .await;
    let reply = h
        .orchestrator
        .handle("marcar como concluída: Reunião X", Some("s"))
        .await;

    assert!(reply.text.contains("concluída"), "{}", reply.text);
    assert_eq!(h.store.inner.tasks()[0].status, TaskStatus::Done);
}

#[tokio::test]
async fn test_follow_up_completes_current_task() {
    let h = harness();
    h.orchestrator
        .handle("criar tarefa: enviar proposta", Some("s"))
        .await;
    let reply = h.orchestrator.handle("concluir tarefa", Some("s")).await;

    assert!(reply.text.contains("enviar proposta"), "{}", reply.text);
    assert_eq!(h.store.inner.tasks()[0].status, TaskStatus::Done);
    // Resolved from context by id: no title search needed.
    assert_eq!(h.store.calls(), vec!["create_task", "complete_task"]);
}

#[tokio::test]
async fn test_complete_without_reference_or_context() {
    let h = harness();
    let reply = h.orchestrator.handle("concluir tarefa", Some("s")).await;
    assert!(reply.text.contains("Qual tarefa"), "{}", reply.text);
    assert!(h.store.calls().is_empty());
}

#[tokio::test]
async fn test_update_priority_by_title() {
    let h = harness();
    h.orchestrator
        .handle("criar tarefa: Relatório", Some("s"))
        .await;
    let reply = h
        .orchestrator
        .handle("atualizar tarefa Relatório para prioridade alta", Some("s"))
        .await;

    assert!(reply.text.contains("prioridade alta"), "{}", reply.text);
    assert_eq!(h.store.inner.tasks()[0].priority, Priority::High);
}

#[tokio::test]
async fn test_follow_up_update_without_title_uses_current_task() {
    let h = harness();
    h.orchestrator
        .handle("criar tarefa: Relatório", Some("s"))
        .await;
    let reply = h
        .orchestrator
        .handle("atualizar tarefa para prioridade alta", Some("s"))
        .await;

    assert!(!reply.text.contains("Não encontrei"), "{}", reply.text);
    assert_eq!(h.store.inner.tasks()[0].priority, Priority::High);
    assert_eq!(h.store.calls(), vec!["create_task", "update_task"]);
}

#[tokio::test]
async fn test_notes_round_trip_through_chat() {
    let h = harness();
    h.orchestrator
        .handle("anotar: padrões de concorrência em Rust #rust", Some("s"))
        .await;
    let reply = h
        .orchestrator
        .handle("buscar notas sobre concorrência", Some("s"))
        .await;

    assert!(reply.text.contains("1 nota(s)"), "{}", reply.text);
    assert_eq!(h.store.inner.notes()[0].tags, vec!["rust"]);
}

#[tokio::test]
async fn test_dashboard_and_analytics() {
    let h = harness();
    h.orchestrator.handle("criar tarefa: a", Some("s")).await;
    let dashboard = h.orchestrator.handle("mostrar painel", Some("s")).await;
    assert!(dashboard.text.contains("Tarefas pendentes: 1"), "{}", dashboard.text);

    let analytics = h
        .orchestrator
        .handle("minha produtividade este mês", Some("s"))
        .await;
    assert!(analytics.text.contains("neste mês"), "{}", analytics.text);
    assert!(analytics.text.contains("Tarefas criadas: 1"));
}

#[tokio::test]
async fn test_conversation_relays_model_reply() {
    let h = harness();
    let reply = h.orchestrator.handle("Olá!", Some("s")).await;
    assert!(reply.text.starts_with("Olá"), "{}", reply.text);
    assert!(h.store.calls().is_empty());
}

// =============================================================================
// Failure boundary
// =============================================================================

#[tokio::test]
async fn test_classifier_transport_failure_returns_apology() {
    let store = Arc::new(RecordingStore::default());
    let orchestrator = Orchestrator::new(
        Arc::new(UnreachableModel),
        store.clone(),
        ChatConfig::default(),
    );
    let reply = orchestrator.handle("criar tarefa: x", Some("s")).await;

    assert_eq!(reply.text, ResponseFormatter::new().apology());
    assert!(store.calls().is_empty());
    assert!(orchestrator
        .context("s")
        .map(|ctx| ctx.history.is_empty())
        .unwrap_or(true));
}

// =============================================================================
// Context
// =============================================================================

#[tokio::test]
async fn test_history_keeps_ten_most_recent() {
    let h = harness();
    for i in 0..15 {
        h.orchestrator
            .handle(&format!("oi {}", i), Some("s"))
            .await;
    }
    let ctx = h.orchestrator.context("s").unwrap();
    assert_eq!(ctx.history.len(), 10);
    let inputs: Vec<String> = ctx.history.iter().map(|i| i.input.clone()).collect();
    let expected: Vec<String> = (5..15).map(|i| format!("oi {}", i)).collect();
    assert_eq!(inputs, expected);
}

#[tokio::test]
async fn test_sessions_do_not_share_subjects() {
    let h = harness();
    h.orchestrator
        .handle("criar tarefa: só da sessão A", Some("a"))
        .await;
    let reply = h.orchestrator.handle("concluir tarefa", Some("b")).await;
    assert!(reply.text.contains("Qual tarefa"), "{}", reply.text);
}

#[test]
fn test_clear_twice_then_fresh_context() {
    let store = ContextStore::default();
    store.append("s", "oi", "olá");
    assert!(store.clear("s"));
    assert!(!store.clear("s"));
    assert!(store.get_or_create("s").history.is_empty());
}

#[tokio::test]
async fn test_concurrent_sessions() {
    let h = Arc::new(harness());
    let mut handles = Vec::new();
    for i in 0..8 {
        let h = Arc::clone(&h);
        handles.push(tokio::spawn(async move {
            let sid = format!("session-{}", i);
            h.orchestrator
                .handle(&format!("criar tarefa: tarefa {}", i), Some(sid.as_str()))
                .await
        }));
    }
    for handle in handles {
        let reply = handle.await.unwrap();
        assert!(reply.text.contains("Tarefa criada"), "{}", reply.text);
    }
    assert_eq!(h.store.inner.tasks().len(), 8);
    assert_eq!(h.orchestrator.session_count(), 8);
}
