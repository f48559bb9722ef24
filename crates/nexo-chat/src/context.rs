//! Conversation context management.
//!
//! Holds per-session history and the task/project the conversation is
//! currently about. Sessions are created lazily and live until cleared.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use crate::types::{ConversationContext, Interaction, SubjectRef};

/// Default number of interactions kept per session.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

// =============================================================================
// ContextStore
// =============================================================================

/// Session-keyed conversation state.
///
/// Reads hand out snapshots; the lock is never held across an await point.
pub struct ContextStore {
    /// Contexts keyed by session id.
    contexts: Mutex<HashMap<String, ConversationContext>>,
    /// Maximum number of interactions kept per session.
    history_limit: usize,
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl ContextStore {
    /// Create a new `ContextStore` keeping at most `history_limit`
    /// interactions per session. A zero limit is raised to one.
    pub fn new(history_limit: usize) -> Self {
        Self {
            contexts: Mutex::new(HashMap::new()),
            history_limit: history_limit.max(1),
        }
    }

    // A poisoned map is still structurally valid; keep serving it.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, ConversationContext>> {
        self.contexts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the session's context, creating an empty one if needed.
    pub fn get_or_create(&self, session_id: &str) -> ConversationContext {
        let mut contexts = self.lock();
        contexts
            .entry(session_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(session_id, "Creating conversation context");
                ConversationContext::new(session_id)
            })
            .clone()
    }

    /// Snapshot without creating.
    pub fn get(&self, session_id: &str) -> Option<ConversationContext> {
        self.lock().get(session_id).cloned()
    }

    /// Record a completed exchange, evicting the oldest entries past the limit.
    pub fn append(&self, session_id: &str, input: &str, output: &str) {
        let mut contexts = self.lock();
        let context = contexts
            .entry(session_id.to_string())
            .or_insert_with(|| ConversationContext::new(session_id));

        context.history.push(Interaction {
            input: input.to_string(),
            output: output.to_string(),
            timestamp: Utc::now(),
        });

        let overflow = context.history.len().saturating_sub(self.history_limit);
        if overflow > 0 {
            context.history.drain(..overflow);
        }
    }

    /// The last `n` interactions of a session, oldest first.
    pub fn recent(&self, session_id: &str, n: usize) -> Vec<Interaction> {
        self.lock()
            .get(session_id)
            .map(|ctx| ctx.recent(n).to_vec())
            .unwrap_or_default()
    }

    pub fn set_current_task(&self, session_id: &str, task: SubjectRef) {
        let mut contexts = self.lock();
        contexts
            .entry(session_id.to_string())
            .or_insert_with(|| ConversationContext::new(session_id))
            .current_task = Some(task);
    }

    pub fn set_current_project(&self, session_id: &str, project: SubjectRef) {
        let mut contexts = self.lock();
        contexts
            .entry(session_id.to_string())
            .or_insert_with(|| ConversationContext::new(session_id))
            .current_project = Some(project);
    }

    /// Drop a session. Returns whether it existed.
    pub fn clear(&self, session_id: &str) -> bool {
        let removed = self.lock().remove(session_id).is_some();
        if removed {
            tracing::debug!(session_id, "Cleared conversation context");
        }
        removed
    }

    pub fn session_count(&self) -> usize {
        self.lock().len()
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn subject(id: &str, title: &str) -> SubjectRef {
        SubjectRef {
            id: id.to_string(),
            title: title.to_string(),
        }
    }

    // ---- Creation ----

    #[test]
    fn test_get_or_create_new_session_is_empty() {
        let store = ContextStore::default();
        let ctx = store.get_or_create("s1");
        assert_eq!(ctx.session_id, "s1");
        assert!(ctx.history.is_empty());
        assert!(ctx.current_task.is_none());
        assert!(ctx.current_project.is_none());
        assert_eq!(store.session_count(), 1);
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let store = ContextStore::default();
        let first = store.get_or_create("s1");
        let second = store.get_or_create("s1");
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(store.session_count(), 1);
    }

    #[test]
    fn test_get_does_not_create() {
        let store = ContextStore::default();
        assert!(store.get("missing").is_none());
        assert_eq!(store.session_count(), 0);
    }

    // ---- History ----

    #[test]
    fn test_append_records_in_order() {
        let store = ContextStore::default();
        store.append("s1", "oi", "olá");
        store.append("s1", "criar tarefa", "Tarefa criada");
        let ctx = store.get_or_create("s1");
        assert_eq!(ctx.history.len(), 2);
        assert_eq!(ctx.history[0].input, "oi");
        assert_eq!(ctx.history[1].output, "Tarefa criada");
    }

    #[test]
    fn test_append_evicts_oldest_past_limit() {
        let store = ContextStore::new(10);
        for i in 0..11 {
            store.append("s1", &format!("in {}", i), &format!("out {}", i));
        }
        let ctx = store.get_or_create("s1");
        assert_eq!(ctx.history.len(), 10);
        assert_eq!(ctx.history[0].input, "in 1");
        assert_eq!(ctx.history[9].input, "in 10");
    }

    #[test]
    fn test_recent_tail() {
        let store = ContextStore::default();
        for i in 0..5 {
            store.append("s1", &format!("in {}", i), "out");
        }
        let recent = store.recent("s1", 3);
        let inputs: Vec<&str> = recent.iter().map(|i| i.input.as_str()).collect();
        assert_eq!(inputs, vec!["in 2", "in 3", "in 4"]);
        assert!(store.recent("other", 3).is_empty());
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = ContextStore::default();
        store.append("a", "one", "1");
        store.append("b", "two", "2");
        assert_eq!(store.get_or_create("a").history.len(), 1);
        assert_eq!(store.get_or_create("b").history[0].input, "two");
    }

    // ---- Subjects ----

    #[test]
    fn test_current_subjects() {
        let store = ContextStore::default();
        store.set_current_task("s1", subject("t1", "Relatório"));
        store.set_current_project("s1", subject("p1", "Site"));
        let ctx = store.get_or_create("s1");
        assert_eq!(ctx.current_task, Some(subject("t1", "Relatório")));
        assert_eq!(ctx.current_project, Some(subject("p1", "Site")));

        store.set_current_task("s1", subject("t2", "Outra"));
        assert_eq!(store.get_or_create("s1").current_task.unwrap().id, "t2");
    }

    // ---- Clear ----

    #[test]
    fn test_clear_then_recreate_is_fresh() {
        let store = ContextStore::default();
        store.append("s1", "oi", "olá");
        store.set_current_task("s1", subject("t1", "x"));
        assert!(store.clear("s1"));
        assert!(!store.clear("s1"));

        let ctx = store.get_or_create("s1");
        assert!(ctx.history.is_empty());
        assert!(ctx.current_task.is_none());
    }

    // ---- Concurrency ----

    #[test]
    fn test_concurrent_appends_are_not_lost() {
        let store = Arc::new(ContextStore::new(100));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..10 {
                        store.append("shared", &format!("{}-{}", t, i), "ok");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.get_or_create("shared").history.len(), 40);
    }

    #[test]
    fn test_zero_limit_is_raised_to_one() {
        let store = ContextStore::new(0);
        store.append("s1", "a", "b");
        store.append("s1", "c", "d");
        assert_eq!(store.history_limit(), 1);
        assert_eq!(store.get_or_create("s1").history[0].input, "c");
    }
}
