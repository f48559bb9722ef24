//! Chat orchestrator: central coordinator wiring classifier, extractor,
//! dispatcher and formatter around per-session context.
//!
//! Every request yields a reply. Unexpected failures are logged and turned
//! into a fixed apology.

use std::sync::Arc;

use nexo_core::config::ChatConfig;
use nexo_store::KnowledgeBase;
use uuid::Uuid;

use crate::classifier::IntentClassifier;
use crate::context::ContextStore;
use crate::dispatcher::CommandDispatcher;
use crate::error::ChatError;
use crate::extractor::CommandExtractor;
use crate::model::LanguageModel;
use crate::response::ResponseFormatter;
use crate::types::{
    CommandResult, ConversationContext, Intent, Reply, ResultData, SubjectRef, TypedCommand,
};

/// One request/response cycle per call to [`handle`](Self::handle).
pub struct Orchestrator {
    /// Per-session history and current subjects.
    contexts: ContextStore,
    classifier: IntentClassifier,
    extractor: CommandExtractor,
    dispatcher: CommandDispatcher,
    formatter: ResponseFormatter,
    config: ChatConfig,
}

impl Orchestrator {
    /// Create a new `Orchestrator` around the given model and store.
    pub fn new(
        model: Arc<dyn LanguageModel>,
        store: Arc<dyn KnowledgeBase>,
        config: ChatConfig,
    ) -> Self {
        tracing::info!(
            model = model.name(),
            store = store.name(),
            "Chat orchestrator ready"
        );
        Self {
            contexts: ContextStore::new(config.history_limit),
            classifier: IntentClassifier::new(model, config.prompt_history_turns),
            extractor: CommandExtractor::new(),
            dispatcher: CommandDispatcher::new(
                store,
                config.default_list_limit,
                config.default_period,
            ),
            formatter: ResponseFormatter::new(),
            config,
        }
    }

    /// Handle one user message. A new session id is minted when none is given.
    pub async fn handle(&self, input: &str, session_id: Option<&str>) -> Reply {
        let session_id = session_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        // The ceiling applies to the raw text, padding included.
        let text = if input.trim().is_empty() {
            self.formatter.empty_input().to_string()
        } else if input.chars().count() > self.config.max_input_chars {
            tracing::debug!(session_id = %session_id, "Rejected oversized input");
            self.formatter.too_long(self.config.max_input_chars)
        } else {
            match self.process(input.trim(), &session_id).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(
                        session_id = %session_id,
                        kind = %e.kind(),
                        error = %e,
                        "Failed to process message"
                    );
                    self.formatter.apology().to_string()
                }
            }
        };

        Reply { session_id, text }
    }

    async fn process(&self, input: &str, session_id: &str) -> Result<String, ChatError> {
        let context = self.contexts.get_or_create(session_id);

        let classified = self.classifier.classify(input, &context).await?;
        tracing::info!(
            session_id,
            intent = %classified.intent,
            confidence = classified.confidence,
            "Intent classified"
        );

        let result = if classified.intent == Intent::Help {
            CommandResult::ok(self.formatter.help_text())
        } else {
            let command = self
                .extractor
                .extract(input, &classified)
                .map(|command| with_context_reference(command, &context));
            self.dispatcher
                .execute(command.as_ref(), classified.reply.as_deref())
                .await
        };

        if !result.success {
            tracing::debug!(
                session_id,
                error = ?result.error,
                "Command did not succeed"
            );
        }

        self.remember_subject(session_id, &result);
        self.contexts.append(session_id, input, &result.message);
        Ok(self.formatter.render(&result))
    }

    fn remember_subject(&self, session_id: &str, result: &CommandResult) {
        match result.data {
            Some(ResultData::Task(ref task)) => self.contexts.set_current_task(
                session_id,
                SubjectRef {
                    id: task.id.clone(),
                    title: task.title.clone(),
                },
            ),
            Some(ResultData::Project(ref project)) => self.contexts.set_current_project(
                session_id,
                SubjectRef {
                    id: project.id.clone(),
                    title: project.name.clone(),
                },
            ),
            _ => {}
        }
    }

    pub fn welcome(&self) -> &'static str {
        self.formatter.welcome_text()
    }

    /// Forget a session's history and subjects. Returns whether it existed.
    pub fn reset_session(&self, session_id: &str) -> bool {
        self.contexts.clear(session_id)
    }

    /// Snapshot of a session's context, if it exists.
    pub fn context(&self, session_id: &str) -> Option<ConversationContext> {
        self.contexts.get(session_id)
    }

    pub fn session_count(&self) -> usize {
        self.contexts.session_count()
    }
}

/// "Conclua ela": an update or completion that names no task falls back to
/// the task the session last worked on.
fn with_context_reference(
    mut command: TypedCommand,
    context: &ConversationContext,
) -> TypedCommand {
    if command.lacks_task_reference() {
        if let Some(ref task) = context.current_task {
            command.parameters.task_id = Some(task.id.clone());
            command.parameters.title = Some(task.title.clone());
        }
    }
    command
}

// =============================================================================
// Tests
// =============================================================================
