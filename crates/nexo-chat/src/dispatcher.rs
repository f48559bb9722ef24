//! Executes typed commands against the knowledge base.
//!
//! Every outcome, including store failures, comes back as a
//! [`CommandResult`]; nothing here returns `Err`.

use std::sync::Arc;

use nexo_core::types::{NewNote, NewProject, NewTask, Note, Period, Task, TaskFilter, TaskUpdate};
use nexo_store::{KnowledgeBase, StoreError};

use crate::error::ChatError;
use crate::types::{
    CommandAction, CommandKind, CommandParameters, CommandResult, CommandTarget, ResultData,
    TypedCommand,
};

/// Shown when there is no command and the classifier gave no reply.
pub const NO_COMMAND_REPLY: &str =
    "Não entendi o que fazer. Digite \"ajuda\" para ver o que posso fazer por você.";

const NOTE_PREVIEW_CHARS: usize = 80;

/// Routes typed commands to the knowledge base and words the outcome.
pub struct CommandDispatcher {
    /// Backing store every command runs against.
    store: Arc<dyn KnowledgeBase>,
    /// Cap for task lists and note searches without an explicit limit.
    default_list_limit: usize,
    /// Analytics window used when the user names none.
    default_period: Period,
}

impl CommandDispatcher {
    /// Create a new `CommandDispatcher`. A zero list limit is raised to one.
    pub fn new(
        store: Arc<dyn KnowledgeBase>,
        default_list_limit: usize,
        default_period: Period,
    ) -> Self {
        Self {
            store,
            default_list_limit: default_list_limit.max(1),
            default_period,
        }
    }

    /// Execute `command`, or relay the conversational `reply` when there is none.
    pub async fn execute(
        &self,
        command: Option<&TypedCommand>,
        reply: Option<&str>,
    ) -> CommandResult {
        let Some(command) = command else {
            let message = reply
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .unwrap_or(NO_COMMAND_REPLY);
            return CommandResult::ok(message);
        };

        tracing::info!(
            action = %command.action,
            store = self.store.name(),
            "Dispatching command"
        );

        let p = &command.parameters;
        match (command.kind, command.target, command.action) {
            (CommandKind::Create, CommandTarget::Task, CommandAction::CreateTask) => {
                self.create_task(p).await
            }
            (CommandKind::Update, CommandTarget::Task, CommandAction::UpdateTask) => {
                self.update_task(p).await
            }
            (CommandKind::Update, CommandTarget::Task, CommandAction::CompleteTask) => {
                self.complete_task(p).await
            }
            (CommandKind::Read, CommandTarget::Task, CommandAction::ListTasks) => {
                self.list_tasks(p).await
            }
            (CommandKind::Create, CommandTarget::Note, CommandAction::CreateNote) => {
                self.create_note(p).await
            }
            (CommandKind::Read, CommandTarget::Note, CommandAction::SearchNotes) => {
                self.search_notes(p).await
            }
            (CommandKind::Create, CommandTarget::Project, CommandAction::CreateProject) => {
                self.create_project(p).await
            }
            (CommandKind::Read, CommandTarget::Dashboard, CommandAction::DashboardSummary) => {
                self.dashboard().await
            }
            (CommandKind::Read, CommandTarget::Analytics, CommandAction::ProductivityStats) => {
                self.analytics(p).await
            }
            (kind, target, action) => {
                tracing::warn!(?kind, ?target, %action, "Unsupported command combination");
                CommandResult::failure(
                    "Ainda não sei executar esse comando.",
                    ChatError::Internal(format!(
                        "unsupported command {:?}/{:?}/{}",
                        kind, target, action
                    )),
                )
            }
        }
    }

    async fn create_task(&self, p: &CommandParameters) -> CommandResult {
        let Some(title) = p.title.clone() else {
            return user_failure("Qual o título da tarefa?", "task title missing");
        };
        let new_task = NewTask {
            title,
            description: p.description.clone(),
            priority: p.priority,
            due_date: p.due_date,
            tags: p.tags.clone(),
            project: p.project.clone(),
        };
        match self.store.create_task(new_task).await {
            Ok(task) => {
                let mut message = format!("Tarefa criada: \"{}\"", task.title);
                message.push_str(&format!(" (prioridade {}", task.priority.label()));
                if let Some(due) = task.due_date {
                    message.push_str(&format!(", prazo {}", due.format("%d/%m/%Y")));
                }
                message.push(')');
                CommandResult::with_data(message, ResultData::Task(task))
            }
            Err(e) => store_failure("Não foi possível criar a tarefa.", e),
        }
    }

    async fn update_task(&self, p: &CommandParameters) -> CommandResult {
        if p.task_id.is_none() && p.title.is_none() {
            return user_failure(
                "Qual tarefa devo atualizar? Diga o título ou o identificador.",
                "task reference missing",
            );
        }
        let update = TaskUpdate {
            title: p.new_title.clone(),
            description: p.description.clone(),
            status: p.status,
            priority: p.priority,
            due_date: p.due_date,
            tags: (!p.tags.is_empty()).then(|| p.tags.clone()),
        };
        if update.is_empty() {
            return user_failure(
                "O que devo alterar na tarefa? Posso mudar título, status, prioridade ou prazo.",
                "update has no fields",
            );
        }

        let (id, matches) = match self.resolve_task(p).await {
            Ok(found) => found,
            Err(result) => return result,
        };

        match self.store.update_task(&id, update).await {
            Ok(task) => {
                let mut changes = Vec::new();
                if p.new_title.is_some() {
                    changes.push(format!("título \"{}\"", task.title));
                }
                if let Some(status) = p.status {
                    changes.push(format!("status {}", status.label()));
                }
                if let Some(priority) = p.priority {
                    changes.push(format!("prioridade {}", priority.label()));
                }
                if let Some(due) = p.due_date {
                    changes.push(format!("prazo {}", due.format("%d/%m/%Y")));
                }
                if p.description.is_some() {
                    changes.push("descrição".to_string());
                }
                if !p.tags.is_empty() {
                    changes.push(format!("tags {}", p.tags.join(", ")));
                }
                let mut message =
                    format!("Tarefa \"{}\" atualizada: {}.", task.title, changes.join(", "));
                push_ambiguity_note(&mut message, matches, p.title.as_deref());
                CommandResult::with_data(message, ResultData::Task(task))
            }
            Err(e) => self.missing_or_store_failure(e, p, "Não foi possível atualizar a tarefa."),
        }
    }

    async fn complete_task(&self, p: &CommandParameters) -> CommandResult {
        if p.task_id.is_none() && p.title.is_none() {
            return user_failure(
                "Qual tarefa devo marcar como concluída? Diga o título ou o identificador.",
                "task reference missing",
            );
        }

        let (id, matches) = match self.resolve_task(p).await {
            Ok(found) => found,
            Err(result) => return result,
        };

        match self.store.complete_task(&id).await {
            Ok(task) => {
                let mut message = format!("Tarefa concluída: \"{}\".", task.title);
                push_ambiguity_note(&mut message, matches, p.title.as_deref());
                CommandResult::with_data(message, ResultData::Task(task))
            }
            Err(e) => self.missing_or_store_failure(e, p, "Não foi possível concluir a tarefa."),
        }
    }

    /// Find the task a command refers to: the id when given, otherwise the
    /// first title match. Returns the id and how many tasks matched.
    async fn resolve_task(&self, p: &CommandParameters) -> Result<(String, usize), CommandResult> {
        if let Some(ref id) = p.task_id {
            return Ok((id.clone(), 1));
        }
        let Some(ref title) = p.title else {
            return Err(user_failure("Qual tarefa?", "task reference missing"));
        };

        let filter = TaskFilter {
            title: Some(title.clone()),
            ..TaskFilter::default()
        };
        match self.store.search_tasks(filter).await {
            Ok(tasks) => match tasks.first() {
                Some(task) => {
                    if tasks.len() > 1 {
                        tracing::debug!(
                            title = %title,
                            matches = tasks.len(),
                            "Ambiguous task title, using first match"
                        );
                    }
                    Ok((task.id.clone(), tasks.len()))
                }
                None => Err(not_found(title)),
            },
            Err(e) => Err(store_failure("Não foi possível buscar a tarefa.", e)),
        }
    }

    fn missing_or_store_failure(
        &self,
        e: StoreError,
        p: &CommandParameters,
        message: &str,
    ) -> CommandResult {
        match e {
            StoreError::NotFound(_) => {
                let reference = p
                    .title
                    .as_deref()
                    .or(p.task_id.as_deref())
                    .unwrap_or_default();
                not_found(reference)
            }
            other => store_failure(message, other),
        }
    }

    async fn list_tasks(&self, p: &CommandParameters) -> CommandResult {
        let limit = p.limit.unwrap_or(self.default_list_limit);
        let filter = TaskFilter {
            title: None,
            status: p.status,
            priority: p.priority,
            project: p.project.clone(),
            limit: Some(limit),
        };
        match self.store.search_tasks(filter).await {
            Ok(mut tasks) => {
                tasks.truncate(limit);
                if tasks.is_empty() {
                    return CommandResult::with_data(
                        "Nenhuma tarefa encontrada.",
                        ResultData::Tasks(tasks),
                    );
                }
                let lines: Vec<String> = tasks
                    .iter()
                    .enumerate()
                    .map(|(i, t)| format!("{}. {}", i + 1, task_line(t)))
                    .collect();
                let message = format!("Suas tarefas ({}):\n{}", tasks.len(), lines.join("\n"));
                CommandResult::with_data(message, ResultData::Tasks(tasks))
            }
            Err(e) => store_failure("Não foi possível listar as tarefas.", e),
        }
    }

    async fn create_note(&self, p: &CommandParameters) -> CommandResult {
        let Some(title) = p.title.clone() else {
            return user_failure("Qual o título da nota?", "note title missing");
        };
        let note = NewNote {
            content: p.content.clone().unwrap_or_else(|| title.clone()),
            title,
            tags: p.tags.clone(),
        };
        match self.store.create_note(note).await {
            Ok(note) => {
                let message = format!("Nota criada: \"{}\".", note.title);
                CommandResult::with_data(message, ResultData::Note(note))
            }
            Err(e) => store_failure("Não foi possível criar a nota.", e),
        }
    }

    async fn search_notes(&self, p: &CommandParameters) -> CommandResult {
        let Some(ref query) = p.query else {
            return user_failure("O que devo procurar nas suas notas?", "search query missing");
        };
        let limit = p.limit.unwrap_or(self.default_list_limit);
        match self.store.search_notes(query, limit).await {
            Ok(mut notes) => {
                notes.truncate(limit);
                if notes.is_empty() {
                    let message = format!("Nenhuma nota encontrada sobre \"{}\".", query);
                    return CommandResult::with_data(message, ResultData::Notes(notes));
                }
                let lines: Vec<String> = notes
                    .iter()
                    .enumerate()
                    .map(|(i, n)| format!("{}. {}", i + 1, note_line(n)))
                    .collect();
                let message = format!(
                    "Encontrei {} nota(s) sobre \"{}\":\n{}",
                    notes.len(),
                    query,
                    lines.join("\n")
                );
                CommandResult::with_data(message, ResultData::Notes(notes))
            }
            Err(e) => store_failure("Não foi possível buscar as notas.", e),
        }
    }

    async fn create_project(&self, p: &CommandParameters) -> CommandResult {
        let Some(name) = p.title.clone() else {
            return user_failure("Qual o nome do projeto?", "project name missing");
        };
        let project = NewProject {
            name,
            description: p.description.clone(),
        };
        match self.store.create_project(project).await {
            Ok(project) => {
                let message = format!("Projeto criado: \"{}\".", project.name);
                CommandResult::with_data(message, ResultData::Project(project))
            }
            Err(StoreError::Validation(detail)) => CommandResult::failure(
                "Não foi possível criar o projeto. Talvez já exista um com esse nome.",
                ChatError::Store(StoreError::Validation(detail)),
            ),
            Err(e) => store_failure("Não foi possível criar o projeto.", e),
        }
    }

    async fn dashboard(&self) -> CommandResult {
        match self.store.dashboard_summary().await {
            Ok(summary) => {
                let message = format!(
                    "Seu painel:\n\
                     - Tarefas pendentes: {}\n\
                     - Em andamento: {}\n\
                     - Concluídas: {}\n\
                     - Atrasadas: {}\n\
                     - Notas: {}\n\
                     - Projetos: {}",
                    summary.todo_tasks,
                    summary.in_progress_tasks,
                    summary.completed_tasks,
                    summary.overdue_tasks,
                    summary.total_notes,
                    summary.total_projects,
                );
                CommandResult::with_data(message, ResultData::Dashboard(summary))
            }
            Err(e) => store_failure("Não foi possível carregar o painel.", e),
        }
    }

    async fn analytics(&self, p: &CommandParameters) -> CommandResult {
        let period = p.period.unwrap_or(self.default_period);
        match self.store.productivity_stats(period).await {
            Ok(stats) => {
                let message = format!(
                    "Sua produtividade {}:\n\
                     - Tarefas criadas: {}\n\
                     - Tarefas concluídas: {}\n\
                     - Taxa de conclusão: {:.0}%\n\
                     - Notas criadas: {}",
                    stats.period.label(),
                    stats.tasks_created,
                    stats.tasks_completed,
                    stats.completion_rate * 100.0,
                    stats.notes_created,
                );
                CommandResult::with_data(message, ResultData::Productivity(stats))
            }
            Err(e) => store_failure("Não foi possível calcular sua produtividade.", e),
        }
    }
}

fn user_failure(message: &str, diagnostic: &str) -> CommandResult {
    CommandResult::failure(message, ChatError::User(diagnostic.to_string()))
}

fn store_failure(message: &str, err: StoreError) -> CommandResult {
    tracing::warn!(error = %err, "Knowledge base request failed");
    CommandResult::failure(
        format!("{} Tente novamente em instantes.", message),
        ChatError::Store(err),
    )
}

fn not_found(reference: &str) -> CommandResult {
    CommandResult::failure(
        format!("Não encontrei nenhuma tarefa \"{}\".", reference),
        ChatError::User(format!("task not found: {}", reference)),
    )
}

fn push_ambiguity_note(message: &mut String, matches: usize, title: Option<&str>) {
    if matches > 1 {
        if let Some(title) = title {
            message.push_str(&format!(
                " ({} tarefas correspondem a \"{}\"; usei a primeira.)",
                matches, title
            ));
        }
    }
}

fn task_line(task: &Task) -> String {
    let mut line = format!("{} [{}] ({})", task.title, task.priority.label(), task.status.label());
    if let Some(due) = task.due_date {
        line.push_str(&format!(" - prazo {}", due.format("%d/%m/%Y")));
    }
    line
}

fn note_line(note: &Note) -> String {
    let content = note.content.trim();
    if content.is_empty() || content == note.title {
        return note.title.clone();
    }
    let preview: String = content.chars().take(NOTE_PREVIEW_CHARS).collect();
    let ellipsis = if content.chars().count() > NOTE_PREVIEW_CHARS {
        "..."
    } else {
        ""
    };
    format!("{}: {}{}", note.title, preview, ellipsis)
}

// =============================================================================
// Tests
// =============================================================================
