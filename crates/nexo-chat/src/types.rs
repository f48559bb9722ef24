//! Types shared across the chat pipeline.
//!
//! The flow is `input -> ClassifiedIntent -> TypedCommand -> CommandResult -> reply`.

use std::fmt;

use chrono::NaiveDate;
use nexo_core::types::{
    DashboardSummary, Note, Period, Priority, ProductivityStats, Project, Task, TaskStatus,
    Timestamp,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ChatError;

// =============================================================================
// Intent
// =============================================================================

/// What the user wants, as understood by the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Intent {
    CreateTask,
    UpdateTask,
    CompleteTask,
    ListTasks,
    CreateNote,
    SearchNotes,
    CreateProject,
    Dashboard,
    Analytics,
    Help,
    Conversation,
    /// A label outside the taxonomy, kept verbatim for logging.
    Unrecognized(String),
}

impl Intent {
    /// Every label the classifier may emit, in prompt order.
    pub const LABELS: [&'static str; 11] = [
        "create_task",
        "update_task",
        "complete_task",
        "list_tasks",
        "create_note",
        "search_notes",
        "create_project",
        "dashboard",
        "analytics",
        "help",
        "conversation",
    ];

    /// Parse a classifier label. Unknown labels become [`Intent::Unrecognized`].
    pub fn parse(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "create_task" => Intent::CreateTask,
            "update_task" => Intent::UpdateTask,
            "complete_task" => Intent::CompleteTask,
            "list_tasks" => Intent::ListTasks,
            "create_note" => Intent::CreateNote,
            "search_notes" => Intent::SearchNotes,
            "create_project" => Intent::CreateProject,
            "dashboard" => Intent::Dashboard,
            "analytics" => Intent::Analytics,
            "help" => Intent::Help,
            "conversation" => Intent::Conversation,
            _ => Intent::Unrecognized(label.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Intent::CreateTask => "create_task",
            Intent::UpdateTask => "update_task",
            Intent::CompleteTask => "complete_task",
            Intent::ListTasks => "list_tasks",
            Intent::CreateNote => "create_note",
            Intent::SearchNotes => "search_notes",
            Intent::CreateProject => "create_project",
            Intent::Dashboard => "dashboard",
            Intent::Analytics => "analytics",
            Intent::Help => "help",
            Intent::Conversation => "conversation",
            Intent::Unrecognized(label) => label,
        }
    }

    /// Whether this intent maps to a store operation.
    pub fn is_actionable(&self) -> bool {
        !matches!(
            self,
            Intent::Help | Intent::Conversation | Intent::Unrecognized(_)
        )
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Entities
// =============================================================================

/// Raw entity bag as emitted by the classifier.
///
/// Every field is optional and leniently typed: numbers and booleans are
/// accepted where strings are expected, and `tags` may be a list or a
/// comma-separated string. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EntityFields {
    #[serde(deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub content: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub priority: Option<String>,
    #[serde(alias = "dueDate", alias = "date", deserialize_with = "lenient_string")]
    pub due_date: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub query: Option<String>,
    #[serde(alias = "taskId", alias = "id", deserialize_with = "lenient_string")]
    pub task_id: Option<String>,
    #[serde(alias = "newTitle", deserialize_with = "lenient_string")]
    pub new_title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub project: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub period: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub limit: Option<String>,
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => items.into_iter().find_map(scalar_to_string),
        Value::Null | Value::Object(_) => None,
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(scalar_to_string))
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items.into_iter().filter_map(scalar_to_string).collect(),
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        Some(other) => scalar_to_string(other).into_iter().collect(),
        None => Vec::new(),
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub tags: Vec<String>,
    pub project: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskChange {
    pub task_id: Option<String>,
    pub title: Option<String>,
    pub new_title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskRef {
    pub task_id: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub project: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteDraft {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteQuery {
    pub query: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectDraft {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Entities projected onto the shape each intent expects.
#[derive(Debug, Clone, PartialEq)]
pub enum IntentEntities {
    CreateTask(TaskDraft),
    UpdateTask(TaskChange),
    CompleteTask(TaskRef),
    ListTasks(TaskQuery),
    CreateNote(NoteDraft),
    SearchNotes(NoteQuery),
    CreateProject(ProjectDraft),
    Dashboard,
    Analytics { period: Option<String> },
    None,
}

impl IntentEntities {
    /// Keep only the fields meaningful for `intent`.
    pub fn project(intent: &Intent, fields: EntityFields) -> Self {
        match intent {
            Intent::CreateTask => IntentEntities::CreateTask(TaskDraft {
                title: fields.title,
                description: fields.description,
                priority: fields.priority,
                due_date: fields.due_date,
                tags: fields.tags,
                project: fields.project,
            }),
            Intent::UpdateTask => IntentEntities::UpdateTask(TaskChange {
                task_id: fields.task_id,
                title: fields.title,
                new_title: fields.new_title,
                description: fields.description,
                status: fields.status,
                priority: fields.priority,
                due_date: fields.due_date,
                tags: fields.tags,
            }),
            Intent::CompleteTask => IntentEntities::CompleteTask(TaskRef {
                task_id: fields.task_id,
                title: fields.title,
            }),
            Intent::ListTasks => IntentEntities::ListTasks(TaskQuery {
                status: fields.status,
                priority: fields.priority,
                project: fields.project,
                limit: fields.limit,
            }),
            Intent::CreateNote => IntentEntities::CreateNote(NoteDraft {
                title: fields.title,
                content: fields.content,
                tags: fields.tags,
            }),
            Intent::SearchNotes => IntentEntities::SearchNotes(NoteQuery {
                query: fields.query.or(fields.title),
                limit: fields.limit,
            }),
            Intent::CreateProject => IntentEntities::CreateProject(ProjectDraft {
                name: fields.name.or(fields.title),
                description: fields.description,
            }),
            Intent::Dashboard => IntentEntities::Dashboard,
            Intent::Analytics => IntentEntities::Analytics {
                period: fields.period,
            },
            Intent::Help | Intent::Conversation | Intent::Unrecognized(_) => IntentEntities::None,
        }
    }
}

/// Classifier output for one utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedIntent {
    pub intent: Intent,
    pub entities: IntentEntities,
    /// In `[0, 1]`.
    pub confidence: f32,
    /// Free-text reply for conversational turns.
    pub reply: Option<String>,
}

impl ClassifiedIntent {
    pub fn new(intent: Intent, fields: EntityFields, confidence: f32) -> Self {
        let entities = IntentEntities::project(&intent, fields);
        Self {
            intent,
            entities,
            confidence: clamp_confidence(confidence),
            reply: None,
        }
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        let reply = reply.into();
        self.reply = if reply.trim().is_empty() {
            None
        } else {
            Some(reply)
        };
        self
    }
}

fn clamp_confidence(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// =============================================================================
// Commands
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Create,
    Update,
    Read,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandTarget {
    Task,
    Note,
    Project,
    Dashboard,
    Analytics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    CreateTask,
    UpdateTask,
    CompleteTask,
    ListTasks,
    CreateNote,
    SearchNotes,
    CreateProject,
    DashboardSummary,
    ProductivityStats,
}

impl CommandAction {
    pub fn kind(self) -> CommandKind {
        match self {
            CommandAction::CreateTask
            | CommandAction::CreateNote
            | CommandAction::CreateProject => CommandKind::Create,
            CommandAction::UpdateTask | CommandAction::CompleteTask => CommandKind::Update,
            CommandAction::ListTasks
            | CommandAction::SearchNotes
            | CommandAction::DashboardSummary
            | CommandAction::ProductivityStats => CommandKind::Read,
        }
    }

    pub fn target(self) -> CommandTarget {
        match self {
            CommandAction::CreateTask
            | CommandAction::UpdateTask
            | CommandAction::CompleteTask
            | CommandAction::ListTasks => CommandTarget::Task,
            CommandAction::CreateNote | CommandAction::SearchNotes => CommandTarget::Note,
            CommandAction::CreateProject => CommandTarget::Project,
            CommandAction::DashboardSummary => CommandTarget::Dashboard,
            CommandAction::ProductivityStats => CommandTarget::Analytics,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CommandAction::CreateTask => "create_task",
            CommandAction::UpdateTask => "update_task",
            CommandAction::CompleteTask => "complete_task",
            CommandAction::ListTasks => "list_tasks",
            CommandAction::CreateNote => "create_note",
            CommandAction::SearchNotes => "search_notes",
            CommandAction::CreateProject => "create_project",
            CommandAction::DashboardSummary => "dashboard_summary",
            CommandAction::ProductivityStats => "productivity_stats",
        }
    }
}

impl fmt::Display for CommandAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized parameters. Only the fields relevant to the action are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommandParameters {
    /// Task/note title or project name. For update/complete, the reference title.
    pub title: Option<String>,
    pub task_id: Option<String>,
    pub new_title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<TaskStatus>,
    pub tags: Vec<String>,
    pub query: Option<String>,
    pub project: Option<String>,
    pub period: Option<Period>,
    pub limit: Option<usize>,
}

/// A store operation ready to dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypedCommand {
    pub kind: CommandKind,
    pub target: CommandTarget,
    pub action: CommandAction,
    pub parameters: CommandParameters,
}

impl TypedCommand {
    pub fn new(action: CommandAction, parameters: CommandParameters) -> Self {
        Self {
            kind: action.kind(),
            target: action.target(),
            action,
            parameters,
        }
    }

    /// Whether the command addresses an existing task that it has not named.
    pub fn lacks_task_reference(&self) -> bool {
        matches!(
            self.action,
            CommandAction::UpdateTask | CommandAction::CompleteTask
        ) && self.parameters.task_id.is_none()
            && self.parameters.title.is_none()
    }
}

// =============================================================================
// Results
// =============================================================================

/// Payload attached to a successful command.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultData {
    Task(Task),
    Tasks(Vec<Task>),
    Note(Note),
    Notes(Vec<Note>),
    Project(Project),
    Dashboard(DashboardSummary),
    Productivity(ProductivityStats),
}

const DEFAULT_SUCCESS_MESSAGE: &str = "Pronto.";
const DEFAULT_FAILURE_MESSAGE: &str = "Não foi possível concluir a operação.";

/// Outcome of dispatching one command. `message` is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    pub success: bool,
    pub message: String,
    pub data: Option<ResultData>,
    pub error: Option<ChatError>,
}

impl CommandResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: non_empty(message.into(), DEFAULT_SUCCESS_MESSAGE),
            data: None,
            error: None,
        }
    }

    pub fn with_data(message: impl Into<String>, data: ResultData) -> Self {
        Self {
            data: Some(data),
            ..Self::ok(message)
        }
    }

    pub fn failure(message: impl Into<String>, error: ChatError) -> Self {
        Self {
            success: false,
            message: non_empty(message.into(), DEFAULT_FAILURE_MESSAGE),
            data: None,
            error: Some(error),
        }
    }
}

fn non_empty(message: String, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

// =============================================================================
// Conversation state
// =============================================================================

/// One completed exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interaction {
    pub input: String,
    pub output: String,
    pub timestamp: Timestamp,
}

/// The task or project a session is currently talking about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectRef {
    pub id: String,
    pub title: String,
}

/// Per-session state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationContext {
    pub session_id: String,
    /// Oldest first.
    pub history: Vec<Interaction>,
    pub current_task: Option<SubjectRef>,
    pub current_project: Option<SubjectRef>,
    pub created_at: Timestamp,
}

impl ConversationContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            history: Vec::new(),
            current_task: None,
            current_project: None,
            created_at: chrono::Utc::now(),
        }
    }

    /// The last `n` interactions, oldest first.
    pub fn recent(&self, n: usize) -> &[Interaction] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }
}

/// What the front end receives for each message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub session_id: String,
    pub text: String,
}

// =============================================================================
// Tests
// =============================================================================
