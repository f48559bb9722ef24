//! Turns a [`ClassifiedIntent`] into a [`TypedCommand`].
//!
//! Pure apart from reading the local date; [`CommandExtractor::extract_at`]
//! takes the date explicitly.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Days, Local, NaiveDate};
use nexo_core::types::{Period, Priority, TaskStatus};
use regex::Regex;

use crate::types::{
    ClassifiedIntent, CommandAction, CommandParameters, IntentEntities, TypedCommand,
};

/// Largest list size a user may ask for.
pub const MAX_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TitleKind {
    Task,
    Note,
    Project,
}

impl TitleKind {
    fn default_title(self) -> &'static str {
        match self {
            TitleKind::Task => "Nova tarefa",
            TitleKind::Note => "Nova nota",
            TitleKind::Project => "Novo projeto",
        }
    }
}

static LEADING_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:criar|crie|adicionar|adicione|novo|nova|uma|um)\b\s*")
        .expect("invalid verb regex")
});
static LEADING_NOUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:tarefa|nota|projeto)\b\s*").expect("invalid noun regex")
});
static TRAILING_NOUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*\b(?:tarefa|nota|projeto)\s*$").expect("invalid noun regex")
});

#[derive(Debug, Clone, Copy, Default)]
pub struct CommandExtractor;

impl CommandExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Build the command for `classified`, or `None` when the intent has no
    /// store operation (help, conversation, unknown labels).
    pub fn extract(&self, raw: &str, classified: &ClassifiedIntent) -> Option<TypedCommand> {
        self.extract_at(raw, classified, Local::now().date_naive())
    }

    pub fn extract_at(
        &self,
        raw: &str,
        classified: &ClassifiedIntent,
        today: NaiveDate,
    ) -> Option<TypedCommand> {
        let command = match &classified.entities {
            IntentEntities::CreateTask(draft) => TypedCommand::new(
                CommandAction::CreateTask,
                CommandParameters {
                    title: Some(
                        clean(draft.title.as_deref())
                            .unwrap_or_else(|| derive_title(raw, TitleKind::Task)),
                    ),
                    description: clean(draft.description.as_deref()),
                    priority: normalize_priority(draft.priority.as_deref()),
                    due_date: normalize_date(draft.due_date.as_deref(), today),
                    tags: normalize_tags(&draft.tags),
                    project: clean(draft.project.as_deref()),
                    ..CommandParameters::default()
                },
            ),
            IntentEntities::UpdateTask(change) => TypedCommand::new(
                CommandAction::UpdateTask,
                CommandParameters {
                    task_id: clean(change.task_id.as_deref()),
                    title: clean(change.title.as_deref()),
                    new_title: clean(change.new_title.as_deref()),
                    description: clean(change.description.as_deref()),
                    status: normalize_status(change.status.as_deref()),
                    priority: normalize_priority(change.priority.as_deref()),
                    due_date: normalize_date(change.due_date.as_deref(), today),
                    tags: normalize_tags(&change.tags),
                    ..CommandParameters::default()
                },
            ),
            IntentEntities::CompleteTask(reference) => TypedCommand::new(
                CommandAction::CompleteTask,
                CommandParameters {
                    task_id: clean(reference.task_id.as_deref()),
                    title: clean(reference.title.as_deref()),
                    ..CommandParameters::default()
                },
            ),
            IntentEntities::ListTasks(query) => TypedCommand::new(
                CommandAction::ListTasks,
                CommandParameters {
                    status: normalize_status(query.status.as_deref()),
                    priority: normalize_priority(query.priority.as_deref()),
                    project: clean(query.project.as_deref()),
                    limit: normalize_limit(query.limit.as_deref()),
                    ..CommandParameters::default()
                },
            ),
            IntentEntities::CreateNote(draft) => {
                let title = clean(draft.title.as_deref())
                    .unwrap_or_else(|| derive_title(raw, TitleKind::Note));
                let content = clean(draft.content.as_deref()).unwrap_or_else(|| title.clone());
                TypedCommand::new(
                    CommandAction::CreateNote,
                    CommandParameters {
                        title: Some(title),
                        content: Some(content),
                        tags: normalize_tags(&draft.tags),
                        ..CommandParameters::default()
                    },
                )
            }
            IntentEntities::SearchNotes(query) => TypedCommand::new(
                CommandAction::SearchNotes,
                CommandParameters {
                    query: clean(query.query.as_deref()),
                    limit: normalize_limit(query.limit.as_deref()),
                    ..CommandParameters::default()
                },
            ),
            IntentEntities::CreateProject(draft) => TypedCommand::new(
                CommandAction::CreateProject,
                CommandParameters {
                    title: Some(
                        clean(draft.name.as_deref())
                            .unwrap_or_else(|| derive_title(raw, TitleKind::Project)),
                    ),
                    description: clean(draft.description.as_deref()),
                    ..CommandParameters::default()
                },
            ),
            IntentEntities::Dashboard => {
                TypedCommand::new(CommandAction::DashboardSummary, CommandParameters::default())
            }
            IntentEntities::Analytics { period } => TypedCommand::new(
                CommandAction::ProductivityStats,
                CommandParameters {
                    period: normalize_period(period.as_deref()),
                    ..CommandParameters::default()
                },
            ),
            IntentEntities::None => return None,
        };
        Some(command)
    }
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Title from the raw utterance: drop leading creation verbs and type nouns.
fn derive_title(raw: &str, kind: TitleKind) -> String {
    let mut text = raw.trim().to_string();
    while let Some(m) = LEADING_VERB.find(&text) {
        if m.end() == 0 {
            break;
        }
        text = text[m.end()..].to_string();
    }
    text = LEADING_NOUN.replace(&text, "").into_owned();
    text = TRAILING_NOUN.replace(&text, "").into_owned();
    let title = text
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '-' | ',' | '.'))
        .to_string();
    if title.is_empty() {
        kind.default_title().to_string()
    } else {
        title
    }
}

fn tokens(value: &str) -> Vec<String> {
    value
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Absent stays absent; "alta/high/urgente" map to high, "baixa/low" to
/// low, anything else present to medium.
pub fn normalize_priority(value: Option<&str>) -> Option<Priority> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    let tokens = tokens(value);
    let has = |words: &[&str]| tokens.iter().any(|t| words.contains(&t.as_str()));
    Some(if has(&["alta", "high", "urgente", "urgent"]) {
        Priority::High
    } else if has(&["baixa", "low"]) {
        Priority::Low
    } else {
        Priority::Medium
    })
}

/// Relative words first ("amanhã", "hoje", "semana"), then explicit dates.
/// Unparseable values are treated as absent.
pub fn normalize_date(value: Option<&str>, today: NaiveDate) -> Option<NaiveDate> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    let lower = value.to_lowercase();

    if lower.contains("amanhã") || lower.contains("amanha") || lower.contains("tomorrow") {
        return today.checked_add_days(Days::new(1));
    }
    if lower.contains("hoje") || lower.contains("today") {
        return Some(today);
    }
    if lower.contains("semana") || lower.contains("week") {
        return today.checked_add_days(Days::new(7));
    }

    for format in ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    // Day and month only: assume the current year.
    let with_year = format!("{}/{}", value, today.year());
    NaiveDate::parse_from_str(&with_year, "%d/%m/%Y").ok()
}

pub fn normalize_status(value: Option<&str>) -> Option<TaskStatus> {
    let lower = value.map(str::trim).filter(|v| !v.is_empty())?.to_lowercase();
    const IN_PROGRESS: [&str; 6] = [
        "andamento",
        "progresso",
        "progress",
        "fazendo",
        "doing",
        "iniciad",
    ];
    const DONE: [&str; 7] = [
        "conclu", "feit", "finaliz", "done", "complet", "termin", "pront",
    ];
    const PENDING: [&str; 5] = ["pendente", "todo", "a fazer", "abert", "open"];

    if IN_PROGRESS.iter().any(|w| lower.contains(w)) {
        Some(TaskStatus::InProgress)
    } else if DONE.iter().any(|w| lower.contains(w)) {
        Some(TaskStatus::Done)
    } else if PENDING.iter().any(|w| lower.contains(w)) {
        Some(TaskStatus::Todo)
    } else {
        None
    }
}

/// Token-based so "média" never reads as "dia".
pub fn normalize_period(value: Option<&str>) -> Option<Period> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    let tokens = tokens(value);
    let has = |words: &[&str]| tokens.iter().any(|t| words.contains(&t.as_str()));
    if has(&["hoje", "dia", "diário", "diaria", "diária", "today", "day", "daily"]) {
        Some(Period::Day)
    } else if has(&["semana", "semanal", "week", "weekly"]) {
        Some(Period::Week)
    } else if has(&["mês", "mes", "mensal", "month", "monthly"]) {
        Some(Period::Month)
    } else if has(&["ano", "anual", "year", "yearly"]) {
        Some(Period::Year)
    } else {
        None
    }
}

/// Trimmed, without leading `#`, lowercase, deduplicated in first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().trim_start_matches('#').trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Positive integers only, capped at [`MAX_LIMIT`].
pub fn normalize_limit(value: Option<&str>) -> Option<usize> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    let n = match value.parse::<i64>() {
        Ok(n) => n,
        Err(_) => {
            let f = value.parse::<f64>().ok()?;
            if !f.is_finite() {
                return None;
            }
            f.trunc() as i64
        }
    };
    if n < 1 {
        return None;
    }
    Some((n as usize).min(MAX_LIMIT))
}

// =============================================================================
// Tests
// =============================================================================
