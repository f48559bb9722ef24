//! Offline rule-based language model.
//!
//! Classifies Portuguese (and basic English) commands with regular
//! expressions and answers in the same JSON shape a hosted model is asked
//! to produce, so the rest of the pipeline cannot tell the difference.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map, Value};

use super::{LanguageModel, Message, Role};
use crate::error::ChatError;

// =============================================================================
// Compiled regex sets (compiled once, reused across calls)
// =============================================================================

struct IntentRules {
    help: Regex,
    greeting: Regex,
    thanks: Regex,
    complete_task: Vec<Regex>,
    update_field: Regex,
    update_task: Vec<Regex>,
    create_project: Vec<Regex>,
    create_note: Vec<Regex>,
    create_task: Vec<Regex>,
    search_notes: Vec<Regex>,
    list_tasks: Vec<Regex>,
    analytics: Regex,
    dashboard: Regex,
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid intent regex {}: {}", pattern, e))
}

static RULES: LazyLock<IntentRules> = LazyLock::new(|| {
    let mk = |pats: &[&str]| -> Vec<Regex> { pats.iter().map(|p| compile(p)).collect() };

    IntentRules {
        help: compile(
            r"(?i)^(?:ajuda|help|socorro|comandos|o\s+que\s+(?:voc[eê]\s+)?(?:pode|sabe)\s+fazer|what\s+can\s+you\s+do)\b",
        ),
        greeting: compile(
            r"(?i)^(?:oi|ol[aá]|bom\s+dia|boa\s+tarde|boa\s+noite|e\s+a[ií]|hello|hi|hey)\b",
        ),
        thanks: compile(r"(?i)\b(?:obrigad[oa]|valeu|thanks|thank\s+you)\b"),
        // Completion is checked before creation so "concluir tarefa" never creates.
        complete_task: mk(&[
            r"(?i)^(?:marcar|marque|marca)\s+(?:a\s+tarefa\s+)?como\s+(?:conclu[ií]d[ao]|feit[ao]|finalizad[ao]|pront[ao])\s*:?\s*(?P<rest>.*)$",
            r"(?i)^(?:marcar|marque|marca)\s+(?:a\s+)?(?:tarefa\s+)?(?P<rest>.+?)\s+como\s+(?:conclu[ií]d[ao]|feit[ao]|finalizad[ao]|pront[ao])$",
            r"(?i)^(?:concluir|conclua|finalizar|finalize|completar|terminar|termine|terminei|conclu[ií])\b\s*(?:a\s+)?(?:tarefa\b)?\s*:?\s*(?P<rest>.*)$",
            r"(?i)^mark\s+(?:task\s+)?(?P<rest>.+?)\s+as\s+(?:done|complete|completed)$",
            r"(?i)^(?:complete|finish)\s+(?:the\s+)?(?:task\b)?\s*:?\s*(?P<rest>.*)$",
        ]),
        update_field: compile(
            r"(?i)^(?:mudar|mude|alterar|altere|definir|defina|update|change|set)\s+(?:a\s+|o\s+|the\s+)?(?P<field>prioridade|status|prazo|priority|due\s+date)\s+(?:da|de|do|of)\s+(?:tarefa\s+|task\s+)?(?P<title>.+?)\s+(?:para|pra|to)\s+(?P<value>.+)$",
        ),
        update_task: mk(&[
            r"(?i)^(?:atualizar|atualize|alterar|altere|mudar|mude|editar|edite|renomear|renomeie)\b\s*(?:a\s+)?(?:tarefa\b)?\s*:?\s*(?P<rest>.*)$",
            r"(?i)^(?:update|change|edit|rename)\b\s*(?:the\s+)?(?:task\b)?\s*:?\s*(?P<rest>.*)$",
        ]),
        create_project: mk(&[
            r"(?i)^(?:criar|crie|cria|adicionar|adicione|novo|iniciar|inicie)\s+(?:um\s+)?(?:novo\s+)?projeto\b\s*:?\s*(?P<rest>.*)$",
            r"(?i)^(?:create|add|new|start)\s+(?:a\s+)?(?:new\s+)?project\b\s*:?\s*(?P<rest>.*)$",
        ]),
        create_note: mk(&[
            r"(?i)^(?:criar|crie|cria|adicionar|adicione|nova|salvar|salve|fazer|fa[cç]a)\s+(?:uma\s+)?(?:nova\s+)?(?:nota|anota[cç][aã]o)\b\s*:?\s*(?P<rest>.*)$",
            r"(?i)^(?:anotar|anote|anota|nota)\b\s*:?\s*(?P<rest>.*)$",
            r"(?i)^(?:create|add|new|take)\s+(?:a\s+)?(?:new\s+)?note\b\s*:?\s*(?P<rest>.*)$",
            r"(?i)^note\s*:\s*(?P<rest>.*)$",
        ]),
        create_task: mk(&[
            r"(?i)^(?:criar|crie|cria|adicionar|adicione|adiciona|nova|novo|registrar|registre)\s+(?:uma\s+)?(?:nova\s+)?tarefa\b\s*:?\s*(?P<rest>.*)$",
            r"(?i)^(?:lembrar|lembre|lembra)(?:-me)?\s+(?:de\s+)?(?P<rest>.+)$",
            r"(?i)^(?:preciso|tenho\s+que)\s+(?P<rest>.+)$",
            r"(?i)^(?:create|add|new)\s+(?:a\s+)?(?:new\s+)?task\b\s*:?\s*(?P<rest>.*)$",
            r"(?i)^remind\s+me\s+to\s+(?P<rest>.+)$",
            r"(?i)^(?:todo|task|tarefa)\s*:\s*(?P<rest>.*)$",
        ]),
        search_notes: mk(&[
            r"(?i)^(?:buscar|busque|busca|procurar|procure|procura|pesquisar|pesquise|encontrar|encontre|achar|ache)\s+(?:por\s+)?(?:minhas\s+|as\s+)?notas?\b\s*(?:sobre|de|com|:)?\s*(?P<rest>.*)$",
            r"(?i)^(?:buscar|busque|procurar|procure|pesquisar|pesquise)\s+(?:por\s+)?(?P<rest>.+?)\s+nas\s+(?:minhas\s+)?notas$",
            r"(?i)^(?:notas|anota[cç][oõ]es)\s+sobre\s+(?P<rest>.+)$",
            r"(?i)^(?:search|find)\s+(?:my\s+)?notes?\s*(?:about|on|for|:)?\s*(?P<rest>.*)$",
        ]),
        list_tasks: mk(&[
            r"(?i)\b(?:listar|liste|lista|mostrar|mostre|mostra|ver|exibir|exiba|quais\s+s[aã]o)\b.*\btarefas\b",
            r"(?i)^(?:minhas\s+)?tarefas\b",
            r"(?i)^(?:o\s+)?que\s+(?:eu\s+)?tenho\s+(?:pra|para)\s+fazer",
            r"(?i)\b(?:list|show)\b.*\btasks\b",
        ]),
        analytics: compile(
            r"(?i)\b(?:produtividade|estat[ií]sticas|an[aá]lise|desempenho|analytics|productivity|stats)\b",
        ),
        dashboard: compile(
            r"(?i)\b(?:painel|dashboard|resumo|vis[aã]o\s+geral|overview|summary)\b",
        ),
    }
});

struct AttributePatterns {
    due: Regex,
    trailing_day: Regex,
    priority: Regex,
    urgent: Regex,
    bare_priority: Regex,
    status: Regex,
    bare_date: Regex,
    tag: Regex,
    limit: Regex,
    period: Regex,
    dangling: Regex,
}

static ATTRS: LazyLock<AttributePatterns> = LazyLock::new(|| AttributePatterns {
    due: compile(
        r"(?i),?\s*\b(?:at[eé]|para|pra|prazo(?:\s+(?:de|para))?|vence(?:\s+em)?|due|by)\s+(?P<date>hoje|amanh[aã]|(?:a\s+)?pr[oó]xima\s+semana|(?:esta|essa)\s+semana|today|tomorrow|next\s+week|\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}(?:/\d{4})?)\b",
    ),
    trailing_day: compile(r"(?i),?\s+(?P<date>hoje|amanh[aã]|today|tomorrow)\s*$"),
    priority: compile(
        r"(?i),?\s*(?:com\s+|with\s+)?(?:prioridade|priority)\s+(?P<level>alta|m[eé]dia|baixa|urgente|high|medium|low)\b",
    ),
    urgent: compile(r"(?i),?\s*\b(?P<level>urgente|urgent)\b"),
    bare_priority: compile(
        r"(?i)^(?:prioridade\s+|priority\s+)?(?P<level>alta|m[eé]dia|baixa|urgente|high|medium|low)$",
    ),
    status: compile(
        r"(?i)\b(?P<status>pendentes?|a\s+fazer|em\s+andamento|em\s+progresso|conclu[ií]d[ao]s?|feitas?|finalizadas?|todo|in\s+progress|done|completed)\b",
    ),
    bare_date: compile(
        r"(?i)^(?P<date>hoje|amanh[aã]|(?:a\s+)?pr[oó]xima\s+semana|today|tomorrow|next\s+week|\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}(?:/\d{4})?)$",
    ),
    tag: compile(r"#(?P<tag>[\p{L}\p{N}_-]+)"),
    limit: compile(r"\b(?P<n>\d{1,3})\b"),
    period: compile(
        r"(?i)\b(?P<period>hoje|dia|semana|m[eê]s|ano|today|day|week|month|year)\b",
    ),
    dangling: compile(r"(?i)(?:\s+(?:e|com|para|pra|at[eé]|como|with|and|to|by))+\s*$"),
});

// =============================================================================
// Attribute extraction
// =============================================================================

#[derive(Debug, Default)]
struct Attributes {
    priority: Option<String>,
    due_date: Option<String>,
    status: Option<String>,
    tags: Vec<String>,
}

impl Attributes {
    fn is_empty(&self) -> bool {
        self.priority.is_none()
            && self.due_date.is_none()
            && self.status.is_none()
            && self.tags.is_empty()
    }
}

/// Remove the first match of `re` from `text`, returning the named group.
fn take(re: &Regex, text: &mut String, group: &str) -> Option<String> {
    let (value, range) = {
        let caps = re.captures(text.as_str())?;
        (caps.name(group)?.as_str().to_string(), caps.get(0)?.range())
    };
    text.replace_range(range, " ");
    Some(value)
}

fn take_tags(text: &mut String) -> Vec<String> {
    let tags: Vec<String> = ATTRS
        .tag
        .captures_iter(text)
        .filter_map(|c| c.name("tag").map(|m| m.as_str().to_string()))
        .collect();
    if !tags.is_empty() {
        *text = ATTRS.tag.replace_all(text, " ").into_owned();
    }
    tags
}

/// Pull priority, due date and tags out of free text. What remains is the title.
fn take_task_attributes(text: &mut String) -> Attributes {
    let tags = take_tags(text);
    let priority =
        take(&ATTRS.priority, text, "level").or_else(|| take(&ATTRS.urgent, text, "level"));
    let due_date =
        take(&ATTRS.due, text, "date").or_else(|| take(&ATTRS.trailing_day, text, "date"));
    Attributes {
        priority,
        due_date,
        status: None,
        tags,
    }
}

/// Interpret the value after "para" in an update request.
fn value_attributes(value: &str) -> Attributes {
    let value = value.trim();
    let mut attrs = Attributes::default();
    if let Some(caps) = ATTRS.bare_priority.captures(value) {
        attrs.priority = caps.name("level").map(|m| m.as_str().to_string());
    } else if let Some(caps) = ATTRS.bare_date.captures(value) {
        attrs.due_date = caps.name("date").map(|m| m.as_str().to_string());
    } else if let Some(caps) = ATTRS.status.captures(value) {
        if caps.get(0).map(|m| m.as_str().len()) == Some(value.len()) {
            attrs.status = caps.name("status").map(|m| m.as_str().to_string());
        }
    }
    if attrs.is_empty() {
        let mut rest = value.to_string();
        attrs = take_task_attributes(&mut rest);
        if clean_title(&rest).is_some() {
            // Leftover free text means this is not a pure attribute phrase.
            return Attributes::default();
        }
    }
    attrs
}

fn clean_title(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = ATTRS.dangling.replace(&collapsed, "");
    let trimmed = trimmed
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ':' | '-' | '.' | ';'))
        .trim_matches('"')
        .trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn note_title(content: &str) -> Option<String> {
    let first = content
        .split(['\n', '.', '!', '?'])
        .map(str::trim)
        .find(|s| !s.is_empty())?;
    let title: String = if first.chars().count() > 60 {
        let cut: String = first.chars().take(60).collect();
        match cut.rfind(' ') {
            Some(idx) if idx > 20 => cut[..idx].to_string(),
            _ => cut,
        }
    } else {
        first.to_string()
    };
    clean_title(&title)
}

fn first_rest(patterns: &[Regex], input: &str) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures(input)
            .map(|c| c.name("rest").map_or(String::new(), |m| m.as_str().to_string()))
    })
}

// =============================================================================
// PatternModel
// =============================================================================

/// Rule-based [`LanguageModel`] that needs no network.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternModel;

impl PatternModel {
    pub fn new() -> Self {
        Self
    }

    /// Classify one utterance into `{intent, entities, confidence, reply}`.
    pub fn classify(&self, input: &str) -> Value {
        let text = input
            .trim()
            .trim_end_matches(|c: char| matches!(c, '.' | '!' | '?'))
            .trim();
        let rules = &*RULES;

        if rules.help.is_match(text) {
            return response("help", Map::new(), 0.95, None);
        }
        if let Some(rest) = first_rest(&rules.complete_task, text) {
            return self.complete_task(&rest);
        }
        if let Some(caps) = rules.update_field.captures(text) {
            let title = caps.name("title").map_or("", |m| m.as_str());
            let value = caps.name("value").map_or("", |m| m.as_str());
            let field = caps.name("field").map_or("", |m| m.as_str());
            return self.update_field(field, title, value);
        }
        if let Some(rest) = first_rest(&rules.update_task, text) {
            return self.update_task(&rest);
        }
        if let Some(rest) = first_rest(&rules.create_project, text) {
            let mut entities = Map::new();
            let mut rest = rest;
            let tags = take_tags(&mut rest);
            insert(&mut entities, "name", clean_title(&rest));
            insert_tags(&mut entities, tags);
            return response("create_project", entities, 0.9, None);
        }
        if let Some(rest) = first_rest(&rules.create_note, text) {
            return self.create_note(&rest);
        }
        if let Some(rest) = first_rest(&rules.create_task, text) {
            return self.create_task(&rest);
        }
        if let Some(rest) = first_rest(&rules.search_notes, text) {
            let mut entities = Map::new();
            insert(&mut entities, "query", clean_title(&rest));
            return response("search_notes", entities, 0.9, None);
        }
        if rules.list_tasks.iter().any(|re| re.is_match(text)) {
            return self.list_tasks(text);
        }
        if rules.analytics.is_match(text) {
            let mut entities = Map::new();
            let period = ATTRS
                .period
                .captures(text)
                .and_then(|c| c.name("period").map(|m| m.as_str().to_string()));
            insert(&mut entities, "period", period);
            return response("analytics", entities, 0.8, None);
        }
        if rules.dashboard.is_match(text) {
            return response("dashboard", Map::new(), 0.8, None);
        }
        if rules.greeting.is_match(text) {
            return response(
                "conversation",
                Map::new(),
                0.8,
                Some("Olá! Como posso ajudar com suas tarefas, notas e projetos hoje?"),
            );
        }
        if rules.thanks.is_match(text) {
            return response(
                "conversation",
                Map::new(),
                0.8,
                Some("De nada! Se precisar de mais alguma coisa, é só falar."),
            );
        }

        response(
            "conversation",
            Map::new(),
            0.3,
            Some(
                "Não tenho certeza do que você precisa. Posso criar tarefas, notas e projetos, \
                 listar tarefas, buscar notas ou mostrar seu painel. Digite \"ajuda\" para ver exemplos.",
            ),
        )
    }

    fn create_task(&self, rest: &str) -> Value {
        let mut rest = rest.to_string();
        let attrs = take_task_attributes(&mut rest);
        let mut entities = Map::new();
        insert(&mut entities, "title", clean_title(&rest));
        insert(&mut entities, "priority", attrs.priority);
        insert(&mut entities, "due_date", attrs.due_date);
        insert_tags(&mut entities, attrs.tags);
        response("create_task", entities, 0.9, None)
    }

    fn complete_task(&self, rest: &str) -> Value {
        let mut entities = Map::new();
        insert(&mut entities, "title", clean_title(rest));
        response("complete_task", entities, 0.9, None)
    }

    fn update_field(&self, field: &str, title: &str, value: &str) -> Value {
        let mut entities = Map::new();
        insert(&mut entities, "title", clean_title(title));
        let key = match field.to_lowercase().as_str() {
            "prioridade" | "priority" => "priority",
            "status" => "status",
            _ => "due_date",
        };
        insert(&mut entities, key, clean_title(value));
        response("update_task", entities, 0.9, None)
    }

    fn update_task(&self, rest: &str) -> Value {
        static SPLIT: LazyLock<Regex> = LazyLock::new(|| {
            compile(r"(?i)^(?P<title>.+?)\s+(?:para|pra|to|como)\s+(?P<value>.+)$")
        });
        // "atualizar tarefa para prioridade alta" names no task at all.
        static UNNAMED: LazyLock<Regex> =
            LazyLock::new(|| compile(r"(?i)^(?:para|pra|to|como)\s+(?P<value>.+)$"));

        let mut entities = Map::new();
        let caps = UNNAMED.captures(rest).or_else(|| SPLIT.captures(rest));
        let (title, attrs, new_title) = match caps {
            Some(caps) => {
                let title = caps.name("title").map_or("", |m| m.as_str()).to_string();
                let value = caps.name("value").map_or("", |m| m.as_str());
                let attrs = value_attributes(value);
                if attrs.is_empty() {
                    (title, attrs, clean_title(value))
                } else {
                    (title, attrs, None)
                }
            }
            None => {
                let mut remaining = rest.to_string();
                let mut attrs = take_task_attributes(&mut remaining);
                attrs.status = take(&ATTRS.status, &mut remaining, "status");
                (remaining, attrs, None)
            }
        };

        insert(&mut entities, "title", clean_title(&title));
        insert(&mut entities, "new_title", new_title);
        insert(&mut entities, "priority", attrs.priority);
        insert(&mut entities, "due_date", attrs.due_date);
        insert(&mut entities, "status", attrs.status);
        insert_tags(&mut entities, attrs.tags);
        response("update_task", entities, 0.85, None)
    }

    fn create_note(&self, rest: &str) -> Value {
        let mut rest = rest.to_string();
        let tags = take_tags(&mut rest);
        let content = clean_title(&rest);
        let mut entities = Map::new();
        insert(&mut entities, "title", content.as_deref().and_then(note_title));
        insert(&mut entities, "content", content);
        insert_tags(&mut entities, tags);
        response("create_note", entities, 0.9, None)
    }

    fn list_tasks(&self, text: &str) -> Value {
        let mut entities = Map::new();
        let status = ATTRS
            .status
            .captures(text)
            .and_then(|c| c.name("status").map(|m| m.as_str().to_string()));
        let priority = ATTRS
            .priority
            .captures(text)
            .or_else(|| ATTRS.urgent.captures(text))
            .and_then(|c| c.name("level").map(|m| m.as_str().to_string()));
        let limit = ATTRS
            .limit
            .captures(text)
            .and_then(|c| c.name("n").and_then(|m| m.as_str().parse::<u64>().ok()));
        insert(&mut entities, "status", status);
        insert(&mut entities, "priority", priority);
        if let Some(n) = limit {
            entities.insert("limit".to_string(), json!(n));
        }
        response("list_tasks", entities, 0.8, None)
    }
}

fn insert(entities: &mut Map<String, Value>, key: &str, value: Option<String>) {
    if let Some(v) = value {
        entities.insert(key.to_string(), Value::String(v));
    }
}

fn insert_tags(entities: &mut Map<String, Value>, tags: Vec<String>) {
    if !tags.is_empty() {
        entities.insert("tags".to_string(), json!(tags));
    }
}

fn response(
    intent: &str,
    entities: Map<String, Value>,
    confidence: f32,
    reply: Option<&str>,
) -> Value {
    let mut value = json!({
        "intent": intent,
        "entities": Value::Object(entities),
        "confidence": confidence,
    });
    if let Some(reply) = reply {
        value["reply"] = Value::String(reply.to_string());
    }
    value
}

#[async_trait]
impl LanguageModel for PatternModel {
    async fn complete(&self, messages: &[Message]) -> Result<String, ChatError> {
        let input = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .ok_or_else(|| ChatError::Classifier("no user message to classify".to_string()))?;
        Ok(self.classify(&input.content).to_string())
    }

    fn name(&self) -> &str {
        "pattern"
    }
}

// =============================================================================
// Tests
// =============================================================================
