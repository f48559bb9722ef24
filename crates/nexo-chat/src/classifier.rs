//! Intent classification.
//!
//! Builds the prompt for a [`LanguageModel`], then turns whatever text it
//! returns into a [`ClassifiedIntent`]. Malformed output never fails the
//! request: it degrades to a low-confidence conversational turn.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ChatError;
use crate::model::{LanguageModel, Message};
use crate::types::{ClassifiedIntent, ConversationContext, EntityFields, Intent};

/// Reply used when the model output cannot be understood.
pub const CLARIFY_REPLY: &str = "Desculpe, não entendi bem. Pode reformular? \
Posso criar tarefas, notas e projetos, listar tarefas ou mostrar seu painel.";

const FALLBACK_CONFIDENCE: f32 = 0.5;

/// Wire shape requested from the model.
#[derive(Debug, Deserialize)]
struct RawClassification {
    intent: String,
    #[serde(default)]
    entities: Value,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    reply: Option<String>,
}

/// Turns free text into a [`ClassifiedIntent`] through a [`LanguageModel`].
pub struct IntentClassifier {
    /// Model that answers the classification prompt.
    model: Arc<dyn LanguageModel>,
    /// Number of recent turns replayed in the prompt.
    history_turns: usize,
}

impl IntentClassifier {
    /// Create a new `IntentClassifier` replaying the last `history_turns` turns.
    pub fn new(model: Arc<dyn LanguageModel>, history_turns: usize) -> Self {
        Self {
            model,
            history_turns,
        }
    }

    /// Classify `input` in the light of the session's recent turns.
    ///
    /// Only a transport failure of the model is an error.
    pub async fn classify(
        &self,
        input: &str,
        context: &ConversationContext,
    ) -> Result<ClassifiedIntent, ChatError> {
        let messages = self.build_prompt(input, context, Local::now().date_naive());
        let raw = self.model.complete(&messages).await?;
        let classified = parse_response(&raw);
        tracing::debug!(
            model = self.model.name(),
            intent = %classified.intent,
            confidence = classified.confidence,
            "Classified input"
        );
        Ok(classified)
    }

    pub fn build_prompt(
        &self,
        input: &str,
        context: &ConversationContext,
        today: NaiveDate,
    ) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2 + self.history_turns * 2);
        messages.push(Message::system(system_prompt(today)));
        for turn in context.recent(self.history_turns) {
            messages.push(Message::user(turn.input.clone()));
            messages.push(Message::assistant(turn.output.clone()));
        }
        messages.push(Message::user(input));
        messages
    }
}

fn system_prompt(today: NaiveDate) -> String {
    format!(
        "Você é o classificador de intenções de um assistente pessoal de produtividade.\n\
         Data de hoje: {today}.\n\n\
         Classifique a última mensagem do usuário em exatamente uma intenção:\n{labels}\n\n\
         Extraia apenas as entidades relevantes, usando estas chaves:\n\
         title, description, content, priority (alta|média|baixa), due_date (hoje|amanhã|semana|AAAA-MM-DD), \
         status (pendente|em andamento|concluída), tags (lista), query, task_id, new_title, \
         project, name, period (dia|semana|mês|ano), limit (número).\n\n\
         Responda somente com um objeto JSON no formato:\n\
         {{\"intent\": \"...\", \"entities\": {{...}}, \"confidence\": 0.0-1.0, \"reply\": \"...\"}}\n\
         Use \"reply\" apenas para a intenção conversation.",
        today = today.format("%Y-%m-%d"),
        labels = Intent::LABELS
            .iter()
            .map(|l| format!("- {}", l))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

/// Strip Markdown code fences and any prose around the JSON object.
fn json_body(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (start < end).then(|| &trimmed[start..=end])
}

/// Parse model output, falling back to a clarifying conversational turn.
pub fn parse_response(raw: &str) -> ClassifiedIntent {
    match try_parse(raw) {
        Ok(classified) => classified,
        Err(reason) => {
            tracing::warn!(reason = %reason, "Unusable classifier output, asking to rephrase");
            fallback()
        }
    }
}

fn try_parse(raw: &str) -> Result<ClassifiedIntent, String> {
    let body = json_body(raw).ok_or_else(|| "no JSON object in output".to_string())?;
    let parsed: RawClassification =
        serde_json::from_str(body).map_err(|e| format!("invalid JSON: {}", e))?;

    let fields: EntityFields = match parsed.entities {
        Value::Null => EntityFields::default(),
        value @ Value::Object(_) => {
            serde_json::from_value(value).map_err(|e| format!("invalid entities: {}", e))?
        }
        other => return Err(format!("entities is not an object: {}", other)),
    };

    let intent = Intent::parse(&parsed.intent);
    if let Intent::Unrecognized(ref label) = intent {
        tracing::warn!(label = %label, "Classifier returned an unknown intent");
    }

    let classified = ClassifiedIntent::new(
        intent,
        fields,
        parsed.confidence.unwrap_or(FALLBACK_CONFIDENCE),
    );
    Ok(match parsed.reply {
        Some(reply) => classified.with_reply(reply),
        None => classified,
    })
}

fn fallback() -> ClassifiedIntent {
    ClassifiedIntent::new(
        Intent::Conversation,
        EntityFields::default(),
        FALLBACK_CONFIDENCE,
    )
    .with_reply(CLARIFY_REPLY)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PatternModel, Role};
    use crate::types::{IntentEntities, Interaction, TaskDraft};
    use async_trait::async_trait;

    struct FixedModel(String);

    #[async_trait]
    impl LanguageModel for FixedModel {
        async fn complete(&self, _messages: &[Message]) -> Result<String, ChatError> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct DownModel;

    #[async_trait]
    impl LanguageModel for DownModel {
        async fn complete(&self, _messages: &[Message]) -> Result<String, ChatError> {
            Err(ChatError::Classifier("connection refused".to_string()))
        }

        fn name(&self) -> &str {
            "down"
        }
    }

    fn context_with_turns(n: usize) -> ConversationContext {
        let mut ctx = ConversationContext::new("s1");
        for i in 0..n {
            ctx.history.push(Interaction {
                input: format!("pergunta {}", i),
                output: format!("resposta {}", i),
                timestamp: chrono::Utc::now(),
            });
        }
        ctx
    }

    // ---- Parsing ----

    #[test]
    fn test_parse_well_formed() {
        let c = parse_response(
            r#"{"intent":"create_task","entities":{"title":"Comprar pão","priority":"alta"},"confidence":0.92}"#,
        );
        assert_eq!(c.intent, Intent::CreateTask);
        assert!((c.confidence - 0.92).abs() < 1e-6);
        assert_eq!(
            c.entities,
            IntentEntities::CreateTask(TaskDraft {
                title: Some("Comprar pão".to_string()),
                priority: Some("alta".to_string()),
                ..TaskDraft::default()
            })
        );
        assert!(c.reply.is_none());
    }

    #[test]
    fn test_parse_strips_code_fences() {
        let raw = "```json\n{\"intent\":\"dashboard\",\"entities\":{},\"confidence\":0.8}\n```";
        assert_eq!(parse_response(raw).intent, Intent::Dashboard);
    }

    #[test]
    fn test_parse_garbage_falls_back() {
        let c = parse_response("I think the user wants a task");
        assert_eq!(c.intent, Intent::Conversation);
        assert_eq!(c.confidence, 0.5);
        assert_eq!(c.reply.as_deref(), Some(CLARIFY_REPLY));
    }

    #[test]
    fn test_parse_missing_intent_falls_back() {
        let c = parse_response(r#"{"entities":{"title":"x"}}"#);
        assert_eq!(c.intent, Intent::Conversation);
        assert_eq!(c.reply.as_deref(), Some(CLARIFY_REPLY));
    }

    #[test]
    fn test_parse_entities_wrong_shape_falls_back() {
        let c = parse_response(r#"{"intent":"create_task","entities":["title"]}"#);
        assert_eq!(c.intent, Intent::Conversation);
    }

    #[test]
    fn test_parse_missing_confidence_and_entities() {
        let c = parse_response(r#"{"intent":"help"}"#);
        assert_eq!(c.intent, Intent::Help);
        assert_eq!(c.confidence, 0.5);
    }

    #[test]
    fn test_parse_out_of_range_confidence_is_clamped() {
        let c = parse_response(r#"{"intent":"dashboard","confidence":3}"#);
        assert_eq!(c.confidence, 1.0);
    }

    #[test]
    fn test_parse_unknown_intent_is_kept() {
        let c = parse_response(r#"{"intent":"book_flight","confidence":0.9}"#);
        assert_eq!(c.intent, Intent::Unrecognized("book_flight".to_string()));
        assert_eq!(c.entities, IntentEntities::None);
    }

    #[test]
    fn test_parse_conversation_reply() {
        let c = parse_response(r#"{"intent":"conversation","reply":"Oi! Tudo bem?"}"#);
        assert_eq!(c.reply.as_deref(), Some("Oi! Tudo bem?"));
    }

    // ---- Prompt ----

    #[test]
    fn test_prompt_includes_last_three_turns() {
        let classifier = IntentClassifier::new(Arc::new(PatternModel::new()), 3);
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let messages = classifier.build_prompt("e agora?", &context_with_turns(5), today);

        assert_eq!(messages.len(), 1 + 3 * 2 + 1);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("2024-05-10"));
        for label in Intent::LABELS {
            assert!(messages[0].content.contains(label));
        }
        assert_eq!(messages[1].content, "pergunta 2");
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[6].content, "resposta 4");
        assert_eq!(messages[7].content, "e agora?");
        assert_eq!(messages[7].role, Role::User);
    }

    #[test]
    fn test_prompt_with_empty_history() {
        let classifier = IntentClassifier::new(Arc::new(PatternModel::new()), 3);
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let messages = classifier.build_prompt("oi", &ConversationContext::new("s"), today);
        assert_eq!(messages.len(), 2);
    }

    // ---- classify ----

    #[tokio::test]
    async fn test_classify_with_pattern_model() {
        let classifier = IntentClassifier::new(Arc::new(PatternModel::new()), 3);
        let c = classifier
            .classify("criar projeto Mudança", &ConversationContext::new("s"))
            .await
            .unwrap();
        assert_eq!(c.intent, Intent::CreateProject);
    }

    #[tokio::test]
    async fn test_classify_malformed_output_is_not_an_error() {
        let classifier = IntentClassifier::new(Arc::new(FixedModel("{oops".to_string())), 3);
        let c = classifier
            .classify("qualquer coisa", &ConversationContext::new("s"))
            .await
            .unwrap();
        assert_eq!(c.intent, Intent::Conversation);
    }

    #[tokio::test]
    async fn test_classify_transport_failure_propagates() {
        let classifier = IntentClassifier::new(Arc::new(DownModel), 3);
        let err = classifier
            .classify("oi", &ConversationContext::new("s"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Classifier(_)));
    }
}
