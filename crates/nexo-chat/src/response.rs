//! Final reply text.
//!
//! Renders command results and owns the fixed texts (help, welcome,
//! apology, input validation).

use crate::error::{ChatError, ErrorKind};
use crate::types::CommandResult;

const HELP_TEXT: &str = "Eu posso ajudar você a organizar tarefas, notas e projetos. Exemplos:\n\
- \"criar tarefa: revisar relatório até amanhã\"\n\
- \"nova tarefa ligar para o banco com prioridade alta\"\n\
- \"marcar como concluída: Reunião com equipe\"\n\
- \"atualizar tarefa Relatório para prioridade baixa\"\n\
- \"listar tarefas pendentes\"\n\
- \"anotar: ideias para o blog #escrita\"\n\
- \"buscar notas sobre Rust\"\n\
- \"criar projeto: Mudança\"\n\
- \"mostrar painel\"\n\
- \"como está minha produtividade este mês?\"";

const WELCOME_TEXT: &str = "Olá! Sou o Nexo, seu assistente de produtividade. \
Diga o que precisa em linguagem natural, por exemplo \"criar tarefa: pagar contas hoje\". \
Digite \"ajuda\" para ver mais exemplos.";

const APOLOGY_TEXT: &str =
    "Desculpe, algo deu errado ao processar sua mensagem. Tente novamente em instantes.";

const GENERIC_ERROR_TEXT: &str = "Ocorreu um erro inesperado. Tente novamente.";

const EMPTY_INPUT_TEXT: &str =
    "Não recebi nenhuma mensagem. Diga o que precisa ou digite \"ajuda\" para ver exemplos.";

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseFormatter;

impl ResponseFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Reply text for a command result.
    ///
    /// Successes and user errors show the message as-is. Store failures add
    /// a wrapped diagnostic line; other failures never expose diagnostics.
    pub fn render(&self, result: &CommandResult) -> String {
        if result.success {
            return result.message.clone();
        }
        match result.error.as_ref().map(ChatError::kind) {
            Some(ErrorKind::Store) => {
                format!("{}\n{}", result.message, self.error_text(result.error.as_ref()))
            }
            _ => result.message.clone(),
        }
    }

    /// Text for an error, or the generic error text when there is none.
    pub fn error_text(&self, error: Option<&ChatError>) -> String {
        match error {
            Some(ChatError::Store(inner)) => format!("(Detalhe: {})", inner),
            Some(ChatError::User(diagnostic)) => diagnostic.clone(),
            Some(ChatError::Classifier(_)) | Some(ChatError::Internal(_)) | None => {
                GENERIC_ERROR_TEXT.to_string()
            }
        }
    }

    pub fn help_text(&self) -> &'static str {
        HELP_TEXT
    }

    pub fn welcome_text(&self) -> &'static str {
        WELCOME_TEXT
    }

    /// Shown when a request fails unexpectedly.
    pub fn apology(&self) -> &'static str {
        APOLOGY_TEXT
    }

    pub fn empty_input(&self) -> &'static str {
        EMPTY_INPUT_TEXT
    }

    pub fn too_long(&self, max_chars: usize) -> String {
        format!(
            "Sua mensagem é muito longa. Envie no máximo {} caracteres.",
            max_chars
        )
    }
}
