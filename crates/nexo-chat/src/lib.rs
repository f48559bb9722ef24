//! Conversational core for Nexo.
//!
//! Turns free-text messages into knowledge-base operations: classify the
//! intent, extract a typed command, dispatch it to the store, and format
//! the reply, keeping per-session context along the way.

pub mod classifier;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod extractor;
pub mod model;
pub mod orchestrator;
pub mod response;
pub mod types;

pub use classifier::IntentClassifier;
pub use context::ContextStore;
pub use dispatcher::CommandDispatcher;
pub use error::{ChatError, ErrorKind};
pub use extractor::CommandExtractor;
pub use model::{LanguageModel, Message, OpenAiModel, PatternModel, Role};
pub use orchestrator::Orchestrator;
pub use response::ResponseFormatter;
pub use types::{
    ClassifiedIntent, CommandAction, CommandKind, CommandParameters, CommandResult,
    CommandTarget, ConversationContext, EntityFields, Intent, IntentEntities, Interaction, Reply,
    ResultData, SubjectRef, TypedCommand,
};
