//! Nexo application binary - composition root.
//!
//! Ties the Nexo crates into a single executable:
//! 1. Load configuration from TOML, then apply flag and env overrides
//! 2. Build the language model (offline patterns or an OpenAI-compatible API)
//! 3. Build the knowledge base (in-memory or remote REST service)
//! 4. Answer a single `--message`, or run an interactive chat on stdin

mod cli;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use nexo_chat::{LanguageModel, OpenAiModel, Orchestrator, PatternModel};
use nexo_core::config::{ClassifierProvider, NexoConfig, StoreConfig, StoreProvider};
use nexo_store::{HttpKnowledgeBase, InMemoryKnowledgeBase, KnowledgeBase};

use cli::CliArgs;

/// REPL commands handled locally, never sent to the assistant.
const QUIT_COMMANDS: &[&str] = &["/sair", "/quit", "/exit"];
const RESET_COMMANDS: &[&str] = &["/nova", "/reset"];

fn build_model(config: &NexoConfig) -> Result<Arc<dyn LanguageModel>, Box<dyn std::error::Error>> {
    let model: Arc<dyn LanguageModel> = match config.classifier.provider {
        ClassifierProvider::Pattern => Arc::new(PatternModel::new()),
        ClassifierProvider::OpenAi => Arc::new(OpenAiModel::from_config(&config.classifier)?),
    };
    Ok(model)
}

fn build_store(config: &StoreConfig) -> Result<Arc<dyn KnowledgeBase>, Box<dyn std::error::Error>> {
    let store: Arc<dyn KnowledgeBase> = match config.provider {
        StoreProvider::Memory => Arc::new(InMemoryKnowledgeBase::new()),
        StoreProvider::Http => {
            let token = std::env::var(&config.token_env).ok();
            if token.is_none() {
                tracing::warn!(
                    env = %config.token_env,
                    "No knowledge-base token set, requests are unauthenticated"
                );
            }
            Arc::new(HttpKnowledgeBase::new(
                config.base_url.clone(),
                token,
                Duration::from_secs(config.timeout_secs),
            )?)
        }
    };
    Ok(store)
}

/// Interactive chat loop. Exits on EOF, Ctrl+C or a quit command.
async fn run_repl(orchestrator: &Orchestrator, session: Option<String>) -> std::io::Result<()> {
    let mut session_id = session.unwrap_or_else(|| Uuid::new_v4().to_string());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", orchestrator.welcome());
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let Some(line) = line else { break };
        let command = line.trim();

        if QUIT_COMMANDS.contains(&command) {
            break;
        }
        if RESET_COMMANDS.contains(&command) {
            orchestrator.reset_session(&session_id);
            session_id = Uuid::new_v4().to_string();
            tracing::info!(session_id = %session_id, "Started a new conversation");
            println!("{}", orchestrator.welcome());
            continue;
        }

        let reply = orchestrator.handle(&line, Some(session_id.as_str())).await;
        println!("{}\n", reply.text);
    }

    tracing::info!(sessions = orchestrator.session_count(), "Nexo chat finished");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing exists, so load errors are reported afterwards.
    let config_file = args.resolve_config_path();
    let (mut config, load_error) = if config_file.exists() {
        match NexoConfig::load(&config_file) {
            Ok(config) => (config, None),
            Err(e) => (NexoConfig::default(), Some(e)),
        }
    } else {
        (NexoConfig::default(), None)
    };
    args.apply_overrides(&mut config);

    // Tracing. RUST_LOG wins over every other source. Logs go to stderr
    // so replies on stdout stay clean.
    let level = args.resolve_log_level(&config);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .init();

    tracing::info!("Starting Nexo v{}", env!("CARGO_PKG_VERSION"));
    match load_error {
        Some(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
        None if !config_file.exists() => tracing::info!(
            path = %config_file.display(),
            "No config file found, using defaults"
        ),
        None => {}
    }

    config.validate()?;

    if args.init_config {
        config.save(&config_file)?;
        println!("{}", config_file.display());
        return Ok(());
    }

    let model = build_model(&config)?;
    let store = build_store(&config.store)?;
    tracing::info!(
        classifier = model.name(),
        store = store.name(),
        "Collaborators initialized"
    );

    let orchestrator = Orchestrator::new(model, store, config.chat.clone());

    match args.message {
        Some(ref message) => {
            let reply = orchestrator.handle(message, args.session.as_deref()).await;
            tracing::debug!(session_id = %reply.session_id, "One-shot reply sent");
            println!("{}", reply.text);
        }
        None => run_repl(&orchestrator, args.session.clone()).await?,
    }

    Ok(())
}
