// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! bizdesk - business dashboard chat assistant
//!
//! Entry point for the bizdesk CLI.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use clap::Parser;

use bizdesk::agents::{builtin_agents, find_builtin};
use bizdesk::chat::{EngineDeps, PageContext, TurnController};
use bizdesk::cli::{Cli, Commands};
use bizdesk::config::Settings;
use bizdesk::context::KnowledgeGraphRetrieval;
use bizdesk::error::{BizdeskError, Result};
use bizdesk::llm::backend::{BackendResolver, FixedBackendResolver};
use bizdesk::llm::factory::ProviderFactory;
use bizdesk::llm::mock_provider::MockProvider;
use bizdesk::llm::provider::ModelSelection;
use bizdesk::store::InMemoryStore;
use bizdesk::tools::builtin::BuiltinServices;
use bizdesk::tools::ToolRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG still takes precedence for other targets.
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());
    let level = match cli.verbose {
        0 => None,
        1 => Some("bizdesk=debug"),
        _ => Some("bizdesk=trace"),
    };
    if let Some(directive) = level {
        if let Ok(parsed) = directive.parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();

    let settings = match &cli.settings {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    let mut controller = build_controller(&cli, settings)?;

    match cli.command {
        None | Some(Commands::Chat) => run_chat(&mut controller).await,
        Some(Commands::Ask(args)) => {
            if let Some(page) = args.page {
                controller.set_page_context(PageContext::new(page));
            }
            if let Some(reply) = controller.send_utterance(&args.text).await {
                println!("{}", reply.content);
            }
            Ok(())
        }
    }
}

fn build_controller(cli: &Cli, settings: Settings) -> Result<TurnController> {
    let store = Arc::new(match &cli.data {
        Some(path) => InMemoryStore::load(path)?,
        None => InMemoryStore::new(),
    });

    let resolver: Arc<dyn BackendResolver> = if cli.mock.is_empty() {
        Arc::new(ProviderFactory::new(settings.clone()))
    } else {
        Arc::new(FixedBackendResolver::new(Arc::new(MockProvider::with_texts(
            cli.mock.clone(),
        ))))
    };

    let registry = ToolRegistry::with_builtins(&BuiltinServices {
        organizations: store.clone(),
        meeting_notes: store.clone(),
        knowledge: store.clone(),
        resolver: resolver.clone(),
    });

    let model = cli
        .model
        .clone()
        .unwrap_or_else(|| settings.defaults.model.clone());

    let mut controller = TurnController::new(
        EngineDeps {
            resolver,
            registry: Arc::new(registry),
            retrieval: Arc::new(KnowledgeGraphRetrieval::new(store.clone())),
            meeting_notes: store,
            config: settings.engine,
        },
        ModelSelection::for_model(model),
    );

    if let Some(id) = &cli.agent {
        let agent = find_builtin(id)
            .ok_or_else(|| BizdeskError::InvalidInput(format!("Unknown agent: {}", id)))?;
        controller.select_agent(Some(agent));
    }
    Ok(controller)
}

fn print_help() {
    println!("Commands:");
    println!("  /agent <id>    select an agent (/agent to deselect)");
    println!("  /agents        list built-in agents");
    println!("  /page <path>   set the current page (e.g. /meeting-notes?meetingId=m1)");
    println!("  /help          show this help");
    println!("  /exit          quit");
}

/// Interactive REPL over stdin
async fn run_chat(controller: &mut TurnController) -> Result<()> {
    if let Some(announcement) = controller.messages().last() {
        println!("{}\n", announcement.content);
    }
    println!("bizdesk chat (/help for commands)");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("\nyou: ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();

        match input.split_once(' ').unwrap_or((input, "")) {
            ("/exit" | "/quit", _) => break,
            ("/help", _) => print_help(),
            ("/agents", _) => {
                for agent in builtin_agents() {
                    println!("  {:<30} {}", agent.id, agent.name);
                }
            }
            ("/agent", id) => {
                let id = id.trim();
                if id.is_empty() {
                    controller.select_agent(None);
                    println!("Agent deselected.");
                } else if let Some(agent) = find_builtin(id) {
                    controller.select_agent(Some(agent));
                    if let Some(announcement) = controller.messages().last() {
                        println!("{}", announcement.content);
                    }
                } else {
                    println!("Unknown agent: {}", id);
                }
            }
            ("/page", path) => {
                controller.set_page_context(PageContext::new(path.trim()));
                println!("Page set to {}", path.trim());
            }
            _ => {
                if let Some(reply) = controller.send_utterance(input).await {
                    println!("\nbizdesk: {}", reply.content);
                }
            }
        }
    }

    controller.close();
    Ok(())
}
