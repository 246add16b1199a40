//! Agent command - run the staged document agent once.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use console::{Style, style};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use quill_agent::{
    AgentEvent, AgentRequest, EngineConfig, StageEngine, StageEvent, ToolBroker, ToolBrokerConfig,
};
use quill_context::MemoryDocumentStore;

use super::{Context, build_backend};

/// Arguments for the agent command.
#[derive(Args, Debug)]
pub struct AgentArgs {
    /// What the agent should do to the document
    #[arg(required = true)]
    pub instruction: String,

    /// Document id to work on
    #[arg(short, long)]
    pub document: String,

    /// JSON fixture with documents, projects and templates
    #[arg(long)]
    pub store: PathBuf,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,
}

/// Run the agent command.
pub async fn run(args: AgentArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let config = &loaded.config;
    let llm = config.llm();
    let tools = config.tools();
    let limits = config.agent();

    let backend = build_backend(&llm)?;

    let mut broker_config =
        ToolBrokerConfig::new(tools.require_endpoint()?).with_timeout(tools.timeout());
    if let Some(ref base) = tools.fallback_base_url {
        broker_config = broker_config.with_fallback(base);
    }
    let broker = ToolBroker::new(broker_config)?;

    let store = MemoryDocumentStore::from_json_file(&args.store)
        .with_context(|| format!("loading document store {}", args.store.display()))?;

    let engine = StageEngine::new(
        backend,
        Arc::new(broker),
        Arc::new(store),
        EngineConfig {
            model: llm.model.clone(),
            temperature: llm.temperature,
            max_tool_calls: limits.max_tool_calls,
            max_parse_failures: limits.max_parse_failures,
            max_turns: limits.max_turns,
        },
    );

    if ctx.verbose && !args.json {
        let dim = Style::new().dim();
        println!("{}", dim.apply_to(format!("Model: {}", llm.model)));
        println!("{}", dim.apply_to(format!("Document: {}", args.document)));
        println!();
    }

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut stream = engine.run(AgentRequest::new(args.document, args.instruction), cancel);
    let mut failure = None;
    while let Some(event) = stream.next().await {
        if args.json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            print_event(&event);
        }
        if let AgentEvent::Error { message, .. } = &event {
            failure = Some(message.clone());
        }
    }
    ctrl_c.abort();

    match failure {
        Some(message) => Err(anyhow::anyhow!(message)),
        None => Ok(()),
    }
}

fn print_event(event: &AgentEvent) {
    match event {
        AgentEvent::Stage(stage) => print_stage(stage),
        AgentEvent::Error { message, .. } => {
            eprintln!("{} {}", style("Error:").red(), message);
        }
        AgentEvent::Stopped => {
            println!("{}", style("[stopped]").yellow());
        }
    }
}

fn print_stage(event: &StageEvent) {
    let dim = Style::new().dim();
    println!("{}", style(format!("── {} ──", event.stage)).cyan().bold());
    if event.thought != event.stage.as_str() {
        println!("{}", dim.apply_to(&event.thought));
    }
    if let Some(invocation) = &event.tool_invocation {
        println!("{}", dim.apply_to(format!("[Running: {}]", invocation.tool)));
    }
    if let Some(outcome) = &event.tool_outcome {
        let status = if outcome.success { "done" } else { "failed" };
        println!("{}", dim.apply_to(format!("[{}]", status)));
    }
    if !event.content.is_empty() {
        println!("{}", event.content);
    }
    println!();
}
