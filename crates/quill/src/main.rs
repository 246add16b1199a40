//! Quill - LLM-driven document agent and repository documentation generator
//!
//! Main entry point for the Quill CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{agent, config, generate};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Quill - LLM-driven document agent and repository documentation generator
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this config file instead of discovery
    #[arg(long, global = true, env = "QUILL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Edit a document through the staged agent loop
    Agent(agent::AgentArgs),

    /// Generate a document from a local repository checkout
    Generate(generate::GenerateArgs),

    /// Inspect configuration
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable, stderr) + daily rolling JSON file
    let filter = if cli.verbose {
        "quill=debug,quill_agent=debug,quill_generate=debug,quill_llm=debug,quill_context=debug,quill_config=debug,info"
    } else {
        "quill=info,quill_agent=info,quill_generate=info,quill_llm=info,quill_context=info,warn"
    };

    let log_dir = quill_config::log_dir().unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "quill.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "quill=trace,quill_agent=trace,quill_generate=trace,quill_llm=trace,quill_context=trace,quill_config=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        config_path: cli.config,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Agent(args) => agent::run(args, &ctx).await,
        Commands::Generate(args) => generate::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_args() {
        let cli = Cli::try_parse_from([
            "quill",
            "agent",
            "--document",
            "doc-1",
            "--store",
            "fixture.json",
            "--json",
            "Add an introduction",
        ])
        .unwrap();
        let Commands::Agent(args) = cli.command else {
            panic!("expected agent command");
        };
        assert_eq!(args.document, "doc-1");
        assert_eq!(args.instruction, "Add an introduction");
        assert!(args.json);
    }

    #[test]
    fn test_generate_defaults_to_sections() {
        let cli = Cli::try_parse_from([
            "quill", "generate", "--repo", ".", "--template", "t.txt", "--name", "Guide",
        ])
        .unwrap();
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate command");
        };
        assert_eq!(args.strategy, generate::StrategyArg::Sections);
        assert!(args.output.is_none());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["quill", "config", "which", "--verbose", "--config", "q.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("q.toml")));
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let result = Cli::try_parse_from([
            "quill", "generate", "--repo", ".", "--template", "t", "--name", "n", "--strategy", "magic",
        ]);
        assert!(result.is_err());
    }
}
