//! Config command - inspect the effective configuration.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::style;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the merged configuration as TOML
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Show the user configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Path => cmd_path(),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("# No config files loaded (using defaults)");
    } else {
        for source in &sources {
            println!("# from {}", source.display());
        }
    }
    println!();

    // Sections left unset print with their defaults.
    let mut effective = loaded.config.clone();
    effective.llm = Some(effective.llm());
    effective.tools = Some(effective.tools());
    effective.agent = Some(effective.agent());
    effective.generation = Some(effective.generation());
    effective.cache = Some(effective.cache());
    print!("{}", effective.to_toml()?);
    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;

    println!("{}\n", style("Config file search order (later overrides earlier):").bold());
    for source in &loaded.sources {
        let status = if source.loaded {
            style("✓ loaded").green()
        } else {
            style("· not found").dim()
        };
        println!("  {} {}", status, source.path.display());
    }

    println!();
    let loaded_count = loaded.loaded_from().len();
    if loaded_count == 0 {
        println!("No config files found.");
    } else {
        println!("{} config file(s) loaded.", loaded_count);
    }
    Ok(())
}

fn cmd_path() -> Result<()> {
    match quill_config::user_config_path() {
        Some(path) => println!("{}", path.display()),
        None => eprintln!("Could not determine config directory"),
    }
    Ok(())
}
