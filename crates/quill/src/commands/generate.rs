//! Generate command - one-shot document generation from a local checkout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Args, ValueEnum};
use console::Style;

use quill_context::{CachedRepository, LocalRepository, RepoContextCache};
use quill_generate::{
    ChunkedGenerator, FileNegotiator, GenerationJob, GenerationStrategy, SectionGenerator,
};

use super::{Context, build_backend};

/// Which chunking strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    /// Plan sections, then write each one
    Sections,
    /// Let the model request files round by round
    Negotiate,
}

/// Arguments for the generate command.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Repository checkout to document
    #[arg(long)]
    pub repo: PathBuf,

    /// File with the template instructions
    #[arg(long)]
    pub template: PathBuf,

    /// Document title
    #[arg(long)]
    pub name: String,

    #[arg(long, value_enum, default_value = "sections")]
    pub strategy: StrategyArg,

    /// Write HTML here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Run the generate command.
pub async fn run(args: GenerateArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let config = &loaded.config;
    let llm = config.llm();
    let cache = config.cache();

    let backend = build_backend(&llm)?;

    let template = std::fs::read_to_string(&args.template)
        .with_context(|| format!("reading template {}", args.template.display()))?;
    let local = LocalRepository::open(&args.repo)
        .with_context(|| format!("opening repository {}", args.repo.display()))?;
    let job = GenerationJob::new(args.name, template, local.repo_ref().clone());

    let repository = CachedRepository::new(
        Arc::new(local),
        Arc::new(RepoContextCache::new(cache.max_entries, cache.ttl())),
    );
    let generator =
        ChunkedGenerator::new(backend, repository, llm.model.clone(), config.generation())
            .with_temperature(llm.temperature);

    let strategy: Box<dyn GenerationStrategy> = match args.strategy {
        StrategyArg::Sections => Box::new(SectionGenerator::new()),
        StrategyArg::Negotiate => Box::new(FileNegotiator::new()),
    };

    if ctx.verbose {
        let dim = Style::new().dim();
        eprintln!(
            "{}",
            dim.apply_to(format!(
                "Generating \"{}\" from {} ({})",
                job.document_name,
                job.repo,
                strategy.name()
            ))
        );
    }

    let html = generator.generate(&job, strategy.as_ref()).await?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, &html).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{}", html),
    }
    Ok(())
}
