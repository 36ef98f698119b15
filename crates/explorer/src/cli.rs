//! CLI wiring for the `hlsforge` binary.

use crate::adapter::EvaluationAdapter;
use crate::config::{ExplorerConfig, StrategyKind};
use crate::export::ParetoExporter;
use crate::session::Explorer;
use crate::strategy::{ExhaustiveSearch, RandomSearch, SearchStrategy};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hlsforge_cache::ResultCache;
use hlsforge_directives::{
    apply_directives, place, ActionPointKind, DirectiveSpace, KernelMetadata, StructuralMetadata,
};
use hlsforge_synth::SynthesisRunner;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "hlsforge", about = "HLS directive design-space exploration")]
pub struct Cli {
    /// TOML run configuration; built-in defaults otherwise.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the candidate directives and domain bounds per action point.
    Space {
        #[arg(long)]
        metadata: Option<PathBuf>,
    },
    /// Search the directive space and export the Pareto front.
    Explore(ExploreArgs),
    /// Place one directive per action point from the loop structure.
    Place {
        #[arg(long)]
        source: Option<PathBuf>,
        #[arg(long)]
        metadata: Option<PathBuf>,
        #[arg(long)]
        structure: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct ExploreArgs {
    #[arg(long)]
    pub source: Option<PathBuf>,
    #[arg(long)]
    pub metadata: Option<PathBuf>,
    #[arg(long)]
    pub cache: Option<PathBuf>,
    #[arg(long)]
    pub threads: Option<usize>,
    #[arg(long)]
    pub timeout_secs: Option<u64>,
    #[arg(long)]
    pub device: Option<String>,
    #[arg(long)]
    pub clock_period_ns: Option<f64>,
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyKind>,
    #[arg(long)]
    pub batch_size: Option<usize>,
    #[arg(long)]
    pub batches: Option<usize>,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Leave the tool's automatic optimizations enabled.
    #[arg(long, default_value_t = false)]
    pub default_optimizations: bool,
}

impl ExploreArgs {
    fn apply(self, config: &mut ExplorerConfig) {
        if let Some(source) = self.source {
            config.kernel.source = source;
        }
        if let Some(metadata) = self.metadata {
            config.kernel.metadata = metadata;
        }
        if let Some(cache) = self.cache {
            config.search.cache = cache;
        }
        if let Some(threads) = self.threads {
            config.search.threads = threads;
        }
        if let Some(timeout) = self.timeout_secs {
            config.tool.timeout_secs = timeout;
        }
        if let Some(device) = self.device {
            config.tool.device = device;
        }
        if let Some(period) = self.clock_period_ns {
            config.tool.clock_period_ns = period;
        }
        if let Some(strategy) = self.strategy {
            config.search.strategy = strategy;
        }
        if let Some(batch_size) = self.batch_size {
            config.search.batch_size = batch_size;
        }
        if let Some(batches) = self.batches {
            config.search.max_batches = batches;
        }
        if let Some(seed) = self.seed {
            config.search.seed = seed;
        }
        if let Some(output) = self.output {
            config.output.dir = output;
        }
        if self.default_optimizations {
            config.tool.default_optimizations = true;
        }
    }
}

pub fn run_cli(cli: Cli) -> Result<()> {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let Cli { config, command } = cli;
    let mut config = match config {
        Some(path) => ExplorerConfig::load(&path)?,
        None => ExplorerConfig::default(),
    };

    match command {
        Command::Space { metadata } => {
            if let Some(metadata) = metadata {
                config.kernel.metadata = metadata;
            }
            print_space(&config)?;
        }
        Command::Explore(args) => {
            args.apply(&mut config);
            config.validate()?;
            explore(&config)?;
        }
        Command::Place {
            source,
            metadata,
            structure,
            output,
        } => {
            if let Some(source) = source {
                config.kernel.source = source;
            }
            if let Some(metadata) = metadata {
                config.kernel.metadata = metadata;
            }
            if let Some(structure) = structure {
                config.kernel.structure = structure;
            }
            if let Some(output) = output {
                config.output.placed_source = output;
            }
            place_directives(&config)?;
        }
    }

    Ok(())
}

fn build_space(config: &ExplorerConfig) -> Result<(KernelMetadata, DirectiveSpace)> {
    let metadata = KernelMetadata::load(&config.kernel.metadata)?;
    let space = DirectiveSpace::build(&metadata, &config.space)?;
    Ok((metadata, space))
}

fn print_space(config: &ExplorerConfig) -> Result<()> {
    let (metadata, space) = build_space(config)?;
    println!("top function: {}", metadata.top_function);
    for set in space.sets() {
        let kind = match &set.point.kind {
            ActionPointKind::Loop { .. } => "loop",
            ActionPointKind::Array { .. } => "array",
        };
        println!(
            "{} ({}): 0..={}",
            set.point.label,
            kind,
            set.directives.len() - 1
        );
        for (i, directive) in set.directives.iter().enumerate() {
            println!("  [{}] {}", i, directive);
        }
    }
    println!("configurations: {}", space.cardinality());
    Ok(())
}

fn explore(config: &ExplorerConfig) -> Result<()> {
    let (_, space) = build_space(config)?;
    let space = Arc::new(space);

    let source = fs::read_to_string(&config.kernel.source)
        .with_context(|| format!("reading kernel source {}", config.kernel.source.display()))?;
    let extension = source_extension(&config.kernel.source);
    let runner = SynthesisRunner::from_source(
        Arc::clone(&space),
        source.clone(),
        extension.clone(),
        config.tool.runner_options(),
    )?;
    let cache = Arc::new(ResultCache::open(&config.search.cache)?);

    let adapter = EvaluationAdapter::new(Arc::clone(&space), Arc::new(runner), cache);
    let explorer = Explorer::new(adapter, config.search.threads)?;

    let search = &config.search;
    let mut strategy: Box<dyn SearchStrategy> = match search.strategy {
        StrategyKind::Random => Box::new(RandomSearch::new(
            search.batch_size,
            search.max_batches,
            search.seed,
        )),
        StrategyKind::Exhaustive => Box::new(ExhaustiveSearch::new(search.batch_size)),
    };
    let outcome = explorer.run(strategy.as_mut())?;

    let exporter = ParetoExporter::new(space, source, extension);
    let summary = exporter.export(&outcome.front, &config.output.dir)?;

    println!("Actual DSE Execution Time = {:.3}s", outcome.elapsed_secs);
    println!(
        "Calculated DSE Execution Time = {:.3}s",
        outcome.estimated_cost_secs
    );
    println!(
        "pareto points = {} (evaluations={}, cache_hits={}) written to {}",
        summary.entries.len(),
        outcome.evaluations,
        outcome.cache_hits,
        summary.dir.display()
    );
    Ok(())
}

fn place_directives(config: &ExplorerConfig) -> Result<()> {
    let metadata = KernelMetadata::load(&config.kernel.metadata)?;
    let structure = StructuralMetadata::load(&config.kernel.structure)?;
    let placement = place(&metadata, &structure, &config.placement);

    let source = fs::read_to_string(&config.kernel.source)
        .with_context(|| format!("reading kernel source {}", config.kernel.source.display()))?;
    let applied = apply_directives(&source, &placement.as_slice());
    fs::write(&config.output.placed_source, &applied.text).with_context(|| {
        format!("writing {}", config.output.placed_source.display())
    })?;

    for (point, directive) in metadata.action_points.iter().zip(&placement.directives) {
        println!(
            "{}: {}",
            point.label,
            directive.as_deref().unwrap_or("(none)")
        );
    }
    info!(
        placed = placement.placed(),
        inserted = applied.inserted,
        output = %config.output.placed_source.display(),
        "placement written"
    );
    Ok(())
}

fn source_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_else(|| ".cpp".to_string())
}
