//! dalai - build llama.cpp and prepare LLaMA model weights for it.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dalai_core::{DalaiError, Installer, RunContext, WeightsSource, USAGE_MESSAGE};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dalai")]
#[command(about = "Build llama.cpp and install LLaMA models for it")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Root directory for the engine checkout and venv (defaults to ~/dalai)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Directory holding the original weights, one sub-directory per model
    #[arg(long, global = true, conflicts_with = "weights_url")]
    weights_dir: Option<PathBuf>,

    /// Base URL serving the original weights, one path segment per model
    #[arg(long, global = true)]
    weights_url: Option<String>,

    /// Base URL serving tokenizer.model and tokenizer_checklist.chk
    #[arg(long, global = true)]
    tokenizer_url: Option<String>,

    /// Python interpreter used for the conversion script
    #[arg(long, global = true)]
    python: Option<PathBuf>,

    /// Git repository of the engine
    #[arg(long, global = true)]
    repo: Option<String>,

    /// Kill any external command that runs longer than this many seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Enable debug logging (includes every line of tool output)
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clone the engine if needed, build it and install models
    Install {
        /// Models to install: 7B, 13B, 30B, 65B (default 7B)
        models: Vec<String>,
    },
    /// Build the engine only
    Build,
    /// Install models into an already built engine
    Add {
        /// Models to install: 7B, 13B, 30B, 65B (default 7B)
        models: Vec<String>,
    },
}

fn build_context(args: &Args) -> dalai_core::Result<RunContext> {
    let root = match &args.root {
        Some(root) => root.clone(),
        None => RunContext::default_root()?,
    };

    let mut builder = RunContext::builder(root)
        .process_timeout(args.timeout_secs.map(Duration::from_secs));
    if let Some(dir) = &args.weights_dir {
        builder = builder.weights_source(WeightsSource::Local(dir.clone()));
    }
    if let Some(url) = &args.weights_url {
        builder = builder.weights_source(WeightsSource::Remote(url.clone()));
    }
    if let Some(url) = &args.tokenizer_url {
        builder = builder.tokenizer_base_url(url.clone());
    }
    if let Some(python) = &args.python {
        builder = builder.python(python.clone());
    }
    if let Some(repo) = &args.repo {
        builder = builder.engine_repo(repo.clone());
    }
    builder.build()
}

async fn run(args: Args) -> Result<()> {
    let context = build_context(&args).context("Invalid configuration")?;
    info!("Root: {}", context.root().display());
    let installer = Installer::new(context)?;

    match &args.command {
        Command::Install { models } => {
            let installed = installer.install(models.as_slice()).await?;
            info!("Installed {} model(s)", installed.len());
        }
        Command::Build => installer.make().await?,
        Command::Add { models } => {
            let added = installer.add(models.as_slice()).await?;
            info!("Added {} model(s)", added.len());
        }
    }
    Ok(())
}

/// True when the request itself was wrong, so the usage banner helps.
fn is_usage_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<DalaiError>()
        .map(DalaiError::is_validation)
        .unwrap_or(false)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    // Dropping the pipeline on Ctrl-C kills the running tool with it.
    let result = tokio::select! {
        result = run(args) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, exiting");
            return ExitCode::from(130);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if is_usage_error(&err) {
                println!("{USAGE_MESSAGE}");
            }
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
