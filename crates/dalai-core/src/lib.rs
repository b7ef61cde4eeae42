//! Dalai Core - headless installer for llama.cpp and LLaMA model weights.
//!
//! This crate clones and builds a llama.cpp checkout, then prepares model
//! weights for it: copying or downloading the original shards, running the
//! engine's conversion script, and quantizing each shard. The hard work is
//! done by those external tools; this crate runs them one at a time and stops
//! at the first failure.
//!
//! # Example
//!
//! ```rust,ignore
//! use dalai_core::{Installer, RunContext};
//!
//! #[tokio::main]
//! async fn main() -> dalai_core::Result<()> {
//!     let context = RunContext::builder(RunContext::default_root()?).build()?;
//!     let installer = Installer::new(context)?;
//!
//!     // Clone if needed, build, then stage 7B and 13B.
//!     installer.install(&["7B", "13B"]).await?;
//!     Ok(())
//! }
//! ```

pub mod build;
pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod network;
pub mod platform;
pub mod process;
pub mod stager;

pub use build::{builder_for, EngineBuilder};
pub use context::{RunContext, RunContextBuilder, WeightsSource};
pub use error::{DalaiError, Result};
pub use model::{parse_variants, ModelVariant, USAGE_MESSAGE};
pub use network::{Downloader, Fetcher};
pub use platform::Platform;
pub use process::{CommandRunner, ProcessRunner};
pub use stager::ModelStager;

use std::sync::Arc;

use tracing::info;

/// Entry point tying the run context to a command runner and a fetcher.
pub struct Installer {
    context: RunContext,
    runner: Arc<dyn CommandRunner>,
    fetcher: Arc<dyn Fetcher>,
}

impl Installer {
    /// Installer that spawns real processes and downloads over HTTP.
    pub fn new(context: RunContext) -> Result<Self> {
        let runner = ProcessRunner::new().with_timeout(context.process_timeout());
        let fetcher = Downloader::new()?;
        Ok(Self::with_components(
            context,
            Arc::new(runner),
            Arc::new(fetcher),
        ))
    }

    /// Installer with caller-supplied process and network backends.
    pub fn with_components(
        context: RunContext,
        runner: Arc<dyn CommandRunner>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            context,
            runner,
            fetcher,
        }
    }

    /// Clone the engine source if it is not checked out yet.
    pub async fn fetch_source(&self) -> Result<bool> {
        build::fetch_source(&self.context, self.runner.as_ref()).await
    }

    /// Build the engine with the platform's build strategy.
    pub async fn make(&self) -> Result<()> {
        let builder = builder_for(&self.context);
        info!(
            "Building engine for {} using {}",
            self.context.platform(),
            builder.name()
        );
        builder.build(self.runner.as_ref()).await
    }

    /// Stage the requested model variants (default `7B`).
    pub async fn add<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<ModelVariant>> {
        self.stager().add(names).await
    }

    /// Validate the request, then fetch the source, build and stage models.
    ///
    /// Model names are checked first so a typo never triggers a clone or a
    /// build.
    pub async fn install<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<ModelVariant>> {
        let variants = parse_variants(names)?;
        self.fetch_source().await?;
        self.make().await?;
        self.stager().stage_all(&variants).await?;
        Ok(variants)
    }

    fn stager(&self) -> ModelStager<'_> {
        ModelStager::new(&self.context, self.runner.as_ref(), self.fetcher.as_ref())
    }
}
