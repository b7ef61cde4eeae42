//! cmake build for Windows.

use std::path::PathBuf;

use tracing::{debug, info};

use super::EngineBuilder;
use crate::config::PathsConfig;
use crate::context::RunContext;
use crate::process::{CommandRunner, CommandSpec, IdlePromptObserver};
use crate::{DalaiError, Result};

/// Configures a fresh `build` directory, then builds the Release config.
///
/// Each stage runs under an [`IdlePromptObserver`], so a stage that drops
/// back to a PowerShell prompt instead of exiting is stopped after the second
/// prompt. A stage that exits non-zero on its own is fatal. No retry.
#[derive(Debug, Clone)]
pub struct CmakeBuilder {
    cmake: PathBuf,
    build_dir: PathBuf,
}

impl CmakeBuilder {
    pub fn new(context: &RunContext) -> Self {
        Self {
            cmake: context.venv_cmake(),
            build_dir: context.build_dir(),
        }
    }

    fn configure_command(&self) -> CommandSpec {
        CommandSpec::new(&self.cmake, &self.build_dir).arg("..")
    }

    fn release_command(&self) -> CommandSpec {
        CommandSpec::new(&self.cmake, &self.build_dir).args(["--build", ".", "--config", "Release"])
    }

    /// Create the build directory and drop any cache from an earlier run.
    fn prepare_build_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.build_dir)
            .map_err(|e| DalaiError::io("creating build dir", &self.build_dir, e))?;

        let cache = self.build_dir.join(PathsConfig::CMAKE_CACHE_FILE);
        if cache.exists() {
            debug!("Removing stale {}", cache.display());
            std::fs::remove_file(&cache)
                .map_err(|e| DalaiError::io("removing cmake cache", &cache, e))?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl EngineBuilder for CmakeBuilder {
    fn name(&self) -> &str {
        "cmake"
    }

    async fn build(&self, runner: &dyn CommandRunner) -> Result<()> {
        self.prepare_build_dir()?;

        info!("Configuring engine with cmake in {}", self.build_dir.display());
        let mut observer = IdlePromptObserver::powershell()?;
        runner
            .run_checked(&self.configure_command(), &mut observer)
            .await?;

        info!("Building engine Release configuration");
        let mut observer = IdlePromptObserver::powershell()?;
        runner
            .run_checked(&self.release_command(), &mut observer)
            .await?;

        info!("Engine build finished");
        Ok(())
    }
}
