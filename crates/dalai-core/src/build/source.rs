//! Obtaining the engine source checkout.

use tracing::info;

use crate::context::RunContext;
use crate::process::{CommandRunner, CommandSpec, PassthroughObserver};
use crate::{DalaiError, Result};

/// Clone the engine repository into the engine home unless a checkout is
/// already there. Returns `true` when a clone was performed.
pub async fn fetch_source(context: &RunContext, runner: &dyn CommandRunner) -> Result<bool> {
    let engine_home = context.engine_home();
    if engine_home.join(".git").exists() {
        info!("Engine source already present at {}", engine_home.display());
        return Ok(false);
    }

    std::fs::create_dir_all(context.root())
        .map_err(|e| DalaiError::io("creating root dir", context.root(), e))?;

    info!("Cloning {} into {}", context.engine_repo(), engine_home.display());
    let clone = CommandSpec::new("git", context.root())
        .arg("clone")
        .arg(context.engine_repo())
        .arg(engine_home.as_os_str());
    runner.run_checked(&clone, &mut PassthroughObserver).await?;
    Ok(true)
}
