//! Building the engine from source.
//!
//! The build strategy is chosen once from the run context's platform:
//! `CmakeBuilder` on Windows (configure + release build), `MakeBuilder`
//! everywhere else. Both drive their tools through a [`CommandRunner`].

mod cmake;
mod make;
mod source;

pub use cmake::CmakeBuilder;
pub use make::MakeBuilder;
pub use source::fetch_source;

use crate::context::RunContext;
use crate::platform::Platform;
use crate::process::CommandRunner;
use crate::Result;

/// Compiles the engine checkout so its `quantize` tool exists.
#[async_trait::async_trait]
pub trait EngineBuilder: Send + Sync {
    fn name(&self) -> &str;

    async fn build(&self, runner: &dyn CommandRunner) -> Result<()>;
}

/// Select the build strategy for the context's platform.
pub fn builder_for(context: &RunContext) -> Box<dyn EngineBuilder> {
    match context.platform() {
        Platform::Windows => Box::new(CmakeBuilder::new(context)),
        Platform::Posix => Box::new(MakeBuilder::new(context)),
    }
}
