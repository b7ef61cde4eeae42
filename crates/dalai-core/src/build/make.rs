//! `make` build for Linux and macOS.

use std::path::PathBuf;

use tracing::info;

use super::EngineBuilder;
use crate::context::RunContext;
use crate::process::{CommandRunner, CommandSpec, PassthroughObserver};
use crate::Result;

/// Runs `make` once in the engine home. A failing build is fatal.
#[derive(Debug, Clone)]
pub struct MakeBuilder {
    engine_home: PathBuf,
}

impl MakeBuilder {
    pub fn new(context: &RunContext) -> Self {
        Self {
            engine_home: context.engine_home().to_path_buf(),
        }
    }

    fn make_command(&self) -> CommandSpec {
        CommandSpec::new("make", &self.engine_home)
    }
}

#[async_trait::async_trait]
impl EngineBuilder for MakeBuilder {
    fn name(&self) -> &str {
        "make"
    }

    async fn build(&self, runner: &dyn CommandRunner) -> Result<()> {
        info!("Building engine with make in {}", self.engine_home.display());
        runner
            .run_checked(&self.make_command(), &mut PassthroughObserver)
            .await?;
        info!("Engine build finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use crate::process::fake::RecordingRunner;
    use crate::DalaiError;

    fn context() -> RunContext {
        RunContext::builder("/home/me/dalai")
            .platform(Platform::Posix)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_runs_make_in_engine_home() {
        let runner = RecordingRunner::new();
        MakeBuilder::new(&context()).build(&runner).await.unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].to_string(), "make");
        assert_eq!(calls[0].current_dir, PathBuf::from("/home/me/dalai/llama"));
    }

    #[tokio::test]
    async fn test_failure_names_make() {
        let runner = RecordingRunner::failing("make");
        let err = MakeBuilder::new(&context()).build(&runner).await.unwrap_err();

        assert!(matches!(err, DalaiError::ProcessFailed { .. }));
        assert!(err.to_string().contains("running 'make' failed"));
        assert_eq!(runner.calls().len(), 1);
    }
}
