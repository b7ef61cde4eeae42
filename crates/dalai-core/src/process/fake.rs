//! Scripted [`CommandRunner`] for unit tests.

use std::sync::Mutex;

use super::{CommandRunner, CommandSpec, ObserverAction, OutputObserver, OutputStream, RunOutcome};
use crate::Result;

/// Records every command instead of spawning it.
#[derive(Default)]
pub(crate) struct RecordingRunner {
    calls: Mutex<Vec<CommandSpec>>,
    /// Program name that exits with code 1.
    failing: Option<String>,
    /// Lines replayed to the observer for each call.
    output: Vec<String>,
    /// Exit code reported after the output when nobody terminated the run.
    exit_code: i32,
}

impl RecordingRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing(program: &str) -> Self {
        Self {
            failing: Some(program.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn with_output(mut self, lines: &[&str], exit_code: i32) -> Self {
        self.output = lines.iter().map(|l| l.to_string()).collect();
        self.exit_code = exit_code;
        self
    }

    pub(crate) fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(
        &self,
        command: &CommandSpec,
        observer: &mut dyn OutputObserver,
    ) -> Result<RunOutcome> {
        self.calls.lock().unwrap().push(command.clone());
        for line in &self.output {
            if observer.on_line(OutputStream::Stdout, line) == ObserverAction::Terminate {
                return Ok(RunOutcome::terminated());
            }
        }
        if self.failing.as_deref() == Some(command.program_name().as_str()) {
            return Ok(RunOutcome::exited(Some(1)));
        }
        Ok(RunOutcome::exited(Some(self.exit_code)))
    }
}
