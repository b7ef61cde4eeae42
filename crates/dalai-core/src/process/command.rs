//! Command descriptions and run outcomes.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

/// An external command to run: program, arguments and working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub current_dir: PathBuf,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>, current_dir: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: current_dir.as_ref().to_path_buf(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// File name of the program, used to tag log lines.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// How a supervised command finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Exit code, if the process exited on its own with one.
    pub exit_code: Option<i32>,
    /// The output observer asked for the process to be stopped.
    pub terminated_by_observer: bool,
}

impl RunOutcome {
    pub fn exited(code: Option<i32>) -> Self {
        Self {
            exit_code: code,
            terminated_by_observer: false,
        }
    }

    pub fn terminated() -> Self {
        Self {
            exit_code: None,
            terminated_by_observer: true,
        }
    }

    /// Observer-requested termination counts as success; otherwise the exit
    /// code must be zero.
    pub fn success(&self) -> bool {
        self.terminated_by_observer || self.exit_code == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_args() {
        let cmd = CommandSpec::new("./quantize", "/m")
            .arg("a.bin")
            .args(["b.bin", "2"]);
        assert_eq!(cmd.to_string(), "./quantize a.bin b.bin 2");
        assert_eq!(cmd.program_name(), "quantize");
    }

    #[test]
    fn test_bare_program_display() {
        let cmd = CommandSpec::new("make", "/m");
        assert_eq!(cmd.to_string(), "make");
    }

    #[test]
    fn test_outcome_success() {
        assert!(RunOutcome::exited(Some(0)).success());
        assert!(!RunOutcome::exited(Some(1)).success());
        // Killed by a signal: no code.
        assert!(!RunOutcome::exited(None).success());
        assert!(RunOutcome::terminated().success());
    }
}
