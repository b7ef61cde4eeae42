//! Output observers that watch a running command line by line.

use std::fmt;

use regex::Regex;
use tracing::{debug, info};

use crate::config::InstallConfig;
use crate::{DalaiError, Result};

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => f.write_str("stdout"),
            OutputStream::Stderr => f.write_str("stderr"),
        }
    }
}

/// Decision returned by an observer for each line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverAction {
    Continue,
    /// Kill the process; the run is reported as successful.
    Terminate,
}

/// Receives every output line of a supervised command.
pub trait OutputObserver: Send {
    fn on_line(&mut self, stream: OutputStream, line: &str) -> ObserverAction;
}

/// Observer that never interferes; the process runs until it exits.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughObserver;

impl OutputObserver for PassthroughObserver {
    fn on_line(&mut self, _stream: OutputStream, _line: &str) -> ObserverAction {
        ObserverAction::Continue
    }
}

/// Stops a command once it has returned to an interactive prompt.
///
/// Some tools wrapped through a shell never exit on their own and instead
/// print a prompt when idle. The first prompt can appear before the real work
/// starts, so the process is only stopped once the marker has been seen
/// `threshold` times. This depends on the exact output of the wrapped tool;
/// commands that exit normally finish on their exit code before it matters.
#[derive(Debug, Clone)]
pub struct IdlePromptObserver {
    marker: Regex,
    threshold: usize,
    seen: usize,
}

impl IdlePromptObserver {
    pub fn new(pattern: &str, threshold: usize) -> Result<Self> {
        let marker = Regex::new(pattern).map_err(|e| DalaiError::Config {
            message: format!("invalid idle-prompt pattern '{pattern}': {e}"),
        })?;
        Ok(Self {
            marker,
            threshold: threshold.max(1),
            seen: 0,
        })
    }

    /// The PowerShell prompt, two occurrences.
    pub fn powershell() -> Result<Self> {
        Self::new(
            InstallConfig::IDLE_PROMPT_PATTERN,
            InstallConfig::IDLE_PROMPT_COUNT,
        )
    }

    /// Number of markers seen so far.
    pub fn seen(&self) -> usize {
        self.seen
    }
}

impl OutputObserver for IdlePromptObserver {
    fn on_line(&mut self, _stream: OutputStream, line: &str) -> ObserverAction {
        if !self.marker.is_match(line) {
            return ObserverAction::Continue;
        }
        self.seen += 1;
        debug!("Idle prompt {}/{}: {}", self.seen, self.threshold, line);
        if self.seen >= self.threshold {
            info!("Idle prompt seen {} times, stopping process", self.seen);
            ObserverAction::Terminate
        } else {
            ObserverAction::Continue
        }
    }
}
