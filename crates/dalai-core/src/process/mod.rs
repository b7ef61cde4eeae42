//! Process supervision.
//!
//! This module provides:
//! - `CommandSpec` / `RunOutcome` - what to run and how it ended
//! - `OutputObserver` - per-line hooks that may stop a running command
//! - `CommandRunner` / `ProcessRunner` - sequential, awaited execution

mod command;
mod observer;
mod runner;

pub use command::{CommandSpec, RunOutcome};
pub use observer::{
    IdlePromptObserver, ObserverAction, OutputObserver, OutputStream, PassthroughObserver,
};
pub use runner::{CommandRunner, ProcessRunner};

#[cfg(test)]
pub(crate) mod fake;
