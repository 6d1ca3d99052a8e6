//! Command-line assembly and execution for the vendor tools
//!
//! `kwxsync` and `kwadmin` are plain executables found on `PATH`. This module
//! builds their argument lists, expands `$VAR` references in user-supplied
//! option strings, and runs them with an explicit environment.

mod args;
mod expand;
#[cfg(test)]
pub(crate) mod mock;
mod runner;

pub use args::{tokenize, ArgumentList};
pub use expand::expand_env;
pub use runner::{CommandOutput, CommandRunner, ProcessRunner};

use std::collections::BTreeMap;
use std::io;
use thiserror::Error;

/// Environment passed to child processes, kept sorted for stable output
pub type EnvMap = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Cannot run an empty command")]
    EmptyCommand,

    #[error("Unbalanced quote in option string: {0}")]
    UnbalancedQuote(String),

    #[error("Failed to start {program}. Is it installed and on PATH? ({source})")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}")]
    Failed {
        program: String,
        status: String,
        code: Option<i32>,
        stderr: String,
    },
}
