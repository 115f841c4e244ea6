//! Program Launching
//!
//! Both the profiling run and every measured run execute the compiled driver
//! through a `Launcher`, so tests can substitute the process layer.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors starting or waiting for a launched program
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The program could not be started
    #[error("Failed to spawn {}: {source}", .program.display())]
    Spawn {
        /// Program involved
        program: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the running program failed
    #[error("Failed to wait for {}: {source}", .program.display())]
    Wait {
        /// Program involved
        program: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// How a launched program ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// Exit status zero
    Success,
    /// Non-zero exit status
    Code(i32),
    /// Terminated by a signal
    Signal(i32),
    /// Killed by the watchdog
    TimedOut,
}

impl std::fmt::Display for ExitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitKind::Success => write!(f, "exit status 0"),
            ExitKind::Code(code) => write!(f, "exit status {}", code),
            ExitKind::Signal(sig) => write!(f, "killed by signal {}", sig),
            ExitKind::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Result of one launch
#[derive(Debug, Clone)]
pub struct LaunchOutcome {
    /// How the program ended
    pub exit: ExitKind,
    /// Last lines of the program's stderr
    pub stderr_tail: String,
    /// Wall time from spawn to exit
    pub elapsed: Duration,
}

impl LaunchOutcome {
    /// Whether the program exited with status zero
    pub fn success(&self) -> bool {
        self.exit == ExitKind::Success
    }
}

/// Runs a program to completion
pub trait Launcher {
    /// Run `program` with `args`, current directory `cwd`
    fn launch(
        &self,
        program: &Path,
        args: &[OsString],
        cwd: &Path,
    ) -> Result<LaunchOutcome, LaunchError>;
}
