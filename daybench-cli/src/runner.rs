//! Trial Runner
//!
//! One trial is one launch of the compiled driver inside the working
//! directory. The driver times every unit itself and leaves `timings.json`
//! behind; the runner only guarantees that the report it hands on was written
//! by this launch.

use daybench_build::{ExitKind, LaunchError, Launcher, driver_args};
use daybench_core::WorkDir;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a single trial
#[derive(Debug, Error)]
pub enum RunError {
    /// The driver could not be launched
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// The driver exited unsuccessfully
    #[error("Driver failed with {exit}{}", stderr_suffix(.stderr_tail))]
    Execution {
        /// How the driver ended
        exit: ExitKind,
        /// Last lines of stderr
        stderr_tail: String,
    },

    /// Clean exit without a report
    #[error("Driver exited cleanly but wrote no report at {}", .0.display())]
    MissingReport(PathBuf),

    /// The watchdog killed the driver
    #[error("Driver did not finish within {0:?}")]
    Timeout(Duration),
}

fn stderr_suffix(tail: &str) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!(":\n{}", tail)
    }
}

/// Launches the driver once per trial
pub struct TrialRunner<'a> {
    launcher: &'a dyn Launcher,
    repetitions: Option<u32>,
    timeout: Option<Duration>,
}

impl<'a> TrialRunner<'a> {
    /// Runner passing `repetitions` to the driver
    pub fn new(launcher: &'a dyn Launcher, repetitions: Option<u32>) -> Self {
        Self {
            launcher,
            repetitions,
            timeout: None,
        }
    }

    /// Watchdog duration reported in `RunError::Timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the driver once and return the path of the fresh report
    pub fn run(&self, artifact: &Path, workdir: &WorkDir) -> Result<PathBuf, RunError> {
        let report = workdir.report_path();
        workdir.remove_stale(&report);

        let args = driver_args(workdir.root(), self.repetitions);
        let outcome = self.launcher.launch(artifact, &args, workdir.root())?;
        tracing::debug!("Driver finished in {:.3?} ({})", outcome.elapsed, outcome.exit);

        match outcome.exit {
            ExitKind::Success => {}
            ExitKind::TimedOut => {
                return Err(RunError::Timeout(self.timeout.unwrap_or(outcome.elapsed)));
            }
            exit => {
                return Err(RunError::Execution {
                    exit,
                    stderr_tail: outcome.stderr_tail,
                });
            }
        }

        if !report.is_file() {
            return Err(RunError::MissingReport(report));
        }
        Ok(report)
    }
}
