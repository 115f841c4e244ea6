//! Process Supervision
//!
//! Launches the compiled driver as a child process and watches it:
//!
//! ```text
//! spawn ──> poll try_wait ──┬── exited ──> ExitKind::{Success, Code, Signal}
//!                           └── deadline ──> SIGTERM ──> grace ──> SIGKILL ──> TimedOut
//! ```
//!
//! The driver's stdout (puzzle answers, printed every repetition) is
//! discarded. Stderr is drained on a thread so a chatty child never blocks on
//! a full pipe; its tail is kept for error messages.

use daybench_build::{ExitKind, LaunchError, LaunchOutcome, Launcher};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Stderr lines kept for diagnostics
const STDERR_TAIL_LINES: usize = 20;

/// Interval between liveness checks
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Send SIGTERM to a process. Returns `Err` if the signal could not be delivered.
fn send_sigterm(pid: u32) -> Result<(), std::io::Error> {
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Launches programs as child processes with an optional watchdog
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    timeout: Option<Duration>,
    grace: Duration,
}

impl ProcessLauncher {
    /// Launcher whose children are killed after `timeout` (`None` = never)
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            grace: Duration::from_millis(500),
        }
    }

    /// Time between SIGTERM and SIGKILL
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    fn wait(&self, child: &mut Child, start: Instant) -> std::io::Result<ExitKind> {
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(exit_kind(status));
            }
            if let Some(timeout) = self.timeout {
                if start.elapsed() >= timeout {
                    self.terminate(child)?;
                    return Ok(ExitKind::TimedOut);
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// SIGTERM, wait out the grace period, then SIGKILL
    fn terminate(&self, child: &mut Child) -> std::io::Result<()> {
        tracing::warn!("Watchdog expired, terminating pid {}", child.id());
        // The child may already be gone
        let _ = send_sigterm(child.id());

        let deadline = Instant::now() + self.grace;
        while Instant::now() < deadline {
            if child.try_wait()?.is_some() {
                return Ok(());
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        let _ = child.kill();
        child.wait()?;
        Ok(())
    }
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Launcher for ProcessLauncher {
    fn launch(
        &self,
        program: &Path,
        args: &[OsString],
        cwd: &Path,
    ) -> Result<LaunchOutcome, LaunchError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        tracing::debug!("Launching {:?} in {}", command, cwd.display());

        let start = Instant::now();
        let mut child = command.spawn().map_err(|source| LaunchError::Spawn {
            program: program.to_path_buf(),
            source,
        })?;

        let drain = child.stderr.take().map(drain_stderr);
        let exit = self.wait(&mut child, start).map_err(|source| LaunchError::Wait {
            program: program.to_path_buf(),
            source,
        });
        let elapsed = start.elapsed();

        // After exit (or kill) the pipe reaches EOF and the drain finishes
        let stderr_tail = drain
            .and_then(|handle| handle.join().ok())
            .map(|lines| lines.into_iter().collect::<Vec<_>>().join("\n"))
            .unwrap_or_default();

        Ok(LaunchOutcome {
            exit: exit?,
            stderr_tail,
            elapsed,
        })
    }
}

fn drain_stderr(stderr: std::process::ChildStderr) -> JoinHandle<VecDeque<String>> {
    std::thread::spawn(move || {
        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
        for line in BufReader::new(stderr).lines() {
            let Ok(line) = line else { break };
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        tail
    })
}

#[cfg(unix)]
fn exit_kind(status: ExitStatus) -> ExitKind {
    use std::os::unix::process::ExitStatusExt;
    match (status.code(), status.signal()) {
        (Some(0), _) => ExitKind::Success,
        (Some(code), _) => ExitKind::Code(code),
        (None, Some(sig)) => ExitKind::Signal(sig),
        (None, None) => ExitKind::Code(-1),
    }
}
