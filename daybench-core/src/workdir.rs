//! Working Directory
//!
//! The working directory is owned by exactly one orchestration run at a time.
//! It holds:
//!
//! ```text
//! <work_dir>/
//! ├── .daybench.lock     exclusive advisory lock for the run
//! ├── 01.in, 02.in ...   cached puzzle inputs (fetched only when absent)
//! ├── src/               staged sources, units renamed to dayNN.oc
//! │   └── run_all.oc     synthesized driver
//! ├── pgo/               transient profile fragments
//! ├── run_all            compiled driver
//! └── timings.json       report written by the driver
//! ```

use crate::fetch::{FetchError, Fetcher};
use crate::Unit;
use std::fs::{self, File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use thiserror::Error;

const LOCK_FILE: &str = ".daybench.lock";
const STAGING_DIR: &str = "src";
const PROFILE_DIR: &str = "pgo";
const DRIVER_SOURCE: &str = "run_all.oc";
const DRIVER_BINARY: &str = "run_all";

/// Name of the report file the compiled driver writes into its current directory
pub const REPORT_FILE: &str = "timings.json";

/// Errors raised while preparing the working directory
#[derive(Debug, Error)]
pub enum WorkDirError {
    /// Another run holds the lock
    #[error("Working directory {} is in use by another run", .0.display())]
    Locked(PathBuf),

    /// Filesystem error inside the working directory
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// An input could not be fetched
    #[error("Failed to fetch input for day {day}: {source}")]
    Fetch {
        /// Day being fetched
        day: crate::DayId,
        /// Underlying error
        #[source]
        source: FetchError,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> WorkDirError + '_ {
    move |source| WorkDirError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Whether an input came from the cache or the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStatus {
    /// Input file already existed
    Cached,
    /// Input was fetched and written
    Fetched,
}

/// Exclusive lock on a working directory, released on drop
#[derive(Debug)]
pub struct WorkDirLock {
    file: File,
    path: PathBuf,
}

impl WorkDirLock {
    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkDirLock {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock as well; unlock explicitly
        // so the release does not depend on drop order of the File.
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}

/// Handle to a working directory
#[derive(Debug, Clone)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    /// Create the directory if needed and return a handle to its absolute path
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, WorkDirError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(io_error(&root))?;
        let root = fs::canonicalize(&root).map_err(io_error(&root))?;
        Ok(Self { root })
    }

    /// Root of the working directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding staged sources
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    /// Path of the synthesized driver source
    pub fn driver_source_path(&self) -> PathBuf {
        self.staging_dir().join(DRIVER_SOURCE)
    }

    /// Path of the compiled driver
    pub fn artifact_path(&self) -> PathBuf {
        self.root.join(DRIVER_BINARY)
    }

    /// Directory for transient profile fragments
    pub fn profile_dir(&self) -> PathBuf {
        self.root.join(PROFILE_DIR)
    }

    /// Path the driver writes its report to
    pub fn report_path(&self) -> PathBuf {
        self.root.join(REPORT_FILE)
    }

    /// Input file path for a unit
    pub fn input_path(&self, unit: &Unit) -> PathBuf {
        self.root.join(unit.input_file_name())
    }

    /// Acquire the exclusive run lock without blocking.
    ///
    /// Fails with `WorkDirError::Locked` when another run holds it.
    pub fn lock(&self) -> Result<WorkDirLock, WorkDirError> {
        let path = self.root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(io_error(&path))?;

        let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if ret != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
                return Err(WorkDirError::Locked(self.root.clone()));
            }
            return Err(WorkDirError::Io { path, source: err });
        }

        tracing::debug!("Acquired lock {}", path.display());
        Ok(WorkDirLock { file, path })
    }

    /// Make sure the unit's input exists, fetching it when absent.
    ///
    /// Fetched inputs are written to a temporary file and renamed into place,
    /// so an interrupted run never leaves a truncated input behind.
    pub fn ensure_input(
        &self,
        unit: &Unit,
        fetcher: &dyn Fetcher,
    ) -> Result<InputStatus, WorkDirError> {
        let path = self.input_path(unit);
        if path.is_file() {
            return Ok(InputStatus::Cached);
        }

        let text = fetcher
            .fetch_input(unit.id())
            .map_err(|source| WorkDirError::Fetch {
                day: unit.id(),
                source,
            })?;

        let tmp = path.with_extension("in.partial");
        fs::write(&tmp, text).map_err(io_error(&tmp))?;
        fs::rename(&tmp, &path).map_err(io_error(&path))?;
        tracing::debug!("Fetched input for day {} into {}", unit.id(), path.display());
        Ok(InputStatus::Fetched)
    }

    /// Copy the source tree into the staging directory and rename every unit
    /// to its module name (`07.oc` → `day07.oc`).
    ///
    /// Any previous staging directory is replaced. A working directory that
    /// lives inside `source_dir` is left out of the copy.
    pub fn stage_sources(&self, source_dir: &Path, units: &[Unit]) -> Result<(), WorkDirError> {
        let staging = self.staging_dir();
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(io_error(&staging))?;
        }
        let excluded = [self.root.clone(), staging.clone()];
        copy_tree(source_dir, &staging, &excluded)?;

        for unit in units {
            let Some(file_name) = unit.source().file_name() else {
                continue;
            };
            let staged = staging.join(file_name);
            let ext = unit
                .source()
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or(crate::registry::DEFAULT_EXTENSION);
            let renamed = staging.join(format!("{}.{}", unit.module_name(), ext));
            fs::rename(&staged, &renamed).map_err(io_error(&staged))?;
        }
        Ok(())
    }

    /// Remove the staging directory (best-effort)
    pub fn clean_staging(&self) {
        let staging = self.staging_dir();
        if staging.exists() {
            if let Err(e) = fs::remove_dir_all(&staging) {
                tracing::warn!("Failed to remove {}: {}", staging.display(), e);
            }
        }
    }

    /// Remove a stale file if present (best-effort)
    pub fn remove_stale(&self, path: &Path) {
        match fs::remove_file(path) {
            Ok(()) => tracing::debug!("Removed stale {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove stale {}: {}", path.display(), e),
        }
    }
}

/// Recursive copy; directories whose canonical path is in `excluded` are skipped
fn copy_tree(from: &Path, to: &Path, excluded: &[PathBuf]) -> Result<(), WorkDirError> {
    fs::create_dir_all(to).map_err(io_error(to))?;
    for entry in fs::read_dir(from).map_err(io_error(from))? {
        let entry = entry.map_err(io_error(from))?;
        let src = entry.path();
        let dst = to.join(entry.file_name());
        if entry.file_type().map_err(io_error(&src))?.is_dir() {
            let canonical = fs::canonicalize(&src).map_err(io_error(&src))?;
            if excluded.contains(&canonical) {
                tracing::debug!("Not staging {}", src.display());
                continue;
            }
            copy_tree(&src, &dst, excluded)?;
        } else {
            fs::copy(&src, &dst).map_err(io_error(&src))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DayId;
    use std::cell::Cell;

    struct CountingFetcher {
        calls: Cell<usize>,
    }

    impl Fetcher for CountingFetcher {
        fn fetch_input(&self, day: DayId) -> Result<String, FetchError> {
            self.calls.set(self.calls.get() + 1);
            Ok(format!("input for {}\n", day))
        }

        fn fetch_expected(&self, _day: DayId) -> Result<(i64, i64), FetchError> {
            Ok((0, 0))
        }
    }

    fn unit(id: u32, dir: &Path) -> Unit {
        Unit::new(DayId::new(id).unwrap(), dir.join(format!("{:02}.oc", id)))
    }

    #[test]
    fn test_layout() {
        let dir = tempfile::tempdir().unwrap();
        let work = WorkDir::create(dir.path().join("build")).unwrap();
        assert!(work.root().is_dir());
        assert!(work.root().is_absolute());
        assert_eq!(work.report_path(), work.root().join("timings.json"));
        assert_eq!(
            work.driver_source_path(),
            work.root().join("src").join("run_all.oc")
        );
    }

    #[test]
    fn test_fetch_only_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let work = WorkDir::create(dir.path()).unwrap();
        let fetcher = CountingFetcher {
            calls: Cell::new(0),
        };
        let u = unit(3, dir.path());

        assert_eq!(work.ensure_input(&u, &fetcher).unwrap(), InputStatus::Fetched);
        assert_eq!(work.ensure_input(&u, &fetcher).unwrap(), InputStatus::Cached);
        assert_eq!(fetcher.calls.get(), 1);

        let text = fs::read_to_string(work.input_path(&u)).unwrap();
        assert_eq!(text, "input for 03\n");
        assert!(!work.root().join("03.in.partial").exists());
    }

    #[test]
    fn test_lock_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let work = WorkDir::create(dir.path()).unwrap();

        let guard = work.lock().unwrap();
        assert!(matches!(work.lock(), Err(WorkDirError::Locked(_))));
        drop(guard);

        // Released on drop
        let _again = work.lock().unwrap();
    }

    #[test]
    fn test_stage_sources_renames_units() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("lib")).unwrap();
        fs::write(src.join("01.oc"), "one").unwrap();
        fs::write(src.join("12.oc"), "twelve").unwrap();
        fs::write(src.join("lib").join("grid.oc"), "helper").unwrap();

        let work = WorkDir::create(dir.path().join("build")).unwrap();
        let units = vec![unit(1, &src), unit(12, &src)];
        work.stage_sources(&src, &units).unwrap();

        let staging = work.staging_dir();
        assert_eq!(fs::read_to_string(staging.join("day01.oc")).unwrap(), "one");
        assert_eq!(fs::read_to_string(staging.join("day12.oc")).unwrap(), "twelve");
        assert!(staging.join("lib").join("grid.oc").is_file());
        assert!(!staging.join("01.oc").exists());

        // Restaging replaces the previous copy
        work.stage_sources(&src, &units).unwrap();
        assert!(staging.join("day01.oc").is_file());

        work.clean_staging();
        assert!(!staging.exists());
    }

    #[test]
    fn test_stage_sources_with_work_dir_inside_source_dir() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("lib")).unwrap();
        fs::write(src.join("01.oc"), "one").unwrap();
        fs::write(src.join("lib").join("grid.oc"), "helper").unwrap();

        let work = WorkDir::create(src.join("build")).unwrap();
        fs::write(work.root().join("01.in"), "cached").unwrap();
        let units = vec![unit(1, &src)];
        work.stage_sources(&src, &units).unwrap();

        let staging = work.staging_dir();
        assert!(staging.join("day01.oc").is_file());
        assert!(staging.join("lib").join("grid.oc").is_file());
        assert!(!staging.join("build").exists());

    }

    #[test]
    fn test_stage_sources_with_work_dir_as_source_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("01.oc"), "one").unwrap();

        let work = WorkDir::create(dir.path()).unwrap();
        let units = vec![unit(1, dir.path())];
        work.stage_sources(dir.path(), &units).unwrap();

        let staging = work.staging_dir();
        assert!(staging.join("day01.oc").is_file());
        assert!(!staging.join("src").exists());
    }

    #[test]
    fn test_remove_stale_missing_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let work = WorkDir::create(dir.path()).unwrap();
        work.remove_stale(&work.report_path());

        fs::write(work.report_path(), "{}").unwrap();
        work.remove_stale(&work.report_path());
        assert!(!work.report_path().exists());
    }
}
