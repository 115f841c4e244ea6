//! Staged PGO Build
//!
//! ```text
//! Start ─┬─ (PGO strategy) ──> InstrumentedCompile ──> ProfilingRun
//!        │                          ──> [ProfileMerge] ──> OptimizedRecompile ──> Done
//!        └─ (none) ─────────> PlainCompile ──> Done
//! ```
//!
//! The profiling run executes the instrumented driver once over the real
//! inputs, so the optimized build is tuned for the workload it will be
//! measured on. Every stage either completes or aborts the build.

use crate::launch::Launcher;
use crate::platform::PlatformFamily;
use crate::strategy::{PgoStrategy, strategy_for};
use crate::toolchain::{DEFAULT_BASE_FLAGS, Toolchain};
use daybench_core::WorkDir;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Stages of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    /// Single compile without profiling
    PlainCompile,
    /// Compile with profile instrumentation
    InstrumentedCompile,
    /// One run of the instrumented driver
    ProfilingRun,
    /// Merge of raw profile fragments
    ProfileMerge,
    /// Recompile using the collected profile
    OptimizedRecompile,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStage::PlainCompile => "plain compile",
            BuildStage::InstrumentedCompile => "instrumented compile",
            BuildStage::ProfilingRun => "profiling run",
            BuildStage::ProfileMerge => "profile merge",
            BuildStage::OptimizedRecompile => "optimized recompile",
        };
        f.write_str(name)
    }
}

/// Errors raised while building the driver
#[derive(Debug, Error)]
pub enum BuildError {
    /// The compiler ran and failed; diagnostics are verbatim
    #[error("{stage} failed:\n{diagnostics}")]
    Compile {
        /// Stage that failed
        stage: BuildStage,
        /// Compiler output
        diagnostics: String,
    },

    /// The compiler could not be started
    #[error("Failed to start the toolchain for {stage}: {source}")]
    Toolchain {
        /// Stage that failed
        stage: BuildStage,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The instrumented driver failed
    #[error("Profiling run failed: {0}")]
    ProfilingRun(String),

    /// No usable profile after the profiling run
    #[error("Profile merge failed: {0}")]
    ProfileMerge(String),

    /// Filesystem error around the build
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Where a build reads, writes, and runs
#[derive(Debug, Clone)]
pub struct BuildPlan {
    /// Driver source to compile
    pub source: PathBuf,
    /// Final artifact path (also used for the instrumented binary)
    pub artifact: PathBuf,
    /// Transient directory for profile fragments
    pub profile_dir: PathBuf,
    /// Current directory of the profiling run
    pub run_dir: PathBuf,
    /// Arguments of the profiling run
    pub run_args: Vec<OsString>,
    /// Report the profiling run leaves behind, deleted afterwards
    pub report_path: PathBuf,
}

impl BuildPlan {
    /// Plan for the driver staged in `workdir`
    pub fn for_workdir(workdir: &WorkDir, repetitions: Option<u32>) -> Self {
        Self {
            source: workdir.driver_source_path(),
            artifact: workdir.artifact_path(),
            profile_dir: workdir.profile_dir(),
            run_dir: workdir.root().to_path_buf(),
            run_args: driver_args(workdir.root(), repetitions),
            report_path: workdir.report_path(),
        }
    }
}

/// Driver arguments: input directory, then the optional repetition override
pub fn driver_args(input_dir: &Path, repetitions: Option<u32>) -> Vec<OsString> {
    let mut args = vec![input_dir.as_os_str().to_os_string()];
    if let Some(reps) = repetitions {
        args.push(reps.to_string().into());
    }
    args
}

/// What a finished build went through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    /// Compiled driver
    pub artifact: PathBuf,
    /// Platform family the build ran for
    pub platform: PlatformFamily,
    /// Stages completed, in order
    pub stages: Vec<BuildStage>,
    /// Number of compiler runs
    pub compiler_invocations: usize,
}

/// Drives the toolchain through the build stages for a platform
pub struct StagedBuilder<'a> {
    toolchain: &'a dyn Toolchain,
    launcher: &'a dyn Launcher,
    base_flags: Vec<String>,
}

impl<'a> StagedBuilder<'a> {
    /// Builder with the default base flags
    pub fn new(toolchain: &'a dyn Toolchain, launcher: &'a dyn Launcher) -> Self {
        Self {
            toolchain,
            launcher,
            base_flags: DEFAULT_BASE_FLAGS.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Replace the optimization flags shared by every compile
    pub fn with_base_flags(mut self, flags: Vec<String>) -> Self {
        self.base_flags = flags;
        self
    }

    /// Flags shared by every compile
    pub fn base_flags(&self) -> &[String] {
        &self.base_flags
    }

    /// Build the artifact described by `plan`
    pub fn build(
        &self,
        plan: &BuildPlan,
        platform: PlatformFamily,
    ) -> Result<BuildResult, BuildError> {
        let mut result = BuildResult {
            artifact: plan.artifact.clone(),
            platform,
            stages: Vec::new(),
            compiler_invocations: 0,
        };

        match strategy_for(platform) {
            None => {
                tracing::info!("No PGO strategy for {}, compiling once", platform);
                self.compile(plan, BuildStage::PlainCompile, &[], &mut result)?;
            }
            Some(strategy) => {
                tracing::info!("Building with {} PGO", strategy.name());
                self.build_with_profile(plan, strategy, &mut result)?;
            }
        }

        Ok(result)
    }

    fn build_with_profile(
        &self,
        plan: &BuildPlan,
        strategy: &dyn PgoStrategy,
        result: &mut BuildResult,
    ) -> Result<(), BuildError> {
        let profile = ProfileDir::create(&plan.profile_dir)?;

        let instrument = strategy.instrument_flags(profile.path());
        self.compile(plan, BuildStage::InstrumentedCompile, &instrument, result)?;

        self.profiling_run(plan)?;
        result.stages.push(BuildStage::ProfilingRun);

        let fragments = collect_fragments(profile.path(), strategy.fragment_extension())
            .map_err(|source| BuildError::Io {
                path: profile.path().to_path_buf(),
                source,
            })?;
        if fragments.is_empty() {
            return Err(BuildError::ProfileMerge(format!(
                "no profile fragments (*.{}) in {}",
                strategy.fragment_extension(),
                profile.path().display()
            )));
        }
        tracing::debug!("Collected {} profile fragment(s)", fragments.len());

        if strategy.needs_merge() {
            let merged = strategy.profile_artifact(profile.path());
            let out = self
                .toolchain
                .merge_profiles(&fragments, &merged)
                .map_err(|e| BuildError::ProfileMerge(e.to_string()))?;
            if !out.success {
                return Err(BuildError::ProfileMerge(out.diagnostics));
            }
            result.stages.push(BuildStage::ProfileMerge);
        }

        let use_flags = strategy.use_flags(profile.path());
        self.compile(plan, BuildStage::OptimizedRecompile, &use_flags, result)?;

        Ok(())
    }

    fn compile(
        &self,
        plan: &BuildPlan,
        stage: BuildStage,
        stage_flags: &[String],
        result: &mut BuildResult,
    ) -> Result<(), BuildError> {
        remove_if_exists(&plan.artifact)?;

        let mut cflags = self.base_flags.clone();
        cflags.extend_from_slice(stage_flags);

        tracing::info!("{}: {}", stage, plan.source.display());
        result.compiler_invocations += 1;
        let out = self
            .toolchain
            .compile(&plan.source, &plan.artifact, &cflags)
            .map_err(|source| BuildError::Toolchain { stage, source })?;
        if !out.success {
            return Err(BuildError::Compile {
                stage,
                diagnostics: out.diagnostics,
            });
        }

        result.stages.push(stage);
        Ok(())
    }

    fn profiling_run(&self, plan: &BuildPlan) -> Result<(), BuildError> {
        tracing::info!("{}: {}", BuildStage::ProfilingRun, plan.artifact.display());
        let outcome = self
            .launcher
            .launch(&plan.artifact, &plan.run_args, &plan.run_dir)
            .map_err(|e| BuildError::ProfilingRun(e.to_string()))?;

        // The profiling run's timings are meaningless
        remove_if_exists(&plan.report_path)?;

        if !outcome.success() {
            let mut reason = outcome.exit.to_string();
            if !outcome.stderr_tail.is_empty() {
                reason.push('\n');
                reason.push_str(&outcome.stderr_tail);
            }
            return Err(BuildError::ProfilingRun(reason));
        }
        Ok(())
    }
}

/// Profile directory that exists for the lifetime of the guard
struct ProfileDir {
    path: PathBuf,
}

impl ProfileDir {
    /// Start from an empty directory so stale fragments never leak in
    fn create(path: &Path) -> Result<Self, BuildError> {
        let io = |source| BuildError::Io {
            path: path.to_path_buf(),
            source,
        };
        if path.exists() {
            fs::remove_dir_all(path).map_err(io)?;
        }
        fs::create_dir_all(path).map_err(io)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProfileDir {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Files with `extension` anywhere under `dir`, sorted
fn collect_fragments(dir: &Path, extension: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some(extension) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

fn remove_if_exists(path: &Path) -> Result<(), BuildError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(BuildError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launch::{ExitKind, LaunchError, LaunchOutcome};
    use crate::toolchain::ToolOutput;
    use std::cell::{Cell, RefCell};
    use std::time::Duration;

    /// Records compiles and merges; writes a placeholder artifact on success
    #[derive(Default)]
    struct MockToolchain {
        compiles: RefCell<Vec<Vec<String>>>,
        merges: Cell<usize>,
        fail_stage_flag: Option<&'static str>,
        fail_merge: bool,
    }

    impl Toolchain for MockToolchain {
        fn compile(
            &self,
            _source: &Path,
            output: &Path,
            cflags: &[String],
        ) -> std::io::Result<ToolOutput> {
            self.compiles.borrow_mut().push(cflags.to_vec());
            // Artifact must have been removed before every compile
            assert!(!output.exists(), "stale artifact at {}", output.display());

            if let Some(flag) = self.fail_stage_flag {
                if cflags.iter().any(|f| f.starts_with(flag)) {
                    return Ok(ToolOutput {
                        success: false,
                        code: Some(1),
                        diagnostics: "run_all.oc:3:5: error: unknown symbol".to_string(),
                    });
                }
            }
            fs::write(output, "binary")?;
            Ok(ToolOutput {
                success: true,
                code: Some(0),
                diagnostics: String::new(),
            })
        }

        fn merge_profiles(
            &self,
            fragments: &[PathBuf],
            output: &Path,
        ) -> std::io::Result<ToolOutput> {
            self.merges.set(self.merges.get() + 1);
            assert!(!fragments.is_empty());
            if self.fail_merge {
                return Ok(ToolOutput {
                    success: false,
                    code: Some(1),
                    diagnostics: "malformed profile".to_string(),
                });
            }
            fs::write(output, "merged")?;
            Ok(ToolOutput {
                success: true,
                code: Some(0),
                diagnostics: String::new(),
            })
        }
    }

    /// Pretends to be the instrumented driver: writes a fragment and a report
    struct MockLauncher {
        runs: Cell<usize>,
        fragment: Option<(PathBuf, &'static str)>,
        exit: ExitKind,
    }

    impl MockLauncher {
        fn writing(profile_dir: &Path, extension: &'static str) -> Self {
            Self {
                runs: Cell::new(0),
                fragment: Some((profile_dir.to_path_buf(), extension)),
                exit: ExitKind::Success,
            }
        }
    }

    impl Launcher for MockLauncher {
        fn launch(
            &self,
            program: &Path,
            args: &[OsString],
            cwd: &Path,
        ) -> Result<LaunchOutcome, LaunchError> {
            self.runs.set(self.runs.get() + 1);
            assert!(program.exists());
            assert_eq!(Path::new(&args[0]), cwd);

            if let Some((dir, ext)) = &self.fragment {
                fs::write(dir.join(format!("4242.{}", ext)), "profile").unwrap();
            }
            fs::write(cwd.join("timings.json"), "{}").unwrap();
            Ok(LaunchOutcome {
                exit: self.exit,
                stderr_tail: String::new(),
                elapsed: Duration::from_millis(1),
            })
        }
    }

    fn plan(dir: &Path) -> BuildPlan {
        let work = WorkDir::create(dir).unwrap();
        fs::create_dir_all(work.staging_dir()).unwrap();
        fs::write(work.driver_source_path(), "def main() {}").unwrap();
        fs::write(work.artifact_path(), "stale").unwrap();
        BuildPlan::for_workdir(&work, None)
    }

    #[test]
    fn test_plain_compile_without_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan(dir.path());
        let toolchain = MockToolchain::default();
        let launcher = MockLauncher::writing(&plan.profile_dir, "gcda");

        let result = StagedBuilder::new(&toolchain, &launcher)
            .build(&plan, PlatformFamily::Other)
            .unwrap();

        assert_eq!(result.stages, vec![BuildStage::PlainCompile]);
        assert_eq!(result.compiler_invocations, 1);
        assert_eq!(launcher.runs.get(), 0);
        assert_eq!(toolchain.merges.get(), 0);
        assert_eq!(
            toolchain.compiles.borrow()[0],
            vec!["-O3", "-march=native", "-funroll-loops", "-Wno-unused-result"]
        );
        assert_eq!(fs::read_to_string(&plan.artifact).unwrap(), "binary");
        assert!(!plan.profile_dir.exists());
    }

    #[test]
    fn test_linux_uses_fragments_directly() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan(dir.path());
        let toolchain = MockToolchain::default();
        let launcher = MockLauncher::writing(&plan.profile_dir, "gcda");

        let result = StagedBuilder::new(&toolchain, &launcher)
            .build(&plan, PlatformFamily::Linux)
            .unwrap();

        assert_eq!(
            result.stages,
            vec![
                BuildStage::InstrumentedCompile,
                BuildStage::ProfilingRun,
                BuildStage::OptimizedRecompile
            ]
        );
        assert_eq!(result.compiler_invocations, 2);
        assert_eq!(launcher.runs.get(), 1);
        assert_eq!(toolchain.merges.get(), 0);

        let compiles = toolchain.compiles.borrow();
        let profile = plan.profile_dir.display().to_string();
        assert!(compiles[0].contains(&format!("-fprofile-generate={}", profile)));
        assert!(compiles[1].contains(&format!("-fprofile-use={}", profile)));
        assert!(compiles[1].contains(&"-O3".to_string()));

        // Profiling run leaves no report or profile behind
        assert!(!plan.report_path.exists());
        assert!(!plan.profile_dir.exists());
    }

    #[test]
    fn test_macos_merges_before_recompile() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan(dir.path());
        let toolchain = MockToolchain::default();
        let launcher = MockLauncher::writing(&plan.profile_dir, "profraw");

        let result = StagedBuilder::new(&toolchain, &launcher)
            .build(&plan, PlatformFamily::MacOs)
            .unwrap();

        assert_eq!(
            result.stages,
            vec![
                BuildStage::InstrumentedCompile,
                BuildStage::ProfilingRun,
                BuildStage::ProfileMerge,
                BuildStage::OptimizedRecompile
            ]
        );
        assert_eq!(result.compiler_invocations, 2);
        assert_eq!(toolchain.merges.get(), 1);
        let compiles = toolchain.compiles.borrow();
        assert!(compiles[1].iter().any(|f| f.starts_with("-fprofile-instr-use=")
            && f.ends_with("merged.profdata")));
        assert!(!plan.profile_dir.exists());
    }

    #[test]
    fn test_compile_error_carries_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan(dir.path());
        let toolchain = MockToolchain {
            fail_stage_flag: Some("-O3"),
            ..Default::default()
        };
        let launcher = MockLauncher::writing(&plan.profile_dir, "gcda");

        let err = StagedBuilder::new(&toolchain, &launcher)
            .build(&plan, PlatformFamily::Linux)
            .unwrap_err();

        match err {
            BuildError::Compile { stage, diagnostics } => {
                assert_eq!(stage, BuildStage::InstrumentedCompile);
                assert_eq!(diagnostics, "run_all.oc:3:5: error: unknown symbol");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(launcher.runs.get(), 0);
        assert!(!plan.profile_dir.exists());
        assert!(!plan.artifact.exists());
    }

    #[test]
    fn test_failed_recompile_cleans_profile_dir() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan(dir.path());
        let toolchain = MockToolchain {
            fail_stage_flag: Some("-fprofile-use"),
            ..Default::default()
        };
        let launcher = MockLauncher::writing(&plan.profile_dir, "gcda");

        let err = StagedBuilder::new(&toolchain, &launcher)
            .build(&plan, PlatformFamily::Linux)
            .unwrap_err();

        assert!(matches!(
            err,
            BuildError::Compile {
                stage: BuildStage::OptimizedRecompile,
                ..
            }
        ));
        assert!(!plan.profile_dir.exists());
    }

    #[test]
    fn test_profiling_run_failure() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan(dir.path());
        let toolchain = MockToolchain::default();
        let launcher = MockLauncher {
            exit: ExitKind::Code(3),
            ..MockLauncher::writing(&plan.profile_dir, "gcda")
        };

        let err = StagedBuilder::new(&toolchain, &launcher)
            .build(&plan, PlatformFamily::Linux)
            .unwrap_err();

        assert!(matches!(err, BuildError::ProfilingRun(ref r) if r.contains("exit status 3")));
        assert_eq!(toolchain.compiles.borrow().len(), 1);
        assert!(!plan.report_path.exists());
    }

    #[test]
    fn test_missing_fragments_is_merge_error() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan(dir.path());
        let toolchain = MockToolchain::default();
        let launcher = MockLauncher {
            fragment: None,
            ..MockLauncher::writing(&plan.profile_dir, "gcda")
        };

        let err = StagedBuilder::new(&toolchain, &launcher)
            .build(&plan, PlatformFamily::Linux)
            .unwrap_err();

        assert!(matches!(err, BuildError::ProfileMerge(ref m) if m.contains("no profile fragments")));
        assert_eq!(toolchain.compiles.borrow().len(), 1);
    }

    #[test]
    fn test_merge_failure() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan(dir.path());
        let toolchain = MockToolchain {
            fail_merge: true,
            ..Default::default()
        };
        let launcher = MockLauncher::writing(&plan.profile_dir, "profraw");

        let err = StagedBuilder::new(&toolchain, &launcher)
            .build(&plan, PlatformFamily::MacOs)
            .unwrap_err();

        assert!(matches!(err, BuildError::ProfileMerge(ref m) if m == "malformed profile"));
        assert!(!plan.profile_dir.exists());
    }

    #[test]
    fn test_stale_profile_fragments_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan(dir.path());
        fs::create_dir_all(&plan.profile_dir).unwrap();
        fs::write(plan.profile_dir.join("old.gcda"), "stale").unwrap();

        let toolchain = MockToolchain::default();
        let launcher = MockLauncher {
            fragment: None,
            ..MockLauncher::writing(&plan.profile_dir, "gcda")
        };

        // Only the stale fragment would be found if the directory were reused
        assert!(
            StagedBuilder::new(&toolchain, &launcher)
                .build(&plan, PlatformFamily::Linux)
                .is_err()
        );
    }

    #[test]
    fn test_driver_args() {
        let dir = Path::new("/w");
        assert_eq!(driver_args(dir, None), vec![OsString::from("/w")]);
        assert_eq!(
            driver_args(dir, Some(5)),
            vec![OsString::from("/w"), OsString::from("5")]
        );
    }
}
