//! Benchmark Pipeline
//!
//! ```text
//! discover ─> synthesize ─> prepare ─> fetch ─> compile ─> run ×N ─> aggregate
//!  units       driver        lock,      inputs   staged     driver     per-unit
//!              text          staging             PGO        launches   means
//! ```
//!
//! Stages are strictly sequential and fail fast. The working directory lock
//! is held from `prepare` to the end; staged sources are removed on every
//! exit path unless they are kept on request.

use crate::runner::TrialRunner;
use daybench_build::{BuildPlan, BuildResult, Launcher, PlatformFamily, StagedBuilder, Toolchain};
use daybench_codegen::{DriverOptions, synthesize};
use daybench_core::{
    DaySelection, DiscoveryError, Fetcher, InputStatus, Unit, WorkDir, WorkDirError,
    discover_with_extension,
};
use daybench_report::{AggregateReport, RawReport, aggregate, check_units};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Pipeline stages, as named in failure messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Unit discovery
    Discover,
    /// Driver synthesis
    Synthesize,
    /// Working directory, lock and staging
    Prepare,
    /// Input fetching
    Fetch,
    /// Staged build
    Compile,
    /// Driver launches
    Run,
    /// Report parsing and aggregation
    Aggregate,
    /// Writing results
    Output,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Discover => "discover",
            Stage::Synthesize => "synthesize",
            Stage::Prepare => "prepare",
            Stage::Fetch => "fetch",
            Stage::Compile => "compile",
            Stage::Run => "run",
            Stage::Aggregate => "aggregate",
            Stage::Output => "output",
        };
        f.write_str(name)
    }
}

/// A stage failure with its cause
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    /// Stage that failed
    pub stage: Stage,
    /// Underlying error
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl PipelineError {
    /// Wrap `source` as a failure of `stage`
    pub fn new(stage: Stage, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

/// Attach a stage to a lower-level error
pub trait InStage<T> {
    /// Map the error into a `PipelineError` for `stage`
    fn in_stage(self, stage: Stage) -> Result<T, PipelineError>;
}

impl<T, E> InStage<T> for Result<T, E>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn in_stage(self, stage: Stage) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError::new(stage, e))
    }
}

/// Everything a session needs besides its collaborators
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Directory holding the day solutions
    pub source_dir: PathBuf,
    /// Working directory
    pub work_dir: PathBuf,
    /// Source file extension
    pub extension: String,
    /// Days to keep (`None` = all)
    pub selection: Option<DaySelection>,
    /// Driver-internal repetitions (`None` = driver default)
    pub repetitions: Option<i64>,
    /// Outer launches of the driver
    pub runs: usize,
    /// Leading launches discarded
    pub warmup_runs: usize,
    /// PGO platform family
    pub platform: PlatformFamily,
    /// Optimization flags for every compile
    pub base_flags: Vec<String>,
    /// Watchdog for one launch
    pub timeout: Option<Duration>,
    /// Keep the staged sources afterwards
    pub keep_sources: bool,
    /// Draw progress bars
    pub show_progress: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("src"),
            work_dir: PathBuf::from("build"),
            extension: daybench_core::DEFAULT_EXTENSION.to_string(),
            selection: None,
            repetitions: None,
            runs: 1,
            warmup_runs: 0,
            platform: PlatformFamily::detect(),
            base_flags: daybench_build::DEFAULT_BASE_FLAGS
                .iter()
                .map(|f| f.to_string())
                .collect(),
            timeout: None,
            keep_sources: false,
            show_progress: false,
        }
    }
}

/// Result of a successful session
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// Units benchmarked
    pub units: Vec<Unit>,
    /// Repetition override passed to the driver
    pub repetitions: Option<u32>,
    /// How the driver was built
    pub build: BuildResult,
    /// Aggregated timings
    pub report: AggregateReport,
}

/// Discover the units of a session, narrowed to the selected days
pub fn discover_units(options: &PipelineOptions) -> Result<Vec<Unit>, DiscoveryError> {
    let units = discover_with_extension(&options.source_dir, &options.extension)?;
    match &options.selection {
        Some(selection) => selection.apply(units, &options.source_dir),
        None => Ok(units),
    }
}

/// One benchmark session over a source tree
pub struct Pipeline<'a> {
    options: PipelineOptions,
    fetcher: &'a dyn Fetcher,
    toolchain: &'a dyn Toolchain,
    launcher: &'a dyn Launcher,
}

impl<'a> Pipeline<'a> {
    /// Session over `options` with the given collaborators
    pub fn new(
        options: PipelineOptions,
        fetcher: &'a dyn Fetcher,
        toolchain: &'a dyn Toolchain,
        launcher: &'a dyn Launcher,
    ) -> Self {
        Self {
            options,
            fetcher,
            toolchain,
            launcher,
        }
    }

    /// Options of this session
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run every stage up to and including aggregation
    pub fn run(&self) -> Result<SessionOutcome, PipelineError> {
        let opts = &self.options;

        tracing::info!("Discovering units in {}", opts.source_dir.display());
        let units = discover_units(opts).in_stage(Stage::Discover)?;
        tracing::info!("Found {} unit(s)", units.len());

        let driver = synthesize(
            &units,
            &DriverOptions {
                repetitions: opts.repetitions,
            },
        )
        .in_stage(Stage::Synthesize)?;

        if opts.runs <= opts.warmup_runs {
            return Err(PipelineError::new(
                Stage::Prepare,
                format!(
                    "{} run(s) with {} warm-up run(s) leaves nothing to measure",
                    opts.runs, opts.warmup_runs
                ),
            ));
        }
        let workdir = WorkDir::create(&opts.work_dir).in_stage(Stage::Prepare)?;
        let _lock = workdir.lock().in_stage(Stage::Prepare)?;
        let _staging = StagingGuard::new(&workdir, opts.keep_sources);
        workdir
            .stage_sources(&opts.source_dir, &units)
            .in_stage(Stage::Prepare)?;
        driver
            .write_to(&workdir.driver_source_path())
            .in_stage(Stage::Synthesize)?;

        self.fetch_inputs(&workdir, &units).in_stage(Stage::Fetch)?;

        let builder = StagedBuilder::new(self.toolchain, self.launcher)
            .with_base_flags(opts.base_flags.clone());
        let plan = BuildPlan::for_workdir(&workdir, driver.repetitions());
        let build = builder.build(&plan, opts.platform).in_stage(Stage::Compile)?;
        tracing::info!(
            "Built {} ({} compiler invocation(s))",
            build.artifact.display(),
            build.compiler_invocations
        );

        let runs = self.run_trials(&workdir, &build, &units, driver.repetitions())?;
        let report = aggregate(&runs, opts.warmup_runs).in_stage(Stage::Aggregate)?;

        Ok(SessionOutcome {
            units,
            repetitions: driver.repetitions(),
            build,
            report,
        })
    }

    fn fetch_inputs(&self, workdir: &WorkDir, units: &[Unit]) -> Result<(), WorkDirError> {
        let pb = self.progress_bar(units.len(), "inputs");
        let mut fetched = 0;
        for unit in units {
            pb.set_message(format!("day {}", unit.id()));
            if workdir.ensure_input(unit, self.fetcher)? == InputStatus::Fetched {
                fetched += 1;
            }
            pb.inc(1);
        }
        pb.finish_and_clear();
        tracing::info!(
            "Inputs ready ({} fetched, {} cached)",
            fetched,
            units.len() - fetched
        );
        Ok(())
    }

    fn run_trials(
        &self,
        workdir: &WorkDir,
        build: &BuildResult,
        units: &[Unit],
        repetitions: Option<u32>,
    ) -> Result<Vec<RawReport>, PipelineError> {
        let opts = &self.options;
        let expected: BTreeSet<_> = units.iter().map(Unit::id).collect();
        let runner = TrialRunner::new(self.launcher, repetitions).with_timeout(opts.timeout);

        let pb = self.progress_bar(opts.runs, "runs");
        let mut reports = Vec::with_capacity(opts.runs);
        for i in 0..opts.runs {
            let label = if i < opts.warmup_runs { "warm-up" } else { "measured" };
            pb.set_message(format!("run {} ({})", i + 1, label));

            let path = runner.run(&build.artifact, workdir).in_stage(Stage::Run)?;
            let report = daybench_report::load(&path).in_stage(Stage::Aggregate)?;
            check_units(&report, i + 1, &expected).in_stage(Stage::Aggregate)?;
            reports.push(report);
            pb.inc(1);
        }
        pb.finish_and_clear();
        Ok(reports)
    }

    fn progress_bar(&self, len: usize, unit: &str) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(&format!(
                    "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} {{msg}}",
                    unit
                ))
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    }
}

/// Removes the staged sources when the session ends
struct StagingGuard<'w> {
    workdir: &'w WorkDir,
    keep: bool,
}

impl<'w> StagingGuard<'w> {
    fn new(workdir: &'w WorkDir, keep: bool) -> Self {
        Self { workdir, keep }
    }
}

impl Drop for StagingGuard<'_> {
    fn drop(&mut self) {
        if self.keep {
            tracing::info!("Keeping staged sources in {}", self.workdir.staging_dir().display());
        } else {
            self.workdir.clean_staging();
        }
    }
}
