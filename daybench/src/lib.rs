#![warn(missing_docs)]
//! # daybench
//!
//! Benchmarks a directory of day-by-day puzzle solutions as one program:
//! - **Discovery**: every `NN.oc` in the source directory is a unit
//! - **Driver Synthesis**: one generated `run_all.oc` imports and times every unit
//! - **Staged PGO**: instrumented compile, profiling run, optimized recompile
//!   (gcc on Linux, clang with `llvm-profdata` on macOS, a plain compile elsewhere)
//! - **Trials**: repeated launches of the driver with warm-up discarding
//! - **Reports**: per-day statistics as a terminal table, `timings.json`, or a
//!   JSON report with system metadata
//!
//! ## Quick Start
//!
//! ```text
//! $ daybench init          # write daybench.toml
//! $ daybench list          # show discovered days
//! $ daybench -n 50 --runs 3 --warmup-runs 1
//! ```
//!
//! ## Library Use
//!
//! ```ignore
//! use daybench::{Pipeline, PipelineOptions, OcenToolchain, ProcessLauncher, HttpFetcher};
//!
//! let fetcher = HttpFetcher::new("https://adventofcode.com", 2023, Some(token))?;
//! let toolchain = OcenToolchain::default();
//! let launcher = ProcessLauncher::default();
//! let outcome = Pipeline::new(PipelineOptions::default(), &fetcher, &toolchain, &launcher).run()?;
//! println!("{}", daybench::render(&outcome.report));
//! ```

// Re-export core types
pub use daybench_core::{
    DayId, DaySelection, DiscoveryError, FetchError, Fetcher, HttpFetcher, InputStatus, Unit,
    WorkDir, WorkDirError, discover,
};

// Re-export driver synthesis
pub use daybench_codegen::{DriverOptions, DriverSource, SynthesisError, synthesize};

// Re-export the staged builder
pub use daybench_build::{
    BuildError, BuildPlan, BuildResult, BuildStage, ExitKind, LaunchError, LaunchOutcome,
    Launcher, OcenToolchain, PlatformFamily, StagedBuilder, ToolOutput, Toolchain,
};

// Re-export reporting
pub use daybench_report::{
    AggregateReport, BenchReport, RawReport, ReportParseError, UnitTiming, aggregate,
    generate_json_report, generate_timings_json, render,
};

// Re-export stats
pub use daybench_stats::{SummaryStatistics, compute_summary};

// Re-export orchestration
pub use daybench_cli::{
    Pipeline, PipelineError, PipelineOptions, ProcessLauncher, RunError, SessionOutcome, Stage,
    TrialRunner,
};

/// Run the daybench CLI.
///
/// ```ignore
/// fn main() {
///     daybench::run().unwrap();
/// }
/// ```
pub use daybench_cli::run;
