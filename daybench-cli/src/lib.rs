#![warn(missing_docs)]
//! daybench CLI Library
//!
//! Command-line front end and pipeline orchestration. `daybench` with no
//! subcommand benchmarks every day solution found in the source directory:
//!
//! ```text
//! daybench                       # discover, fetch, PGO-build, run, report
//! daybench -n 50 --runs 5 --warmup-runs 1 --days 1-10
//! daybench list
//! daybench fetch 7 --expected
//! daybench compile-all
//! daybench init
//! ```

mod config;
mod metadata;
mod pipeline;
mod runner;
mod supervisor;

pub use config::*;
pub use metadata::build_report_meta;
pub use pipeline::{
    InStage, Pipeline, PipelineError, PipelineOptions, SessionOutcome, Stage, discover_units,
};
pub use runner::{RunError, TrialRunner};
pub use supervisor::ProcessLauncher;

use clap::{Parser, Subcommand};
use daybench_build::{OcenToolchain, PlatformFamily, compile_all};
use daybench_core::{DayId, DaySelection, Fetcher, HttpFetcher};
use daybench_report::{
    BenchReport, OutputFormat, ReportConfig, generate_json_report, generate_timings_json, render,
};
use std::io::Write;
use std::path::{Path, PathBuf};

/// daybench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "daybench")]
#[command(
    author,
    version,
    about = "daybench - PGO-built benchmarks for day-by-day puzzle solutions"
)]
pub struct Cli {
    /// Optional subcommand; defaults to Bench
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding the day solutions
    #[arg(long, global = true)]
    pub source_dir: Option<PathBuf>,

    /// Working directory for inputs, staged sources and the driver
    #[arg(long, global = true)]
    pub work_dir: Option<PathBuf>,

    /// Repetitions of each day inside the driver (first one discarded)
    #[arg(short = 'n', long, global = true, allow_negative_numbers = true)]
    pub repetitions: Option<i64>,

    /// Launches of the compiled driver
    #[arg(long, global = true)]
    pub runs: Option<usize>,

    /// Leading launches discarded as warm-up
    #[arg(long, global = true)]
    pub warmup_runs: Option<usize>,

    /// Only these days, e.g. "1,3,5-7"
    #[arg(long, global = true)]
    pub days: Option<DaySelection>,

    /// Platform family for PGO: linux, macos, other
    #[arg(long, global = true)]
    pub platform: Option<PlatformFamily>,

    /// Watchdog for one driver launch, e.g. "5m"; "0" disables it
    #[arg(long, global = true)]
    pub timeout: Option<String>,

    /// Output format: human, json, timings
    #[arg(long, global = true)]
    pub format: Option<String>,

    /// Output file (stdout if not specified)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Keep the staged sources after the run
    #[arg(long, global = true)]
    pub keep_sources: bool,

    /// Session token for the puzzle site
    #[arg(long, global = true, env = "AOC_SESSION", hide_env_values = true)]
    pub session: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build and benchmark every day (default)
    Bench,
    /// List discovered days
    List,
    /// Fetch one day's input, or its two expected answers
    Fetch {
        /// Day to fetch
        day: DayId,
        /// Fetch the expected answers instead of the input
        #[arg(long)]
        expected: bool,
    },
    /// Compile each day into its own executable
    CompileAll {
        /// Output directory (defaults to the working directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Write a default daybench.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the daybench CLI with process arguments.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the daybench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    let filter = if cli.verbose {
        "daybench=debug"
    } else {
        "daybench=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Discover daybench.toml configuration (CLI flags override)
    let config = DaybenchConfig::discover().unwrap_or_default();

    match cli.command {
        Some(Commands::List) => list_days(&cli, &config),
        Some(Commands::Fetch { day, expected }) => fetch_day(&cli, &config, day, expected),
        Some(Commands::CompileAll { ref out_dir }) => {
            compile_all_days(&cli, &config, out_dir.as_deref())
        }
        Some(Commands::Init { force }) => init_config(force),
        Some(Commands::Bench) | None => run_bench(&cli, &config),
    }
}

/// Resolve pipeline options by layering: daybench.toml → CLI overrides
pub fn build_pipeline_options(cli: &Cli, config: &DaybenchConfig) -> anyhow::Result<PipelineOptions> {
    let platform = match (cli.platform, config.compiler.platform.as_deref()) {
        (Some(platform), _) => platform,
        (None, Some(name)) => name.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        (None, None) => PlatformFamily::detect(),
    };
    let timeout = DaybenchConfig::parse_duration(
        cli.timeout.as_deref().unwrap_or(&config.runner.timeout),
    )?;

    Ok(PipelineOptions {
        source_dir: cli
            .source_dir
            .clone()
            .unwrap_or_else(|| config.paths.source_dir.clone()),
        work_dir: cli
            .work_dir
            .clone()
            .unwrap_or_else(|| config.paths.work_dir.clone()),
        extension: config.paths.extension.clone(),
        selection: cli.days.clone(),
        repetitions: cli.repetitions.or(config.runner.repetitions),
        runs: cli.runs.unwrap_or(config.runner.runs),
        warmup_runs: cli.warmup_runs.unwrap_or(config.runner.warmup_runs),
        platform,
        base_flags: config.compiler.flags.clone(),
        timeout,
        keep_sources: cli.keep_sources || config.output.keep_sources,
        show_progress: true,
    })
}

fn toolchain(config: &DaybenchConfig) -> OcenToolchain {
    OcenToolchain::new(&config.compiler.program, &config.compiler.merge_tool)
}

fn http_fetcher(cli: &Cli, config: &DaybenchConfig) -> anyhow::Result<HttpFetcher> {
    let session = resolve_session(cli.session.as_deref(), &config.fetch);
    Ok(HttpFetcher::new(
        &config.fetch.base_url,
        config.fetch.year,
        session,
    )?)
}

fn run_bench(cli: &Cli, config: &DaybenchConfig) -> anyhow::Result<()> {
    let options = build_pipeline_options(cli, config)?;
    let format: OutputFormat = cli
        .format
        .as_deref()
        .unwrap_or(&config.output.format)
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let fetcher = http_fetcher(cli, config)?;
    let toolchain = toolchain(config);
    let launcher = ProcessLauncher::new(options.timeout);

    let pipeline = Pipeline::new(options, &fetcher, &toolchain, &launcher);
    let outcome = pipeline.run()?;

    write_outputs(cli, config, pipeline.options(), &outcome, format).in_stage(Stage::Output)?;
    Ok(())
}

fn write_outputs(
    cli: &Cli,
    config: &DaybenchConfig,
    options: &PipelineOptions,
    outcome: &SessionOutcome,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let bench_report = || {
        let meta = build_report_meta(ReportConfig {
            platform: outcome.build.platform.to_string(),
            repetitions: outcome.repetitions,
            runs: options.runs,
            warmup_runs: options.warmup_runs,
            compiler: config.compiler.program.clone(),
            compiler_flags: options.base_flags.clone(),
        });
        BenchReport::new(meta, &outcome.report)
    };

    let output = match format {
        OutputFormat::Human => render(&outcome.report),
        OutputFormat::Json => generate_json_report(&bench_report())?,
        OutputFormat::Timings => generate_timings_json(&outcome.report)? + "\n",
    };

    if let Some(ref path) = cli.output {
        write_file(path, &output)?;
        println!("Report written to: {}", path.display());
    } else {
        print!("{}", output);
    }

    if config.output.save_report {
        let path = &config.output.report_path;
        write_file(path, &generate_json_report(&bench_report())?)?;
        tracing::info!("Saved report to {}", path.display());
    }
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::File::create(path)?;
    file.write_all(contents.as_bytes())?;
    Ok(())
}

fn list_days(cli: &Cli, config: &DaybenchConfig) -> anyhow::Result<()> {
    let options = build_pipeline_options(cli, config)?;
    let units = discover_units(&options).in_stage(Stage::Discover)?;

    println!("daybench plan ({}):", options.source_dir.display());
    for unit in &units {
        let cached = options.work_dir.join(unit.input_file_name()).is_file();
        println!(
            "├── {} {}{}",
            unit.id(),
            unit.source().display(),
            if cached { "" } else { " (input not fetched)" }
        );
    }
    println!("{} days found.", units.len());
    Ok(())
}

fn fetch_day(cli: &Cli, config: &DaybenchConfig, day: DayId, expected: bool) -> anyhow::Result<()> {
    let fetcher = http_fetcher(cli, config)?;
    let text = if expected {
        let (part1, part2) = fetcher.fetch_expected(day).in_stage(Stage::Fetch)?;
        format!("{}\n{}\n", part1, part2)
    } else {
        fetcher.fetch_input(day).in_stage(Stage::Fetch)?
    };

    match cli.output {
        Some(ref path) => {
            write_file(path, &text).in_stage(Stage::Output)?;
            tracing::info!("Wrote day {} to {}", day, path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn compile_all_days(
    cli: &Cli,
    config: &DaybenchConfig,
    out_dir: Option<&Path>,
) -> anyhow::Result<()> {
    let options = build_pipeline_options(cli, config)?;
    let units = discover_units(&options).in_stage(Stage::Discover)?;

    let toolchain = toolchain(config);
    let out_dir = out_dir.unwrap_or(&options.work_dir);
    let builds = compile_all(&toolchain, &units, out_dir).in_stage(Stage::Compile)?;

    let failed: Vec<String> = builds
        .iter()
        .filter_map(|b| match &b.result {
            Ok(()) => {
                println!("✓ day {} -> {}", b.id, b.output.display());
                None
            }
            Err(e) => {
                println!("✗ day {}: {}", b.id, e);
                Some(b.id.to_string())
            }
        })
        .collect();

    if failed.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::new(
            Stage::Compile,
            format!("{} day(s) failed to compile: {}", failed.len(), failed.join(", ")),
        )
        .into())
    }
}

fn init_config(force: bool) -> anyhow::Result<()> {
    let path = PathBuf::from(CONFIG_FILE);
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_file(&path, &DaybenchConfig::default_toml())?;
    println!("Wrote {}", path.display());
    Ok(())
}
