//! Configuration loading from daybench.toml
//!
//! The configuration is discovered by walking up from the current directory.
//! Every field has a default, and command-line flags override file values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file
pub const CONFIG_FILE: &str = "daybench.toml";

/// daybench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DaybenchConfig {
    /// Source and working directory layout
    #[serde(default)]
    pub paths: PathsConfig,
    /// Measurement configuration
    #[serde(default)]
    pub runner: RunnerConfig,
    /// Compiler configuration
    #[serde(default)]
    pub compiler: CompilerConfig,
    /// Input fetching configuration
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Source and working directory layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding `NN.<ext>` unit sources
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
    /// Working directory (inputs, staged sources, artifact, report)
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Unit source file extension
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            work_dir: default_work_dir(),
            extension: default_extension(),
        }
    }
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("src")
}
fn default_work_dir() -> PathBuf {
    PathBuf::from("build")
}
fn default_extension() -> String {
    daybench_core::DEFAULT_EXTENSION.to_string()
}

/// Measurement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Repetitions of each unit inside the driver (first one discarded)
    #[serde(default)]
    pub repetitions: Option<i64>,
    /// Launches of the compiled driver
    #[serde(default = "default_runs")]
    pub runs: usize,
    /// Leading launches discarded as warm-up
    #[serde(default)]
    pub warmup_runs: usize,
    /// Watchdog for a single launch (e.g., "10m"); "0" disables it
    #[serde(default = "default_timeout")]
    pub timeout: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            repetitions: None,
            runs: default_runs(),
            warmup_runs: 0,
            timeout: default_timeout(),
        }
    }
}

fn default_runs() -> usize {
    1
}
fn default_timeout() -> String {
    "10m".to_string()
}

/// Compiler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Compiler executable
    #[serde(default = "default_program")]
    pub program: String,
    /// Optimization flags passed to every compile
    #[serde(default = "default_flags")]
    pub flags: Vec<String>,
    /// Profile merge tool (clang PGO)
    #[serde(default = "default_merge_tool")]
    pub merge_tool: String,
    /// Platform family override: "linux", "macos" or "other"
    #[serde(default)]
    pub platform: Option<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            flags: default_flags(),
            merge_tool: default_merge_tool(),
            platform: None,
        }
    }
}

fn default_program() -> String {
    "ocen".to_string()
}
fn default_flags() -> Vec<String> {
    daybench_build::DEFAULT_BASE_FLAGS
        .iter()
        .map(|f| f.to_string())
        .collect()
}
fn default_merge_tool() -> String {
    "llvm-profdata".to_string()
}

/// Input fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Event year
    #[serde(default = "default_year")]
    pub year: u32,
    /// Puzzle site
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// File holding the session token (used when none is given otherwise)
    #[serde(default)]
    pub session_file: Option<PathBuf>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            year: default_year(),
            base_url: default_base_url(),
            session_file: None,
        }
    }
}

fn default_year() -> u32 {
    2023
}
fn default_base_url() -> String {
    "https://adventofcode.com".to_string()
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default output format: "human", "json", "timings"
    #[serde(default = "default_format")]
    pub format: String,
    /// Keep the staged sources after a run
    #[serde(default)]
    pub keep_sources: bool,
    /// Save the JSON report after each run
    #[serde(default)]
    pub save_report: bool,
    /// Where the JSON report is saved
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            keep_sources: false,
            save_report: false,
            report_path: default_report_path(),
        }
    }
}

fn default_format() -> String {
    "human".to_string()
}
fn default_report_path() -> PathBuf {
    PathBuf::from("build/report.json")
}

impl DaybenchConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        tracing::warn!("Ignoring {}: {}", config_path.display(), e);
                        None
                    }
                };
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# daybench configuration

[paths]
# Directory holding the day solutions (01.oc, 02.oc, ...)
source_dir = "src"
# Working directory for inputs, staged sources and the compiled driver
work_dir = "build"
# Solution file extension
extension = "oc"

[runner]
# Repetitions of each day inside the driver; the first is discarded (uncomment to override 20)
# repetitions = 20
# Launches of the compiled driver
runs = 1
# Leading launches discarded as warm-up
warmup_runs = 0
# Watchdog for a single launch; "0" disables it
timeout = "10m"

[compiler]
program = "ocen"
flags = ["-O3", "-march=native", "-funroll-loops", "-Wno-unused-result"]
# Profile merge tool for clang-based PGO
merge_tool = "llvm-profdata"
# Platform family override: linux, macos, other (uncomment to force)
# platform = "other"

[fetch]
year = 2023
base_url = "https://adventofcode.com"
# Session token file, used when neither --session nor AOC_SESSION is set
# session_file = "~/.config/aoc/session"

[output]
# Default output format: human, json, timings
format = "human"
# Keep the staged sources after a run
keep_sources = false
# Save a JSON report after each run
save_report = false
report_path = "build/report.json"
"#
        .to_string()
    }

    /// Parse duration string (e.g., "3s", "500ms", "2m"); `0` means none
    pub fn parse_duration(s: &str) -> anyhow::Result<Option<Duration>> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        // Find where the number ends and unit begins
        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;
        if !value.is_finite() || value < 0.0 {
            return Err(anyhow::anyhow!("Invalid duration: {}", s));
        }

        let multiplier: u64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" | "" => 1_000_000_000,
            "m" | "min" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        let nanos = (value * multiplier as f64) as u64;
        Ok((nanos > 0).then(|| Duration::from_nanos(nanos)))
    }
}

/// Resolve the session token: the explicit value (`--session` or
/// `AOC_SESSION`), else the contents of the configured `session_file`
pub fn resolve_session(explicit: Option<&str>, config: &FetchConfig) -> Option<String> {
    if let Some(token) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
        return Some(token.to_string());
    }

    let path = expand_home(config.session_file.as_ref()?);
    let token = std::fs::read_to_string(&path).ok()?;
    let token = token.trim();
    (!token.is_empty()).then(|| {
        tracing::debug!("Using session token from {}", path.display());
        token.to_string()
    })
}

fn expand_home(path: &PathBuf) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.clone(),
    }
}
