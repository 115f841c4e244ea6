//! System Metadata Collection
//!
//! Git commit/branch, OS, CPU model and core count, captured for the JSON
//! report. Linux-only data degrades to "Unknown" elsewhere.

use chrono::Utc;
use daybench_report::{ReportConfig, ReportMeta, SCHEMA_VERSION, SystemInfo};

/// Build report metadata including system info and git details
pub fn build_report_meta(config: ReportConfig) -> ReportMeta {
    ReportMeta {
        schema_version: SCHEMA_VERSION,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        git_commit: git(&["rev-parse", "HEAD"]),
        git_branch: git(&["rev-parse", "--abbrev-ref", "HEAD"]),
        system: SystemInfo {
            os: std::env::consts::OS.to_string(),
            os_version: get_os_release().unwrap_or_else(|| std::env::consts::ARCH.to_string()),
            cpu: get_cpu_model().unwrap_or_else(|| "Unknown".to_string()),
            cpu_cores: num_cpus(),
        },
        config,
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = std::process::Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// CPU model name, read from `/proc/cpuinfo` where it exists
fn get_cpu_model() -> Option<String> {
    if !cfg!(target_os = "linux") {
        return None;
    }
    cpu_model_from(&std::fs::read_to_string("/proc/cpuinfo").ok()?)
}

/// Kernel release on Linux
fn get_os_release() -> Option<String> {
    if !cfg!(target_os = "linux") {
        return None;
    }
    let release = std::fs::read_to_string("/proc/sys/kernel/osrelease").ok()?;
    Some(release.trim().to_string())
}

fn cpu_model_from(cpuinfo: &str) -> Option<String> {
    cpuinfo.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == "model name").then(|| value.trim().to_string())
    })
}

fn num_cpus() -> u32 {
    std::thread::available_parallelism().map_or(1, |n| n.get() as u32)
}
