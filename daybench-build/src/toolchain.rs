//! Compiler Toolchain
//!
//! The toolchain is a collaborator: the staged builder only decides which
//! flags go into which compile, the toolchain turns that into processes.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Default optimization flags for every compile of the driver
pub const DEFAULT_BASE_FLAGS: &[&str] = &[
    "-O3",
    "-march=native",
    "-funroll-loops",
    "-Wno-unused-result",
];

/// Outcome of one toolchain invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Whether the tool exited with status zero
    pub success: bool,
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    /// Captured stdout and stderr, verbatim
    pub diagnostics: String,
}

impl ToolOutput {
    fn from_output(output: std::process::Output) -> Self {
        let mut diagnostics = String::from_utf8_lossy(&output.stdout).into_owned();
        diagnostics.push_str(&String::from_utf8_lossy(&output.stderr));
        Self {
            success: output.status.success(),
            code: output.status.code(),
            diagnostics,
        }
    }
}

/// Compiles sources and merges profiles
///
/// `Err` means the tool could not be started at all; a tool that ran and
/// failed is reported through `ToolOutput::success`.
pub trait Toolchain {
    /// Compile `source` into `output` with the given C flags
    fn compile(&self, source: &Path, output: &Path, cflags: &[String])
    -> std::io::Result<ToolOutput>;

    /// Merge raw profile fragments into one profile at `output`
    fn merge_profiles(&self, fragments: &[PathBuf], output: &Path)
    -> std::io::Result<ToolOutput>;
}

/// The `ocen` compiler plus the LLVM profile merger
///
/// `ocen <source> -o <output> -cf '<cflags>'`
#[derive(Debug, Clone)]
pub struct OcenToolchain {
    program: PathBuf,
    merge_tool: PathBuf,
}

impl OcenToolchain {
    /// Toolchain running `program` and `merge_tool`
    pub fn new(program: impl Into<PathBuf>, merge_tool: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            merge_tool: merge_tool.into(),
        }
    }

    /// Compiler executable
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for OcenToolchain {
    fn default() -> Self {
        Self::new("ocen", "llvm-profdata")
    }
}

impl Toolchain for OcenToolchain {
    fn compile(
        &self,
        source: &Path,
        output: &Path,
        cflags: &[String],
    ) -> std::io::Result<ToolOutput> {
        let mut command = Command::new(&self.program);
        command.arg(source).arg("-o").arg(output);
        if !cflags.is_empty() {
            command.arg("-cf").arg(cflags.join(" "));
        }
        tracing::debug!("Running {:?}", command);
        command.output().map(ToolOutput::from_output)
    }

    fn merge_profiles(
        &self,
        fragments: &[PathBuf],
        output: &Path,
    ) -> std::io::Result<ToolOutput> {
        let mut command = Command::new(&self.merge_tool);
        command
            .arg("merge")
            .arg(format!("-output={}", output.display()))
            .args(fragments);
        tracing::debug!("Running {:?}", command);
        command.output().map(ToolOutput::from_output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_spawn_error() {
        let toolchain = OcenToolchain::new("/nonexistent/ocen", "/nonexistent/llvm-profdata");
        assert!(
            toolchain
                .compile(Path::new("a.oc"), Path::new("a"), &[])
                .is_err()
        );
        assert!(toolchain.merge_profiles(&[], Path::new("m")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_tool_captures_diagnostics() {
        // `sh a.oc -o a -cf ...` fails because a.oc does not exist
        let dir = tempfile::tempdir().unwrap();
        let toolchain = OcenToolchain::new("sh", "sh");
        let out = toolchain
            .compile(
                &dir.path().join("a.oc"),
                &dir.path().join("a"),
                &["-O3".to_string()],
            )
            .unwrap();
        assert!(!out.success);
        assert!(!out.diagnostics.is_empty());
    }
}
