//! Per-unit Standalone Builds

use crate::staged::{BuildError, BuildStage};
use crate::toolchain::Toolchain;
use daybench_core::{DayId, Unit};
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of compiling one unit on its own
#[derive(Debug)]
pub struct UnitBuild {
    /// Day that was compiled
    pub id: DayId,
    /// Executable path (`<out_dir>/dayN`)
    pub output: PathBuf,
    /// Outcome of the compile
    pub result: Result<(), BuildError>,
}

/// Plain-compile every unit to `<out_dir>/day<N>`
///
/// A failing unit does not stop the others; only failing to create
/// `out_dir` aborts.
pub fn compile_all(
    toolchain: &dyn Toolchain,
    units: &[Unit],
    out_dir: &Path,
) -> Result<Vec<UnitBuild>, BuildError> {
    fs::create_dir_all(out_dir).map_err(|source| BuildError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let builds = units
        .iter()
        .map(|unit| {
            let output = out_dir.join(format!("day{}", unit.id().get()));
            tracing::info!("Compiling {} -> {}", unit.source().display(), output.display());
            let result = compile_one(toolchain, unit.source(), &output);
            if let Err(e) = &result {
                tracing::warn!("Day {} failed: {}", unit.id(), e);
            }
            UnitBuild {
                id: unit.id(),
                output,
                result,
            }
        })
        .collect();

    Ok(builds)
}

fn compile_one(toolchain: &dyn Toolchain, source: &Path, output: &Path) -> Result<(), BuildError> {
    let stage = BuildStage::PlainCompile;
    let out = toolchain
        .compile(source, output, &[])
        .map_err(|source| BuildError::Toolchain { stage, source })?;
    if out.success {
        Ok(())
    } else {
        Err(BuildError::Compile {
            stage,
            diagnostics: out.diagnostics,
        })
    }
}
