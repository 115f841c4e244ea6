#![warn(missing_docs)]
//! daybench Build - Staged Compilation
//!
//! Compiles the synthesized driver, with profile-guided optimization where the
//! platform's compiler family supports it:
//!
//! ```text
//! gcc   (Linux)  instrument → profiling run → recompile with .gcda
//! clang (macOS)  instrument → profiling run → llvm-profdata merge → recompile
//! other          plain compile
//! ```
//!
//! The compiler and the process launcher are collaborators behind traits
//! (`Toolchain`, `Launcher`) so every stage sequence can be exercised without
//! a real toolchain.

mod compile_all;
mod launch;
mod platform;
mod staged;
mod strategy;
mod toolchain;

pub use compile_all::{UnitBuild, compile_all};
pub use launch::{ExitKind, LaunchError, LaunchOutcome, Launcher};
pub use platform::PlatformFamily;
pub use staged::{BuildError, BuildPlan, BuildResult, BuildStage, StagedBuilder, driver_args};
pub use strategy::{ClangStrategy, GccStrategy, PgoStrategy, strategy_for};
pub use toolchain::{DEFAULT_BASE_FLAGS, OcenToolchain, ToolOutput, Toolchain};
