//! PGO Strategies
//!
//! | Family | Instrument | Profile artifact | Merge | Use |
//! |--------|------------|------------------|-------|-----|
//! | Linux  | `-fprofile-generate=<dir>` | `<dir>` (`.gcda`) | none | `-fprofile-use=<dir>` |
//! | MacOs  | `-fprofile-instr-generate=<dir>/%p.profraw` | `<dir>/merged.profdata` | `llvm-profdata merge` | `-fprofile-instr-use=<artifact>` |
//! | Other  | n/a (plain compile) | | | |

use crate::platform::PlatformFamily;
use std::path::{Path, PathBuf};

/// How one compiler family instruments, collects, and consumes profiles
pub trait PgoStrategy: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Extra C flags for the instrumented build
    fn instrument_flags(&self, profile_dir: &Path) -> Vec<String>;

    /// File extension of the fragments the instrumented binary writes
    fn fragment_extension(&self) -> &'static str;

    /// Path the optimized build reads its profile from
    fn profile_artifact(&self, profile_dir: &Path) -> PathBuf;

    /// Whether fragments must be merged into `profile_artifact` first
    fn needs_merge(&self) -> bool;

    /// Extra C flags for the optimized rebuild
    fn use_flags(&self, profile_dir: &Path) -> Vec<String>;
}

/// gcc: `.gcda` fragments are read straight from the profile directory
#[derive(Debug, Clone, Copy, Default)]
pub struct GccStrategy;

impl PgoStrategy for GccStrategy {
    fn name(&self) -> &'static str {
        "gcc"
    }

    fn instrument_flags(&self, profile_dir: &Path) -> Vec<String> {
        vec![format!("-fprofile-generate={}", profile_dir.display())]
    }

    fn fragment_extension(&self) -> &'static str {
        "gcda"
    }

    fn profile_artifact(&self, profile_dir: &Path) -> PathBuf {
        profile_dir.to_path_buf()
    }

    fn needs_merge(&self) -> bool {
        false
    }

    fn use_flags(&self, profile_dir: &Path) -> Vec<String> {
        vec![
            format!("-fprofile-use={}", self.profile_artifact(profile_dir).display()),
            "-fprofile-correction".to_string(),
            "-Wno-missing-profile".to_string(),
        ]
    }
}

/// clang: raw `.profraw` fragments are merged into one `.profdata`
#[derive(Debug, Clone, Copy, Default)]
pub struct ClangStrategy;

impl PgoStrategy for ClangStrategy {
    fn name(&self) -> &'static str {
        "clang"
    }

    fn instrument_flags(&self, profile_dir: &Path) -> Vec<String> {
        vec![format!(
            "-fprofile-instr-generate={}",
            profile_dir.join("%p.profraw").display()
        )]
    }

    fn fragment_extension(&self) -> &'static str {
        "profraw"
    }

    fn profile_artifact(&self, profile_dir: &Path) -> PathBuf {
        profile_dir.join("merged.profdata")
    }

    fn needs_merge(&self) -> bool {
        true
    }

    fn use_flags(&self, profile_dir: &Path) -> Vec<String> {
        vec![format!(
            "-fprofile-instr-use={}",
            self.profile_artifact(profile_dir).display()
        )]
    }
}

static GCC: GccStrategy = GccStrategy;
static CLANG: ClangStrategy = ClangStrategy;

/// PGO strategy for a platform family, `None` when the family has no PGO
pub fn strategy_for(platform: PlatformFamily) -> Option<&'static dyn PgoStrategy> {
    match platform {
        PlatformFamily::Linux => Some(&GCC),
        PlatformFamily::MacOs => Some(&CLANG),
        PlatformFamily::Other => None,
    }
}
