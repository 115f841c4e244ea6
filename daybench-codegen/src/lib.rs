#![warn(missing_docs)]
//! daybench Codegen - Driver Synthesis
//!
//! Generates `run_all.oc`, a single program that imports every unit and calls
//! each one through a uniform wrapper:
//!
//! ```text
//! call_fn("07", day07::main, `{dir}/07.in`, reps)
//!     │
//!     ├── argv = ("dummy", inputPath)
//!     ├── run `reps` times (argv[2] of the driver, default 20)
//!     ├── drop iteration 0 (warm-up)
//!     └── record mean of the rest
//!
//! write_report() → timings.json  {"07": 0.123, ..., "total": 0.456}
//! ```
//!
//! Timing happens inside the compiled driver, so process-spawn overhead never
//! reaches the numbers. The generated text depends on the unit list only: the
//! repetition override is validated here but passed to the driver at run time.

mod template;

pub use template::{Template, TemplateError};

use daybench_core::{REPORT_FILE, Unit};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Repetitions per unit when the driver gets no override
pub const DEFAULT_REPETITIONS: u32 = 20;

/// Minimum repetitions: one warm-up plus at least one measured iteration
pub const MIN_REPETITIONS: i64 = 2;

const DRIVER_TEMPLATE: &str = include_str!("run_all.oc.tmpl");

/// Errors raised before any driver text is emitted
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Options or unit list rejected before emission
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The driver template failed to render
    #[error("Driver template error: {0}")]
    Template(#[from] TemplateError),

    /// The driver source could not be written
    #[error("Failed to write driver source to {}: {source}", .path.display())]
    Io {
        /// Path involved
        path: std::path::PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Options that affect how the driver is run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverOptions {
    /// Repetition override passed as the driver's second argument
    pub repetitions: Option<i64>,
}

impl DriverOptions {
    /// Validate the repetition override.
    ///
    /// Anything below two leaves no non-warm-up sample, so its mean is undefined.
    pub fn validated_repetitions(&self) -> Result<Option<u32>, SynthesisError> {
        match self.repetitions {
            None => Ok(None),
            Some(n) if n < MIN_REPETITIONS => Err(SynthesisError::InvalidConfiguration(format!(
                "repetitions must be at least {} (one warm-up plus one measured run), got {}",
                MIN_REPETITIONS, n
            ))),
            Some(n) => u32::try_from(n).map(Some).map_err(|_| {
                SynthesisError::InvalidConfiguration(format!("repetitions too large: {}", n))
            }),
        }
    }
}

/// Everything the template needs to know about one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDescriptor {
    /// Report key (`07`)
    pub key: String,
    /// Module the unit is imported as (`day07`)
    pub module: String,
    /// Entry point passed to the wrapper (`day07::main`)
    pub entry: String,
    /// Input file relative to the driver's input directory (`07.in`)
    pub input: String,
}

impl From<&Unit> for UnitDescriptor {
    fn from(unit: &Unit) -> Self {
        Self {
            key: unit.id().key(),
            module: unit.module_name(),
            entry: unit.entry_symbol(),
            input: unit.input_file_name(),
        }
    }
}

impl UnitDescriptor {
    fn import_line(&self) -> String {
        format!("import .{}", self.module)
    }

    fn call_line(&self) -> String {
        format!(
            "    call_fn(\"{}\", {}, `{{dir}}/{}`, reps)",
            self.key, self.entry, self.input
        )
    }
}

/// Synthesized driver program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSource {
    text: String,
    unit_count: usize,
    repetitions: Option<u32>,
}

impl DriverSource {
    /// Generated program text
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of units the driver calls
    pub fn unit_count(&self) -> usize {
        self.unit_count
    }

    /// Validated repetition override to pass when running the driver
    pub fn repetitions(&self) -> Option<u32> {
        self.repetitions
    }

    /// Write the program text to `path`, creating parent directories
    pub fn write_to(&self, path: &Path) -> Result<(), SynthesisError> {
        let io_err = |source| SynthesisError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, &self.text).map_err(io_err)
    }
}

/// Render the driver for `units` (in the given order).
///
/// Configuration is validated first; nothing is rendered for an invalid one.
pub fn synthesize(units: &[Unit], options: &DriverOptions) -> Result<DriverSource, SynthesisError> {
    let repetitions = options.validated_repetitions()?;
    if units.is_empty() {
        return Err(SynthesisError::InvalidConfiguration(
            "cannot synthesize a driver without units".to_string(),
        ));
    }

    let descriptors: Vec<UnitDescriptor> = units.iter().map(UnitDescriptor::from).collect();
    let text = render_driver(&descriptors)?;
    tracing::debug!(
        "Synthesized driver for {} units ({} bytes)",
        descriptors.len(),
        text.len()
    );

    Ok(DriverSource {
        text,
        unit_count: descriptors.len(),
        repetitions,
    })
}

/// Render the driver template over typed descriptors
pub fn render_driver(descriptors: &[UnitDescriptor]) -> Result<String, SynthesisError> {
    let template = Template::parse(DRIVER_TEMPLATE)?;

    let imports: Vec<String> = descriptors.iter().map(UnitDescriptor::import_line).collect();
    let calls: Vec<String> = descriptors.iter().map(UnitDescriptor::call_line).collect();

    let mut values = BTreeMap::new();
    values.insert("imports", imports.join("\n"));
    values.insert("calls", calls.join("\n"));
    values.insert("unit_count", descriptors.len().to_string());
    values.insert("default_repetitions", DEFAULT_REPETITIONS.to_string());
    values.insert("report_file", REPORT_FILE.to_string());

    Ok(template.render(&values)?)
}
