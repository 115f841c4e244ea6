//! Unit Registry
//!
//! Discovers day solutions in a source directory.
//!
//! A file is a unit when its name is `<digits>.<ext>` (for example `07.oc` or
//! `7.oc`). Units are ordered numerically, so `9` always precedes `10`.

use crate::{DayId, Unit};
use regex::Regex;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default source extension for day solutions
pub const DEFAULT_EXTENSION: &str = "oc";

/// Errors raised while scanning for units
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// No unit files (or none selected)
    #[error("No units found in {}", .dir.display())]
    NoUnitsFound {
        /// Directory searched
        dir: PathBuf,
    },

    /// Two files map to the same day
    #[error("Day {id} is defined twice: {} and {}", .first.display(), .second.display())]
    DuplicateUnit {
        /// Day claimed twice
        id: DayId,
        /// First file
        first: PathBuf,
        /// Second file
        second: PathBuf,
    },

    /// The source directory could not be read
    #[error("Failed to read source directory {}: {source}", .dir.display())]
    Io {
        /// Directory searched
        dir: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Discover all `<id>.oc` units in `source_dir`, sorted by identifier
pub fn discover(source_dir: &Path) -> Result<Vec<Unit>, DiscoveryError> {
    discover_with_extension(source_dir, DEFAULT_EXTENSION)
}

/// Discover units with a custom file extension
pub fn discover_with_extension(
    source_dir: &Path,
    extension: &str,
) -> Result<Vec<Unit>, DiscoveryError> {
    let io_err = |source| DiscoveryError::Io {
        dir: source_dir.to_path_buf(),
        source,
    };

    let pattern = Regex::new(&format!(r"^(\d+)\.{}$", regex::escape(extension)))
        .expect("escaped extension forms a valid pattern");

    let mut found: BTreeMap<DayId, PathBuf> = BTreeMap::new();
    for entry in std::fs::read_dir(source_dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if !entry.file_type().map_err(io_err)?.is_file() {
            continue;
        }

        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Some(caps) = pattern.captures(name) else {
            continue;
        };

        let Some(id) = caps[1].parse::<u32>().ok().and_then(DayId::new) else {
            tracing::warn!("Skipping {}: day identifier must be positive", name);
            continue;
        };

        let path = entry.path();
        if let Some(existing) = found.get(&id) {
            // read_dir order is unspecified; report the pair sorted for stable messages
            let (first, second) = if existing <= &path {
                (existing.clone(), path)
            } else {
                (path, existing.clone())
            };
            return Err(DiscoveryError::DuplicateUnit { id, first, second });
        }
        found.insert(id, path);
    }

    if found.is_empty() {
        return Err(DiscoveryError::NoUnitsFound {
            dir: source_dir.to_path_buf(),
        });
    }

    // BTreeMap iteration is already in ascending numeric order
    Ok(found
        .into_iter()
        .map(|(id, path)| Unit::new(id, path))
        .collect())
}

/// A set of day identifiers selected on the command line (`1,3,5-7`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaySelection {
    ranges: Vec<RangeInclusive<u32>>,
}

impl DaySelection {
    /// Whether the selection contains the given day
    pub fn contains(&self, id: DayId) -> bool {
        self.ranges.iter().any(|r| r.contains(&id.get()))
    }

    /// Keep only the selected units, preserving order.
    ///
    /// Fails with `NoUnitsFound` when nothing survives the filter.
    pub fn apply(&self, units: Vec<Unit>, source_dir: &Path) -> Result<Vec<Unit>, DiscoveryError> {
        let selected: Vec<Unit> = units.into_iter().filter(|u| self.contains(u.id())).collect();
        if selected.is_empty() {
            return Err(DiscoveryError::NoUnitsFound {
                dir: source_dir.to_path_buf(),
            });
        }
        Ok(selected)
    }
}

impl std::str::FromStr for DaySelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut ranges = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('-') {
                Some((lo, hi)) => {
                    let lo: DayId = lo.parse()?;
                    let hi: DayId = hi.parse()?;
                    if lo > hi {
                        return Err(format!("Empty day range: {}", part));
                    }
                    ranges.push(lo.get()..=hi.get());
                }
                None => {
                    let day: DayId = part.parse()?;
                    ranges.push(day.get()..=day.get());
                }
            }
        }
        if ranges.is_empty() {
            return Err("Empty day selection".to_string());
        }
        Ok(Self { ranges })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "def main(argc: i32, argv: &str) {}\n").unwrap();
    }

    #[test]
    fn test_numeric_ordering() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "9.oc");
        touch(dir.path(), "10.oc");
        touch(dir.path(), "2.oc");

        let units = discover(dir.path()).unwrap();
        let ids: Vec<u32> = units.iter().map(|u| u.id().get()).collect();
        assert_eq!(ids, vec![2, 9, 10]);
    }

    #[test]
    fn test_ignores_non_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "01.oc");
        touch(dir.path(), "utils.oc");
        touch(dir.path(), "02.c");
        touch(dir.path(), "03.oc.bak");
        fs::create_dir(dir.path().join("04.oc")).unwrap();

        let units = discover(dir.path()).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].id().get(), 1);
    }

    #[test]
    fn test_no_units_found() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "readme.md");

        let err = discover(dir.path()).unwrap_err();
        assert!(matches!(err, DiscoveryError::NoUnitsFound { .. }));
    }

    #[test]
    fn test_duplicate_identifier() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "9.oc");
        touch(dir.path(), "09.oc");

        let err = discover(dir.path()).unwrap_err();
        match err {
            DiscoveryError::DuplicateUnit { id, .. } => assert_eq!(id.get(), 9),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_identifier_skipped() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "00.oc");
        touch(dir.path(), "01.oc");

        let units = discover(dir.path()).unwrap();
        assert_eq!(units.len(), 1);
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, DiscoveryError::Io { .. }));
    }

    #[test]
    fn test_custom_extension() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "01.oc");
        touch(dir.path(), "02.ae");

        let units = discover_with_extension(dir.path(), "ae").unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].id().get(), 2);
    }

    #[test]
    fn test_day_selection_parse() {
        let sel: DaySelection = "1, 3,5-7".parse().unwrap();
        for day in [1, 3, 5, 6, 7] {
            assert!(sel.contains(DayId::new(day).unwrap()));
        }
        assert!(!sel.contains(DayId::new(4).unwrap()));

        assert!("7-5".parse::<DaySelection>().is_err());
        assert!("".parse::<DaySelection>().is_err());
        assert!("0".parse::<DaySelection>().is_err());
    }

    #[test]
    fn test_day_selection_wide_range() {
        let sel: DaySelection = "1-4000000000".parse().unwrap();
        assert!(sel.contains(DayId::new(1).unwrap()));
        assert!(sel.contains(DayId::new(3_999_999_999).unwrap()));
        assert!(!sel.contains(DayId::new(4_000_000_001).unwrap()));
    }

    #[test]
    fn test_day_selection_apply() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1.oc", "2.oc", "3.oc"] {
            touch(dir.path(), name);
        }
        let units = discover(dir.path()).unwrap();

        let sel: DaySelection = "2-3".parse().unwrap();
        let kept = sel.apply(units.clone(), dir.path()).unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].id().get(), 2);

        let sel: DaySelection = "9".parse().unwrap();
        assert!(matches!(
            sel.apply(units, dir.path()),
            Err(DiscoveryError::NoUnitsFound { .. })
        ));
    }
}
