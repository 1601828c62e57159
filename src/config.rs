//! Engine configuration.
//!
//! Loaded from a TOML file; every key is optional.
//!
//! ```toml
//! data_dir = "/var/lib/course-scheduler"
//! boundary = "half_open"      # or "inclusive" (default)
//! week_start = "sunday"       # or "monday" (default)
//! enforce_unit_hours = false  # default true
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{RegistryError, Result};
use crate::validation::{BoundaryPolicy, ConflictChecker, OverlapDetector, WeekStart, WeeklyHourAggregator};

/// Registry and validation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Directory holding one `<collection>.json` per collection. `None` keeps
    /// everything in memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Time-of-day boundary convention for overlap checks.
    pub boundary: BoundaryPolicy,
    /// First day of the week for weekly hour caps.
    pub week_start: WeekStart,
    /// Reject unit writes that push a course's unit hours above its total.
    pub enforce_unit_hours: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            boundary: BoundaryPolicy::default(),
            week_start: WeekStart::default(),
            enforce_unit_hours: true,
        }
    }
}

impl EngineConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RegistryError::Config(e.to_string()))
    }

    /// Reads `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(RegistryError::Config(format!(
                "cannot read {}: {err}",
                path.display()
            ))),
        }
    }

    /// Sets the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Sets the boundary policy.
    pub fn with_boundary(mut self, boundary: BoundaryPolicy) -> Self {
        self.boundary = boundary;
        self
    }

    /// Sets the week start.
    pub fn with_week_start(mut self, week_start: WeekStart) -> Self {
        self.week_start = week_start;
        self
    }

    pub(crate) fn conflict_checker(&self) -> ConflictChecker {
        ConflictChecker::new(OverlapDetector::new(self.boundary))
    }

    pub(crate) fn aggregator(&self) -> WeeklyHourAggregator {
        WeeklyHourAggregator::new(self.week_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.boundary, BoundaryPolicy::Inclusive);
        assert_eq!(config.week_start, WeekStart::Monday);
        assert!(config.enforce_unit_hours);
    }

    #[test]
    fn test_parse_all_keys() {
        let config = EngineConfig::from_toml_str(
            r#"
            data_dir = "/tmp/sched"
            boundary = "half_open"
            week_start = "sunday"
            enforce_unit_hours = false
            "#,
        )
        .unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/sched")));
        assert_eq!(config.boundary, BoundaryPolicy::HalfOpen);
        assert_eq!(config.week_start, WeekStart::Sunday);
        assert!(!config.enforce_unit_hours);
    }

    #[test]
    fn test_unknown_key_is_config_error() {
        let err = EngineConfig::from_toml_str("boundery = \"inclusive\"").unwrap_err();
        assert!(matches!(err, RegistryError::Config(_)));
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());

        let path = dir.path().join("engine.toml");
        fs::write(&path, "week_start = \"sunday\"\n").unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap().week_start, WeekStart::Sunday);
    }
}
