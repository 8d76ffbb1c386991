//! Tunables for containment resolution and tie-breaking.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    /// Minimum fraction of a descendant's area that must lie inside its ancestor.
    pub containment_threshold: f64,

    /// Relative tolerance under which two areas count as equal.
    pub equal_area_tolerance: f64,

    /// Consecutive boundary points closer than this are merged; also the
    /// simplification tolerance.
    pub snap_epsilon: f64,

    /// Regions with area at or below this are degenerate.
    pub min_area: f64,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            containment_threshold: 0.95,
            equal_area_tolerance: 0.001,
            snap_epsilon: 0.001,
            min_area: 1e-9,
        }
    }
}

impl HierarchyConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read hierarchy config")?;
        let config: HierarchyConfig =
            toml::from_str(&content).context("Failed to parse hierarchy config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.containment_threshold;
        if !(t > 0.0 && t <= 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "containment_threshold",
                value: t,
                expected: "0 < value <= 1",
            });
        }
        check_non_negative("equal_area_tolerance", self.equal_area_tolerance)?;
        check_non_negative("snap_epsilon", self.snap_epsilon)?;
        check_non_negative("min_area", self.min_area)?;
        Ok(())
    }

    /// Whether two areas are equal within `equal_area_tolerance`.
    pub fn areas_equal(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.equal_area_tolerance * a.max(b)
    }
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected: "finite and >= 0",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        assert!(HierarchyConfig::default().validate().is_ok());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let config = HierarchyConfig {
            containment_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange {
                field: "containment_threshold",
                ..
            })
        ));
    }

    #[test]
    fn test_areas_equal_is_relative() {
        let config = HierarchyConfig::default();
        assert!(config.areas_equal(1000.0, 999.5));
        assert!(!config.areas_equal(1000.0, 990.0));
        assert!(config.areas_equal(0.0, 0.0));
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "containment_threshold = 0.9").unwrap();

        let config = HierarchyConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.containment_threshold, 0.9);
        assert_eq!(config.equal_area_tolerance, 0.001);
    }
}
