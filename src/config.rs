use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub normalize: NormalizeConfig,
    pub geometry: GeometryConfig,
    pub change_detection: ChangeDetectionConfig,
    pub validation: ValidationConfig,
}

/// Bounds applied while normalizing raw records.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Inclusive lower bound for completion/removal years
    pub min_year: i32,
    /// Inclusive upper bound for completion/removal years
    pub max_year: i32,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            min_year: 2014,
            max_year: 2025,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Douglas-Peucker tolerance in coordinate degrees (~11m at NYC latitude)
    pub simplify_tolerance: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            simplify_tolerance: 0.0001,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChangeDetectionConfig {
    /// Maximum number of records hashed when fingerprinting a collection
    pub sample_cap: usize,
}

impl Default for ChangeDetectionConfig {
    fn default() -> Self {
        Self { sample_cap: 1000 }
    }
}

/// Run-level gates checked before any destructive write.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// A dataset smaller than this aborts the run
    pub min_record_count: usize,
    /// Fraction of records allowed to miss a required field before aborting
    pub max_missing_field_rate: f64,
    /// Fraction of sampled records allowed to carry wrong-typed fields
    pub max_type_error_rate: f64,
    /// How many records to type-check
    pub type_check_sample: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_record_count: 100,
            max_missing_field_rate: 0.05,
            max_type_error_rate: 0.01,
            type_check_sample: 500,
        }
    }
}

impl Config {
    /// Load `config.toml` from the working directory, falling back to
    /// defaults when the file is absent.
    pub fn load() -> Result<Self> {
        let config_path = "config.toml";
        match fs::read_to_string(config_path) {
            Ok(content) => {
                let config: Config = toml::from_str(&content)?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Config::default()),
            Err(e) => Err(PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path, e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_all_sections() {
        let config = Config::default();
        assert_eq!(config.normalize.min_year, 2014);
        assert_eq!(config.normalize.max_year, 2025);
        assert_eq!(config.geometry.simplify_tolerance, 0.0001);
        assert_eq!(config.change_detection.sample_cap, 1000);
        assert!(config.validation.min_record_count > 0);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str("[geometry]\nsimplify_tolerance = 0.001\n").unwrap();
        assert_eq!(config.geometry.simplify_tolerance, 0.001);
        assert_eq!(config.normalize.min_year, 2014);
    }
}
