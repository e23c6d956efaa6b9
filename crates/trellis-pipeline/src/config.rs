//! Configuration types for the pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup. The experiment directory is
//! an explicit configuration value threaded through pipeline construction —
//! there is no process-wide global — so independent pipelines with
//! different roots coexist safely in one process.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a pipeline instance.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration with a
/// fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use trellis_pipeline::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .experiment_dir("runs/titanic")
///     .cache(true)
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory under which every trainable step persists its fitted
    /// state (one subdirectory per step). Created lazily on first persist;
    /// never cleared by the framework.
    /// Default: "experiments"
    pub experiment_dir: PathBuf,

    /// Whether fitted state is cached to and reused from the experiment
    /// directory. When false, every `fit_transform` re-fits and nothing is
    /// persisted. Individual steps can additionally opt out.
    /// Default: true
    pub cache: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            experiment_dir: PathBuf::from("experiments"),
            cache: true,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.experiment_dir.as_os_str().is_empty() {
            return Err(ConfigValidationError::EmptyExperimentDir);
        }
        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Experiment directory path must not be empty")]
    EmptyExperimentDir,
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    experiment_dir: Option<PathBuf>,
    cache: Option<bool>,
}

impl PipelineConfigBuilder {
    /// Set the experiment directory shared by all steps of the pipeline.
    ///
    /// Concurrent pipeline runs must use disjoint experiment directories;
    /// no locking is performed on the shared root.
    pub fn experiment_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.experiment_dir = Some(path.into());
        self
    }

    /// Enable or disable disk-backed caching of fitted state.
    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let config = PipelineConfig {
            experiment_dir: self
                .experiment_dir
                .unwrap_or_else(|| PathBuf::from("experiments")),
            cache: self.cache.unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.experiment_dir, PathBuf::from("experiments"));
        assert!(config.cache);
    }

    #[test]
    fn test_builder_defaults() {
        let config = PipelineConfig::builder().build().unwrap();
        assert_eq!(config.experiment_dir, PathBuf::from("experiments"));
        assert!(config.cache);
    }

    #[test]
    fn test_builder_custom_values() {
        let config = PipelineConfig::builder()
            .experiment_dir("runs/exp1")
            .cache(false)
            .build()
            .unwrap();

        assert_eq!(config.experiment_dir, PathBuf::from("runs/exp1"));
        assert!(!config.cache);
    }

    #[test]
    fn test_validation_empty_experiment_dir() {
        let result = PipelineConfig::builder().experiment_dir("").build();

        assert!(result.is_err());
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::EmptyExperimentDir
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = PipelineConfig::builder()
            .experiment_dir("runs/exp2")
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: PipelineConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config.experiment_dir, deserialized.experiment_dir);
        assert_eq!(config.cache, deserialized.cache);
    }
}
