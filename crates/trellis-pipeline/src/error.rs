//! Custom error types for the step-graph pipeline.
//!
//! This module provides a comprehensive error hierarchy using `thiserror`
//! for better error handling and context throughout the pipeline.
//!
//! Graph-shape problems (`DuplicateStepName`, `UnknownInputStep`,
//! `CycleDetected`) are raised at build time; data-shape problems
//! (`MissingInputKey`, `MissingRawInput`, `ContractViolation`) at the first
//! resolution that hits them. Nothing is retried; transformer failures
//! propagate unchanged to the top-level caller.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigValidationError;

/// The main error type for pipeline operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Pipeline was cancelled by user.
    #[error("Pipeline cancelled")]
    Cancelled,

    /// A key was not found in a data bundle.
    #[error("Key '{0}' not found in data bundle")]
    KeyNotFound(String),

    /// A step's required input key is present in neither upstream outputs
    /// nor raw inputs.
    #[error("Step '{step}' requires input key '{key}' which is missing from resolved inputs")]
    MissingInputKey { step: String, key: String },

    /// A step references a raw input bundle that the caller did not supply.
    #[error("Step '{step}' references raw input '{name}' which was not supplied")]
    MissingRawInput { step: String, name: String },

    /// The step graph contains a cycle.
    #[error("Step graph contains a cycle: {path}")]
    CycleDetected { path: String },

    /// Two steps share the same name.
    #[error("Duplicate step name '{0}' in pipeline")]
    DuplicateStepName(String),

    /// A step lists an input step that does not exist in the pipeline.
    #[error("Step '{step}' lists unknown input step '{input}'")]
    UnknownInputStep { step: String, input: String },

    /// A step name was not found in the pipeline.
    #[error("Step '{0}' not found in pipeline")]
    UnknownStep(String),

    /// A transformer's output did not contain a declared output key.
    #[error("Step '{step}' violated its contract: declared output key '{key}' missing from transform result")]
    ContractViolation { step: String, key: String },

    /// A bundle value had a different variant than the caller expected.
    #[error("Value '{key}' has type {actual}, expected {expected}")]
    WrongValueType {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A transformer was asked to transform before being fit or loaded.
    #[error("Transformer '{0}' used before fit or load")]
    NotFitted(String),

    /// Invalid data provided for fitting or transforming.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Persist/load I/O failure at a cache location.
    #[error("Persistence error at '{}': {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigValidationError),

    /// Internal error (e.g., corrupted bookkeeping).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get a stable error code for callers that match on failure classes.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::KeyNotFound(_) => "KEY_NOT_FOUND",
            Self::MissingInputKey { .. } => "MISSING_INPUT_KEY",
            Self::MissingRawInput { .. } => "MISSING_RAW_INPUT",
            Self::CycleDetected { .. } => "CYCLE_DETECTED",
            Self::DuplicateStepName(_) => "DUPLICATE_STEP_NAME",
            Self::UnknownInputStep { .. } => "UNKNOWN_INPUT_STEP",
            Self::UnknownStep(_) => "UNKNOWN_STEP",
            Self::ContractViolation { .. } => "CONTRACT_VIOLATION",
            Self::WrongValueType { .. } => "WRONG_VALUE_TYPE",
            Self::NotFitted(_) => "NOT_FITTED",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::Persistence { .. } => "PERSISTENCE_ERROR",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this error was raised during graph construction
    /// (as opposed to resolution or transformer execution).
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::CycleDetected { .. }
                | Self::DuplicateStepName(_)
                | Self::UnknownInputStep { .. }
                | Self::InvalidConfig(_)
        )
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(PipelineError::Cancelled.error_code(), "CANCELLED");
        assert_eq!(
            PipelineError::MissingInputKey {
                step: "classify".to_string(),
                key: "y".to_string(),
            }
            .error_code(),
            "MISSING_INPUT_KEY"
        );
        assert_eq!(
            PipelineError::CycleDetected {
                path: "a -> b -> a".to_string(),
            }
            .error_code(),
            "CYCLE_DETECTED"
        );
    }

    #[test]
    fn test_is_cancelled() {
        assert!(PipelineError::Cancelled.is_cancelled());
        assert!(!PipelineError::KeyNotFound("X".to_string()).is_cancelled());
    }

    #[test]
    fn test_is_construction_error() {
        assert!(
            PipelineError::DuplicateStepName("scale".to_string()).is_construction_error()
        );
        assert!(
            PipelineError::CycleDetected {
                path: "a -> a".to_string(),
            }
            .is_construction_error()
        );
        assert!(
            !PipelineError::MissingInputKey {
                step: "scale".to_string(),
                key: "X".to_string(),
            }
            .is_construction_error()
        );
    }

    #[test]
    fn test_with_context() {
        let error = PipelineError::KeyNotFound("X".to_string())
            .with_context("While resolving step 'scale'");
        assert!(error.to_string().contains("While resolving step 'scale'"));
        assert_eq!(error.error_code(), "KEY_NOT_FOUND"); // Preserves original code
    }

    #[test]
    fn test_missing_key_message_names_key() {
        let error = PipelineError::MissingInputKey {
            step: "classify".to_string(),
            key: "y".to_string(),
        };
        assert!(error.to_string().contains("'y'"));
        assert!(error.to_string().contains("'classify'"));
    }
}
