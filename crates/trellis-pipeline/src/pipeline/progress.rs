//! Progress reporting and cancellation support for pipeline execution.
//!
//! This module provides types for tracking resolution progress across the
//! step graph and supporting cancellation from external threads.
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_pipeline::{Pipeline, CancellationToken};
//!
//! let token = CancellationToken::new();
//! let token_clone = token.clone();
//!
//! // In another thread
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//!     token_clone.cancel();
//! });
//!
//! let result = Pipeline::builder()
//!     .cancellation_token(token)
//!     .on_progress(|update| {
//!         println!("[{:?}] {}", update.stage, update.message);
//!     })
//!     .build()?
//!     .fit_transform(&raw);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Phases of resolving a single step (or the run as a whole).
///
/// Unlike a fixed linear workflow, a step graph has no static stage
/// weights; overall progress is derived from resolved-step counts instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStage {
    /// Run is starting; the resolution order has been determined
    Initializing,
    /// Collecting a step's upstream outputs and raw inputs
    Resolving,
    /// Loading previously persisted state instead of fitting
    LoadingCache,
    /// Fitting a trainable step's transformer
    Fitting,
    /// Persisting freshly fitted state
    Persisting,
    /// Applying a step's transform
    Transforming,
    /// Run completed successfully
    Complete,
    /// Run was cancelled by user
    Cancelled,
    /// Run failed with an error
    Failed,
}

impl ExecutionStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Resolving => "Resolving Inputs",
            Self::LoadingCache => "Loading Cached State",
            Self::Fitting => "Fitting",
            Self::Persisting => "Persisting State",
            Self::Transforming => "Transforming",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }
}

/// Progress update emitted while a pipeline resolves its step graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Current execution stage
    pub stage: ExecutionStage,

    /// Step being resolved, if the update concerns a single step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,

    /// Steps fully resolved so far in this run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps_completed: Option<usize>,

    /// Total steps this run will resolve
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps_total: Option<usize>,

    /// Overall progress (0.0 - 1.0), derived from step counts
    pub progress: f32,

    /// Human-readable message describing current activity
    pub message: String,
}

impl ProgressUpdate {
    /// Creates a progress update not tied to a single step.
    pub fn new(stage: ExecutionStage, progress: f32, message: impl Into<String>) -> Self {
        Self {
            stage,
            step: None,
            steps_completed: None,
            steps_total: None,
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
        }
    }

    /// Creates a progress update for one step, deriving overall progress
    /// from the resolved-step count.
    pub fn for_step(
        stage: ExecutionStage,
        step: impl Into<String>,
        completed: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let progress = if total > 0 {
            completed as f32 / total as f32
        } else {
            0.0
        };
        Self {
            stage,
            step: Some(step.into()),
            steps_completed: Some(completed),
            steps_total: Some(total),
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
        }
    }

    /// Creates a completion progress update.
    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            stage: ExecutionStage::Complete,
            step: None,
            steps_completed: None,
            steps_total: None,
            progress: 1.0,
            message: message.into(),
        }
    }

    /// Creates a cancelled progress update.
    pub fn cancelled() -> Self {
        Self {
            stage: ExecutionStage::Cancelled,
            step: None,
            steps_completed: None,
            steps_total: None,
            progress: 0.0,
            message: "Pipeline cancelled by user".to_string(),
        }
    }

    /// Creates a failed progress update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            stage: ExecutionStage::Failed,
            step: None,
            steps_completed: None,
            steps_total: None,
            progress: 0.0,
            message: message.into(),
        }
    }
}

/// Trait for receiving progress updates during pipeline execution.
///
/// Implementations must be `Send + Sync` so a caller can run the pipeline
/// on a background thread while observing progress elsewhere.
pub trait ProgressReporter: Send + Sync {
    /// Called when progress is made during execution.
    ///
    /// May be called several times per step. Implementations should be
    /// efficient and non-blocking.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

/// Token for cancelling a running pipeline.
///
/// Uses an atomic boolean internally, making it safe to clone and share
/// across threads. Call [`cancel()`](Self::cancel) from any thread to
/// request cancellation; the pipeline checks the token between steps and
/// returns [`PipelineError::Cancelled`](crate::error::PipelineError::Cancelled)
/// if cancellation was requested.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    /// Creates a new cancellation token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation of the pipeline.
    ///
    /// Thread-safe; may be called from any thread.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested on this token or any of
    /// its clones.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Reset the token for reuse in another run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_cancellation_token_default_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancellation_token_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();

        token1.cancel();

        assert!(token1.is_cancelled());
        assert!(token2.is_cancelled());
    }

    #[test]
    fn test_cancellation_token_reset() {
        let token = CancellationToken::new();
        token.cancel();
        token.reset();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_progress_update_for_step() {
        let update =
            ProgressUpdate::for_step(ExecutionStage::Fitting, "scale", 1, 4, "Fitting scale");
        assert_eq!(update.stage, ExecutionStage::Fitting);
        assert_eq!(update.step, Some("scale".to_string()));
        assert_eq!(update.steps_completed, Some(1));
        assert_eq!(update.steps_total, Some(4));
        assert_eq!(update.progress, 0.25);
    }

    #[test]
    fn test_progress_update_complete() {
        let update = ProgressUpdate::complete("Done!");
        assert_eq!(update.stage, ExecutionStage::Complete);
        assert_eq!(update.progress, 1.0);
    }

    #[test]
    fn test_closure_progress_reporter() {
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        let reporter = ClosureProgressReporter::new(move |_update| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        reporter.report(ProgressUpdate::new(ExecutionStage::Initializing, 0.0, "Go"));
        reporter.report(ProgressUpdate::complete("Done"));

        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_execution_stage_serializes_snake_case() {
        let json = serde_json::to_string(&ExecutionStage::LoadingCache).unwrap();
        assert_eq!(json, "\"loading_cache\"");
        let json = serde_json::to_string(&ExecutionStage::Fitting).unwrap();
        assert_eq!(json, "\"fitting\"");
    }

    #[test]
    fn test_progress_update_json_round_trip() {
        let update = ProgressUpdate::for_step(
            ExecutionStage::Transforming,
            "impute",
            2,
            3,
            "Transforming impute",
        );

        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains("\"stage\":\"transforming\""));
        assert!(json.contains("\"step\":\"impute\""));

        let deserialized: ProgressUpdate = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.steps_completed, Some(2));
        assert_eq!(deserialized.steps_total, Some(3));
    }

    #[test]
    fn test_cancellation_across_threads() {
        let token = CancellationToken::new();
        let token_clone = token.clone();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            token_clone.is_cancelled()
        });

        token.cancel();

        let was_cancelled = handle.join().expect("Thread should not panic");
        assert!(was_cancelled, "Cancellation should be visible across threads");
    }
}
