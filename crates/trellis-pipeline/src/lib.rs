//! trellis-pipeline: step-graph pipelines with disk-backed caching.
//!
//! This crate provides a small orchestration core for fit/transform
//! workloads: named [`Step`]s wrap a [`Transformer`], reference each other
//! to form a directed acyclic graph, and exchange dictionary-shaped
//! [`DataBundle`]s. Resolving a step resolves all of its ancestors first,
//! each exactly once per call; trainable steps persist their fitted state
//! under an experiment directory so later runs — including runs in a fresh
//! process — skip refitting.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use trellis_pipeline::{DataBundle, Pipeline, PipelineConfig, Step, raw_inputs};
//!
//! let config = PipelineConfig::builder()
//!     .experiment_dir("runs/exp1")
//!     .build()?;
//!
//! let mut pipeline = Pipeline::builder()
//!     .config(config)
//!     .step(Step::new("impute", Box::new(imputer)).input_data("input").trainable(true))
//!     .step(Step::new("scale", Box::new(scaler)).input_step("impute").trainable(true))
//!     .on_progress(|u| println!("[{:.0}%] {}", u.progress * 100.0, u.message))
//!     .build()?;
//!
//! let raw = raw_inputs("input", DataBundle::new().with("X", train_frame));
//! let outputs = pipeline.fit_transform(&raw)?;
//!
//! // A later run with the same experiment dir loads fitted state instead
//! // of refitting; `transform` never fits at all.
//! let predictions = pipeline.transform(&raw_inputs("input", test_bundle))?;
//! ```
//!
//! # Architecture
//!
//! ```text
//! RawInputs ──► Pipeline (validated step graph)
//!                 │  dependency-order resolution, memoized per call
//!                 ▼
//!               Step ──owns──► Transformer (fit / transform / persist / load)
//!                 │
//!                 ▼
//!               <experiment_dir>/<step_name>/   cached fitted state
//! ```
//!
//! # Caching
//!
//! The cache check is presence-only: any transformer-written artifact
//! under a step's cache directory counts as cached state. Nothing
//! fingerprints the
//! transformer's configuration, so changing hyperparameters while stale
//! state sits at the same location silently serves the stale parameters.
//! Clear the experiment directory ([`Pipeline::clear_cache`]) or point the
//! config at a fresh one to force recomputation.
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, PipelineError>`](PipelineError).
//! Graph-shape errors (`DuplicateStepName`, `UnknownInputStep`,
//! `CycleDetected`) surface at [`PipelineBuilder::build`]; data-shape
//! errors (`MissingInputKey`, `MissingRawInput`, `ContractViolation`) at
//! resolution. Transformer failures propagate unchanged — no retries.
//!
//! # Thread Safety
//!
//! Resolution is single-threaded and synchronous. `Pipeline` is `Send`, so
//! a run can be moved onto a background thread; [`CancellationToken`] is
//! the cross-thread channel back into it. Concurrent runs sharing one
//! experiment directory race on the cache — use disjoint roots per
//! concurrent run.

pub mod config;
pub mod data;
pub mod error;
pub mod persistence;
pub mod pipeline;
pub mod step;
pub mod transformer;

// Re-exports for convenient access
pub use config::{ConfigValidationError, PipelineConfig, PipelineConfigBuilder};
pub use data::{DataBundle, RawInputs, Value, raw_inputs};
pub use error::{PipelineError, Result, ResultExt};
pub use persistence::{has_cached_state, read_json, step_cache_dir, write_json};
pub use pipeline::{
    CancellationToken, ClosureProgressReporter, ExecutionStage, Pipeline, PipelineBuilder,
    ProgressReporter, ProgressUpdate,
};
pub use step::Step;
pub use transformer::{FnTransformer, Transformer, TransformerContract};
