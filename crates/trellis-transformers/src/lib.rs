//! Built-in transformers for trellis pipelines.
//!
//! Concrete [`Transformer`](trellis_pipeline::Transformer) implementations
//! covering the usual preprocessing-and-model chain:
//!
//! - **Imputation**: [`StatisticalImputer`] fills missing values with
//!   training statistics (mean/median, mode)
//! - **Scaling**: [`StandardScaler`] standardizes numeric columns
//! - **Encoding**: [`LabelEncoder`] maps string labels to integer codes
//! - **Selection**: [`ColumnSelector`] narrows a frame to declared columns
//!   (transform-only)
//! - **Classification**: [`LogisticRegression`] ends a pipeline in a
//!   trainable modeling step
//!
//! Every trainable transformer persists its fitted state as a small JSON
//! artifact, so a pipeline built from these steps resumes from its
//! experiment directory in a fresh process.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use trellis_pipeline::{DataBundle, Pipeline, PipelineConfig, Step, raw_inputs};
//! use trellis_transformers::{LogisticRegression, StandardScaler, StatisticalImputer};
//!
//! let mut pipeline = Pipeline::builder()
//!     .config(PipelineConfig::builder().experiment_dir("runs/titanic").build()?)
//!     .step(
//!         Step::new("impute", Box::new(StatisticalImputer::default()))
//!             .input_data("input")
//!             .trainable(true),
//!     )
//!     .step(
//!         Step::new("scale", Box::new(StandardScaler::new()))
//!             .input_step("impute")
//!             .trainable(true),
//!     )
//!     .step(
//!         Step::new("classify", Box::new(LogisticRegression::new()))
//!             .input_step("scale")
//!             .input_data("input")
//!             .trainable(true),
//!     )
//!     .build()?;
//!
//! let outputs = pipeline.fit_transform(&raw_inputs(
//!     "input",
//!     DataBundle::new().with("X", train_x).with("y", train_y),
//! ))?;
//! // outputs now carries "y_pred" aligned 1:1 with the training rows.
//! ```

pub mod classification;
pub mod encoding;
pub mod imputation;
pub mod scaling;
pub mod selection;
pub mod utils;

// Re-exports for convenient access
pub use classification::LogisticRegression;
pub use encoding::LabelEncoder;
pub use imputation::{ImputeStrategy, StatisticalImputer};
pub use scaling::StandardScaler;
pub use selection::ColumnSelector;
