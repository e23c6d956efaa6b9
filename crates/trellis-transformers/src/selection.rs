//! Column selection.
//!
//! [`ColumnSelector`] is a transform-only step: it narrows the `X` frame to
//! a declared set of columns. Nothing is learned, so it is used on
//! non-trainable steps.

use serde::{Deserialize, Serialize};

use trellis_pipeline::{DataBundle, Result, Transformer, TransformerContract};

/// Keeps only the declared columns of the `X` frame, in declaration order.
///
/// A missing column is an error — the selector is the contract between a
/// pipeline and the frames fed into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSelector {
    columns: Vec<String>,
}

impl ColumnSelector {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// The declared columns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Transformer for ColumnSelector {
    fn contract(&self) -> TransformerContract {
        TransformerContract::new(&["X"], &["X"])
    }

    fn transform(&self, inputs: &DataBundle) -> Result<DataBundle> {
        let df = inputs.frame("X")?;
        let selected = df.select(self.columns.iter().map(String::as_str))?;
        Ok(DataBundle::new().with("X", selected))
    }
}
