//! Binary classification.
//!
//! [`LogisticRegression`] is a small batch-gradient-descent classifier over
//! the numeric columns of `X`. It exists so a pipeline can end in a
//! trainable modeling step whose fitted parameters round-trip through the
//! cache; it is not a tuned learner.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use trellis_pipeline::{
    DataBundle, PipelineError, Result, Transformer, TransformerContract, Value, read_json,
    write_json,
};

use crate::utils::{numeric_feature_matrix, series_to_dense_f64s};

/// Fitted model parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelState {
    weights: Vec<f64>,
    bias: f64,
    /// Feature column order the weights were learned in.
    features: Vec<String>,
}

const STATE_FILE: &str = "model.json";

/// Binary logistic regression fit by batch gradient descent.
///
/// `fit` consumes the `X` frame and a numeric 0/1 `y` column; `transform`
/// needs only `X` and produces `y_pred` (one prediction per input row)
/// plus `y_proba` with the raw probabilities.
///
/// Features are taken from the numeric columns of `X` in frame order;
/// standardize them upstream or gradient descent may crawl.
pub struct LogisticRegression {
    learning_rate: f64,
    epochs: usize,
    state: Option<ModelState>,
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 500,
            state: None,
        }
    }

    /// Set the gradient-descent learning rate.
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the number of full-batch epochs.
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Whether the model has been fit or loaded.
    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    fn sigmoid(z: f64) -> f64 {
        1.0 / (1.0 + (-z).exp())
    }

    /// Accept the label column either as a Series or a plain float vector.
    fn label_vector(inputs: &DataBundle) -> Result<Vec<f64>> {
        match inputs.expect("y")? {
            Value::Column(series) => series_to_dense_f64s(series),
            Value::Floats(values) => Ok(values.clone()),
            other => Err(PipelineError::WrongValueType {
                key: "y".to_string(),
                expected: "column",
                actual: other.kind(),
            }),
        }
    }

    /// Build the feature matrix in the fitted column order.
    fn matrix_for(&self, state: &ModelState, df: &DataFrame) -> Result<Vec<Vec<f64>>> {
        let mut columns = Vec::with_capacity(state.features.len());
        for name in &state.features {
            let col = df.column(name)?;
            columns.push(series_to_dense_f64s(col.as_materialized_series())?);
        }

        let height = df.height();
        let mut rows = Vec::with_capacity(height);
        for i in 0..height {
            rows.push(columns.iter().map(|c| c[i]).collect());
        }
        Ok(rows)
    }
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for LogisticRegression {
    fn contract(&self) -> TransformerContract {
        TransformerContract::new(&["X"], &["y_pred"]).with_fit_inputs(&["X", "y"])
    }

    fn fit(&mut self, inputs: &DataBundle) -> Result<()> {
        let df = inputs.frame("X")?;
        let (features, rows) = numeric_feature_matrix(df)?;
        let labels = Self::label_vector(inputs)?;

        if labels.len() != rows.len() {
            return Err(PipelineError::InvalidData(format!(
                "label count {} does not match row count {}",
                labels.len(),
                rows.len()
            )));
        }
        if rows.is_empty() {
            return Err(PipelineError::InvalidData(
                "cannot fit on an empty frame".to_string(),
            ));
        }

        let n = rows.len() as f64;
        let dim = features.len();
        let mut weights = vec![0.0f64; dim];
        let mut bias = 0.0f64;

        for _ in 0..self.epochs {
            let mut grad_w = vec![0.0f64; dim];
            let mut grad_b = 0.0f64;

            for (row, &label) in rows.iter().zip(labels.iter()) {
                let z = row
                    .iter()
                    .zip(weights.iter())
                    .map(|(x, w)| x * w)
                    .sum::<f64>()
                    + bias;
                let residual = Self::sigmoid(z) - label;
                for (g, x) in grad_w.iter_mut().zip(row.iter()) {
                    *g += residual * x;
                }
                grad_b += residual;
            }

            for (w, g) in weights.iter_mut().zip(grad_w.iter()) {
                *w -= self.learning_rate * g / n;
            }
            bias -= self.learning_rate * grad_b / n;
        }

        debug!(
            "Logistic regression fitted over {} features, {} rows",
            dim,
            rows.len()
        );
        self.state = Some(ModelState {
            weights,
            bias,
            features,
        });
        Ok(())
    }

    fn transform(&self, inputs: &DataBundle) -> Result<DataBundle> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| PipelineError::NotFitted("logistic_regression".to_string()))?;

        let df = inputs.frame("X")?;
        let rows = self.matrix_for(state, df)?;

        let mut probabilities = Vec::with_capacity(rows.len());
        let mut predictions: Vec<u32> = Vec::with_capacity(rows.len());
        for row in &rows {
            let z = row
                .iter()
                .zip(state.weights.iter())
                .map(|(x, w)| x * w)
                .sum::<f64>()
                + state.bias;
            let p = Self::sigmoid(z);
            probabilities.push(p);
            predictions.push(if p >= 0.5 { 1 } else { 0 });
        }

        Ok(DataBundle::new()
            .with("y_pred", Series::new("y_pred".into(), predictions))
            .with("y_proba", probabilities))
    }

    fn persist(&self, location: &Path) -> Result<()> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| PipelineError::NotFitted("logistic_regression".to_string()))?;
        write_json(location, STATE_FILE, state)
    }

    fn load(&mut self, location: &Path) -> Result<()> {
        self.state = Some(read_json(location, STATE_FILE)?);
        Ok(())
    }
}
