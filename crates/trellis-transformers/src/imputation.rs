//! Statistical imputation of missing values.
//!
//! [`StatisticalImputer`] learns per-column fill values from the training
//! frame — mean or median for numeric columns, mode for string columns —
//! and applies them to any frame with overlapping columns. Fitted fill
//! values persist as a single JSON artifact.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use trellis_pipeline::{
    DataBundle, PipelineError, Result, Transformer, TransformerContract, read_json, write_json,
};

use crate::utils::{fill_numeric_nulls, fill_string_nulls, is_numeric_dtype, is_string_dtype, string_mode};

/// Strategy for imputing missing numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ImputeStrategy {
    /// Use the mean of non-null values
    Mean,
    /// Use the median of non-null values
    #[default]
    Median,
}

/// Fitted per-column fill values.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ImputerState {
    numeric_fill: HashMap<String, f64>,
    string_fill: HashMap<String, String>,
}

const STATE_FILE: &str = "imputer.json";

/// Learns fill values on `fit` and fills nulls on `transform`.
///
/// Consumes and produces the `X` frame. Columns unseen during `fit` pass
/// through untouched; string columns always use the mode.
pub struct StatisticalImputer {
    strategy: ImputeStrategy,
    state: Option<ImputerState>,
}

impl StatisticalImputer {
    /// Create an imputer with the given numeric strategy.
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            state: None,
        }
    }

    /// Whether the imputer has been fit or loaded.
    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }
}

impl Default for StatisticalImputer {
    fn default() -> Self {
        Self::new(ImputeStrategy::default())
    }
}

impl Transformer for StatisticalImputer {
    fn contract(&self) -> TransformerContract {
        TransformerContract::new(&["X"], &["X"])
    }

    fn fit(&mut self, inputs: &DataBundle) -> Result<()> {
        let df = inputs.frame("X")?;
        let mut state = ImputerState::default();

        for col in df.get_columns() {
            let series = col.as_materialized_series();
            let name = col.name().to_string();

            if is_numeric_dtype(col.dtype()) {
                let fill = match self.strategy {
                    ImputeStrategy::Mean => series.mean(),
                    ImputeStrategy::Median => series.median(),
                };
                // A column with no valid values has nothing to learn from.
                if let Some(fill) = fill {
                    state.numeric_fill.insert(name, fill);
                }
            } else if is_string_dtype(col.dtype()) {
                if let Some(mode) = string_mode(series) {
                    state.string_fill.insert(name, mode);
                }
            }
        }

        debug!(
            "Imputer fitted: {} numeric, {} string columns",
            state.numeric_fill.len(),
            state.string_fill.len()
        );
        self.state = Some(state);
        Ok(())
    }

    fn transform(&self, inputs: &DataBundle) -> Result<DataBundle> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| PipelineError::NotFitted("statistical_imputer".to_string()))?;
        let mut df = inputs.frame("X")?.clone();

        for (name, fill) in &state.numeric_fill {
            if let Ok(col) = df.column(name) {
                if col.null_count() == 0 {
                    continue;
                }
                let filled = fill_numeric_nulls(col.as_materialized_series(), *fill)?;
                df.replace(name, filled)?;
            }
        }

        for (name, fill) in &state.string_fill {
            if let Ok(col) = df.column(name) {
                if col.null_count() == 0 {
                    continue;
                }
                let filled = fill_string_nulls(col.as_materialized_series(), fill)?;
                df.replace(name, filled)?;
            }
        }

        Ok(DataBundle::new().with("X", df))
    }

    fn persist(&self, location: &Path) -> Result<()> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| PipelineError::NotFitted("statistical_imputer".to_string()))?;
        write_json(location, STATE_FILE, state)
    }

    fn load(&mut self, location: &Path) -> Result<()> {
        self.state = Some(read_json(location, STATE_FILE)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(df: DataFrame) -> DataBundle {
        DataBundle::new().with("X", df)
    }

    #[test]
    fn test_median_imputation() {
        let train = df!["values" => [Some(1.0), None, Some(3.0), None, Some(5.0)]].unwrap();

        let mut imputer = StatisticalImputer::default();
        imputer.fit(&bundle(train.clone())).unwrap();
        let out = imputer.transform(&bundle(train)).unwrap();

        let values = out.frame("X").unwrap().column("values").unwrap().clone();
        assert_eq!(values.null_count(), 0);
        // Median of [1, 3, 5] = 3
        assert_eq!(values.get(1).unwrap().try_extract::<f64>().unwrap(), 3.0);
        assert_eq!(values.get(3).unwrap().try_extract::<f64>().unwrap(), 3.0);
    }

    #[test]
    fn test_mean_imputation() {
        let train = df!["values" => [Some(1.0), None, Some(5.0)]].unwrap();

        let mut imputer = StatisticalImputer::new(ImputeStrategy::Mean);
        imputer.fit(&bundle(train.clone())).unwrap();
        let out = imputer.transform(&bundle(train)).unwrap();

        let values = out.frame("X").unwrap().column("values").unwrap().clone();
        // Mean of [1, 5] = 3
        assert_eq!(values.get(1).unwrap().try_extract::<f64>().unwrap(), 3.0);
    }

    #[test]
    fn test_string_mode_imputation() {
        let train = df!["category" => [Some("A"), Some("B"), Some("A"), None]].unwrap();

        let mut imputer = StatisticalImputer::default();
        imputer.fit(&bundle(train.clone())).unwrap();
        let out = imputer.transform(&bundle(train)).unwrap();

        let category = out.frame("X").unwrap().column("category").unwrap().clone();
        assert_eq!(category.null_count(), 0);
        assert!(category.get(3).unwrap().to_string().contains("A"));
    }

    #[test]
    fn test_fill_values_come_from_training_data() {
        let train = df!["values" => [Some(10.0), Some(20.0), Some(30.0)]].unwrap();
        let test = df!["values" => [Some(1.0), None]].unwrap();

        let mut imputer = StatisticalImputer::default();
        imputer.fit(&bundle(train)).unwrap();
        let out = imputer.transform(&bundle(test)).unwrap();

        let values = out.frame("X").unwrap().column("values").unwrap().clone();
        // The fill is the training median (20), not the test median.
        assert_eq!(values.get(1).unwrap().try_extract::<f64>().unwrap(), 20.0);
    }

    #[test]
    fn test_all_null_column_left_alone() {
        let train = df![
            "empty" => [Option::<f64>::None, None],
            "ok" => [Some(1.0), Some(2.0)],
        ]
        .unwrap();

        let mut imputer = StatisticalImputer::default();
        imputer.fit(&bundle(train.clone())).unwrap();
        let out = imputer.transform(&bundle(train)).unwrap();

        // No fill value could be learned for "empty".
        let empty = out.frame("X").unwrap().column("empty").unwrap().clone();
        assert_eq!(empty.null_count(), 2);
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let imputer = StatisticalImputer::default();
        let err = imputer
            .transform(&bundle(df!["values" => [1.0]].unwrap()))
            .unwrap_err();
        assert_eq!(err.error_code(), "NOT_FITTED");
    }

    #[test]
    fn test_persist_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let train = df!["values" => [Some(1.0), None, Some(3.0)]].unwrap();

        let mut imputer = StatisticalImputer::default();
        imputer.fit(&bundle(train.clone())).unwrap();
        imputer.persist(tmp.path()).unwrap();

        let mut restored = StatisticalImputer::default();
        restored.load(tmp.path()).unwrap();

        let a = imputer.transform(&bundle(train.clone())).unwrap();
        let b = restored.transform(&bundle(train)).unwrap();
        assert_eq!(
            a.frame("X").unwrap().column("values").unwrap().get(1).unwrap(),
            b.frame("X").unwrap().column("values").unwrap().get(1).unwrap()
        );
    }

    #[test]
    fn test_refit_overwrites_parameters() {
        let mut imputer = StatisticalImputer::default();
        imputer
            .fit(&bundle(df!["values" => [1.0, 1.0, 1.0]].unwrap()))
            .unwrap();
        imputer
            .fit(&bundle(df!["values" => [9.0, 9.0, 9.0]].unwrap()))
            .unwrap();

        let test = df!["values" => [Some(0.0), None]].unwrap();
        let out = imputer.transform(&bundle(test)).unwrap();
        let values = out.frame("X").unwrap().column("values").unwrap().clone();
        assert_eq!(values.get(1).unwrap().try_extract::<f64>().unwrap(), 9.0);
    }
}
