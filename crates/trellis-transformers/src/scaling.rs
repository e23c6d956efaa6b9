//! Feature scaling.
//!
//! [`StandardScaler`] centers each numeric column on its training mean and
//! divides by its training standard deviation. Constant columns are only
//! centered.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use trellis_pipeline::{
    DataBundle, PipelineError, Result, Transformer, TransformerContract, read_json, write_json,
};

use crate::utils::{is_numeric_dtype, series_to_f64s};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ColumnScale {
    mean: f64,
    std: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct ScalerState {
    columns: HashMap<String, ColumnScale>,
}

const STATE_FILE: &str = "scaler.json";

/// Standardizes numeric columns to zero mean and unit variance.
///
/// Consumes and produces the `X` frame. Non-numeric columns and columns
/// unseen during `fit` pass through untouched; nulls are preserved
/// (impute upstream if the consumer cannot handle them).
#[derive(Default)]
pub struct StandardScaler {
    state: Option<ScalerState>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the scaler has been fit or loaded.
    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }
}

impl Transformer for StandardScaler {
    fn contract(&self) -> TransformerContract {
        TransformerContract::new(&["X"], &["X"])
    }

    fn fit(&mut self, inputs: &DataBundle) -> Result<()> {
        let df = inputs.frame("X")?;
        let mut state = ScalerState::default();

        for col in df.get_columns() {
            if !is_numeric_dtype(col.dtype()) {
                continue;
            }
            let values: Vec<f64> = series_to_f64s(col.as_materialized_series())?
                .into_iter()
                .flatten()
                .collect();
            if values.is_empty() {
                continue;
            }
            let (mean, std) = crate::utils::mean_and_std(&values);
            state
                .columns
                .insert(col.name().to_string(), ColumnScale { mean, std });
        }

        debug!("Scaler fitted over {} columns", state.columns.len());
        self.state = Some(state);
        Ok(())
    }

    fn transform(&self, inputs: &DataBundle) -> Result<DataBundle> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| PipelineError::NotFitted("standard_scaler".to_string()))?;
        let mut df = inputs.frame("X")?.clone();

        for (name, scale) in &state.columns {
            let Ok(col) = df.column(name) else {
                continue;
            };
            let values = series_to_f64s(col.as_materialized_series())?;
            let scaled: Vec<Option<f64>> = values
                .into_iter()
                .map(|v| {
                    v.map(|v| {
                        if scale.std > 0.0 {
                            (v - scale.mean) / scale.std
                        } else {
                            v - scale.mean
                        }
                    })
                })
                .collect();
            df.replace(name, Series::new(name.as_str().into(), scaled))?;
        }

        Ok(DataBundle::new().with("X", df))
    }

    fn persist(&self, location: &Path) -> Result<()> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| PipelineError::NotFitted("standard_scaler".to_string()))?;
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
    fn test_scaling_centers_and_normalizes() {
        let train = df!["values" => [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]].unwrap();

        let mut scaler = StandardScaler::new();
        scaler.fit(&bundle(train.clone())).unwrap();
        let out = scaler.transform(&bundle(train)).unwrap();

        let values = out.frame("X").unwrap().column("values").unwrap().clone();
        // mean 5, std 2: first value (2 - 5) / 2 = -1.5
        assert_eq!(values.get(0).unwrap().try_extract::<f64>().unwrap(), -1.5);
        assert_eq!(values.get(7).unwrap().try_extract::<f64>().unwrap(), 2.0);
    }

    #[test]
    fn test_scaling_uses_training_statistics() {
        let train = df!["values" => [0.0, 10.0]].unwrap();
        let test = df!["values" => [5.0]].unwrap();

        let mut scaler = StandardScaler::new();
        scaler.fit(&bundle(train)).unwrap();
        let out = scaler.transform(&bundle(test)).unwrap();

        let values = out.frame("X").unwrap().column("values").unwrap().clone();
        // train mean 5, std 5: (5 - 5) / 5 = 0
        assert_eq!(values.get(0).unwrap().try_extract::<f64>().unwrap(), 0.0);
    }

    #[test]
    fn test_constant_column_only_centered() {
        let train = df!["values" => [3.0, 3.0, 3.0]].unwrap();

        let mut scaler = StandardScaler::new();
        scaler.fit(&bundle(train.clone())).unwrap();
        let out = scaler.transform(&bundle(train)).unwrap();

        let values = out.frame("X").unwrap().column("values").unwrap().clone();
        assert_eq!(values.get(0).unwrap().try_extract::<f64>().unwrap(), 0.0);
    }

    #[test]
    fn test_string_columns_untouched() {
        let train = df![
            "values" => [1.0, 3.0],
            "name" => ["ada", "bob"],
        ]
        .unwrap();

        let mut scaler = StandardScaler::new();
        scaler.fit(&bundle(train.clone())).unwrap();
        let out = scaler.transform(&bundle(train)).unwrap();

        let name = out.frame("X").unwrap().column("name").unwrap().clone();
        assert!(name.get(0).unwrap().to_string().contains("ada"));
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let scaler = StandardScaler::new();
        let err = scaler
            .transform(&bundle(df!["values" => [1.0]].unwrap()))
            .unwrap_err();
        assert_eq!(err.error_code(), "NOT_FITTED");
    }

    #[test]
    fn test_persist_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let train = df!["values" => [0.0, 10.0]].unwrap();
        let test = df!["values" => [7.5]].unwrap();

        let mut scaler = StandardScaler::new();
        scaler.fit(&bundle(train)).unwrap();
        scaler.persist(tmp.path()).unwrap();

        let mut restored = StandardScaler::new();
        restored.load(tmp.path()).unwrap();

        let a = scaler.transform(&bundle(test.clone())).unwrap();
        let b = restored.transform(&bundle(test)).unwrap();
        assert_eq!(
            a.frame("X").unwrap().column("values").unwrap().get(0).unwrap(),
            b.frame("X").unwrap().column("values").unwrap().get(0).unwrap()
        );
    }
}
