//! Categorical encoding.
//!
//! [`LabelEncoder`] learns the distinct labels of the `y` column and maps
//! them to dense integer codes, with a stable (sorted) ordering so the
//! same data always produces the same codes.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use trellis_pipeline::{
    DataBundle, PipelineError, Result, Transformer, TransformerContract, read_json, write_json,
};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct EncoderState {
    /// Distinct labels in code order: `classes[code]` is the label.
    classes: Vec<String>,
}

const STATE_FILE: &str = "encoder.json";

/// Maps string labels in `y` to `u32` codes.
///
/// Labels unseen during `fit` are rejected — an encoder cannot invent a
/// code for them.
#[derive(Default)]
pub struct LabelEncoder {
    state: Option<EncoderState>,
}

impl LabelEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distinct labels in code order, once fitted.
    pub fn classes(&self) -> Option<&[String]> {
        self.state.as_ref().map(|s| s.classes.as_slice())
    }

    /// The label behind a code, once fitted.
    pub fn decode(&self, code: u32) -> Option<&str> {
        self.state
            .as_ref()
            .and_then(|s| s.classes.get(code as usize))
            .map(String::as_str)
    }

    fn labels_of(series: &Series) -> Result<Vec<String>> {
        let str_series = series.cast(&DataType::String)?;
        let chunked = str_series.str()?;
        let mut labels = Vec::with_capacity(series.len());
        for (i, val) in chunked.into_iter().enumerate() {
            match val {
                Some(v) => labels.push(v.to_string()),
                None => {
                    return Err(PipelineError::InvalidData(format!(
                        "label column contains a null at row {i}"
                    )));
                }
            }
        }
        Ok(labels)
    }
}

impl Transformer for LabelEncoder {
    fn contract(&self) -> TransformerContract {
        TransformerContract::new(&["y"], &["y"])
    }

    fn fit(&mut self, inputs: &DataBundle) -> Result<()> {
        let labels = Self::labels_of(inputs.column("y")?)?;

        let mut classes: Vec<String> = labels;
        classes.sort();
        classes.dedup();

        self.state = Some(EncoderState { classes });
        Ok(())
    }

    fn transform(&self, inputs: &DataBundle) -> Result<DataBundle> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| PipelineError::NotFitted("label_encoder".to_string()))?;

        let codes: HashMap<&str, u32> = state
            .classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i as u32))
            .collect();

        let labels = Self::labels_of(inputs.column("y")?)?;
        let mut encoded = Vec::with_capacity(labels.len());
        for label in &labels {
            match codes.get(label.as_str()) {
                Some(&code) => encoded.push(code),
                None => {
                    return Err(PipelineError::InvalidData(format!(
                        "label '{label}' was not seen during fit"
                    )));
                }
            }
        }

        Ok(DataBundle::new().with("y", Series::new("y".into(), encoded)))
    }

    fn persist(&self, location: &Path) -> Result<()> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| PipelineError::NotFitted("label_encoder".to_string()))?;
        write_json(location, STATE_FILE, state)
    }

    fn load(&mut self, location: &Path) -> Result<()> {
        self.state = Some(read_json(location, STATE_FILE)?);
        Ok(())
    }
}
