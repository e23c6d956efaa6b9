//! Dictionary-shaped data interchange between steps.
//!
//! Steps exchange data as [`DataBundle`]s: maps from string keys to tagged
//! [`Value`]s. Keys are the inter-step contract; nothing beyond key
//! existence is enforced at this layer. Callers supply [`RawInputs`], a map
//! from a logical input name to a bundle, e.g. the classic
//! `{"input": {"X": <frame>, "y": <column>}}` shape.

use polars::prelude::*;
use std::collections::HashMap;

use crate::error::{PipelineError, Result};

/// A single value flowing between steps.
///
/// The variant set covers the payloads transformers actually exchange:
/// tables, columns, plain float vectors, scalars, text and free-form JSON.
#[derive(Debug, Clone)]
pub enum Value {
    /// A polars DataFrame (a table).
    Frame(DataFrame),
    /// A single polars Series (a column).
    Column(Series),
    /// A plain vector of floats.
    Floats(Vec<f64>),
    /// A single float.
    Scalar(f64),
    /// A text value.
    Text(String),
    /// Free-form JSON, for metadata-shaped payloads.
    Json(serde_json::Value),
}

impl Value {
    /// The variant name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Frame(_) => "frame",
            Self::Column(_) => "column",
            Self::Floats(_) => "floats",
            Self::Scalar(_) => "scalar",
            Self::Text(_) => "text",
            Self::Json(_) => "json",
        }
    }

    /// Borrow the value as a DataFrame, if it is one.
    pub fn as_frame(&self) -> Option<&DataFrame> {
        match self {
            Self::Frame(df) => Some(df),
            _ => None,
        }
    }

    /// Borrow the value as a Series, if it is one.
    pub fn as_column(&self) -> Option<&Series> {
        match self {
            Self::Column(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the value as a float vector, if it is one.
    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            Self::Floats(v) => Some(v),
            _ => None,
        }
    }

    /// Get the value as a scalar, if it is one.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// Borrow the value as text, if it is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<DataFrame> for Value {
    fn from(df: DataFrame) -> Self {
        Self::Frame(df)
    }
}

impl From<Series> for Value {
    fn from(s: Series) -> Self {
        Self::Column(s)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Self::Floats(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Scalar(v)
    }
}

/// A keyed collection of [`Value`]s — the unit of data exchanged between
/// steps and supplied by callers.
#[derive(Debug, Clone, Default)]
pub struct DataBundle {
    values: HashMap<String, Value>,
}

impl DataBundle {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, for literal bundle construction.
    ///
    /// ```rust,ignore
    /// let bundle = DataBundle::new()
    ///     .with("X", df)
    ///     .with("y", labels);
    /// ```
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Insert a value, replacing any existing value under the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Get a value by key, failing with [`PipelineError::KeyNotFound`].
    pub fn expect(&self, key: &str) -> Result<&Value> {
        self.values
            .get(key)
            .ok_or_else(|| PipelineError::KeyNotFound(key.to_string()))
    }

    /// Get a DataFrame by key, failing on absence or wrong variant.
    pub fn frame(&self, key: &str) -> Result<&DataFrame> {
        let value = self.expect(key)?;
        value.as_frame().ok_or_else(|| PipelineError::WrongValueType {
            key: key.to_string(),
            expected: "frame",
            actual: value.kind(),
        })
    }

    /// Get a Series by key, failing on absence or wrong variant.
    pub fn column(&self, key: &str) -> Result<&Series> {
        let value = self.expect(key)?;
        value.as_column().ok_or_else(|| PipelineError::WrongValueType {
            key: key.to_string(),
            expected: "column",
            actual: value.kind(),
        })
    }

    /// Get a float vector by key, failing on absence or wrong variant.
    pub fn floats(&self, key: &str) -> Result<&[f64]> {
        let value = self.expect(key)?;
        value.as_floats().ok_or_else(|| PipelineError::WrongValueType {
            key: key.to_string(),
            expected: "floats",
            actual: value.kind(),
        })
    }

    /// Get a scalar by key, failing on absence or wrong variant.
    pub fn scalar(&self, key: &str) -> Result<f64> {
        let value = self.expect(key)?;
        value.as_scalar().ok_or_else(|| PipelineError::WrongValueType {
            key: key.to_string(),
            expected: "scalar",
            actual: value.kind(),
        })
    }

    /// Whether a key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Iterate over keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of values in the bundle.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the bundle is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy every entry of `other` into this bundle.
    ///
    /// Entries of `other` win on key collision; resolution merges raw
    /// inputs first and upstream outputs second, so upstream data shadows
    /// a raw value under the same key.
    pub fn merge(&mut self, other: &DataBundle) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }
}

/// Caller-supplied raw inputs: a mapping from a logical input name to a
/// bundle of named values.
pub type RawInputs = HashMap<String, DataBundle>;

/// Convenience constructor for the common single-bundle case.
pub fn raw_inputs(name: impl Into<String>, bundle: DataBundle) -> RawInputs {
    let mut raw = RawInputs::new();
    raw.insert(name.into(), bundle);
    raw
}
