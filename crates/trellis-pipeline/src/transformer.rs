//! The transformer contract: the pure computation boundary of a pipeline.
//!
//! A [`Transformer`] is the unit of work a step wraps. It declares the keys
//! it consumes and produces via [`TransformerContract`], learns parameters
//! in `fit`, applies them in `transform`, and round-trips its fitted state
//! through `persist`/`load` so a later process can reuse it.
//!
//! # Contract rules
//!
//! - `fit` must be safe to call repeatedly: a re-fit overwrites prior
//!   parameters.
//! - `transform` takes `&self`, so it cannot mutate fitted parameters, and
//!   must return every key declared in `contract().outputs`.
//! - `load(dir)` after `persist(dir)` must yield a transformer that is
//!   behaviorally equivalent on `transform`.

use std::path::Path;

use crate::data::DataBundle;
use crate::error::Result;

/// Declared input/output keys of a transformer.
///
/// `inputs` are the keys `transform` needs; `fit_inputs` are the keys `fit`
/// needs, which may be a superset (a classifier transforms from `X` alone
/// but fits on `X` and `y`). Declared keys are checked when the pipeline is
/// built where possible, and re-checked against the resolved bundle before
/// dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformerContract {
    /// Keys required by `transform`.
    pub inputs: Vec<String>,
    /// Keys required by `fit`. Defaults to `inputs`.
    pub fit_inputs: Vec<String>,
    /// Keys guaranteed to be present in the `transform` result.
    pub outputs: Vec<String>,
}

impl TransformerContract {
    /// Contract where `fit` and `transform` consume the same keys.
    pub fn new(inputs: &[&str], outputs: &[&str]) -> Self {
        let inputs: Vec<String> = inputs.iter().map(|s| s.to_string()).collect();
        Self {
            fit_inputs: inputs.clone(),
            inputs,
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Declare extra keys that only `fit` consumes (e.g. a label column).
    pub fn with_fit_inputs(mut self, fit_inputs: &[&str]) -> Self {
        self.fit_inputs = fit_inputs.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// A polymorphic unit implementing fit/transform/persist/load.
///
/// Implementations are pure computation: a transformer has no knowledge of
/// pipeline structure, cache policy, or where its inputs came from.
///
/// `fit`, `persist` and `load` default to no-ops so transform-only
/// implementations (a column selector, a closure) only provide
/// [`contract`](Transformer::contract) and
/// [`transform`](Transformer::transform). The pipeline never calls `fit`,
/// `persist` or `load` on a step that is not marked trainable.
pub trait Transformer: Send {
    /// The declared input/output key contract.
    fn contract(&self) -> TransformerContract;

    /// Learn parameters from the resolved inputs. Re-fitting overwrites
    /// prior parameters.
    fn fit(&mut self, inputs: &DataBundle) -> Result<()> {
        let _ = inputs;
        Ok(())
    }

    /// Apply fitted parameters to the resolved inputs, producing the output
    /// bundle. Must contain every declared output key.
    fn transform(&self, inputs: &DataBundle) -> Result<DataBundle>;

    /// Write fitted state under `location`. The serialization format is
    /// transformer-defined; the pipeline treats the directory as an opaque
    /// blob.
    fn persist(&self, location: &Path) -> Result<()> {
        let _ = location;
        Ok(())
    }

    /// Restore fitted state previously written by `persist`.
    fn load(&mut self, location: &Path) -> Result<()> {
        let _ = location;
        Ok(())
    }
}

/// Closure-backed transform-only transformer.
///
/// Handy for lightweight glue steps and tests:
///
/// ```rust,ignore
/// let doubler = FnTransformer::new(&["x"], &["x"], |inputs| {
///     let x = inputs.scalar("x")?;
///     Ok(DataBundle::new().with("x", x * 2.0))
/// });
/// ```
pub struct FnTransformer<F>
where
    F: Fn(&DataBundle) -> Result<DataBundle> + Send,
{
    contract: TransformerContract,
    func: F,
}

impl<F> FnTransformer<F>
where
    F: Fn(&DataBundle) -> Result<DataBundle> + Send,
{
    /// Create a transformer from declared keys and a transform closure.
    pub fn new(inputs: &[&str], outputs: &[&str], func: F) -> Self {
        Self {
            contract: TransformerContract::new(inputs, outputs),
            func,
        }
    }
}

impl<F> Transformer for FnTransformer<F>
where
    F: Fn(&DataBundle) -> Result<DataBundle> + Send,
{
    fn contract(&self) -> TransformerContract {
        self.contract.clone()
    }

    fn transform(&self, inputs: &DataBundle) -> Result<DataBundle> {
        (self.func)(inputs)
    }
}
