//! Step: a named pipeline node owning one transformer.
//!
//! A step names its upstream data sources — other steps by name, and raw
//! input bundles supplied by the caller — and carries the two flags the
//! execution policy reads: `trainable` (whether `fit` is ever dispatched)
//! and `cache` (whether fitted state is persisted and reused).

use crate::transformer::Transformer;

/// A named node in a pipeline graph.
///
/// Built fluently and handed to [`PipelineBuilder::step`]:
///
/// ```rust,ignore
/// let step = Step::new("scale", Box::new(StandardScaler::new()))
///     .input_step("impute")
///     .trainable(true);
/// ```
///
/// A step refers to its upstream steps by name only; the pipeline resolves
/// the references and owns every node. Step names must be unique within a
/// pipeline and the input references must form an acyclic graph — both are
/// checked when the pipeline is built.
///
/// [`PipelineBuilder::step`]: crate::pipeline::PipelineBuilder::step
pub struct Step {
    pub(crate) name: String,
    pub(crate) transformer: Box<dyn Transformer>,
    pub(crate) input_steps: Vec<String>,
    pub(crate) input_data: Vec<String>,
    pub(crate) trainable: bool,
    pub(crate) cache: bool,
}

impl Step {
    /// Create a step wrapping a transformer. Not trainable by default;
    /// caching defaults to enabled (it only matters for trainable steps).
    pub fn new(name: impl Into<String>, transformer: Box<dyn Transformer>) -> Self {
        Self {
            name: name.into(),
            transformer,
            input_steps: Vec::new(),
            input_data: Vec::new(),
            trainable: false,
            cache: true,
        }
    }

    /// Add an upstream step (by name) whose output feeds this step.
    pub fn input_step(mut self, name: impl Into<String>) -> Self {
        self.input_steps.push(name.into());
        self
    }

    /// Add a raw input bundle (by logical name) consumed directly,
    /// bypassing upstream steps.
    pub fn input_data(mut self, name: impl Into<String>) -> Self {
        self.input_data.push(name.into());
        self
    }

    /// Mark the step trainable: `fit` is dispatched and fitted state is
    /// cached. Non-trainable steps only ever `transform`.
    pub fn trainable(mut self, trainable: bool) -> Self {
        self.trainable = trainable;
        self
    }

    /// Enable or disable caching for this step. With caching disabled the
    /// step re-fits on every `fit_transform` and never persists.
    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// The step's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of upstream steps, in declaration order.
    pub fn input_steps(&self) -> &[String] {
        &self.input_steps
    }

    /// Names of raw input bundles consumed directly.
    pub fn input_data_keys(&self) -> &[String] {
        &self.input_data
    }

    /// Whether `fit` is ever dispatched to this step.
    pub fn is_trainable(&self) -> bool {
        self.trainable
    }

    /// Whether fitted state is persisted and reused.
    pub fn cache_enabled(&self) -> bool {
        self.cache
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("input_steps", &self.input_steps)
            .field("input_data", &self.input_data)
            .field("trainable", &self.trainable)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
