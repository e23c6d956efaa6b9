//! Pipeline construction and graph validation.
//!
//! The builder collects [`Step`]s and configuration, then `build()`
//! validates the whole graph before anything executes: step names must be
//! unique, every input reference must resolve, the graph must be acyclic,
//! and declared key contracts are checked statically where upstream
//! outputs fully determine a step's inputs.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::persistence::{clear_cache_dir, step_cache_dir};
use crate::pipeline::progress::{
    CancellationToken, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
use crate::step::Step;

/// A validated, executable step graph.
///
/// Use [`Pipeline::builder()`] to construct one:
///
/// ```rust,ignore
/// use trellis_pipeline::{Pipeline, PipelineConfig, Step};
///
/// let mut pipeline = Pipeline::builder()
///     .config(PipelineConfig::builder().experiment_dir("runs/exp1").build()?)
///     .step(Step::new("impute", Box::new(imputer)).input_data("input").trainable(true))
///     .step(Step::new("scale", Box::new(scaler)).input_step("impute").trainable(true))
///     .build()?;
///
/// let outputs = pipeline.fit_transform(&raw)?;
/// ```
///
/// Resolution is single-threaded and synchronous; see
/// [`fit_transform`](Pipeline::fit_transform) and
/// [`transform`](Pipeline::transform) on the execution side.
pub struct Pipeline {
    pub(crate) config: PipelineConfig,
    pub(crate) steps: Vec<Step>,
    pub(crate) index: HashMap<String, usize>,
    /// Full topological order of the graph, dependencies first.
    pub(crate) order: Vec<usize>,
    pub(crate) progress_reporter: Option<Arc<dyn ProgressReporter>>,
    pub(crate) cancellation_token: CancellationToken,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("steps", &self.steps)
            .field("order", &self.order)
            .field("cancellation_token", &self.cancellation_token)
            .finish_non_exhaustive()
    }
}

// A pipeline run can be moved onto a background thread wholesale; the
// cancellation token is the cross-thread channel back into it.
static_assertions::assert_impl_all!(Pipeline: Send);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// The pipeline's configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Step names in insertion order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Name of the terminal step — the last one added — which
    /// [`fit_transform`](Pipeline::fit_transform) and
    /// [`transform`](Pipeline::transform) resolve by default.
    pub fn terminal_step(&self) -> &str {
        self.steps
            .last()
            .map(|s| s.name())
            .expect("pipeline always holds at least one step")
    }

    /// Remove every step's cache directory under the experiment root.
    ///
    /// The framework never clears caches on its own; this is the explicit
    /// hook for callers that want to force recomputation.
    pub fn clear_cache(&self) -> Result<()> {
        for step in &self.steps {
            clear_cache_dir(&step_cache_dir(&self.config.experiment_dir, step.name()))?;
        }
        Ok(())
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    pub(crate) fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }
}

/// Builder for creating a [`Pipeline`] instance.
#[derive(Default)]
pub struct PipelineBuilder {
    steps: Vec<Step>,
    config: Option<PipelineConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Add a step to the graph. Order matters only for picking the default
    /// terminal step; execution order is derived from the dependencies.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during execution.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// Convenience over [`progress_reporter`](Self::progress_reporter) for
    /// simple handlers.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Set a cancellation token for stopping the pipeline between steps.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Validate the graph and build the pipeline.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::DuplicateStepName`] if two steps share a name
    /// - [`PipelineError::UnknownInputStep`] if a step references a step
    ///   that was never added
    /// - [`PipelineError::CycleDetected`] if the references form a cycle,
    ///   reported with the offending path — before any fit or transform
    ///   ever executes
    /// - [`PipelineError::MissingInputKey`] if a step consuming only
    ///   upstream outputs requires a key no upstream step declares
    /// - [`PipelineError::InvalidConfig`] if the configuration is invalid
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        config.validate().map_err(PipelineError::InvalidConfig)?;

        if self.steps.is_empty() {
            return Err(PipelineError::Internal(
                "pipeline must contain at least one step".to_string(),
            ));
        }

        let mut index = HashMap::with_capacity(self.steps.len());
        for (i, step) in self.steps.iter().enumerate() {
            if index.insert(step.name().to_string(), i).is_some() {
                return Err(PipelineError::DuplicateStepName(step.name().to_string()));
            }
        }

        for step in &self.steps {
            for input in step.input_steps() {
                if !index.contains_key(input) {
                    return Err(PipelineError::UnknownInputStep {
                        step: step.name().to_string(),
                        input: input.clone(),
                    });
                }
            }
        }

        let order = topological_order(&self.steps, &index)?;
        check_declared_contracts(&self.steps, &index)?;

        Ok(Pipeline {
            config,
            steps: self.steps,
            index,
            order,
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
        })
    }
}

/// Depth-first topological sort with cycle reporting.
fn topological_order(steps: &[Step], index: &HashMap<String, usize>) -> Result<Vec<usize>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    fn visit(
        idx: usize,
        steps: &[Step],
        index: &HashMap<String, usize>,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> Result<()> {
        match marks[idx] {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                // Revisited a step already on the current resolution path.
                let start = path.iter().position(|&p| p == idx).unwrap_or(0);
                let mut names: Vec<&str> =
                    path[start..].iter().map(|&p| steps[p].name()).collect();
                names.push(steps[idx].name());
                return Err(PipelineError::CycleDetected {
                    path: names.join(" -> "),
                });
            }
            Mark::Unvisited => {}
        }

        marks[idx] = Mark::InProgress;
        path.push(idx);
        for input in steps[idx].input_steps() {
            let input_idx = index[input];
            visit(input_idx, steps, index, marks, path, order)?;
        }
        path.pop();
        marks[idx] = Mark::Done;
        order.push(idx);
        Ok(())
    }

    let mut marks = vec![Mark::Unvisited; steps.len()];
    let mut order = Vec::with_capacity(steps.len());
    let mut path = Vec::new();

    for idx in 0..steps.len() {
        visit(idx, steps, index, &mut marks, &mut path, &mut order)?;
    }

    Ok(order)
}

/// Static key-contract check: a step fed exclusively by upstream steps must
/// find every required transform input among their declared outputs. Steps
/// that also consume raw input defer the check to resolution time, when the
/// caller's bundles are known.
fn check_declared_contracts(steps: &[Step], index: &HashMap<String, usize>) -> Result<()> {
    for step in steps {
        if !step.input_data_keys().is_empty() {
            continue;
        }

        let mut available: HashSet<String> = HashSet::new();
        for input in step.input_steps() {
            let upstream = &steps[index[input]];
            available.extend(upstream.transformer.contract().outputs);
        }

        for key in step.transformer.contract().inputs {
            if !available.contains(&key) {
                return Err(PipelineError::MissingInputKey {
                    step: step.name().to_string(),
                    key,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataBundle;
    use crate::transformer::FnTransformer;

    fn named(name: &str, inputs: &[&str], outputs: &[&str]) -> Step {
        Step::new(
            name,
            Box::new(FnTransformer::new(inputs, outputs, |b: &DataBundle| {
                Ok(b.clone())
            })),
        )
    }

    #[test]
    fn test_build_single_step() {
        let pipeline = Pipeline::builder()
            .step(named("only", &["x"], &["x"]).input_data("input"))
            .build()
            .unwrap();

        assert_eq!(pipeline.step_names(), vec!["only"]);
        assert_eq!(pipeline.terminal_step(), "only");
    }

    #[test]
    fn test_build_empty_pipeline_fails() {
        let result = Pipeline::builder().build();
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_step_name_rejected() {
        let err = Pipeline::builder()
            .step(named("dup", &["x"], &["x"]).input_data("input"))
            .step(named("dup", &["x"], &["x"]).input_data("input"))
            .build()
            .unwrap_err();

        assert_eq!(err.error_code(), "DUPLICATE_STEP_NAME");
    }

    #[test]
    fn test_unknown_input_step_rejected() {
        let err = Pipeline::builder()
            .step(named("a", &["x"], &["x"]).input_step("ghost"))
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::UnknownInputStep { ref step, ref input }
                if step == "a" && input == "ghost"
        ));
    }

    #[test]
    fn test_cycle_rejected_with_path() {
        let err = Pipeline::builder()
            .step(named("a", &["x"], &["x"]).input_step("b"))
            .step(named("b", &["x"], &["x"]).input_step("a"))
            .build()
            .unwrap_err();

        match err {
            PipelineError::CycleDetected { path } => {
                assert!(path.contains("a") && path.contains("b"), "path: {path}");
            }
            other => panic!("expected CycleDetected, got {other:?}"),
        }
    }

    #[test]
    fn test_self_cycle_rejected() {
        let err = Pipeline::builder()
            .step(named("a", &["x"], &["x"]).input_step("a"))
            .build()
            .unwrap_err();

        assert_eq!(err.error_code(), "CYCLE_DETECTED");
    }

    #[test]
    fn test_topological_order_dependencies_first() {
        let pipeline = Pipeline::builder()
            .step(named("sink", &["x"], &["x"]).input_step("mid"))
            .step(named("mid", &["x"], &["x"]).input_step("source"))
            .step(named("source", &["x"], &["x"]).input_data("input"))
            .build()
            .unwrap();

        let positions: HashMap<&str, usize> = pipeline
            .order
            .iter()
            .enumerate()
            .map(|(pos, &idx)| (pipeline.steps[idx].name(), pos))
            .collect();

        assert!(positions["source"] < positions["mid"]);
        assert!(positions["mid"] < positions["sink"]);
    }

    #[test]
    fn test_static_contract_check_rejects_unproducible_key() {
        // "sink" needs key "z" but its only upstream declares "x".
        let err = Pipeline::builder()
            .step(named("source", &["x"], &["x"]).input_data("input"))
            .step(named("sink", &["z"], &["z"]).input_step("source"))
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::MissingInputKey { ref step, ref key }
                if step == "sink" && key == "z"
        ));
    }

    #[test]
    fn test_static_contract_check_defers_for_raw_consumers() {
        // "sink" needs "z" which no upstream declares, but it also reads a
        // raw bundle, so the check is deferred to resolution time.
        let result = Pipeline::builder()
            .step(named("source", &["x"], &["x"]).input_data("input"))
            .step(named("sink", &["z"], &["z"]).input_step("source").input_data("extra"))
            .build();

        assert!(result.is_ok());
    }

    #[test]
    fn test_clear_cache_removes_step_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::builder()
            .config(
                PipelineConfig::builder()
                    .experiment_dir(tmp.path())
                    .build()
                    .unwrap(),
            )
            .step(named("a", &["x"], &["x"]).input_data("input"))
            .build()
            .unwrap();

        let dir = step_cache_dir(tmp.path(), "a");
        crate::persistence::write_json(&dir, "state.json", &1u32).unwrap();
        assert!(crate::persistence::has_cached_state(&dir));

        pipeline.clear_cache().unwrap();
        assert!(!crate::persistence::has_cached_state(&dir));
    }
}
