//! Step-graph resolution: fit/transform dispatch and the caching policy.
//!
//! Resolution is single-threaded, synchronous and depth-first: a run walks
//! the ancestors of the target step in dependency order (leaves first) and
//! resolves each of them exactly once per top-level call, even when a step
//! feeds several downstream steps. Collected inputs for a step are its raw
//! input bundles (in declaration order) overlaid by its upstream outputs.
//!
//! The caching policy lives here: before fitting a trainable step, the
//! presence of persisted state at the step's cache location decides whether
//! `fit` is skipped in favor of `load`. The check is presence-only — see
//! the [`persistence`](crate::persistence) module notes on staleness.

use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info};

use crate::data::{DataBundle, RawInputs};
use crate::error::{PipelineError, Result};
use crate::persistence::{has_cached_state, step_cache_dir, write_meta};
use crate::pipeline::builder::Pipeline;
use crate::pipeline::progress::{ExecutionStage, ProgressUpdate};

/// Whether a run may dispatch `fit` or must stay transform-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecutionMode {
    FitTransform,
    Transform,
}

impl Pipeline {
    /// Fit and transform the terminal step, resolving all ancestors.
    ///
    /// Trainable ancestors are fit (or loaded from cache) and their fitted
    /// state persisted; every ancestor's transform output feeds downstream
    /// steps. Returns the terminal step's output bundle.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingInputKey`] /
    /// [`PipelineError::MissingRawInput`] when the resolved inputs do not
    /// cover a step's declared keys, [`PipelineError::Cancelled`] if the
    /// cancellation token fires, and propagates transformer and
    /// persistence failures unchanged.
    pub fn fit_transform(&mut self, raw: &RawInputs) -> Result<DataBundle> {
        let target = self.terminal_step().to_string();
        self.fit_transform_step(&target, raw)
    }

    /// Fit and transform a named step, resolving all its ancestors.
    pub fn fit_transform_step(&mut self, name: &str, raw: &RawInputs) -> Result<DataBundle> {
        self.run(name, raw, ExecutionMode::FitTransform)
    }

    /// Transform the terminal step without ever fitting.
    ///
    /// Trainable steps load persisted state from their cache location when
    /// present, so a fresh process reuses parameters fit by an earlier run.
    pub fn transform(&mut self, raw: &RawInputs) -> Result<DataBundle> {
        let target = self.terminal_step().to_string();
        self.transform_step(&target, raw)
    }

    /// Transform a named step without ever fitting.
    pub fn transform_step(&mut self, name: &str, raw: &RawInputs) -> Result<DataBundle> {
        self.run(name, raw, ExecutionMode::Transform)
    }

    fn run(&mut self, target: &str, raw: &RawInputs, mode: ExecutionMode) -> Result<DataBundle> {
        match self.run_internal(target, raw, mode) {
            Ok(outputs) => {
                self.report_progress(ProgressUpdate::complete(format!(
                    "Resolved step '{target}'"
                )));
                Ok(outputs)
            }
            Err(e) => {
                if e.is_cancelled() {
                    self.report_progress(ProgressUpdate::cancelled());
                } else {
                    self.report_progress(ProgressUpdate::failed(e.to_string()));
                }
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    fn run_internal(
        &mut self,
        target: &str,
        raw: &RawInputs,
        mode: ExecutionMode,
    ) -> Result<DataBundle> {
        let target_idx = *self
            .index
            .get(target)
            .ok_or_else(|| PipelineError::UnknownStep(target.to_string()))?;

        let needed = self.ancestors_of(target_idx);
        let total = needed.len();

        info!(
            "Resolving step '{}' ({} step{} involved)...",
            target,
            total,
            if total == 1 { "" } else { "s" }
        );
        self.report_progress(ProgressUpdate::new(
            ExecutionStage::Initializing,
            0.0,
            format!("Resolving step '{target}'"),
        ));

        // Per-call memo: each step's output, keyed by step index. A step
        // referenced by several downstream steps is resolved once.
        let mut outputs: HashMap<usize, DataBundle> = HashMap::new();
        let mut completed = 0usize;

        let order = self.order.clone();
        for idx in order {
            if !needed.contains(&idx) {
                continue;
            }
            self.check_cancelled()?;

            let out = self.execute_step(idx, raw, &outputs, mode, completed, total)?;
            completed += 1;
            outputs.insert(idx, out);
        }

        outputs.remove(&target_idx).ok_or_else(|| {
            PipelineError::Internal(format!("no output recorded for step '{target}'"))
        })
    }

    /// The target step together with all its transitive upstream steps.
    fn ancestors_of(&self, target: usize) -> HashSet<usize> {
        let mut set = HashSet::new();
        let mut stack = vec![target];
        while let Some(idx) = stack.pop() {
            if set.insert(idx) {
                for input in self.steps[idx].input_steps() {
                    stack.push(self.index[input]);
                }
            }
        }
        set
    }

    fn execute_step(
        &mut self,
        idx: usize,
        raw: &RawInputs,
        outputs: &HashMap<usize, DataBundle>,
        mode: ExecutionMode,
        completed: usize,
        total: usize,
    ) -> Result<DataBundle> {
        let step_name = self.steps[idx].name().to_string();

        self.report_progress(ProgressUpdate::for_step(
            ExecutionStage::Resolving,
            step_name.as_str(),
            completed,
            total,
            format!("Collecting inputs for '{step_name}'"),
        ));

        // Raw bundles first, upstream outputs second: upstream data shadows
        // a raw value under the same key.
        let mut inputs = DataBundle::new();
        for data_name in self.steps[idx].input_data_keys() {
            let bundle = raw.get(data_name).ok_or_else(|| PipelineError::MissingRawInput {
                step: step_name.clone(),
                name: data_name.clone(),
            })?;
            inputs.merge(bundle);
        }
        for input in self.steps[idx].input_steps() {
            let up_idx = self.index[input];
            let bundle = outputs.get(&up_idx).ok_or_else(|| {
                PipelineError::Internal(format!(
                    "upstream step '{input}' resolved out of order"
                ))
            })?;
            inputs.merge(bundle);
        }

        let contract = self.steps[idx].transformer.contract();
        let trainable = self.steps[idx].is_trainable();
        let cache_enabled = self.config.cache && self.steps[idx].cache_enabled();
        let cache_dir = step_cache_dir(&self.config.experiment_dir, &step_name);

        if trainable {
            match mode {
                ExecutionMode::FitTransform => {
                    if cache_enabled && has_cached_state(&cache_dir) {
                        info!(
                            "Step '{}': cached state found at {}, loading instead of fitting",
                            step_name,
                            cache_dir.display()
                        );
                        self.report_progress(ProgressUpdate::for_step(
                            ExecutionStage::LoadingCache,
                            step_name.as_str(),
                            completed,
                            total,
                            format!("Loading cached state for '{step_name}'"),
                        ));
                        self.steps[idx].transformer.load(&cache_dir)?;
                    } else {
                        require_keys(&inputs, &contract.fit_inputs, &step_name)?;
                        debug!("Step '{}': fitting", step_name);
                        self.report_progress(ProgressUpdate::for_step(
                            ExecutionStage::Fitting,
                            step_name.as_str(),
                            completed,
                            total,
                            format!("Fitting '{step_name}'"),
                        ));
                        self.steps[idx].transformer.fit(&inputs)?;

                        if cache_enabled {
                            self.report_progress(ProgressUpdate::for_step(
                                ExecutionStage::Persisting,
                                step_name.as_str(),
                                completed,
                                total,
                                format!("Persisting fitted state for '{step_name}'"),
                            ));
                            self.steps[idx].transformer.persist(&cache_dir)?;
                            write_meta(&cache_dir, &step_name)?;
                            debug!(
                                "Step '{}': persisted fitted state to {}",
                                step_name,
                                cache_dir.display()
                            );
                        }
                    }
                }
                ExecutionMode::Transform => {
                    // A transform-only run reuses whatever an earlier run
                    // persisted; with nothing on disk the transformer runs
                    // with its in-memory state (fit earlier in this
                    // process, or not at all).
                    if has_cached_state(&cache_dir) {
                        debug!(
                            "Step '{}': loading persisted state from {}",
                            step_name,
                            cache_dir.display()
                        );
                        self.steps[idx].transformer.load(&cache_dir)?;
                    }
                }
            }
        }

        require_keys(&inputs, &contract.inputs, &step_name)?;
        self.report_progress(ProgressUpdate::for_step(
            ExecutionStage::Transforming,
            step_name.as_str(),
            completed,
            total,
            format!("Transforming '{step_name}'"),
        ));
        let out = self.steps[idx].transformer.transform(&inputs)?;

        for key in &contract.outputs {
            if !out.contains_key(key) {
                return Err(PipelineError::ContractViolation {
                    step: step_name,
                    key: key.clone(),
                });
            }
        }

        Ok(out)
    }
}

/// Check that every declared key is present in the resolved bundle.
fn require_keys(inputs: &DataBundle, keys: &[String], step: &str) -> Result<()> {
    for key in keys {
        if !inputs.contains_key(key) {
            return Err(PipelineError::MissingInputKey {
                step: step.to_string(),
                key: key.clone(),
            });
        }
    }
    Ok(())
}
