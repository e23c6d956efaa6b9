//! Integration tests for the built-in transformers.
//!
//! These tests wire the transformers into full pipelines and verify the
//! end-to-end training/inference flow, including resuming from cached
//! state in a fresh pipeline.

use polars::prelude::*;
use trellis_pipeline::{DataBundle, Pipeline, PipelineConfig, RawInputs, Step, raw_inputs};
use trellis_transformers::{
    ColumnSelector, LogisticRegression, StandardScaler, StatisticalImputer,
};

// ============================================================================
// Helper Functions
// ============================================================================

fn train_frame() -> DataFrame {
    df![
        "age" => [Some(22.0), Some(38.0), None, Some(35.0), Some(58.0), Some(24.0)],
        "fare" => [7.25, 71.28, 7.92, 53.1, 51.86, 8.05],
    ]
    .unwrap()
}

fn train_labels() -> Series {
    // Higher fares survive in this toy set.
    Series::new("y".into(), &[0.0, 1.0, 0.0, 1.0, 1.0, 0.0])
}

fn test_frame() -> DataFrame {
    df![
        "age" => [Some(30.0), None],
        "fare" => [80.0, 7.5],
    ]
    .unwrap()
}

fn standard_pipeline(experiment_dir: &std::path::Path) -> Pipeline {
    Pipeline::builder()
        .config(
            PipelineConfig::builder()
                .experiment_dir(experiment_dir)
                .build()
                .unwrap(),
        )
        .step(
            Step::new("impute", Box::new(StatisticalImputer::default()))
                .input_data("input")
                .trainable(true),
        )
        .step(
            Step::new("scale", Box::new(StandardScaler::new()))
                .input_step("impute")
                .trainable(true),
        )
        .step(
            Step::new("classify", Box::new(LogisticRegression::new()))
                .input_step("scale")
                .input_data("input")
                .trainable(true),
        )
        .build()
        .unwrap()
}

fn train_inputs() -> RawInputs {
    raw_inputs(
        "input",
        DataBundle::new()
            .with("X", train_frame())
            .with("y", train_labels()),
    )
}

fn predictions_of(out: &DataBundle) -> Vec<u32> {
    let series = out.column("y_pred").unwrap();
    (0..series.len())
        .map(|i| series.get(i).unwrap().try_extract::<u32>().unwrap())
        .collect()
}

// ============================================================================
// End-to-End Training Flow
// ============================================================================

#[test]
fn test_fit_transform_returns_aligned_predictions() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pipeline = standard_pipeline(tmp.path());

    let out = pipeline.fit_transform(&train_inputs()).unwrap();
    let preds = predictions_of(&out);

    assert_eq!(
        preds.len(),
        train_frame().height(),
        "one prediction per training row"
    );
    // The toy data is separable on fare; training accuracy must be perfect.
    assert_eq!(preds, vec![0, 1, 0, 1, 1, 0]);
}

#[test]
fn test_fresh_pipeline_predicts_from_cached_state_only() {
    let tmp = tempfile::tempdir().unwrap();

    let mut train = standard_pipeline(tmp.path());
    train.fit_transform(&train_inputs()).unwrap();

    // A brand-new pipeline value stands in for a fresh process. It never
    // sees `y`; transform succeeds only because every trainable step loads
    // the state persisted by the run above.
    let mut infer = standard_pipeline(tmp.path());
    let out = infer
        .transform(&raw_inputs(
            "input",
            DataBundle::new().with("X", test_frame()),
        ))
        .unwrap();

    let preds = predictions_of(&out);
    assert_eq!(preds.len(), 2);
    assert_eq!(preds, vec![1, 0], "high fare survives, low fare does not");
}

#[test]
fn test_second_fit_transform_reuses_cache_and_matches() {
    let tmp = tempfile::tempdir().unwrap();

    let mut first = standard_pipeline(tmp.path());
    let out_first = first.fit_transform(&train_inputs()).unwrap();

    let mut second = standard_pipeline(tmp.path());
    let out_second = second.fit_transform(&train_inputs()).unwrap();

    assert_eq!(
        predictions_of(&out_first),
        predictions_of(&out_second),
        "a cached run must reproduce the original predictions"
    );
}

#[test]
fn test_imputation_feeds_scaling() {
    let tmp = tempfile::tempdir().unwrap();

    let mut pipeline = Pipeline::builder()
        .config(
            PipelineConfig::builder()
                .experiment_dir(tmp.path())
                .build()
                .unwrap(),
        )
        .step(
            Step::new("impute", Box::new(StatisticalImputer::default()))
                .input_data("input")
                .trainable(true),
        )
        .step(
            Step::new("scale", Box::new(StandardScaler::new()))
                .input_step("impute")
                .trainable(true),
        )
        .build()
        .unwrap();

    let out = pipeline
        .fit_transform(&raw_inputs(
            "input",
            DataBundle::new().with("X", train_frame()),
        ))
        .unwrap();

    let x = out.frame("X").unwrap();
    assert_eq!(
        x.column("age").unwrap().null_count(),
        0,
        "imputation must run before scaling"
    );
}

#[test]
fn test_selector_narrows_features_for_downstream_steps() {
    let tmp = tempfile::tempdir().unwrap();

    let mut pipeline = Pipeline::builder()
        .config(
            PipelineConfig::builder()
                .experiment_dir(tmp.path())
                .build()
                .unwrap(),
        )
        .step(
            Step::new("select", Box::new(ColumnSelector::new(&["fare"])))
                .input_data("input"),
        )
        .step(
            Step::new("classify", Box::new(LogisticRegression::new()))
                .input_step("select")
                .input_data("input")
                .trainable(true),
        )
        .build()
        .unwrap();

    let out = pipeline.fit_transform(&train_inputs()).unwrap();
    assert_eq!(predictions_of(&out).len(), train_frame().height());

    // The selector is transform-only; nothing may be cached for it.
    assert!(!trellis_pipeline::has_cached_state(
        &trellis_pipeline::step_cache_dir(tmp.path(), "select")
    ));
}

// ============================================================================
// Cache Layout
// ============================================================================

#[test]
fn test_each_trainable_step_persists_under_its_own_name() {
    let tmp = tempfile::tempdir().unwrap();

    let mut pipeline = standard_pipeline(tmp.path());
    pipeline.fit_transform(&train_inputs()).unwrap();

    for step in ["impute", "scale", "classify"] {
        assert!(
            trellis_pipeline::has_cached_state(&trellis_pipeline::step_cache_dir(
                tmp.path(),
                step
            )),
            "missing cached state for step '{step}'"
        );
    }
}
