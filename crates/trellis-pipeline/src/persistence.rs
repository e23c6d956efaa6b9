//! Disk layout and helpers for cached transformer state.
//!
//! Every trainable step persists under `<experiment_dir>/<step_name>/`.
//! What goes inside the directory is transformer-defined; the pipeline
//! only checks *presence* to decide whether a cached state exists.
//!
//! The presence-only check is deliberate: there is no content hashing and
//! no versioning of transformer configuration. Changing a transformer's
//! hyperparameters while a stale cache sits at the same location silently
//! serves the stale parameters — clear the experiment directory (or use a
//! new one) to force recomputation.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Cache directory for one step under an experiment root.
pub fn step_cache_dir(experiment_dir: &Path, step_name: &str) -> PathBuf {
    experiment_dir.join(step_name)
}

/// Whether a cached state exists at `dir`: the directory exists and holds
/// at least one artifact beyond the pipeline's own `meta.json`. No content
/// is inspected.
pub fn has_cached_state(dir: &Path) -> bool {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .any(|e| e.file_name() != META_FILE),
        Err(_) => false,
    }
}

/// Remove a step's cache directory if present. Used by
/// [`Pipeline::clear_cache`](crate::pipeline::Pipeline::clear_cache);
/// the framework itself never clears caches.
pub fn clear_cache_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|source| PipelineError::Persistence {
            path: dir.to_path_buf(),
            source,
        })?;
        debug!("Cleared cache directory {}", dir.display());
    }
    Ok(())
}

/// Serialize `state` as JSON to `<dir>/<file_name>`, creating the
/// directory lazily. I/O failures surface as
/// [`PipelineError::Persistence`].
pub fn write_json<T: Serialize>(dir: &Path, file_name: &str, state: &T) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| PipelineError::Persistence {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(file_name);
    let json = serde_json::to_string_pretty(state)?;
    fs::write(&path, json).map_err(|source| PipelineError::Persistence { path, source })
}

/// Deserialize JSON state from `<dir>/<file_name>`.
pub fn read_json<T: DeserializeOwned>(dir: &Path, file_name: &str) -> Result<T> {
    let path = dir.join(file_name);
    let json = fs::read_to_string(&path)
        .map_err(|source| PipelineError::Persistence { path, source })?;
    Ok(serde_json::from_str(&json)?)
}

/// Bookkeeping written by the pipeline next to the transformer's artifact.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CacheMeta {
    pub step: String,
    pub fitted_at: DateTime<Utc>,
}

const META_FILE: &str = "meta.json";

/// Record when a step's state was persisted. Informational only — the
/// cache check never reads it.
pub(crate) fn write_meta(dir: &Path, step_name: &str) -> Result<()> {
    let meta = CacheMeta {
        step: step_name.to_string(),
        fitted_at: Utc::now(),
    };
    write_json(dir, META_FILE, &meta)
}
