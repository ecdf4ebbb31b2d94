// ============================================================
// Layer 6 - Checkpoint Manager
// ============================================================
// Persists the model whenever the training loop decides the
// current weights are worth keeping.
//
// What gets written:
//   checkpoints/
//     model_best.mpk       ← single checkpoint, replaced in place
//     train_config.json    ← the run's configuration
//
// How the checkpoint is replaced:
//   1. Serialise the record to bytes (NamedMpkBytesRecorder)
//   2. Write the bytes to a temporary file in the same directory
//   3. fsync, then rename over model_best.mpk
//
//   A reader sees either the previous checkpoint or the new
//   one, never a half-written file. If anything fails before
//   the rename, the previous checkpoint stays untouched.
//
// Which epochs get saved is decided by CheckpointTracker:
//   BestOnly   → only when validation loss beats the best so far
//   EveryEpoch → after every epoch
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            tempfile crate documentation (NamedTempFile::persist)

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder},
};
use tempfile::NamedTempFile;

use crate::application::train_use_case::TrainConfig;
use crate::domain::error::{PipelineError, PipelineResult};

/// File name of the single model checkpoint
pub const CHECKPOINT_FILE: &str = "model_best.mpk";

/// File name of the saved run configuration
pub const CONFIG_FILE: &str = "train_config.json";

// ─── CheckpointTracker ────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointPolicy {
    BestOnly,
    EveryEpoch,
}

impl CheckpointPolicy {
    pub fn from_save_best_only(save_best_only: bool) -> Self {
        if save_best_only { Self::BestOnly } else { Self::EveryEpoch }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointDecision {
    Save,
    Skip,
}

/// Remembers the best validation loss seen so far.
#[derive(Debug, Clone)]
pub struct CheckpointTracker {
    policy: CheckpointPolicy,
    best:   f64,
}

impl CheckpointTracker {
    pub fn new(policy: CheckpointPolicy) -> Self {
        Self { policy, best: f64::INFINITY }
    }

    /// Record one epoch's validation loss and decide whether to save.
    /// A NaN loss never improves on anything.
    pub fn observe(&mut self, val_loss: f64) -> CheckpointDecision {
        let improved = val_loss < self.best;
        if improved {
            self.best = val_loss;
        }

        match self.policy {
            CheckpointPolicy::EveryEpoch   => CheckpointDecision::Save,
            CheckpointPolicy::BestOnly if improved => CheckpointDecision::Save,
            CheckpointPolicy::BestOnly     => CheckpointDecision::Skip,
        }
    }

    /// Best finite loss observed, if any
    pub fn best(&self) -> Option<f64> {
        self.best.is_finite().then_some(self.best)
    }
}

// ─── CheckpointManager ────────────────────────────────────────────────────────
pub struct CheckpointManager {
    /// Directory holding the checkpoint and run config
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create the manager, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> PipelineResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.dir.join(CHECKPOINT_FILE)
    }

    /// Serialise `model` and atomically replace the checkpoint.
    pub fn save_model<B: Backend, M: Module<B>>(&self, model: &M) -> PipelineResult<PathBuf> {
        let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::default();
        let bytes    = Recorder::<B>::record(&recorder, model.clone().into_record(), ())
            .map_err(|e| PipelineError::TrainingEngine(format!("cannot serialise model: {e}")))?;

        let path = self.checkpoint_path();
        write_atomically(&self.dir, &path, &bytes)?;

        tracing::debug!("Saved checkpoint ({} bytes) to '{}'", bytes.len(), path.display());
        Ok(path)
    }

    /// Write the run configuration as pretty JSON.
    pub fn save_config(&self, cfg: &TrainConfig) -> PipelineResult<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        write_atomically(&self.dir, &path, json.as_bytes())?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }
}

/// Temp file in `dir`, fsync, rename over `target`.
fn write_atomically(dir: &Path, target: &Path, bytes: &[u8]) -> PipelineResult<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| PipelineError::Io(e.error))?;
    Ok(())
}
