// ============================================================
// Layer 2 - TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate the configuration
//   Step 2: Resolve and load the dataset  (Layer 4 - data)
//   Step 3: Train / validation split      (Layer 4 - data)
//   Step 4: Save config                   (Layer 6 - infra)
//   Step 5: Build the model               (Layer 5 - ml)
//   Step 6: Run training loop             (Layer 5 - ml)
//
// An ingestion failure stops the run before any model is
// built. A training failure leaves a previous checkpoint as
// it was.
//
// Reference: Burn Book §5 (Training)

use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::ImageBatchProducer,
    loader::DatasetResolver,
    splitter::split_train_val,
};
use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::traits::SampleSource;
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::model::build_model;
use crate::ml::trainer::{train_model, TrainBackend, TrainingReport};

// ─── Training Configuration ──────────────────────────────────────────────────
// All settings for a training run. Built once from the CLI,
// validated, then only ever read. Saved next to the checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_dir:          String,
    pub test_size:         f64,
    pub keep_prob:         f64,
    pub nb_epoch:          usize,
    /// Informational only; steps come from the split sizes
    pub samples_per_epoch: usize,
    pub batch_size:        usize,
    pub save_best_only:    bool,
    pub learning_rate:     f64,
    pub seed:              u64,
    pub checkpoint_dir:    String,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:          "data".to_string(),
            test_size:         0.2,
            keep_prob:         0.5,
            nb_epoch:          10,
            samples_per_epoch: 20000,
            batch_size:        40,
            save_best_only:    true,
            learning_rate:     1.0e-4,
            seed:              0,
            checkpoint_dir:    "checkpoints".to_string(),
        }
    }
}

impl TrainConfig {
    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> PipelineResult<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(PipelineError::InvalidFraction(self.test_size));
        }
        if !(self.keep_prob > 0.0 && self.keep_prob <= 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "keep_prob must be in (0, 1], got {}",
                self.keep_prob
            )));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::InvalidConfig("batch_size must be at least 1".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }

    /// `(name, value)` pairs for the parameter table.
    pub fn parameters(&self) -> Vec<(&'static str, String)> {
        vec![
            ("data_dir",          self.data_dir.clone()),
            ("test_size",         self.test_size.to_string()),
            ("keep_prob",         self.keep_prob.to_string()),
            ("nb_epoch",          self.nb_epoch.to_string()),
            ("samples_per_epoch", self.samples_per_epoch.to_string()),
            ("batch_size",        self.batch_size.to_string()),
            ("save_best_only",    self.save_best_only.to_string()),
            ("learning_rate",     self.learning_rate.to_string()),
            ("seed",              self.seed.to_string()),
            ("checkpoint_dir",    self.checkpoint_dir.clone()),
        ]
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> PipelineResult<TrainingReport> {
        let cfg = &self.config;

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.validate()?;

        // ── Step 2: Load samples ──────────────────────────────────────────────
        let resolver = DatasetResolver::detect(&cfg.data_dir);
        let samples  = resolver.load_all()?;
        tracing::info!("Loaded {} samples in {} mode", samples.len(), resolver.mode());
        if samples.is_empty() {
            tracing::warn!("Dataset under '{}' is empty", cfg.data_dir);
        }

        // ── Step 3: Split ─────────────────────────────────────────────────────
        let (train_samples, val_samples) = split_train_val(&samples, cfg.test_size, cfg.seed)?;
        tracing::info!(
            "Split: {} train, {} validation",
            train_samples.len(),
            val_samples.len()
        );

        // ── Step 4: Save config ───────────────────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt_manager.save_config(cfg)?;
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;

        // ── Step 5: Build model ───────────────────────────────────────────────
        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        let model = build_model::<TrainBackend>(cfg.keep_prob, cfg.seed, &device)?;

        // ── Step 6: Train ─────────────────────────────────────────────────────
        let producer = ImageBatchProducer::new(&cfg.data_dir, cfg.seed);
        train_model(
            model,
            cfg,
            &train_samples,
            &val_samples,
            &producer,
            &ckpt_manager,
            &metrics,
            &device,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cli_defaults() {
        let cfg = TrainConfig::default();
        assert_eq!(cfg.data_dir, "data");
        assert_eq!(cfg.test_size, 0.2);
        assert_eq!(cfg.keep_prob, 0.5);
        assert_eq!(cfg.nb_epoch, 10);
        assert_eq!(cfg.samples_per_epoch, 20000);
        assert_eq!(cfg.batch_size, 40);
        assert!(cfg.save_best_only);
        assert_eq!(cfg.learning_rate, 1.0e-4);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            TrainConfig { test_size: 1.5, ..TrainConfig::default() },
            TrainConfig { keep_prob: 0.0, ..TrainConfig::default() },
            TrainConfig { batch_size: 0, ..TrainConfig::default() },
            TrainConfig { learning_rate: -1.0, ..TrainConfig::default() },
        ];
        for cfg in bad {
            assert!(cfg.validate().is_err(), "{cfg:?} should be rejected");
        }
    }

    #[test]
    fn test_bad_fraction_reports_invalid_fraction() {
        let cfg = TrainConfig { test_size: 0.0, ..TrainConfig::default() };
        assert!(matches!(cfg.validate(), Err(PipelineError::InvalidFraction(_))));
    }

    #[test]
    fn test_missing_data_fails_before_training() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = TrainConfig {
            data_dir:       tmp.path().join("nowhere").display().to_string(),
            checkpoint_dir: tmp.path().join("ckpt").display().to_string(),
            ..TrainConfig::default()
        };

        let err = TrainUseCase::new(cfg).execute().unwrap_err();
        assert!(matches!(err, PipelineError::DataMissing(_)));
        // nothing was written: ingestion runs before the checkpoint dir is made
        assert!(!tmp.path().join("ckpt").exists());
    }
}
