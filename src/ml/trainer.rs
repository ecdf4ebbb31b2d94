// ============================================================
// Layer 5 - Training Loop
// ============================================================
// Checkpointed fit loop: MSE loss, Adam, one train stream and
// one validation stream pulled synchronously.
//
// Key Burn insight:
//   - Training uses B (an AutodiffBackend) for gradients
//   - model.valid() returns the model on B::InnerBackend with
//     dropout disabled, so the validation stream is produced
//     for the inner backend as well
//
// Steps per epoch are len / batch_size. A trailing partial
// batch is dropped every epoch; with fewer samples than one
// batch the epoch has zero steps and its loss is NaN.
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use std::path::PathBuf;

use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::batcher::{BatchProducer, BatchStream, SteeringBatch};
use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::sample::Sample;
use crate::infra::checkpoint::{
    CheckpointDecision, CheckpointManager, CheckpointPolicy, CheckpointTracker,
};
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::model::SteeringModel;

pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

/// Where the run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingPhase {
    Uninitialized,
    Compiled,
    Training { epoch: usize },
    Validating { epoch: usize },
    CheckpointSaved { epoch: usize },
    CheckpointSkipped { epoch: usize },
    Terminal,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub epochs:        Vec<EpochMetrics>,
    pub best_val_loss: Option<f64>,
    /// Set once any epoch wrote the checkpoint
    pub checkpoint:    Option<PathBuf>,
    pub phases:        Vec<TrainingPhase>,
}

impl TrainingReport {
    fn new() -> Self {
        Self {
            epochs:        Vec::new(),
            best_val_loss: None,
            checkpoint:    None,
            phases:        vec![TrainingPhase::Uninitialized],
        }
    }

    fn enter(&mut self, phase: TrainingPhase) {
        tracing::debug!("Training phase: {:?}", phase);
        self.phases.push(phase);
    }

    pub fn phase(&self) -> TrainingPhase {
        self.phases.last().copied().unwrap_or(TrainingPhase::Uninitialized)
    }
}

/// Number of whole batches in `len` samples.
pub fn steps_per_epoch(len: usize, batch_size: usize) -> usize {
    if batch_size == 0 { 0 } else { len / batch_size }
}

#[allow(clippy::too_many_arguments)]
pub fn train_model<B, P>(
    model:     SteeringModel<B>,
    cfg:       &TrainConfig,
    train_set: &[Sample],
    valid_set: &[Sample],
    producer:  &P,
    ckpt:      &CheckpointManager,
    metrics:   &MetricsLogger,
    device:    &B::Device,
) -> PipelineResult<TrainingReport>
where
    B: AutodiffBackend,
    P: BatchProducer<B> + BatchProducer<B::InnerBackend>,
{
    let mut report = TrainingReport::new();
    let mut model  = model;

    // ── Compile: Adam + MSE (the loss lives in forward_loss) ──────────────────
    let mut optim = AdamConfig::new().init();
    report.enter(TrainingPhase::Compiled);

    let train_steps = steps_per_epoch(train_set.len(), cfg.batch_size);
    let val_steps   = steps_per_epoch(valid_set.len(), cfg.batch_size);
    tracing::info!(
        "{} train steps and {} validation steps per epoch (batch size {})",
        train_steps, val_steps, cfg.batch_size,
    );

    let dropped = train_set.len() - train_steps * cfg.batch_size;
    if dropped > 0 {
        tracing::debug!("{} training samples beyond the last whole batch are skipped each epoch", dropped);
    }
    if train_steps == 0 {
        tracing::warn!(
            "Training set ({}) is smaller than one batch ({}): epochs will take no steps",
            train_set.len(),
            cfg.batch_size
        );
    }

    let mut train_stream =
        BatchProducer::<B>::produce(producer, train_set, cfg.batch_size, true, device);
    let mut val_stream =
        BatchProducer::<B::InnerBackend>::produce(producer, valid_set, cfg.batch_size, false, device);

    let mut tracker =
        CheckpointTracker::new(CheckpointPolicy::from_save_best_only(cfg.save_best_only));

    for epoch in 1..=cfg.nb_epoch {
        // ── Training phase ────────────────────────────────────────────────────
        report.enter(TrainingPhase::Training { epoch });
        let mut train_loss_sum = 0.0f64;

        for _ in 0..train_steps {
            let batch = next_batch(&mut train_stream)?;
            let loss  = model.forward_loss(batch.images, batch.angles);
            train_loss_sum += loss.clone().into_scalar().elem::<f64>();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.learning_rate, model, grads);
        }

        // ── Validation phase ──────────────────────────────────────────────────
        report.enter(TrainingPhase::Validating { epoch });
        let model_valid      = model.valid();
        let mut val_loss_sum = 0.0f64;

        for _ in 0..val_steps {
            let batch = next_batch(&mut val_stream)?;
            val_loss_sum += model_valid
                .forward_loss(batch.images, batch.angles)
                .into_scalar()
                .elem::<f64>();
        }

        let train_loss = mean(train_loss_sum, train_steps);
        let val_loss   = mean(val_loss_sum, val_steps);

        // ── Checkpoint ────────────────────────────────────────────────────────
        let saved = match tracker.observe(val_loss) {
            CheckpointDecision::Save => {
                let path = ckpt.save_model::<B::InnerBackend, _>(&model_valid)?;
                tracing::info!("Epoch {}: checkpoint written to '{}'", epoch, path.display());
                report.checkpoint = Some(path);
                report.enter(TrainingPhase::CheckpointSaved { epoch });
                true
            }
            CheckpointDecision::Skip => {
                report.enter(TrainingPhase::CheckpointSkipped { epoch });
                false
            }
        };

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | {}",
            epoch,
            cfg.nb_epoch,
            train_loss,
            val_loss,
            if saved { "saved" } else { "kept previous" },
        );

        let row = EpochMetrics { epoch, train_loss, val_loss, train_steps, val_steps, saved };
        metrics.log(&row)?;
        report.epochs.push(row);
    }

    report.best_val_loss = tracker.best();
    report.enter(TrainingPhase::Terminal);
    tracing::info!("Training complete!");
    Ok(report)
}

fn next_batch<B: Backend>(stream: &mut BatchStream<B>) -> PipelineResult<SteeringBatch<B>> {
    match stream.next() {
        Some(batch) => batch,
        None => Err(PipelineError::TrainingEngine(
            "batch stream ended before the epoch's steps were taken".to_string(),
        )),
    }
}

fn mean(sum: f64, steps: usize) -> f64 {
    if steps > 0 { sum / steps as f64 } else { f64::NAN }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::{ImageRef, INPUT_SHAPE};
    use crate::infra::checkpoint::CHECKPOINT_FILE;
    use crate::ml::model::{build_model, lock_backend_rng};
    use burn::backend::{Autodiff, NdArray};
    use std::{cell::RefCell, rc::Rc};
    use tempfile::TempDir;

    type TestBackend = Autodiff<NdArray>;

    /// Constant gray images labelled with the samples' angles.
    struct SyntheticProducer;

    impl<B: Backend> BatchProducer<B> for SyntheticProducer {
        fn produce(
            &self,
            samples:    &[Sample],
            batch_size: usize,
            _augment:   bool,
            device:     &B::Device,
        ) -> BatchStream<B> {
            let angles: Vec<f32> = samples.iter().map(|s| s.steering).collect();
            let device = device.clone();
            Box::new((0usize..).map(move |step| {
                let batch: Vec<f32> = (0..batch_size)
                    .map(|i| angles[(step * batch_size + i) % angles.len()])
                    .collect();
                let images = vec![100.0; batch_size * INPUT_SHAPE.value_count()];
                Ok(SteeringBatch::from_vecs(images, batch, INPUT_SHAPE, &device))
            }))
        }
    }

    /// Validation targets sit `offsets[epoch - 1]` away from the model's
    /// initial prediction `base`, so the validation loss is about offset².
    /// Each validation pull records the checkpoint bytes on disk at that
    /// moment, i.e. the state left by the previous epoch.
    struct ScriptedProducer {
        base:       f32,
        offsets:    Vec<f32>,
        checkpoint: PathBuf,
        on_disk:    Rc<RefCell<Vec<Option<Vec<u8>>>>>,
    }

    impl<B: Backend> BatchProducer<B> for ScriptedProducer {
        fn produce(
            &self,
            _:          &[Sample],
            batch_size: usize,
            augment:    bool,
            device:     &B::Device,
        ) -> BatchStream<B> {
            let device     = device.clone();
            let base       = self.base;
            let offsets    = self.offsets.clone();
            let checkpoint = self.checkpoint.clone();
            let on_disk    = Rc::clone(&self.on_disk);

            Box::new((0usize..).map(move |step| {
                let angle = if augment {
                    base + 1.0
                } else {
                    on_disk.borrow_mut().push(std::fs::read(&checkpoint).ok());
                    base + offsets[step.min(offsets.len() - 1)]
                };
                let images = vec![100.0; batch_size * INPUT_SHAPE.value_count()];
                Ok(SteeringBatch::from_vecs(images, vec![angle; batch_size], INPUT_SHAPE, &device))
            }))
        }
    }

    struct FailingProducer;

    impl<B: Backend> BatchProducer<B> for FailingProducer {
        fn produce(&self, _: &[Sample], _: usize, _: bool, _: &B::Device) -> BatchStream<B> {
            Box::new(std::iter::repeat_with(|| {
                Err(PipelineError::DataMissing("image 'IMG/gone.jpg' not found".to_string()))
            }))
        }
    }

    fn samples(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| Sample::new(ImageRef::Single(format!("Forward/f_{i}.png").into()), 0.05 * i as f32))
            .collect()
    }

    fn config(nb_epoch: usize, batch_size: usize) -> TrainConfig {
        TrainConfig { nb_epoch, batch_size, ..TrainConfig::default() }
    }

    fn run<P>(producer: &P, cfg: &TrainConfig, train: usize, valid: usize, dir: &TempDir)
        -> PipelineResult<TrainingReport>
    where
        P: BatchProducer<TestBackend> + BatchProducer<NdArray>,
    {
        let _rng    = lock_backend_rng();
        let device  = Default::default();
        let ckpt    = CheckpointManager::new(dir.path()).unwrap();
        let metrics = MetricsLogger::new(dir.path()).unwrap();
        let model   = build_model::<TestBackend>(cfg.keep_prob, cfg.seed, &device).unwrap();
        train_model(model, cfg, &samples(train), &samples(valid), producer, &ckpt, &metrics, &device)
    }

    #[test]
    fn test_steps_per_epoch_truncates() {
        assert_eq!(steps_per_epoch(100, 40), 2);
        assert_eq!(steps_per_epoch(39, 40), 0);
        assert_eq!(steps_per_epoch(80, 40), 2);
        assert_eq!(steps_per_epoch(10, 0), 0);
    }

    #[test]
    fn test_training_run_writes_first_checkpoint() {
        let dir    = TempDir::new().unwrap();
        let report = run(&SyntheticProducer, &config(2, 2), 4, 2, &dir).unwrap();

        assert_eq!(report.epochs.len(), 2);
        assert_eq!(report.epochs[0].train_steps, 2);
        assert_eq!(report.epochs[0].val_steps, 1);
        assert!(report.epochs[0].saved);
        assert!(report.epochs.iter().all(|e| e.train_loss.is_finite()));
        assert!(report.best_val_loss.is_some());

        let path = report.checkpoint.clone().unwrap();
        assert!(path.is_file());

        let csv = std::fs::read_to_string(dir.path().join(crate::infra::metrics::METRICS_FILE)).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_phases_follow_lifecycle() {
        let dir    = TempDir::new().unwrap();
        let report = run(&SyntheticProducer, &config(1, 2), 2, 2, &dir).unwrap();

        assert_eq!(
            report.phases,
            vec![
                TrainingPhase::Uninitialized,
                TrainingPhase::Compiled,
                TrainingPhase::Training { epoch: 1 },
                TrainingPhase::Validating { epoch: 1 },
                TrainingPhase::CheckpointSaved { epoch: 1 },
                TrainingPhase::Terminal,
            ]
        );
        assert_eq!(report.phase(), TrainingPhase::Terminal);
    }

    #[test]
    fn test_undersized_sets_give_degenerate_epochs() {
        let dir    = TempDir::new().unwrap();
        let report = run(&SyntheticProducer, &config(2, 4), 3, 1, &dir).unwrap();

        assert_eq!(report.epochs.len(), 2);
        assert!(report.epochs.iter().all(|e| e.train_steps == 0 && e.val_steps == 0));
        assert!(report.epochs.iter().all(|e| e.val_loss.is_nan() && !e.saved));
        assert!(report.checkpoint.is_none());
        assert!(!dir.path().join(crate::infra::checkpoint::CHECKPOINT_FILE).exists());
    }

    #[test]
    fn test_batch_failure_aborts_without_checkpoint() {
        let dir = TempDir::new().unwrap();
        let err = run(&FailingProducer, &config(3, 2), 4, 2, &dir).unwrap_err();

        assert!(matches!(err, PipelineError::DataMissing(_)));
        assert!(!dir.path().join(crate::infra::checkpoint::CHECKPOINT_FILE).exists());
    }

    #[test]
    fn test_worse_epoch_keeps_previous_checkpoint() {
        let _rng   = lock_backend_rng();
        let dir    = TempDir::new().unwrap();
        let device = Default::default();
        let cfg    = TrainConfig { learning_rate: 1.0e-7, ..config(4, 2) };

        let model  = build_model::<TestBackend>(cfg.keep_prob, cfg.seed, &device).unwrap();
        let images = Tensor::<NdArray, 4>::full([1, 3, 66, 200], 100.0, &device);
        let base   = model.valid().forward(images).into_scalar().elem::<f32>();

        let producer = ScriptedProducer {
            base,
            offsets:    [0.9f32, 0.5, 0.7, 0.3].iter().map(|l| l.sqrt()).collect(),
            checkpoint: dir.path().join(CHECKPOINT_FILE),
            on_disk:    Rc::new(RefCell::new(Vec::new())),
        };
        let ckpt    = CheckpointManager::new(dir.path()).unwrap();
        let metrics = MetricsLogger::new(dir.path()).unwrap();

        let report = train_model(
            model, &cfg, &samples(2), &samples(2), &producer, &ckpt, &metrics, &device,
        )
        .unwrap();

        let saved: Vec<bool> = report.epochs.iter().map(|e| e.saved).collect();
        assert_eq!(saved, vec![true, true, false, true]);
        assert!((report.best_val_loss.unwrap() - 0.3).abs() < 0.05);

        let on_disk = producer.on_disk.borrow();
        assert_eq!(on_disk.len(), 4);
        assert!(on_disk[0].is_none());
        assert_ne!(on_disk[1], on_disk[2]);
        assert_eq!(on_disk[2], on_disk[3]);

        let last = std::fs::read(dir.path().join(CHECKPOINT_FILE)).unwrap();
        assert_ne!(on_disk[3].as_deref(), Some(last.as_slice()));
    }

    #[test]
    fn test_failed_run_leaves_prior_checkpoint_untouched() {
        let dir      = TempDir::new().unwrap();
        let path     = dir.path().join(CHECKPOINT_FILE);
        let previous = b"weights from an earlier run".to_vec();
        std::fs::write(&path, &previous).unwrap();

        let err = run(&FailingProducer, &config(3, 2), 4, 2, &dir).unwrap_err();

        assert!(matches!(err, PipelineError::DataMissing(_)));
        assert_eq!(std::fs::read(&path).unwrap(), previous);
    }
}
