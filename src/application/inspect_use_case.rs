// ============================================================
// Layer 2 - InspectUseCase
// ============================================================
// Resolves and splits a dataset exactly like a training run
// would, then reports what it found. No model is built and
// nothing is written to disk.

use crate::data::{
    dataset::{AngleStats, SteeringDataset},
    loader::{DatasetResolver, IngestionMode},
    splitter::split_train_val,
};
use crate::domain::error::PipelineResult;
use crate::domain::traits::SampleSource;

#[derive(Debug, Clone)]
pub struct DatasetSummary {
    pub mode:       IngestionMode,
    pub total:      usize,
    pub train:      usize,
    pub validation: usize,
    pub angles:     Option<AngleStats>,
}

pub struct InspectUseCase {
    data_dir:  String,
    test_size: f64,
    seed:      u64,
}

impl InspectUseCase {
    pub fn new(data_dir: impl Into<String>, test_size: f64, seed: u64) -> Self {
        Self { data_dir: data_dir.into(), test_size, seed }
    }

    pub fn summarize(&self) -> PipelineResult<DatasetSummary> {
        let resolver = DatasetResolver::detect(&self.data_dir);
        let samples  = resolver.load_all()?;
        let (train, validation) = split_train_val(&samples, self.test_size, self.seed)?;

        let total  = samples.len();
        let angles = SteeringDataset::new(samples).angle_stats();

        Ok(DatasetSummary {
            mode: resolver.mode(),
            total,
            train: train.len(),
            validation: validation.len(),
            angles,
        })
    }
}
