// ============================================================
// Layer 6 - Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch.
//
// Metrics recorded per epoch:
//   - epoch:       the epoch number (1, 2, 3, ...)
//   - train_loss:  mean MSE over the epoch's training steps
//   - val_loss:    mean MSE over the epoch's validation steps
//   - train_steps: batches used for training this epoch
//   - val_steps:   batches used for validation this epoch
//   - saved:       whether the checkpoint was replaced
//
// Losses are NaN when an epoch had zero steps (fewer samples
// than one batch).
//
// Output file: checkpoints/metrics.csv (appended across runs)
//
// Example CSV output:
//   epoch,train_loss,val_loss,train_steps,val_steps,saved
//   1,0.041200,0.030900,400,100,true
//   2,0.032800,0.033400,400,100,false
//
// Reference: Rust Book §12 (I/O and File Handling)

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::error::PipelineResult;

/// File name of the metrics log inside the checkpoint directory
pub const METRICS_FILE: &str = "metrics.csv";

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch:       usize,
    pub train_loss:  f64,
    pub val_loss:    f64,
    pub train_steps: usize,
    pub val_steps:   usize,
    /// True when this epoch's weights were written to disk
    pub saved:       bool,
}

/// Appends epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger.
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> PipelineResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join(METRICS_FILE);

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,train_loss,val_loss,train_steps,val_steps,saved")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row.
    pub fn log(&self, m: &EpochMetrics) -> PipelineResult<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{:.6},{:.6},{},{},{}",
            m.epoch,
            m.train_loss,
            m.val_loss,
            m.train_steps,
            m.val_steps,
            m.saved,
        )?;

        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
