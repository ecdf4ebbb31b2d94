// ============================================================
// Layer 3 - Pipeline Errors
// ============================================================
// Every stage below the CLI returns Result<T, PipelineError>.
// Errors are surfaced to the caller unmodified: no retries,
// no partial results. The CLI layer wraps them in anyhow.

use thiserror::Error;

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// An expected file or directory is absent
    #[error("missing data: {0}")]
    DataMissing(String),

    /// Index file lacks required columns, or a value does not parse
    #[error("malformed data: {0}")]
    DataFormat(String),

    #[error("test fraction {0} is outside the open interval (0, 1)")]
    InvalidFraction(f64),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failure inside compile/fit/record; fatal for the run
    #[error("training engine failure: {0}")]
    TrainingEngine(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
