// ============================================================
// Layer 3 - Core Traits (Abstractions)
// ============================================================
// The application layer talks to data sources through this
// trait only. Both ingestion strategies implement it:
//   - DrivingLogLoader → rows of driving_log.csv
//   - LabeledDirLoader → Forward/Left/Right image folders
//   - DatasetResolver  → picks one of the two at runtime
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use crate::domain::error::PipelineResult;
use crate::domain::sample::Sample;

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// Any component that can produce labelled samples.
pub trait SampleSource {
    /// Load every sample in discovery order.
    fn load_all(&self) -> PipelineResult<Vec<Sample>>;
}
