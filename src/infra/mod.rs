// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// Cross-cutting concerns the other layers rely on:
//
//   checkpoint.rs - Atomic model checkpointing and the
//                   best-so-far save policy. Also writes the
//                   run's TrainConfig as JSON.
//
//   metrics.rs    - Epoch-level metrics (loss, step counts,
//                   whether a checkpoint was written) appended
//                   to a CSV file.
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and save policy
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
