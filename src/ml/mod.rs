// ============================================================
// Layer 5 - ML / Model Layer (Burn)
// ============================================================
// The network and the loop that fits it.
//
//   model.rs   - The steering regressor
//                • Pixel normalisation to [-1, 1]
//                • Five conv stages (24, 36, 48, 64, 64), ELU
//                • Dropout on the conv features
//                • Dense head 100 → 50 → 10 → 1
//
//   trainer.rs - The training loop
//                Forward pass, MSE loss, backward pass,
//                Adam step, validation, and best-so-far
//                checkpointing per epoch
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Bojarski et al. (2016) End to End Learning for
//            Self-Driving Cars

/// Convolutional steering-angle regressor
pub mod model;

/// Training loop with validation and checkpointing
pub mod trainer;
