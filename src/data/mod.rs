// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// Everything from the data directory on disk to tensor
// batches in the training loop.
//
//   data directory
//       │
//       ▼
//   DatasetResolver   → driving_log.csv rows or labelled images
//       │
//       ▼
//   split_train_val   → seeded train / validation partition
//       │
//       ▼
//   SteeringDataset   → implements Burn's Dataset trait
//       │
//       ▼
//   Preprocessor      → crop, resize, YUV, augmentation
//       │
//       ▼
//   ImageBatchProducer→ endless batch streams for the trainer
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Resolves the dataset layout and loads labelled samples
pub mod loader;

/// Shuffles and splits samples into train/validation sets
pub mod splitter;

/// Implements Burn's Dataset trait for steering samples
pub mod dataset;

/// Image preprocessing and training-time augmentation
pub mod preprocessor;

/// Produces tensor batch streams for the training loop
pub mod batcher;
