// ============================================================
// Layer 4 - Steering Batcher
// ============================================================
// Produces the endless, lazily evaluated batch streams the
// training loop pulls from.
//
// What is a batch stream?
//   An Iterator that yields one SteeringBatch per call to
//   next(), forever. The trainer takes exactly as many
//   batches per epoch as it needs (len / batch_size).
//
// Every call to BatchProducer::produce returns a fresh stream
// with its own RNG and its own index permutation. The train
// and validation streams never share a cursor.
//
// How ImageBatchStream fills a batch:
//   1. Take the next index from a shuffled permutation
//      (reshuffled each time it runs out)
//   2. Load the image (maybe a side view when augmenting)
//   3. Augment with probability 0.6 when enabled
//   4. Preprocess to [3, 66, 200] floats
//   5. Stack batch_size of them into [N, 3, 66, 200]
//
// Reference: Burn Book §4 (Batcher)
//            Rust Book §13 (Iterators)

use std::path::{Path, PathBuf};

use burn::{
    data::dataset::Dataset,
    prelude::*,
    tensor::TensorData,
};
use image::RgbImage;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use crate::data::dataset::SteeringDataset;
use crate::data::preprocessor::{self, Preprocessor, AUGMENT_PROBABILITY};
use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::sample::{InputShape, Sample};

// ─── SteeringBatch ────────────────────────────────────────────────────────────
/// A batch ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct SteeringBatch<B: Backend> {
    /// Preprocessed images - shape: [batch_size, channels, height, width]
    pub images: Tensor<B, 4>,

    /// Target steering angles - shape: [batch_size, 1]
    pub angles: Tensor<B, 2>,
}

impl<B: Backend> SteeringBatch<B> {
    /// Stack flat channel-major image values and their labels.
    /// `images.len()` must equal `angles.len() * shape.value_count()`.
    pub fn from_vecs(
        images: Vec<f32>,
        angles: Vec<f32>,
        shape:  InputShape,
        device: &B::Device,
    ) -> Self {
        let n = angles.len();

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(images, [n, shape.channels, shape.height, shape.width]),
            device,
        );
        let angles = Tensor::<B, 2>::from_data(TensorData::new(angles, [n, 1]), device);

        Self { images, angles }
    }

    pub fn len(&self) -> usize {
        self.angles.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An endless stream of batches; an `Err` item aborts training.
pub type BatchStream<B> = Box<dyn Iterator<Item = PipelineResult<SteeringBatch<B>>>>;

// ─── BatchProducer ────────────────────────────────────────────────────────────
/// Anything that can turn samples into a batch stream.
pub trait BatchProducer<B: Backend> {
    /// Start a new, independent stream over `samples`.
    fn produce(
        &self,
        samples:    &[Sample],
        batch_size: usize,
        augment:    bool,
        device:     &B::Device,
    ) -> BatchStream<B>;
}

// ─── ImageBatchProducer ───────────────────────────────────────────────────────
/// Loads images from disk relative to the data directory.
#[derive(Debug, Clone)]
pub struct ImageBatchProducer {
    data_dir:     PathBuf,
    preprocessor: Preprocessor,
    seed:         u64,
}

impl ImageBatchProducer {
    pub fn new(data_dir: impl Into<PathBuf>, seed: u64) -> Self {
        Self {
            data_dir:     data_dir.into(),
            preprocessor: Preprocessor::default(),
            seed,
        }
    }
}

impl<B: Backend> BatchProducer<B> for ImageBatchProducer {
    fn produce(
        &self,
        samples:    &[Sample],
        batch_size: usize,
        augment:    bool,
        device:     &B::Device,
    ) -> BatchStream<B> {
        // Distinct seeds so train and validation draw different orders
        let seed = if augment { self.seed } else { self.seed.wrapping_add(1) };

        Box::new(ImageBatchStream::<B> {
            dataset:      SteeringDataset::new(samples.to_vec()),
            data_dir:     self.data_dir.clone(),
            preprocessor: self.preprocessor.clone(),
            batch_size,
            augment,
            order:        Vec::new(),
            cursor:       0,
            rng:          StdRng::seed_from_u64(seed),
            device:       device.clone(),
        })
    }
}

// ─── ImageBatchStream ─────────────────────────────────────────────────────────
pub struct ImageBatchStream<B: Backend> {
    dataset:      SteeringDataset,
    data_dir:     PathBuf,
    preprocessor: Preprocessor,
    batch_size:   usize,
    augment:      bool,
    order:        Vec<usize>,
    cursor:       usize,
    rng:          StdRng,
    device:       B::Device,
}

impl<B: Backend> ImageBatchStream<B> {
    fn next_index(&mut self) -> usize {
        if self.cursor >= self.order.len() {
            self.order = (0..self.dataset.len()).collect();
            self.order.shuffle(&mut self.rng);
            self.cursor = 0;
        }
        let idx = self.order[self.cursor];
        self.cursor += 1;
        idx
    }

    /// Pixels and (possibly adjusted) label for one sample.
    fn load_sample(&mut self, sample: &Sample) -> PipelineResult<(Vec<f32>, f32)> {
        let (img, angle) = if self.augment && self.rng.gen::<f32>() < AUGMENT_PROBABILITY {
            let (camera, angle) =
                preprocessor::choose_camera(&mut self.rng, &sample.image, sample.steering);
            let img = load_rgb(&self.data_dir.join(sample.image.view(camera)))?;
            preprocessor::augment(&mut self.rng, img, angle)
        } else {
            let img = load_rgb(&self.data_dir.join(sample.image.primary()))?;
            (img, sample.steering)
        };

        Ok((self.preprocessor.process(&img), angle))
    }
}

impl<B: Backend> Iterator for ImageBatchStream<B> {
    type Item = PipelineResult<SteeringBatch<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.dataset.is_empty() || self.batch_size == 0 {
            return None;
        }

        let shape      = self.preprocessor.shape();
        let mut images = Vec::with_capacity(self.batch_size * shape.value_count());
        let mut angles = Vec::with_capacity(self.batch_size);

        for _ in 0..self.batch_size {
            let idx    = self.next_index();
            let sample = self.dataset.get(idx)?;
            match self.load_sample(&sample) {
                Ok((pixels, angle)) => {
                    images.extend(pixels);
                    angles.push(angle);
                }
                Err(e) => return Some(Err(e)),
            }
        }

        Some(Ok(SteeringBatch::from_vecs(images, angles, shape, &self.device)))
    }
}

/// Decode an image file as 8-bit RGB.
pub fn load_rgb(path: &Path) -> PipelineResult<RgbImage> {
    match image::open(path) {
        Ok(img) => Ok(img.to_rgb8()),
        Err(image::ImageError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(PipelineError::DataMissing(format!("image '{}' not found", path.display())))
        }
        Err(e) => Err(PipelineError::DataFormat(format!(
            "cannot decode image '{}': {}",
            path.display(),
            e
        ))),
    }
}
