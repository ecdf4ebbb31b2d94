use burn::data::dataset::Dataset;

use crate::domain::sample::Sample;

/// Summary statistics over the steering labels of a dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleStats {
    pub min:  f32,
    pub max:  f32,
    pub mean: f32,
}

#[derive(Debug, Clone)]
pub struct SteeringDataset {
    samples: Vec<Sample>,
}

impl SteeringDataset {
    pub fn new(samples: Vec<Sample>) -> Self { Self { samples } }

    pub fn sample_count(&self) -> usize { self.samples.len() }

    pub fn angle_stats(&self) -> Option<AngleStats> {
        let first = self.samples.first()?.steering;
        let (min, max, sum) = self.samples.iter().fold(
            (first, first, 0.0f64),
            |(lo, hi, sum), s| (lo.min(s.steering), hi.max(s.steering), sum + s.steering as f64),
        );
        let mean = (sum / self.samples.len() as f64) as f32;
        Some(AngleStats { min, max, mean })
    }
}

impl Dataset<Sample> for SteeringDataset {
    fn get(&self, index: usize) -> Option<Sample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
