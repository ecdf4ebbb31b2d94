use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        loss::{MseLoss, Reduction},
        Dropout, DropoutConfig,
        Linear, LinearConfig,
        PaddingConfig2d,
    },
    prelude::*,
    tensor::activation,
};

use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::sample::INPUT_SHAPE;

/// One convolutional feature-extraction stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvStage {
    pub channels: usize,
    pub kernel:   usize,
    pub stride:   usize,
}

/// Feature extractor: three unstrided 5x5 stages, then two 3x3 stages
/// that stride by their own kernel size.
pub const CONV_STAGES: [ConvStage; 5] = [
    ConvStage { channels: 24, kernel: 5, stride: 1 },
    ConvStage { channels: 36, kernel: 5, stride: 1 },
    ConvStage { channels: 48, kernel: 5, stride: 1 },
    ConvStage { channels: 64, kernel: 3, stride: 3 },
    ConvStage { channels: 64, kernel: 3, stride: 3 },
];

pub const DENSE_UNITS: [usize; 3] = [100, 50, 10];

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct SteeringModelConfig {
    /// Probability that an activation survives dropout
    pub keep_prob: f64,
    #[config(default = 66)]
    pub input_height: usize,
    #[config(default = 200)]
    pub input_width: usize,
    #[config(default = 3)]
    pub input_channels: usize,
}

impl SteeringModelConfig {
    /// Spatial size after each conv stage, `None` once the
    /// input is too small for a kernel.
    pub fn feature_dims(&self) -> Option<Vec<(usize, usize)>> {
        let mut dims       = Vec::with_capacity(CONV_STAGES.len());
        let (mut h, mut w) = (self.input_height, self.input_width);
        for stage in CONV_STAGES {
            if h < stage.kernel || w < stage.kernel {
                return None;
            }
            h = (h - stage.kernel) / stage.stride + 1;
            w = (w - stage.kernel) / stage.stride + 1;
            dims.push((h, w));
        }
        Some(dims)
    }

    /// Length of the flattened conv output fed to the dense head.
    pub fn flattened_len(&self) -> Option<usize> {
        let (h, w) = *self.feature_dims()?.last()?;
        Some(h * w * CONV_STAGES[CONV_STAGES.len() - 1].channels)
    }

    /// Human-readable layer listing.
    pub fn architecture(&self) -> Vec<String> {
        let mut lines = vec![
            format!(
                "input      [{}, {}, {}]",
                self.input_channels, self.input_height, self.input_width
            ),
            "normalize  x / 127.5 - 1.0".to_string(),
        ];

        let dims      = self.feature_dims().unwrap_or_default();
        let mut in_ch = self.input_channels;
        for (i, stage) in CONV_STAGES.iter().enumerate() {
            let (h, w) = dims.get(i).copied().unwrap_or((0, 0));
            lines.push(format!(
                "conv{}      {}→{} k{}x{} s{} elu → [{}, {}, {}]",
                i + 1, in_ch, stage.channels, stage.kernel, stage.kernel, stage.stride,
                stage.channels, h, w,
            ));
            in_ch = stage.channels;
        }

        lines.push(format!("dropout    keep_prob={}", self.keep_prob));

        let mut in_units = self.flattened_len().unwrap_or(0);
        lines.push(format!("flatten    {in_units}"));
        for (i, units) in DENSE_UNITS.iter().enumerate() {
            lines.push(format!("dense{}     {}→{} elu", i + 1, in_units, units));
            in_units = *units;
        }
        lines.push(format!("output     {in_units}→1 linear"));
        lines
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> SteeringModel<B> {
        let mut in_ch = self.input_channels;
        let convs: Vec<Conv2d<B>> = CONV_STAGES
            .iter()
            .map(|stage| {
                let conv = Conv2dConfig::new([in_ch, stage.channels], [stage.kernel, stage.kernel])
                    .with_stride([stage.stride, stage.stride])
                    .with_padding(PaddingConfig2d::Valid)
                    .init(device);
                in_ch = stage.channels;
                conv
            })
            .collect();

        let dropout = DropoutConfig::new(1.0 - self.keep_prob).init();

        let mut in_units = self.flattened_len().unwrap_or(0);
        let dense: Vec<Linear<B>> = DENSE_UNITS
            .iter()
            .map(|&units| {
                let layer = LinearConfig::new(in_units, units).init(device);
                in_units = units;
                layer
            })
            .collect();
        let output = LinearConfig::new(in_units, 1).init(device);

        SteeringModel { convs, dropout, dense, output }
    }
}

#[derive(Module, Debug)]
pub struct SteeringModel<B: Backend> {
    pub convs:   Vec<Conv2d<B>>,
    pub dropout: Dropout,
    pub dense:   Vec<Linear<B>>,
    pub output:  Linear<B>,
}

impl<B: Backend> SteeringModel<B> {
    /// images: [batch, channels, height, width] in 0..=255 → [batch, 1]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = images.div_scalar(127.5).sub_scalar(1.0);
        for conv in &self.convs {
            x = elu(conv.forward(x));
        }
        let x = self.dropout.forward(x);

        let mut x: Tensor<B, 2> = x.flatten(1, 3);
        for layer in &self.dense {
            x = elu(layer.forward(x));
        }
        self.output.forward(x)
    }

    /// Mean squared error against target angles [batch, 1].
    pub fn forward_loss(&self, images: Tensor<B, 4>, angles: Tensor<B, 2>) -> Tensor<B, 1> {
        MseLoss::new().forward(self.forward(images), angles, Reduction::Mean)
    }
}

/// Exponential linear unit: x for x > 0, e^x - 1 otherwise.
pub fn elu<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    // clamp first so exp never sees large positive inputs
    activation::relu(x.clone()) + x.clamp_max(0.0).exp().sub_scalar(1.0)
}

/// Build the fixed steering regressor.
///
/// The backend RNG is seeded before parameters are drawn, so
/// the same `(keep_prob, seed)` gives the same initial weights.
pub fn build_model<B: Backend>(
    keep_prob: f64,
    seed:      u64,
    device:    &B::Device,
) -> PipelineResult<SteeringModel<B>> {
    if !(keep_prob > 0.0 && keep_prob <= 1.0) {
        return Err(PipelineError::InvalidConfig(format!(
            "keep_prob must be in (0, 1], got {keep_prob}"
        )));
    }

    let config = SteeringModelConfig::new(keep_prob)
        .with_input_height(INPUT_SHAPE.height)
        .with_input_width(INPUT_SHAPE.width)
        .with_input_channels(INPUT_SHAPE.channels);

    B::seed(seed);
    let model = config.init::<B>(device);

    for line in config.architecture() {
        tracing::info!("  {line}");
    }
    tracing::info!("Model ready: {} trainable parameters", model.num_params());

    Ok(model)
}

/// Serializes tests that draw from the backend's global RNG.
#[cfg(test)]
pub(crate) fn lock_backend_rng() -> std::sync::MutexGuard<'static, ()> {
    static BACKEND_RNG: std::sync::Mutex<()> = std::sync::Mutex::new(());
    BACKEND_RNG.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_feature_dims_for_default_input() {
        let cfg  = SteeringModelConfig::new(0.5);
        let dims = cfg.feature_dims().unwrap();
        assert_eq!(dims, vec![(62, 196), (58, 192), (54, 188), (18, 62), (6, 20)]);
        assert_eq!(cfg.flattened_len(), Some(64 * 6 * 20));
    }

    #[test]
    fn test_stage_strides() {
        let strides: Vec<usize> = CONV_STAGES.iter().map(|s| s.stride).collect();
        assert_eq!(strides, vec![1, 1, 1, 3, 3]);
    }

    #[test]
    fn test_too_small_input_has_no_feature_dims() {
        let cfg = SteeringModelConfig::new(0.5).with_input_height(20);
        assert!(cfg.feature_dims().is_none());
    }

    #[test]
    fn test_output_is_one_value_per_image() {
        let _rng   = lock_backend_rng();
        let device = Default::default();
        for keep_prob in [0.2, 0.5, 1.0] {
            let model  = build_model::<TestBackend>(keep_prob, 0, &device).unwrap();
            let images = Tensor::<TestBackend, 4>::zeros([2, 3, 66, 200], &device);
            assert_eq!(model.forward(images).dims(), [2, 1]);
        }
    }

    #[test]
    fn test_architecture_is_pure_function_of_keep_prob() {
        let _rng   = lock_backend_rng();
        let device = Default::default();
        let a = build_model::<TestBackend>(0.5, 0, &device).unwrap();
        let b = build_model::<TestBackend>(0.5, 9, &device).unwrap();
        assert_eq!(a.num_params(), b.num_params());
        assert_eq!(
            SteeringModelConfig::new(0.5).architecture(),
            SteeringModelConfig::new(0.5).architecture()
        );
        assert_ne!(
            SteeringModelConfig::new(0.5).architecture(),
            SteeringModelConfig::new(0.8).architecture()
        );
    }

    #[test]
    fn test_same_seed_gives_same_initial_weights() {
        let _rng   = lock_backend_rng();
        let device = Default::default();
        let output = |seed: u64| {
            let model  = build_model::<TestBackend>(1.0, seed, &device).unwrap();
            let images = Tensor::<TestBackend, 4>::full([1, 3, 66, 200], 90.0, &device);
            model.forward(images).into_data().to_vec::<f32>().unwrap()
        };

        let first = output(7);
        assert_eq!(first, output(7));
        assert_ne!(first, output(8));
    }

    #[test]
    fn test_invalid_keep_prob_is_rejected() {
        let device = Default::default();
        for bad in [0.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                build_model::<TestBackend>(bad, 0, &device),
                Err(PipelineError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_elu_values() {
        let device = Default::default();
        let x      = Tensor::<TestBackend, 1>::from_floats([-1.0, 0.0, 2.0], &device);
        let y      = elu(x).into_data().to_vec::<f32>().unwrap();
        assert!((y[0] - ((-1.0f32).exp() - 1.0)).abs() < 1e-6);
        assert!(y[1].abs() < 1e-6);
        assert!((y[2] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_mse_loss_is_zero_for_perfect_prediction() {
        let _rng   = lock_backend_rng();
        let device = Default::default();
        let model  = build_model::<TestBackend>(1.0, 0, &device).unwrap();
        let images = Tensor::<TestBackend, 4>::ones([1, 3, 66, 200], &device);
        let target = model.forward(images.clone());
        let loss   = model.forward_loss(images, target).into_scalar().elem::<f64>();
        assert!(loss.abs() < 1e-9);
    }
}
