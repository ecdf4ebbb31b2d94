// ============================================================
// Layer 4 - Image Preprocessor and Augmentation
// ============================================================
// Prepares raw camera frames for the network.
//
// Preprocessing (every image, training and validation):
//   1. Crop 60 rows of sky from the top and 25 rows of hood
//      from the bottom (skipped for images too short to crop)
//   2. Resize to the network input, 200 × 66 (bilinear)
//   3. Convert RGB to YUV
//   4. Lay out as channel-major floats in 0..=255
//      (the model normalises to [-1, 1] itself)
//
// Augmentation (training only, applied before preprocessing):
//   - choose_camera:     use a side view with ±0.2 correction
//   - random_flip:       mirror horizontally, negate the angle
//   - random_translate:  shift the frame, nudge the angle
//   - random_shadow:     darken one side of a random line
//   - random_brightness: scale intensity by 0.8..1.2
//
// Every random decision draws from the caller's RNG, so a
// seeded stream produces the same batches each run.
//
// Reference: image crate documentation (imageops)
//            Bojarski et al. (2016) End to End Learning for
//            Self-Driving Cars

use image::{
    imageops::{self, FilterType},
    Rgb, RgbImage,
};
use rand::Rng;

use crate::domain::sample::{Camera, ImageRef, InputShape, INPUT_SHAPE};

/// Rows removed above the road
pub const CROP_TOP: u32 = 60;
/// Rows removed at the car hood
pub const CROP_BOTTOM: u32 = 25;

/// Angle correction applied when a side camera stands in for the center one
pub const STEERING_CORRECTION: f32 = 0.2;

/// Chance that a training sample is augmented at all
pub const AUGMENT_PROBABILITY: f32 = 0.6;

const TRANSLATE_RANGE_X: f32 = 100.0;
const TRANSLATE_RANGE_Y: f32 = 10.0;
const ANGLE_PER_PIXEL:   f32 = 0.002;

// ─── Preprocessor ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct Preprocessor {
    shape: InputShape,
}

impl Preprocessor {
    pub fn new(shape: InputShape) -> Self {
        Self { shape }
    }

    pub fn shape(&self) -> InputShape {
        self.shape
    }

    /// Full pipeline: crop → resize → YUV → channel-major floats.
    /// Output length is `shape.value_count()`.
    pub fn process(&self, img: &RgbImage) -> Vec<f32> {
        let cropped = crop_road(img);
        let (w, h)  = (self.shape.width as u32, self.shape.height as u32);
        let resized = imageops::resize(&cropped, w, h, FilterType::Triangle);

        let plane   = self.shape.width * self.shape.height;
        let mut out = vec![0.0f32; plane * 3];

        for (x, y, px) in resized.enumerate_pixels() {
            let i = y as usize * self.shape.width + x as usize;
            let [luma, u, v] = rgb_to_yuv(px.0);
            out[i]             = luma;
            out[plane + i]     = u;
            out[2 * plane + i] = v;
        }
        out
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(INPUT_SHAPE)
    }
}

/// Remove sky and hood rows when the frame is tall enough.
pub fn crop_road(img: &RgbImage) -> RgbImage {
    let (w, h) = img.dimensions();
    if h <= CROP_TOP + CROP_BOTTOM {
        return img.clone();
    }
    imageops::crop_imm(img, 0, CROP_TOP, w, h - CROP_TOP - CROP_BOTTOM).to_image()
}

/// BT.601 RGB → YUV with the chroma planes offset to 128.
pub fn rgb_to_yuv([r, g, b]: [u8; 3]) -> [f32; 3] {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = 0.492 * (b - y) + 128.0;
    let v = 0.877 * (r - y) + 128.0;
    [y.clamp(0.0, 255.0), u.clamp(0.0, 255.0), v.clamp(0.0, 255.0)]
}

// ─── Augmentation ─────────────────────────────────────────────────────────────

/// Pick one of the three views. Side views get the steering
/// correction; a single-image sample always keeps its view.
pub fn choose_camera<R: Rng>(rng: &mut R, image: &ImageRef, steering: f32) -> (Camera, f32) {
    if !image.has_side_views() {
        return (Camera::Center, steering);
    }
    match rng.gen_range(0..3) {
        0 => (Camera::Left,  steering + STEERING_CORRECTION),
        1 => (Camera::Right, steering - STEERING_CORRECTION),
        _ => (Camera::Center, steering),
    }
}

pub fn random_flip<R: Rng>(rng: &mut R, img: RgbImage, steering: f32) -> (RgbImage, f32) {
    if rng.gen_bool(0.5) {
        (imageops::flip_horizontal(&img), -steering)
    } else {
        (img, steering)
    }
}

/// Shift by up to ±50 px horizontally and ±5 px vertically.
/// Uncovered pixels are black.
pub fn random_translate<R: Rng>(rng: &mut R, img: RgbImage, steering: f32) -> (RgbImage, f32) {
    let tx = TRANSLATE_RANGE_X * (rng.gen::<f32>() - 0.5);
    let ty = TRANSLATE_RANGE_Y * (rng.gen::<f32>() - 0.5);
    let steering = steering + tx * ANGLE_PER_PIXEL;

    let (dx, dy) = (tx.round() as i64, ty.round() as i64);
    let (w, h)   = img.dimensions();

    let shifted = RgbImage::from_fn(w, h, |x, y| {
        let sx = x as i64 - dx;
        let sy = y as i64 - dy;
        if sx >= 0 && sy >= 0 && sx < w as i64 && sy < h as i64 {
            *img.get_pixel(sx as u32, sy as u32)
        } else {
            Rgb([0, 0, 0])
        }
    });
    (shifted, steering)
}

/// Darken everything on one side of a line running from a
/// random point on the top edge to a random point on the bottom.
pub fn random_shadow<R: Rng>(rng: &mut R, mut img: RgbImage) -> RgbImage {
    let (w, h) = img.dimensions();
    let x1     = w as f32 * rng.gen::<f32>();
    let x2     = w as f32 * rng.gen::<f32>();
    let side   = rng.gen_bool(0.5);
    let ratio  = rng.gen_range(0.2f32..0.5);

    for (x, y, px) in img.enumerate_pixels_mut() {
        let above = (y as f32) * (x2 - x1) - (h as f32) * (x as f32 - x1) > 0.0;
        if above == side {
            px.0 = px.0.map(|c| (c as f32 * ratio) as u8);
        }
    }
    img
}

pub fn random_brightness<R: Rng>(rng: &mut R, mut img: RgbImage) -> RgbImage {
    let ratio = 1.0 + 0.4 * (rng.gen::<f32>() - 0.5);
    for px in img.pixels_mut() {
        px.0 = px.0.map(|c| (c as f32 * ratio).min(255.0) as u8);
    }
    img
}

/// Geometric and photometric augmentation of an already
/// chosen view.
pub fn augment<R: Rng>(rng: &mut R, img: RgbImage, steering: f32) -> (RgbImage, f32) {
    let (img, steering) = random_flip(rng, img, steering);
    let (img, steering) = random_translate(rng, img, steering);
    let img             = random_shadow(rng, img);
    let img             = random_brightness(rng, img);
    (img, steering)
}
