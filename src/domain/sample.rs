// ============================================================
// Layer 3 - Sample Domain Types
// ============================================================
// A Sample pairs an image reference with a steering angle.
//
// The image reference comes in two shapes depending on how
// the dataset was ingested:
//
//   Indexed mode   → one row of driving_log.csv
//                    = three camera views for the same angle
//   Directory mode → one .png file = one image for one angle
//
// All paths are stored relative to the data directory (an
// absolute path in the index file stays absolute) and are
// resolved against it only when the image is loaded.
//
// Reference: Rust Book §5 (Structs), §6 (Enums)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Fixed network input: height × width × channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    pub height:   usize,
    pub width:    usize,
    pub channels: usize,
}

impl InputShape {
    /// Number of values in one channel-major image
    pub fn value_count(&self) -> usize {
        self.height * self.width * self.channels
    }
}

/// The shape every image is preprocessed into before batching.
pub const INPUT_SHAPE: InputShape = InputShape { height: 66, width: 200, channels: 3 };

/// Which camera an image was captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Camera {
    Center,
    Left,
    Right,
}

/// The three simultaneous camera views of one index row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraViews {
    pub center: PathBuf,
    pub left:   PathBuf,
    pub right:  PathBuf,
}

/// Where the pixels of a Sample come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImageRef {
    /// One index row: any one of the views may be used for the angle
    Views(CameraViews),
    /// One image file from a labelled directory
    Single(PathBuf),
}

impl ImageRef {
    /// The view used when no augmentation is applied.
    pub fn primary(&self) -> &Path {
        self.view(Camera::Center)
    }

    /// Path for the requested camera. A single image has only
    /// one view, so it is returned whatever camera is asked for.
    pub fn view(&self, camera: Camera) -> &Path {
        match self {
            ImageRef::Views(v) => match camera {
                Camera::Center => &v.center,
                Camera::Left   => &v.left,
                Camera::Right  => &v.right,
            },
            ImageRef::Single(path) => path,
        }
    }

    /// True when left/right views exist alongside the center one
    pub fn has_side_views(&self) -> bool {
        matches!(self, ImageRef::Views(_))
    }
}

/// One labelled training example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub image:    ImageRef,
    pub steering: f32,
}

impl Sample {
    pub fn new(image: ImageRef, steering: f32) -> Self {
        Self { image, steering }
    }
}
