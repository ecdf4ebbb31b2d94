// ============================================================
// Layer 4 - Dataset Loaders
// ============================================================
// Turns a data directory into an ordered list of Samples.
//
// Two on-disk layouts are supported:
//
//   Indexed mode (driving_log.csv present):
//     data/
//       driving_log.csv        ← center,left,right,steering,...
//       IMG/*.jpg
//     One Sample per CSV row, carrying all three camera views.
//
//   Directory mode (no driving_log.csv):
//     data/
//       Forward/img_0.3.png    ← angle encoded after the last '_'
//       Left/img_-0.15.png
//       Right/...
//     One Sample per image file.
//
// The grouping differs between the modes (row vs. file).
// Both are kept as-is behind the DatasetResolver enum so the
// split and training code never needs to know which one ran.
//
// Reference: csv crate documentation
//            Rust Book §9 (Error Handling)

use std::{
    fmt,
    fs,
    path::{Path, PathBuf},
};

use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::sample::{CameraViews, ImageRef, Sample};
use crate::domain::traits::SampleSource;

/// Index file probed for under the data directory
pub const INDEX_FILE: &str = "driving_log.csv";

/// Image folders scanned in directory mode, in output order
pub const VIEW_DIRS: [&str; 3] = ["Forward", "Left", "Right"];

/// Extension of images picked up in directory mode
const IMAGE_EXTENSION: &str = "png";

// ─── Ingestion mode ───────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionMode {
    Indexed,
    Directory,
}

impl fmt::Display for IngestionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestionMode::Indexed   => write!(f, "indexed ({INDEX_FILE})"),
            IngestionMode::Directory => write!(f, "directory ({})", VIEW_DIRS.join("/")),
        }
    }
}

// ─── DatasetResolver ──────────────────────────────────────────────────────────
/// Chooses the ingestion strategy for a data directory.
pub enum DatasetResolver {
    Indexed(DrivingLogLoader),
    Directory(LabeledDirLoader),
}

impl DatasetResolver {
    /// Probe `data_dir` for the index file and pick a loader.
    pub fn detect(data_dir: impl AsRef<Path>) -> Self {
        let data_dir  = data_dir.as_ref();
        let index     = data_dir.join(INDEX_FILE);

        if index.is_file() {
            tracing::info!("Found '{}', using indexed mode", index.display());
            DatasetResolver::Indexed(DrivingLogLoader::new(index))
        } else {
            tracing::info!(
                "No '{}' under '{}', using directory mode",
                INDEX_FILE,
                data_dir.display()
            );
            DatasetResolver::Directory(LabeledDirLoader::new(data_dir))
        }
    }

    pub fn mode(&self) -> IngestionMode {
        match self {
            DatasetResolver::Indexed(_)   => IngestionMode::Indexed,
            DatasetResolver::Directory(_) => IngestionMode::Directory,
        }
    }
}

impl SampleSource for DatasetResolver {
    fn load_all(&self) -> PipelineResult<Vec<Sample>> {
        match self {
            DatasetResolver::Indexed(loader)   => loader.load_all(),
            DatasetResolver::Directory(loader) => loader.load_all(),
        }
    }
}

// ─── DrivingLogLoader ─────────────────────────────────────────────────────────
/// Reads samples from a simulator driving log.
pub struct DrivingLogLoader {
    /// Full path of driving_log.csv
    path: PathBuf,
}

impl DrivingLogLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Column positions of the fields we need
struct LogColumns {
    center:   usize,
    left:     usize,
    right:    usize,
    steering: usize,
}

impl LogColumns {
    fn from_headers(headers: &csv::StringRecord, path: &Path) -> PipelineResult<Self> {
        let find = |name: &str| headers.iter().position(|h| h == name);

        let wanted  = ["center", "left", "right", "steering"];
        let missing: Vec<&str> = wanted
            .iter()
            .copied()
            .filter(|name| find(*name).is_none())
            .collect();

        match (find("center"), find("left"), find("right"), find("steering")) {
            (Some(center), Some(left), Some(right), Some(steering)) => {
                Ok(Self { center, left, right, steering })
            }
            _ => Err(PipelineError::DataFormat(format!(
                "'{}' is missing required column(s): {}",
                path.display(),
                missing.join(", ")
            ))),
        }
    }
}

impl SampleSource for DrivingLogLoader {
    fn load_all(&self) -> PipelineResult<Vec<Sample>> {
        let file = fs::File::open(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::DataMissing(format!("'{}' not found", self.path.display()))
            } else {
                PipelineError::Io(e)
            }
        })?;

        // Simulator logs put a space after each comma
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(file);

        let headers = reader
            .headers()
            .map_err(|e| csv_format_error(&self.path, e))?
            .clone();
        let cols = LogColumns::from_headers(&headers, &self.path)?;

        let mut samples = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(|e| csv_format_error(&self.path, e))?;
            // +2: one for the header line, one for 1-based numbering
            let line   = row + 2;
            let field  = |idx: usize| record.get(idx).unwrap_or("");

            let steering = parse_angle(field(cols.steering)).ok_or_else(|| {
                PipelineError::DataFormat(format!(
                    "'{}' line {}: steering value '{}' is not a finite number",
                    self.path.display(),
                    line,
                    field(cols.steering)
                ))
            })?;

            let views = CameraViews {
                center: PathBuf::from(field(cols.center)),
                left:   PathBuf::from(field(cols.left)),
                right:  PathBuf::from(field(cols.right)),
            };
            samples.push(Sample::new(ImageRef::Views(views), steering));
        }

        tracing::info!("Read {} rows from '{}'", samples.len(), self.path.display());
        Ok(samples)
    }
}

fn csv_format_error(path: &Path, e: csv::Error) -> PipelineError {
    PipelineError::DataFormat(format!("cannot parse '{}': {}", path.display(), e))
}

// ─── LabeledDirLoader ─────────────────────────────────────────────────────────
/// Reads samples from Forward/Left/Right folders whose file
/// names carry the steering angle, e.g. `frame_0042_-0.15.png`.
pub struct LabeledDirLoader {
    data_dir: PathBuf,
}

impl LabeledDirLoader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    /// Image files of one view folder, sorted by file name.
    /// Returned paths are relative to the data directory.
    fn list_view(&self, view: &str) -> PipelineResult<Vec<PathBuf>> {
        let dir = self.data_dir.join(view);
        if !dir.is_dir() {
            return Err(PipelineError::DataMissing(format!(
                "image directory '{}' does not exist",
                dir.display()
            )));
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path  = entry.path();
            if path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(IMAGE_EXTENSION)
            {
                names.push(entry.file_name());
            }
        }
        names.sort();

        Ok(names.into_iter().map(|n| Path::new(view).join(n)).collect())
    }
}

impl SampleSource for LabeledDirLoader {
    fn load_all(&self) -> PipelineResult<Vec<Sample>> {
        let mut samples = Vec::new();

        for view in VIEW_DIRS {
            let files = self.list_view(view)?;
            tracing::debug!("{}: {} images", view, files.len());

            for rel in files {
                let steering = angle_from_file_name(&rel)?;
                samples.push(Sample::new(ImageRef::Single(rel), steering));
            }
        }

        tracing::info!(
            "Found {} labelled images under '{}'",
            samples.len(),
            self.data_dir.display()
        );
        Ok(samples)
    }
}

/// Steering angle encoded as the last `_`-separated token of
/// the file stem. A stem without `_` is parsed whole.
pub fn angle_from_file_name(path: &Path) -> PipelineResult<f32> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            PipelineError::DataFormat(format!("'{}' has no usable file name", path.display()))
        })?;

    let token = stem.rsplit_once('_').map_or(stem, |(_, tail)| tail);

    parse_angle(token).ok_or_else(|| {
        PipelineError::DataFormat(format!(
            "'{}': trailing token '{}' is not a steering angle",
            path.display(),
            token
        ))
    })
}

fn parse_angle(raw: &str) -> Option<f32> {
    raw.trim().parse::<f32>().ok().filter(|v| v.is_finite())
}
