//! Pipeline configuration value objects

use crate::{Error, Result};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

/// Default target clip duration in seconds
pub const DEFAULT_CLIP_DURATION_SECS: f64 = 2.0;

/// Default bit rate for re-encoded clips (bits per second)
pub const DEFAULT_CLIP_BIT_RATE: usize = 8_000_000;

/// Default number of perceptual model invocations averaged per frame
pub const DEFAULT_PERCEPTUAL_PASSES: u32 = 2;

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Image format of the selected frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum OutputFormat {
    #[default]
    Webp,
    Jpeg,
    Png,
    Avif,
}

impl OutputFormat {
    /// File extension written for this format
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Avif => "avif",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "webp" => Ok(OutputFormat::Webp),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "avif" => Ok(OutputFormat::Avif),
            other => Err(Error::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// How the perceptual model input is cropped out of the resized frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum CropMode {
    /// Independent random crop on every invocation
    #[default]
    Random,
    /// Deterministic center crop
    Center,
}

impl FromStr for CropMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(CropMode::Random),
            "center" => Ok(CropMode::Center),
            other => Err(Error::InvalidConfig(format!("unknown crop mode '{other}'"))),
        }
    }
}

/// Weights of the composite quality score
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QualityWeights {
    pub sharpness: f64,
    pub contrast: f64,
    pub entropy: f64,
    pub perceptual: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            sharpness: 0.3,
            contrast: 0.2,
            entropy: 0.2,
            perceptual: 0.3,
        }
    }
}

impl QualityWeights {
    /// Sum of all four weights
    pub fn total(&self) -> f64 {
        self.sharpness + self.contrast + self.entropy + self.perceptual
    }

    /// Checks that every weight is finite and non-negative and that they sum to one
    pub fn validate(&self) -> Result<()> {
        let all = [self.sharpness, self.contrast, self.entropy, self.perceptual];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::InvalidConfig(format!(
                "quality weights must be finite and non-negative: {self:?}"
            )));
        }
        if (self.total() - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(Error::InvalidConfig(format!(
                "quality weights must sum to 1.0, got {}",
                self.total()
            )));
        }
        Ok(())
    }
}

/// Immutable settings for one pipeline run.
///
/// Every stage directory travels in this single value; the orchestrator
/// receives it once at construction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct PipelineConfig {
    /// Source survey video
    pub video_path: PathBuf,
    /// Staging directory for segmented clips
    pub clips_dir: PathBuf,
    /// Staging directory for per-clip extracted frames
    pub frames_dir: PathBuf,
    /// Destination of the selected frames
    pub output_dir: PathBuf,
    /// Perceptual model weights (ONNX)
    pub model_path: PathBuf,
    /// Target clip duration in seconds
    pub clip_duration_secs: f64,
    /// Image format of the selected frames
    pub output_format: OutputFormat,
    /// Bit rate used when re-encoding clips
    pub clip_bit_rate: usize,
    /// Perceptual model invocations averaged per frame
    pub perceptual_passes: u32,
    /// Crop strategy for the perceptual model input
    pub crop_mode: CropMode,
    /// Composite score weights
    pub weights: QualityWeights,
    /// Keep clips and extracted frames after a successful run
    pub keep_intermediates: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            video_path: PathBuf::new(),
            clips_dir: PathBuf::new(),
            frames_dir: PathBuf::new(),
            output_dir: PathBuf::new(),
            model_path: PathBuf::new(),
            clip_duration_secs: DEFAULT_CLIP_DURATION_SECS,
            output_format: OutputFormat::default(),
            clip_bit_rate: DEFAULT_CLIP_BIT_RATE,
            perceptual_passes: DEFAULT_PERCEPTUAL_PASSES,
            crop_mode: CropMode::default(),
            weights: QualityWeights::default(),
            keep_intermediates: true,
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with default tuning for the given paths
    pub fn new(
        video_path: impl Into<PathBuf>,
        clips_dir: impl Into<PathBuf>,
        frames_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        model_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            video_path: video_path.into(),
            clips_dir: clips_dir.into(),
            frames_dir: frames_dir.into(),
            output_dir: output_dir.into(),
            model_path: model_path.into(),
            ..Self::default()
        }
    }

    pub fn with_clip_duration(mut self, secs: f64) -> Self {
        self.clip_duration_secs = secs;
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn with_crop_mode(mut self, mode: CropMode) -> Self {
        self.crop_mode = mode;
        self
    }

    pub fn with_weights(mut self, weights: QualityWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_keep_intermediates(mut self, keep: bool) -> Self {
        self.keep_intermediates = keep;
        self
    }

    /// Validates paths and tuning values
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("video_path", &self.video_path),
            ("clips_dir", &self.clips_dir),
            ("frames_dir", &self.frames_dir),
            ("output_dir", &self.output_dir),
        ];
        for (name, path) in required {
            if path.as_os_str().is_empty() {
                return Err(Error::InvalidConfig(format!("{name} is not set")));
            }
        }
        self.validate_layout()?;
        if !self.clip_duration_secs.is_finite() || self.clip_duration_secs <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "clip duration must be a positive number of seconds, got {}",
                self.clip_duration_secs
            )));
        }
        if self.perceptual_passes == 0 {
            return Err(Error::InvalidConfig(
                "perceptual_passes must be at least 1".into(),
            ));
        }
        if self.clip_bit_rate == 0 {
            return Err(Error::InvalidConfig("clip_bit_rate must be positive".into()));
        }
        self.weights.validate()
    }

    /// Staging directories are wiped at the start of every run, so no stage
    /// directory may contain another and no input may live inside one.
    fn validate_layout(&self) -> Result<()> {
        let stages = [
            ("clips_dir", absolute(&self.clips_dir)?),
            ("frames_dir", absolute(&self.frames_dir)?),
            ("output_dir", absolute(&self.output_dir)?),
        ];
        for (i, (name, dir)) in stages.iter().enumerate() {
            for (other_name, other) in &stages[i + 1..] {
                if dir.starts_with(other) || other.starts_with(dir) {
                    return Err(Error::InvalidConfig(format!(
                        "{name} {} and {other_name} {} overlap",
                        dir.display(),
                        other.display()
                    )));
                }
            }
        }

        let inputs = [("video_path", &self.video_path), ("model_path", &self.model_path)];
        for (name, path) in inputs {
            if path.as_os_str().is_empty() {
                continue;
            }
            let path = absolute(path)?;
            for (stage, dir) in &stages[..2] {
                if path.starts_with(dir) {
                    return Err(Error::InvalidConfig(format!(
                        "{name} {} lies inside {stage} {}, which is cleared on every run",
                        path.display(),
                        dir.display()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Loads a configuration from a JSON file; missing fields take defaults
    #[cfg(feature = "serde")]
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(config)
    }

    /// Removes the clip and frame staging directories
    pub fn remove_intermediates(&self) -> Result<()> {
        for dir in [&self.clips_dir, &self.frames_dir] {
            remove_dir_if_present(dir)?;
        }
        Ok(())
    }
}

/// Absolute, lexically normalized form of `path`; symlinks are not resolved
fn absolute(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}

fn remove_dir_if_present(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
