//! Roadframe Quality Library
//!
//! Scores a single decoded frame by a weighted combination of sharpness,
//! contrast, entropy and a learned perceptual-quality model.

pub mod metrics;
pub mod model;
pub mod scorer;

pub use model::{OnnxModelConfig, OnnxQualityModel, QualityModel};
pub use scorer::{QualityBreakdown, QualityScorer};

use std::path::PathBuf;

/// Result type for roadframe-quality operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for roadframe-quality operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Roadframe core error: {0}")]
    Core(#[from] roadframe_core::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Failed to load quality model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("Quality model inference failed: {0}")]
    Inference(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub(crate) fn model_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::ModelLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn inference(reason: impl ToString) -> Self {
        Error::Inference(reason.to_string())
    }
}
