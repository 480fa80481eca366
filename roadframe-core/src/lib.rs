//! Roadframe Core Library
//!
//! Data model, on-disk naming rules and configuration shared by every stage of
//! the road-survey frame selection pipeline.

pub mod clip;
pub mod config;
pub mod layout;
pub mod progress;

pub use clip::{
    clip_dir_name, clip_file_name, frame_file_name, is_frame_file, parse_clip_ordinal,
    parse_frame_index, parse_selected_file_name, selected_file_name, Clip, FrameRef, SelectedFrame, CLIP_EXTENSION, FRAME_EXTENSION,
};
pub use config::{CropMode, OutputFormat, PipelineConfig, QualityWeights};
pub use layout::SurveyLayout;
pub use progress::ProgressEvent;

/// Result type for roadframe-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for roadframe-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown output format: {0}")]
    UnknownFormat(String),

    #[cfg(feature = "serde")]
    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),
}
