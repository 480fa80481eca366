//! Roadframe Pipeline Library
//!
//! Drives segmentation, frame extraction and per-clip best frame selection,
//! reporting progress once per completed clip. The whole run can be moved off
//! the caller's thread with [`spawn_pipeline`].

pub mod orchestrator;
pub mod output;
pub mod progress;
pub mod runner;
pub mod selector;

pub use orchestrator::{Orchestrator, RunSummary};
pub use output::write_selected;
pub use progress::{ProgressObserver, ProgressTracker};
pub use runner::{spawn_pipeline, PipelineEvent, PipelineHandle};
pub use selector::{select_best_frames, ClipSelection, SelectionReport};

/// Result type for roadframe-pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for roadframe-pipeline operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Roadframe core error: {0}")]
    Core(#[from] roadframe_core::Error),

    #[error("Media error: {0}")]
    Media(#[from] roadframe_media::Error),

    #[error("Quality error: {0}")]
    Quality(#[from] roadframe_quality::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("AVIF encoding error: {0}")]
    AvifEncode(String),

    #[error("pipeline cancelled")]
    Cancelled,
}
