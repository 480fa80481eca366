//! Roadframe Media Library
//!
//! Splits a survey video into fixed-duration clips and decodes clips into
//! per-clip frame sequences using FFmpeg.

pub mod clip_writer;
pub mod extractor;
pub mod segmenter;
pub mod video_reader;

pub use clip_writer::ClipWriter;
pub use extractor::{
    extract_frames, extract_frames_with, list_clips, ClipExtraction, ClipStatus, ExtractionReport,
};
pub use segmenter::{
    frames_per_clip, segment_video, segment_video_with, SegmentOptions, SegmentReport,
};
pub use video_reader::{VideoInfo, VideoReader};

use std::path::PathBuf;

/// Result type for roadframe-media operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for roadframe-media operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Roadframe core error: {0}")]
    Core(#[from] roadframe_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),

    #[error("Cannot open video {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: ffmpeg_next::Error,
    },

    #[error("No video stream found")]
    NoVideoStream,

    #[error("Encoder not available: {0}")]
    EncoderNotFound(&'static str),

    #[error("Clip duration {duration_secs}s holds no frames at {fps:.3} fps")]
    InvalidClipDuration { duration_secs: f64, fps: f64 },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
}
