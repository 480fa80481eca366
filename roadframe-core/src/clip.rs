//! Clip, frame and selected-frame data structures plus their on-disk names

use crate::OutputFormat;
use std::path::{Path, PathBuf};

/// Container extension used for segmented clips (MPEG-4 Part 2 in AVI)
pub const CLIP_EXTENSION: &str = "avi";

/// Image extension used for extracted candidate frames
pub const FRAME_EXTENSION: &str = "jpg";

const CLIP_PREFIX: &str = "clip";
const FRAME_PREFIX: &str = "frame";

/// A contiguous, fixed-duration segment of the source video
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Clip {
    /// 1-based position of the clip in the source video
    pub ordinal: u32,
    /// Location of the encoded clip file
    pub path: PathBuf,
    /// Number of frames written to the clip
    pub frame_count: usize,
}

impl Clip {
    /// Creates a new clip record
    pub fn new(ordinal: u32, path: PathBuf, frame_count: usize) -> Self {
        Self {
            ordinal,
            path,
            frame_count,
        }
    }
}

/// A decoded frame stored on disk, addressed by clip ordinal and decode index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRef {
    pub clip: u32,
    pub index: u32,
    pub path: PathBuf,
}

impl FrameRef {
    /// Builds the reference for frame `index` of clip `clip` under `frames_dir`
    pub fn new(frames_dir: &Path, clip: u32, index: u32) -> Self {
        let path = frames_dir
            .join(clip_dir_name(clip))
            .join(frame_file_name(index));
        Self { clip, index, path }
    }
}

/// The representative frame chosen for a clip
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SelectedFrame {
    /// Ordinal of the clip this frame represents
    pub clip: u32,
    /// Candidate frame the winner was copied from
    pub source: PathBuf,
    /// Stable output location, named by the clip ordinal
    pub path: PathBuf,
}

/// File name of clip `ordinal` (`clip{n}.avi`)
pub fn clip_file_name(ordinal: u32) -> String {
    format!("{CLIP_PREFIX}{ordinal}.{CLIP_EXTENSION}")
}

/// Directory name holding the frames of clip `ordinal` (`clip{n}`)
pub fn clip_dir_name(ordinal: u32) -> String {
    format!("{CLIP_PREFIX}{ordinal}")
}

/// File name of the frame at decode `index`, zero padded to four digits.
///
/// Indices past 9999 widen the name, so order frames with
/// [`parse_frame_index`] rather than by name.
pub fn frame_file_name(index: u32) -> String {
    format!("{FRAME_PREFIX}{index:04}.{FRAME_EXTENSION}")
}

/// Output file name for the frame selected from clip `ordinal`
pub fn selected_file_name(ordinal: u32, format: OutputFormat) -> String {
    format!("{ordinal}.{}", format.extension())
}

/// Parses the ordinal out of a clip stem such as `clip12`.
///
/// Returns `None` for anything that is not `clip` followed by a positive
/// decimal number.
pub fn parse_clip_ordinal(stem: &str) -> Option<u32> {
    parse_digits(stem.strip_prefix(CLIP_PREFIX)?).filter(|&n| n > 0)
}

/// Decode index of an extracted frame such as `clip3/frame0042.jpg`
pub fn parse_frame_index(path: &Path) -> Option<u32> {
    let ext_ok = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(FRAME_EXTENSION));
    if !ext_ok {
        return None;
    }
    let digits = path.file_stem()?.to_str()?.strip_prefix(FRAME_PREFIX)?;
    parse_digits(digits)
}

/// Returns true if `path` names an extracted candidate frame
pub fn is_frame_file(path: &Path) -> bool {
    parse_frame_index(path).is_some()
}

/// Clip ordinal and format of a selected-frame file such as `7.webp`
pub fn parse_selected_file_name(path: &Path) -> Option<(u32, OutputFormat)> {
    let ordinal = parse_digits(path.file_stem()?.to_str()?).filter(|&n| n > 0)?;
    let format = path.extension()?.to_str()?.parse().ok()?;
    Some((ordinal, format))
}

fn parse_digits(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
