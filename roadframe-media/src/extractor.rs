//! Decoding clips into per-clip frame sequences

use crate::{Result, VideoReader};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use roadframe_core::{clip_dir_name, parse_clip_ordinal, FrameRef};
use std::fs::File;
use std::io::BufWriter;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CLIP_EXTENSIONS: &[&str] = &["avi", "mp4"];
const JPEG_QUALITY: u8 = 95;

/// How far decoding of a clip got
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipStatus {
    /// Decoded until the clip reported exhaustion
    Complete,
    /// A decode error cut the clip short; earlier frames were kept
    Truncated,
    /// The clip could not be opened; no frames were produced
    OpenFailed,
}

/// Per-clip extraction result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipExtraction {
    pub ordinal: u32,
    pub frames_dir: PathBuf,
    pub frame_count: usize,
    pub status: ClipStatus,
}

/// Outcome of extracting every clip in a directory
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    pub clips: Vec<ClipExtraction>,
    /// Extraction was stopped by the caller before all clips were processed
    pub stopped: bool,
}

impl ExtractionReport {
    /// Total frames written across all clips
    pub fn total_frames(&self) -> usize {
        self.clips.iter().map(|c| c.frame_count).sum()
    }
}

/// Lists `clip{n}.avi|mp4` files in `clips_dir`, ordered by ordinal.
///
/// Each ordinal appears once; `avi` wins over `mp4` when both exist.
pub fn list_clips(clips_dir: &Path) -> Result<Vec<(u32, PathBuf)>> {
    let mut clips = Vec::new();
    for entry in std::fs::read_dir(clips_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(rank) = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|e| CLIP_EXTENSIONS.iter().position(|c| e.eq_ignore_ascii_case(c)))
        else {
            continue;
        };
        match path.file_stem().and_then(|s| s.to_str()).and_then(parse_clip_ordinal) {
            Some(ordinal) => clips.push((ordinal, rank, path)),
            None => debug!(path = %path.display(), "Ignoring file without clip ordinal"),
        }
    }
    clips.sort();

    let mut unique: Vec<(u32, PathBuf)> = Vec::with_capacity(clips.len());
    for (ordinal, _, path) in clips {
        if unique.last().is_some_and(|(last, _)| *last == ordinal) {
            warn!(clip = ordinal, ignored = %path.display(), "Duplicate clip ordinal, skipping");
        } else {
            unique.push((ordinal, path));
        }
    }
    Ok(unique)
}

/// Decodes every clip in `clips_dir` into `frames_dir/clip{n}/frame{i:04}.jpg`
pub fn extract_frames(clips_dir: &Path, frames_dir: &Path) -> Result<ExtractionReport> {
    extract_frames_with(clips_dir, frames_dir, |_| ControlFlow::Continue(()))
}

/// Like [`extract_frames`], calling `after_clip` once each clip is done.
///
/// Returning `ControlFlow::Break` stops before the next clip. Clips that
/// cannot be opened or fail mid-decode are recorded and skipped; only
/// filesystem failures abort.
pub fn extract_frames_with<F>(
    clips_dir: &Path,
    frames_dir: &Path,
    mut after_clip: F,
) -> Result<ExtractionReport>
where
    F: FnMut(&ClipExtraction) -> ControlFlow<()>,
{
    std::fs::create_dir_all(frames_dir)?;
    let clips = list_clips(clips_dir)?;
    info!(clips = clips.len(), dir = %clips_dir.display(), "Extracting frames");

    let mut report = ExtractionReport::default();
    for (ordinal, clip_path) in clips {
        let out_dir = frames_dir.join(clip_dir_name(ordinal));
        reset_dir(&out_dir)?;

        let (frame_count, status) = extract_clip(&clip_path, frames_dir, ordinal)?;
        debug!(clip = ordinal, frames = frame_count, ?status, "Clip extracted");

        let extraction = ClipExtraction {
            ordinal,
            frames_dir: out_dir,
            frame_count,
            status,
        };
        let flow = after_clip(&extraction);
        report.clips.push(extraction);

        if flow.is_break() {
            report.stopped = true;
            break;
        }
    }

    info!(
        clips = report.clips.len(),
        frames = report.total_frames(),
        "Frame extraction complete"
    );
    Ok(report)
}

fn extract_clip(clip_path: &Path, frames_dir: &Path, ordinal: u32) -> Result<(usize, ClipStatus)> {
    let mut reader = match VideoReader::open(clip_path) {
        Ok(reader) => reader,
        Err(e) => {
            warn!(clip = ordinal, error = %e, "Cannot open clip, skipping");
            return Ok((0, ClipStatus::OpenFailed));
        }
    };

    let mut index: u32 = 0;
    loop {
        match reader.next_rgb_frame() {
            Ok(Some(frame)) => {
                save_frame(&frame, &FrameRef::new(frames_dir, ordinal, index).path)?;
                index += 1;
            }
            Ok(None) => return Ok((index as usize, ClipStatus::Complete)),
            Err(e) => {
                warn!(clip = ordinal, frames = index, error = %e, "Decode failed, truncating clip");
                return Ok((index as usize, ClipStatus::Truncated));
            }
        }
    }
}

fn save_frame(frame: &RgbImage, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    frame.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY))?;
    Ok(())
}

/// Empties a per-clip directory so reruns never mix stale frames in
fn reset_dir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}
