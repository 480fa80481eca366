//! Fixed-duration segmentation of a survey video into clips

use crate::{ClipWriter, Error, Result, VideoReader};
use roadframe_core::{clip_file_name, Clip};
use std::ops::ControlFlow;
use std::path::Path;
use tracing::{debug, info, warn};

/// Segmentation settings
#[derive(Debug, Clone)]
pub struct SegmentOptions {
    /// Target clip duration in seconds
    pub clip_duration_secs: f64,
    /// Bit rate of the re-encoded clips
    pub bit_rate: usize,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            clip_duration_secs: roadframe_core::config::DEFAULT_CLIP_DURATION_SECS,
            bit_rate: roadframe_core::config::DEFAULT_CLIP_BIT_RATE,
        }
    }
}

/// Outcome of segmenting one video
#[derive(Debug, Clone)]
pub struct SegmentReport {
    pub fps: f64,
    pub frames_per_clip: usize,
    /// Frames actually decoded from the source
    pub total_frames: usize,
    pub clips: Vec<Clip>,
    /// Segmentation was stopped by the caller before the source was exhausted
    pub stopped: bool,
}

/// Number of whole frames that fit in a clip of `duration_secs` at `fps`
pub fn frames_per_clip(duration_secs: f64, fps: f64) -> Result<usize> {
    let frames = (duration_secs * fps).floor();
    if !frames.is_finite() || frames < 1.0 {
        return Err(Error::InvalidClipDuration { duration_secs, fps });
    }
    Ok(frames as usize)
}

/// Splits `source` into consecutive clips `clip1.avi`, `clip2.avi`, ... in
/// `clips_dir`.
///
/// Every decoded frame lands in exactly one clip; the last clip may be
/// shorter. A writer is only opened once a frame is available, so no empty
/// clip file is ever produced. Any write failure aborts the segmentation; a
/// source decode failure after the first frame ends it early.
pub fn segment_video(
    source: &Path,
    clips_dir: &Path,
    options: &SegmentOptions,
) -> Result<SegmentReport> {
    segment_video_with(source, clips_dir, options, |_| ControlFlow::Continue(()))
}

/// Like [`segment_video`], calling `after_clip` once each clip is finalized.
///
/// Returning `ControlFlow::Break` stops before the next clip is started.
pub fn segment_video_with<F>(
    source: &Path,
    clips_dir: &Path,
    options: &SegmentOptions,
    mut after_clip: F,
) -> Result<SegmentReport>
where
    F: FnMut(&Clip) -> ControlFlow<()>,
{
    let mut reader = VideoReader::open(source)?;
    std::fs::create_dir_all(clips_dir)?;

    let fps = reader.fps();
    let per_clip = frames_per_clip(options.clip_duration_secs, fps)?;
    let width = reader.width();
    let height = reader.height();
    let rate = reader.frame_rate();
    let reported_frames = reader.frame_count();

    info!(
        source = %source.display(),
        width,
        height,
        fps,
        frames_per_clip = per_clip,
        reported_frames,
        expected_clips = reported_frames.div_ceil(per_clip as u64),
        "Segmenting video"
    );

    let mut clips = Vec::new();
    let mut total_frames = 0usize;
    let mut ordinal: u32 = 1;
    let mut exhausted = false;
    let mut stopped = false;

    while !exhausted && !stopped {
        let clip_path = clips_dir.join(clip_file_name(ordinal));
        let mut writer: Option<ClipWriter> = None;

        while writer.as_ref().map_or(0, |w| w.frames_written()) < per_clip {
            let decoded = total_frames + writer.as_ref().map_or(0, |w| w.frames_written());
            let Some(frame) = end_on_decode_error(reader.next_frame(), decoded)? else {
                exhausted = true;
                break;
            };
            if writer.is_none() {
                writer = Some(ClipWriter::create(
                    &clip_path,
                    width,
                    height,
                    rate,
                    options.bit_rate,
                )?);
            }
            if let Some(clip) = writer.as_mut() {
                clip.write_frame(&frame)?;
            }
        }

        if let Some(clip) = writer {
            let frame_count = clip.finish()?;
            total_frames += frame_count;
            debug!(clip = ordinal, frames = frame_count, "Clip written");
            let clip = Clip::new(ordinal, clip_path, frame_count);
            stopped = after_clip(&clip).is_break();
            clips.push(clip);
            ordinal += 1;
        }
    }

    info!(
        clips = clips.len(),
        frames = total_frames,
        "Segmentation complete"
    );

    Ok(SegmentReport {
        fps,
        frames_per_clip: per_clip,
        total_frames,
        clips,
        stopped,
    })
}

/// A source that fails to decode after yielding frames is treated as ended,
/// which is how a recording cut off by power loss looks. A failure on the
/// very first frame is still an error.
fn end_on_decode_error<T>(next: Result<Option<T>>, decoded: usize) -> Result<Option<T>> {
    match next {
        Err(e) if decoded > 0 => {
            warn!(frames = decoded, error = %e, "Source decode failed, ending segmentation");
            Ok(None)
        }
        other => other,
    }
}
