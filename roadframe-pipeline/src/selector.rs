//! Per-clip best frame selection

use crate::output::write_selected;
use crate::{Error, ProgressObserver, Result};
use roadframe_core::{
    parse_clip_ordinal, parse_frame_index, parse_selected_file_name, selected_file_name,
    OutputFormat, ProgressEvent, SelectedFrame,
};
use roadframe_quality::QualityScorer;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Selection outcome of one clip
#[derive(Debug, Clone, PartialEq)]
pub struct ClipSelection {
    pub ordinal: u32,
    /// Candidate frames found for the clip
    pub frames: usize,
    /// Winning frame, if any frame could be scored
    pub selected: Option<SelectedFrame>,
    /// Composite score of the winner, negative infinity when none
    pub best_score: f64,
}

/// Outcome of selecting across every clip directory
#[derive(Debug, Clone, Default)]
pub struct SelectionReport {
    pub clips: Vec<ClipSelection>,
}

impl SelectionReport {
    /// Frames written to the output directory, in clip order
    pub fn selected(&self) -> Vec<SelectedFrame> {
        self.clips.iter().filter_map(|c| c.selected.clone()).collect()
    }

    /// Ordinals of clips that produced no output
    pub fn skipped(&self) -> Vec<u32> {
        self.clips
            .iter()
            .filter(|c| c.selected.is_none())
            .map(|c| c.ordinal)
            .collect()
    }
}

/// Lists the `clip{n}` subdirectories of `frames_dir`, ordered by ordinal
pub fn list_clip_dirs(frames_dir: &Path) -> Result<Vec<(u32, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(frames_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(ordinal) = path.file_name().and_then(|n| n.to_str()).and_then(parse_clip_ordinal) {
            dirs.push((ordinal, path));
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Lists candidate frames of one clip in decode order
pub fn list_frames(clip_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for entry in std::fs::read_dir(clip_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(index) = parse_frame_index(&path) {
            frames.push((index, path));
        }
    }
    frames.sort();
    Ok(frames.into_iter().map(|(_, path)| path).collect())
}

/// Deletes `{n}.{ext}` images in `output_dir` that are not in `keep`.
///
/// Other files are left alone. Returns the number of files removed.
pub fn remove_stale_outputs(output_dir: &Path, keep: &[SelectedFrame]) -> Result<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(output_dir)? {
        let path = entry?.path();
        if !path.is_file() || parse_selected_file_name(&path).is_none() {
            continue;
        }
        if keep.iter().any(|frame| frame.path == path) {
            continue;
        }
        std::fs::remove_file(&path)?;
        debug!(path = %path.display(), "Removed stale selected frame");
        removed += 1;
    }
    Ok(removed)
}

/// Highest scoring frame among `frames`; the first one wins ties.
///
/// Frames scoring negative infinity never win.
pub fn best_frame<'a>(frames: &'a [PathBuf], scorer: &QualityScorer) -> Option<(&'a Path, f64)> {
    let mut best: Option<(&Path, f64)> = None;
    for frame in frames {
        let score = scorer.score_path(frame);
        if score == f64::NEG_INFINITY || score.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((frame.as_path(), score));
        }
    }
    best
}

/// Picks the best frame of every clip under `frames_dir` and writes it to
/// `output_dir/{n}.{ext}`.
///
/// `observer` receives `(completed, total)` after every clip, including clips
/// without frames. `cancel` is checked before each clip. Once every clip is
/// done, selected images left in `output_dir` by earlier runs are removed.
pub fn select_best_frames(
    frames_dir: &Path,
    output_dir: &Path,
    scorer: &QualityScorer,
    format: OutputFormat,
    observer: &mut dyn ProgressObserver,
    cancel: &CancellationToken,
) -> Result<SelectionReport> {
    std::fs::create_dir_all(output_dir)?;
    let clip_dirs = list_clip_dirs(frames_dir)?;
    let total = clip_dirs.len();
    info!(clips = total, dir = %frames_dir.display(), "Selecting best frames");

    let mut report = SelectionReport::default();
    for (completed, (ordinal, clip_dir)) in clip_dirs.into_iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let frames = list_frames(&clip_dir)?;
        let selection = match best_frame(&frames, scorer) {
            Some((source, score)) => {
                let path = output_dir.join(selected_file_name(ordinal, format));
                write_selected(source, &path, format)?;
                info!(clip = ordinal, frames = frames.len(), score, source = %source.display(), "Frame selected");
                ClipSelection {
                    ordinal,
                    frames: frames.len(),
                    selected: Some(SelectedFrame {
                        clip: ordinal,
                        source: source.to_path_buf(),
                        path,
                    }),
                    best_score: score,
                }
            }
            None => {
                debug!(clip = ordinal, frames = frames.len(), "No scorable frame, skipping clip");
                ClipSelection {
                    ordinal,
                    frames: frames.len(),
                    selected: None,
                    best_score: f64::NEG_INFINITY,
                }
            }
        };
        report.clips.push(selection);
        observer.on_progress(ProgressEvent::new(completed + 1, total));
    }

    let selected = report.selected();
    let stale = remove_stale_outputs(output_dir, &selected)?;
    info!(
        selected = selected.len(),
        skipped = report.skipped().len(),
        stale,
        "Selection complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{imageops, Rgb, RgbImage};
    use roadframe_quality::QualityModel;
    use std::sync::Arc;

    struct FlatModel;

    impl QualityModel for FlatModel {
        fn score(&self, _image: &RgbImage) -> roadframe_quality::Result<f64> {
            Ok(10.0)
        }
    }

    fn scorer() -> QualityScorer {
        QualityScorer::new(Arc::new(FlatModel))
    }

    fn texture() -> RgbImage {
        RgbImage::from_fn(64, 48, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgb([220, 210, 200])
            } else {
                Rgb([30, 40, 50])
            }
        })
    }

    fn write_frames(dir: &Path, blurs: &[f32]) {
        std::fs::create_dir_all(dir).unwrap();
        let sharp = texture();
        for (i, &sigma) in blurs.iter().enumerate() {
            let img = if sigma > 0.0 { imageops::blur(&sharp, sigma) } else { sharp.clone() };
            img.save(dir.join(format!("frame{i:04}.jpg"))).unwrap();
        }
    }

    #[test]
    fn test_picks_sharpest_frame_per_clip() {
        let tmp = tempfile::tempdir().unwrap();
        let frames_dir = tmp.path().join("frames");
        let out = tmp.path().join("out");
        write_frames(&frames_dir.join("clip1"), &[3.0, 2.0, 0.0, 2.5]);
        write_frames(&frames_dir.join("clip2"), &[0.0, 3.0]);

        let report = select_best_frames(
            &frames_dir,
            &out,
            &scorer(),
            OutputFormat::Png,
            &mut (),
            &CancellationToken::new(),
        )
        .unwrap();

        let selected = report.selected();
        assert_eq!(selected.len(), 2);
        assert!(selected[0].source.ends_with("clip1/frame0002.jpg"));
        assert!(selected[1].source.ends_with("clip2/frame0000.jpg"));
        assert!(out.join("1.png").exists());
        assert!(out.join("2.png").exists());
    }

    #[test]
    fn test_ties_resolve_to_first_frame() {
        let tmp = tempfile::tempdir().unwrap();
        let clip = tmp.path().join("clip1");
        write_frames(&clip, &[1.0, 1.0, 1.0]);

        let frames = list_frames(&clip).unwrap();
        let (winner, _) = best_frame(&frames, &scorer()).unwrap();
        assert!(winner.ends_with("frame0000.jpg"));
    }

    #[test]
    fn test_empty_and_unscorable_clips_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let frames_dir = tmp.path().join("frames");
        let out = tmp.path().join("out");
        write_frames(&frames_dir.join("clip1"), &[0.0]);
        std::fs::create_dir_all(frames_dir.join("clip2")).unwrap();
        std::fs::create_dir_all(frames_dir.join("clip3")).unwrap();
        std::fs::write(frames_dir.join("clip3").join("frame0000.jpg"), b"corrupt").unwrap();

        let mut events = Vec::new();
        let report = select_best_frames(
            &frames_dir,
            &out,
            &scorer(),
            OutputFormat::Webp,
            &mut |e: ProgressEvent| events.push(e),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(report.skipped(), vec![2, 3]);
        assert!(out.join("1.webp").exists());
        assert!(!out.join("2.webp").exists());
        assert!(!out.join("3.webp").exists());
        assert_eq!(
            events,
            vec![
                ProgressEvent::new(1, 3),
                ProgressEvent::new(2, 3),
                ProgressEvent::new(3, 3)
            ]
        );
    }

    #[test]
    fn test_frames_listed_by_index_past_padding() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["frame10000.jpg", "frame1001.jpg", "frame1000.jpg", "frame0002.jpg", "notes.jpg"] {
            std::fs::write(tmp.path().join(name), b"x").unwrap();
        }

        let names: Vec<String> = list_frames(tmp.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["frame0002.jpg", "frame1000.jpg", "frame1001.jpg", "frame10000.jpg"]
        );
    }

    #[test]
    fn test_previous_outputs_are_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let frames_dir = tmp.path().join("frames");
        let out = tmp.path().join("out");
        write_frames(&frames_dir.join("clip1"), &[0.0]);
        write_frames(&frames_dir.join("clip2"), &[0.0]);
        std::fs::create_dir_all(frames_dir.join("clip3")).unwrap();
        std::fs::create_dir_all(&out).unwrap();
        for name in ["1.png", "3.webp", "4.webp", "notes.txt", "cover.webp"] {
            std::fs::write(out.join(name), b"old").unwrap();
        }

        select_best_frames(
            &frames_dir,
            &out,
            &scorer(),
            OutputFormat::Webp,
            &mut (),
            &CancellationToken::new(),
        )
        .unwrap();

        let mut names: Vec<String> = std::fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["1.webp", "2.webp", "cover.webp", "notes.txt"]);
    }

    #[test]
    fn test_clip_dirs_in_numeric_order() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["clip10", "clip2", "clip1", "scratch"] {
            std::fs::create_dir_all(tmp.path().join(name)).unwrap();
        }
        let ordinals: Vec<u32> = list_clip_dirs(tmp.path()).unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(ordinals, vec![1, 2, 10]);
    }

    #[test]
    fn test_cancelled_before_first_clip() {
        let tmp = tempfile::tempdir().unwrap();
        let frames_dir = tmp.path().join("frames");
        write_frames(&frames_dir.join("clip1"), &[0.0]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = select_best_frames(
            &frames_dir,
            &tmp.path().join("out"),
            &scorer(),
            OutputFormat::Webp,
            &mut (),
            &cancel,
        );
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
