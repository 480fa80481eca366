//! Full pipeline runs over synthetic survey videos

use ffmpeg_next as ffmpeg;
use image::{imageops, Rgb, RgbImage};
use roadframe_core::{FrameRef, OutputFormat, PipelineConfig, ProgressEvent};
use roadframe_media::ClipWriter;
use roadframe_pipeline::{spawn_pipeline, Orchestrator, PipelineEvent};
use roadframe_quality::{QualityModel, QualityScorer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const WIDTH: u32 = 160;
const HEIGHT: u32 = 120;
const SHARP_INDEX: usize = 37;

/// Perceptual stand-in with a constant opinion, so structure decides
struct NeutralModel;

impl QualityModel for NeutralModel {
    fn score(&self, _image: &RgbImage) -> roadframe_quality::Result<f64> {
        Ok(50.0)
    }
}

fn road_surface(shift: u32) -> RgbImage {
    RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
        if ((x + shift) / 6 + y / 6) % 2 == 0 {
            Rgb([210, 205, 190])
        } else {
            Rgb([45, 50, 55])
        }
    })
}

/// Writes `seconds` of video at `fps` where frame `SHARP_INDEX` of every
/// `frames_per_clip` group is sharp and every other frame is blurred
fn write_survey(path: &Path, seconds: u32, fps: i32, frames_per_clip: usize) {
    let mut writer =
        ClipWriter::create(path, WIDTH, HEIGHT, ffmpeg::Rational(fps, 1), 8_000_000).unwrap();
    let total = seconds as usize * fps as usize;
    for i in 0..total {
        let surface = road_surface(i as u32 % 12);
        let frame = if i % frames_per_clip == SHARP_INDEX % frames_per_clip {
            surface
        } else {
            imageops::blur(&surface, 3.0)
        };
        writer.write_rgb(&frame).unwrap();
    }
    writer.finish().unwrap();
}

fn config(root: &Path, duration: f64) -> PipelineConfig {
    PipelineConfig::new(
        root.join("survey.avi"),
        root.join("clips"),
        root.join("frames"),
        root.join("selected"),
        root.join("unused.onnx"),
    )
    .with_clip_duration(duration)
}

fn orchestrator(config: PipelineConfig) -> Orchestrator {
    Orchestrator::new(config, QualityScorer::new(Arc::new(NeutralModel)))
}

fn output_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn frame_path(config: &PipelineConfig, clip: u32, index: usize) -> PathBuf {
    FrameRef::new(&config.frames_dir, clip, index as u32).path
}

#[tokio::test]
async fn test_ten_second_survey_yields_one_frame_per_clip() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path(), 2.0);
    write_survey(&config.video_path, 10, 30, 60);

    let orchestrator = Arc::new(orchestrator(config.clone()));
    let mut handle = spawn_pipeline(orchestrator);

    let mut progress = Vec::new();
    let summary = loop {
        match handle.next_event().await.expect("terminal event") {
            PipelineEvent::Progress(event) => progress.push(event),
            PipelineEvent::Completed(summary) => break summary,
            PipelineEvent::Failed(message) => panic!("pipeline failed: {message}"),
        }
    };

    assert_eq!(summary.clips, 5);
    assert_eq!(summary.frames_extracted, 300);
    assert!(summary.skipped.is_empty());

    let expected: Vec<ProgressEvent> = (1..=5).map(|n| ProgressEvent::new(n, 5)).collect();
    assert_eq!(progress, expected);

    assert_eq!(
        output_names(&config.output_dir),
        vec!["1.webp", "2.webp", "3.webp", "4.webp", "5.webp"]
    );

    for clip in 1..=5u32 {
        let clip_frames = std::fs::read_dir(config.frames_dir.join(format!("clip{clip}")))
            .unwrap()
            .count();
        assert_eq!(clip_frames, 60);

        let selected = &summary.selected[clip as usize - 1];
        assert_eq!(selected.clip, clip);
        assert_eq!(selected.source, frame_path(&config, clip, SHARP_INDEX));

        let written = image::open(&selected.path).unwrap().to_rgb8();
        let sharp = image::open(frame_path(&config, clip, SHARP_INDEX)).unwrap().to_rgb8();
        let first = image::open(frame_path(&config, clip, 0)).unwrap().to_rgb8();
        assert_eq!(written, sharp);
        assert_ne!(written, first);
    }
}

#[test]
fn test_rerun_keeps_ordinal_names() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path(), 1.0).with_output_format(OutputFormat::Png);
    write_survey(&config.video_path, 3, 10, 10);

    let orchestrator = orchestrator(config.clone());
    let first = orchestrator.run(&mut (), &CancellationToken::new()).unwrap();
    let first_names = output_names(&config.output_dir);
    let second = orchestrator.run(&mut (), &CancellationToken::new()).unwrap();

    assert_eq!(first_names, vec!["1.png", "2.png", "3.png"]);
    assert_eq!(output_names(&config.output_dir), first_names);
    assert_eq!(first.selected, second.selected);
}

#[test]
fn test_rerun_on_shorter_video_drops_old_outputs() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path(), 1.0).with_output_format(OutputFormat::Png);
    write_survey(&config.video_path, 3, 10, 10);

    let orchestrator = orchestrator(config.clone());
    orchestrator.run(&mut (), &CancellationToken::new()).unwrap();
    assert_eq!(output_names(&config.output_dir), vec!["1.png", "2.png", "3.png"]);

    write_survey(&config.video_path, 2, 10, 10);
    let summary = orchestrator.run(&mut (), &CancellationToken::new()).unwrap();

    assert_eq!(summary.clips, 2);
    assert_eq!(output_names(&config.output_dir), vec!["1.png", "2.png"]);
    assert!(!config.clips_dir.join("clip3.avi").exists());
}

#[test]
fn test_discarding_intermediates() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path(), 1.0).with_keep_intermediates(false);
    write_survey(&config.video_path, 2, 10, 10);

    let mut events = Vec::new();
    let summary = orchestrator(config.clone())
        .run(&mut |e: ProgressEvent| events.push(e), &CancellationToken::new())
        .unwrap();

    assert_eq!(summary.selected.len(), 2);
    assert_eq!(events.last(), Some(&ProgressEvent::new(2, 2)));
    assert!(!config.clips_dir.exists());
    assert!(!config.frames_dir.exists());
    assert_eq!(output_names(&config.output_dir), vec!["1.webp", "2.webp"]);
}

#[tokio::test]
async fn test_cancelled_run_reports_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path(), 1.0);
    write_survey(&config.video_path, 2, 10, 10);

    let handle = spawn_pipeline(Arc::new(orchestrator(config)));
    handle.cancel();
    let result = handle.wait().await;
    assert_eq!(result.unwrap_err(), "pipeline cancelled");
}
