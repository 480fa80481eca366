//! Full pipeline: segment, extract, select

use crate::selector::select_best_frames;
use crate::{Error, ProgressObserver, Result};
use roadframe_core::{PipelineConfig, SelectedFrame};
use roadframe_media::{extract_frames_with, segment_video_with, SegmentOptions};
use roadframe_quality::{OnnxModelConfig, OnnxQualityModel, QualityScorer};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Result of one successful pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Clips produced by segmentation
    pub clips: usize,
    /// Frames decoded across all clips
    pub frames_extracted: usize,
    /// One entry per clip that produced an output image
    pub selected: Vec<SelectedFrame>,
    /// Ordinals of clips without output
    pub skipped: Vec<u32>,
}

/// Runs the frame selection pipeline for one configuration.
///
/// The configuration is fixed at construction; the clips and frames
/// directories are owned by the run and cleared before it starts.
pub struct Orchestrator {
    config: PipelineConfig,
    scorer: QualityScorer,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig, scorer: QualityScorer) -> Self {
        Self { config, scorer }
    }

    /// Loads the perceptual model named by `config.model_path` and builds a
    /// scorer from the configured weights.
    ///
    /// A missing or corrupt model fails here, before anything is processed.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let model_config = OnnxModelConfig {
            crop_mode: config.crop_mode,
            ..OnnxModelConfig::default()
        };
        let model = OnnxQualityModel::load(&config.model_path, model_config)?;
        let scorer = QualityScorer::new(Arc::new(model))
            .with_weights(config.weights)?
            .with_perceptual_passes(config.perceptual_passes)?;

        Ok(Self::new(config, scorer))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn scorer(&self) -> &QualityScorer {
        &self.scorer
    }

    /// Runs every stage on the calling thread.
    ///
    /// `observer` gets one event per clip during selection. `cancel` is
    /// polled between stages and at clip boundaries.
    pub fn run(
        &self,
        observer: &mut dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        let config = &self.config;
        config.validate()?;
        let started = Instant::now();

        info!(
            video = %config.video_path.display(),
            clip_duration_secs = config.clip_duration_secs,
            format = %config.output_format,
            "Starting pipeline"
        );

        config.remove_intermediates()?;
        std::fs::create_dir_all(&config.output_dir)?;

        check_cancelled(cancel)?;
        let options = SegmentOptions {
            clip_duration_secs: config.clip_duration_secs,
            bit_rate: config.clip_bit_rate,
        };
        let segments = segment_video_with(&config.video_path, &config.clips_dir, &options, |_| {
            continue_unless(cancel)
        })?;
        if segments.stopped {
            return Err(Error::Cancelled);
        }

        check_cancelled(cancel)?;
        let extraction = extract_frames_with(&config.clips_dir, &config.frames_dir, |_| {
            continue_unless(cancel)
        })?;
        if extraction.stopped {
            return Err(Error::Cancelled);
        }

        check_cancelled(cancel)?;
        let selection = select_best_frames(
            &config.frames_dir,
            &config.output_dir,
            &self.scorer,
            config.output_format,
            observer,
            cancel,
        )?;

        if !config.keep_intermediates {
            config.remove_intermediates()?;
        }

        let summary = RunSummary {
            clips: segments.clips.len(),
            frames_extracted: extraction.total_frames(),
            selected: selection.selected(),
            skipped: selection.skipped(),
        };
        info!(
            clips = summary.clips,
            frames = summary.frames_extracted,
            selected = summary.selected.len(),
            skipped = summary.skipped.len(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Pipeline complete"
        );
        Ok(summary)
    }
}

fn continue_unless(cancel: &CancellationToken) -> ControlFlow<()> {
    if cancel.is_cancelled() {
        ControlFlow::Break(())
    } else {
        ControlFlow::Continue(())
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}
